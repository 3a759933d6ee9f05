//! Widget host abstraction and the cross-window message contract.
//!
//! The hosted widget runs in a popup owned by the embedding UI shell. The
//! orchestrator never touches windowing directly; it opens popups and
//! receives messages through [`WidgetHost`], which the shell implements.
//!
//! # Message trust
//!
//! Widget messages carry the sender's origin. Only messages from the
//! payment provider's domain (or a subdomain of it) are interpreted; every
//! other origin is discarded before the payload is even inspected. The
//! check is a host-suffix match at a label boundary, so a hostile domain
//! that merely *contains* the provider's name does not pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use super::url::SANDBOX_DOMAIN;

/// Raw cross-window message as delivered by the UI shell.
#[derive(Debug, Clone)]
pub struct WidgetMessage {
    /// Origin of the sending window, e.g. `https://pay.coinbase.com`.
    pub origin: String,
    /// Message body; the provider posts JSON objects.
    pub payload: Value,
}

/// Terminal vocabulary posted by the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// The purchase or sale completed.
    Success,
    /// The user finished the widget without completing a transaction.
    Exit,
    /// The widget failed; carries the provider's error text when present.
    Error(Option<String>),
}

/// Popup viewport placement, fixed for every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupOptions {
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            width: 450,
            height: 700,
            left: 400,
            top: 100,
        }
    }
}

/// An open widget popup.
pub trait PopupHandle: Send {
    /// Whether the window has been closed, by us or by the user.
    fn is_closed(&self) -> bool;

    /// Force-close the window. Idempotent.
    fn close(&mut self);
}

/// Capability the UI shell provides for widget popup lifecycles.
pub trait WidgetHost: Send + Sync {
    /// Open a popup at `url`. Returns `None` when the host refuses to open
    /// a window (popup blocker, headless shell).
    fn open_popup(&self, url: &Url, options: PopupOptions) -> Option<Box<dyn PopupHandle>>;

    /// Subscribe to cross-window messages. Each receiver sees every message
    /// delivered after subscription.
    fn subscribe_messages(&self) -> mpsc::UnboundedReceiver<WidgetMessage>;
}

/// Whether `origin` belongs to the payment provider.
pub fn is_trusted_origin(origin: &str, provider_domain: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    if url.scheme() != "https" {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };

    host == provider_domain || host.ends_with(&format!(".{provider_domain}"))
}

/// Interpret a raw message as a widget event.
///
/// Returns `None` for untrusted origins and for payloads outside the
/// provider's event vocabulary.
pub fn parse_trusted_event(message: &WidgetMessage, provider_domain: &str) -> Option<WidgetEvent> {
    if !is_trusted_origin(&message.origin, provider_domain) {
        return None;
    }

    let event_name = message.payload.get("eventName")?.as_str()?;
    match event_name {
        "success" => Some(WidgetEvent::Success),
        "exit" => Some(WidgetEvent::Exit),
        "error" => Some(WidgetEvent::Error(
            message
                .payload
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_owned),
        )),
        _ => None,
    }
}

/// Behavior of a [`SimulatedWidget`] popup after its response delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetScript {
    /// Post a `success` event from the sandbox origin.
    CompletePurchase,
    /// Post an `exit` event without completing a transaction.
    ExitWithoutPurchase,
    /// Post an `error` event with the given text.
    ReportError(String),
    /// Close the popup without posting anything.
    UserClosesPopup,
    /// Never respond; the attempt runs into its deadline.
    Unresponsive,
    /// Refuse to open the popup at all.
    BlockPopup,
}

/// Scripted [`WidgetHost`] for sandbox demos and tests.
///
/// Plays one fixed script against every popup it opens, after a short
/// response delay, and records opened URLs for inspection. Cloning shares
/// the recorded state, so a caller can hand one clone to the orchestrator
/// and keep another for assertions. Must be used from within a tokio
/// runtime.
#[derive(Clone)]
pub struct SimulatedWidget {
    script: WidgetScript,
    response_delay: Duration,
    state: Arc<SimulatedState>,
}

#[derive(Default)]
struct SimulatedState {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<WidgetMessage>>>,
    opened: Mutex<Vec<Url>>,
    popups: Mutex<Vec<Arc<AtomicBool>>>,
}

impl SimulatedState {
    fn broadcast(&self, message: &WidgetMessage) {
        if let Ok(subscribers) = self.subscribers.lock() {
            for subscriber in subscribers.iter() {
                subscriber.send(message.clone()).ok();
            }
        }
    }
}

impl SimulatedWidget {
    pub fn new(script: WidgetScript) -> Self {
        Self {
            script,
            response_delay: Duration::from_millis(100),
            state: Arc::new(SimulatedState::default()),
        }
    }

    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// URLs of every popup opened so far.
    pub fn opened_urls(&self) -> Vec<Url> {
        self.state
            .opened
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    /// Whether the `index`-th opened popup has been closed.
    pub fn popup_closed(&self, index: usize) -> Option<bool> {
        self.state
            .popups
            .lock()
            .ok()
            .and_then(|popups| popups.get(index).map(|flag| flag.load(Ordering::SeqCst)))
    }
}

struct SimulatedPopup {
    closed: Arc<AtomicBool>,
}

impl PopupHandle for SimulatedPopup {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl WidgetHost for SimulatedWidget {
    fn open_popup(&self, url: &Url, _options: PopupOptions) -> Option<Box<dyn PopupHandle>> {
        if self.script == WidgetScript::BlockPopup {
            return None;
        }

        let closed = Arc::new(AtomicBool::new(false));
        if let Ok(mut opened) = self.state.opened.lock() {
            opened.push(url.clone());
        }
        if let Ok(mut popups) = self.state.popups.lock() {
            popups.push(Arc::clone(&closed));
        }

        let script = self.script.clone();
        let delay = self.response_delay;
        let state = Arc::clone(&self.state);
        let popup_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let origin = format!("https://{SANDBOX_DOMAIN}");
            match script {
                WidgetScript::CompletePurchase => state.broadcast(&WidgetMessage {
                    origin,
                    payload: serde_json::json!({ "eventName": "success" }),
                }),
                WidgetScript::ExitWithoutPurchase => state.broadcast(&WidgetMessage {
                    origin,
                    payload: serde_json::json!({ "eventName": "exit" }),
                }),
                WidgetScript::ReportError(text) => state.broadcast(&WidgetMessage {
                    origin,
                    payload: serde_json::json!({ "eventName": "error", "error": text }),
                }),
                WidgetScript::UserClosesPopup => popup_closed.store(true, Ordering::SeqCst),
                WidgetScript::Unresponsive | WidgetScript::BlockPopup => {}
            }
        });

        Some(Box::new(SimulatedPopup { closed }))
    }

    fn subscribe_messages(&self) -> mpsc::UnboundedReceiver<WidgetMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.state.subscribers.lock() {
            subscribers.push(sender);
        }
        receiver
    }
}
