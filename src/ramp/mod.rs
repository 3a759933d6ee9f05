//! Fiat ramp orchestration.
//!
//! Drives one on-ramp or off-ramp attempt from request to terminal state:
//! session token acquisition, hosted-widget popup lifecycle, cross-window
//! message handling, and terminal-callback dispatch. Page-level flows call
//! [`RampOrchestrator::open_ramp`] and observe the outcome exclusively
//! through the callbacks they supply.
//!
//! # Attempt lifecycle
//!
//! ```text
//! Idle --open_ramp--> RequestingToken --token--> AwaitingWidget
//!
//! AwaitingWidget --"success" message--> Succeeded
//! AwaitingWidget --"exit" message-----> Cancelled
//! AwaitingWidget --"error" message----> Failed
//! AwaitingWidget --popup closed-------> Cancelled
//! AwaitingWidget --deadline expired---> Failed
//! ```
//!
//! While a popup is open, a watcher task races three event sources: the
//! widget message channel, a closed-popup poll, and a maximum-wait
//! deadline. Whichever fires first settles the attempt; terminal dispatch
//! is idempotent, so the losing sources cannot fire a callback a second
//! time.
//!
//! # Callback contract
//!
//! Per attempt, at most one of `on_success`/`on_error` runs, and `on_close`
//! runs at most once, after them. A silent popup close runs `on_close`
//! alone. Failures are never returned from `open_ramp` itself; an attempt
//! without an `on_error` callback logs the dropped failure and continues,
//! which keeps the orchestrator safe to call from fire-and-forget UI
//! handlers.

pub mod url;
pub mod widget;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use ::url::Position;
use tracing::{info, warn};
use uuid::Uuid;

use crate::network::Chain;
use crate::session::{SessionTokenError, SessionTokenRequest, TokenIssuer};
use crate::wallet::AccountProvider;

use self::url::build_widget_url;
use self::widget::{
    PopupHandle, PopupOptions, WidgetEvent, WidgetHost, WidgetMessage, parse_trusted_event,
};

/// Direction of a ramp attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampKind {
    OnRamp,
    OffRamp,
}

/// Caller-supplied parameters for one attempt.
#[derive(Debug, Clone)]
pub struct RampRequest {
    pub kind: RampKind,
    /// Decimal amount string; fiat for on-ramps, crypto for off-ramps.
    pub amount: String,
    pub network: Chain,
    /// Where the widget should send the user after completion.
    pub redirect_url: Option<::url::Url>,
}

/// Failures surfaced through `on_error`.
#[derive(Debug, thiserror::Error)]
pub enum RampError {
    #[error("invalid ramp parameters: {0}")]
    InvalidParameters(&'static str),
    #[error("session token issuance failed: {0}")]
    TokenIssuance(#[from] SessionTokenError),
    #[error("widget popup was blocked by the host")]
    PopupBlocked,
    #[error("widget reported an error: {0}")]
    Provider(String),
    #[error("another ramp attempt is already in flight")]
    AttemptInFlight,
    #[error("no terminal widget signal within {0:?}")]
    TimedOut(Duration),
}

/// Terminal-state callbacks for one attempt.
///
/// Each callback runs at most once; `on_success` and `on_error` are
/// mutually exclusive, `on_close` runs after either of them or alone on a
/// silent popup close.
#[derive(Default)]
pub struct RampCallbacks {
    on_success: Option<Box<dyn FnOnce() + Send>>,
    on_error: Option<Box<dyn FnOnce(RampError) + Send>>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl RampCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(RampError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn on_close(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(callback));
        self
    }
}

/// Phase of the most recent attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Idle,
    RequestingToken,
    AwaitingWidget,
    Succeeded,
    Failed,
    Cancelled,
}

impl AttemptPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Lock-free cell for the attempt phase, readable from any thread.
struct PhaseCell(AtomicU8);

impl PhaseCell {
    fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    fn set(&self, phase: AttemptPhase) {
        let raw = match phase {
            AttemptPhase::Idle => 0,
            AttemptPhase::RequestingToken => 1,
            AttemptPhase::AwaitingWidget => 2,
            AttemptPhase::Succeeded => 3,
            AttemptPhase::Failed => 4,
            AttemptPhase::Cancelled => 5,
        };
        self.0.store(raw, Ordering::SeqCst);
    }

    fn get(&self) -> AttemptPhase {
        match self.0.load(Ordering::SeqCst) {
            0 => AttemptPhase::Idle,
            1 => AttemptPhase::RequestingToken,
            2 => AttemptPhase::AwaitingWidget,
            3 => AttemptPhase::Succeeded,
            4 => AttemptPhase::Failed,
            _ => AttemptPhase::Cancelled,
        }
    }
}

/// Attempt identifier for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptId(Uuid);

impl AttemptId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tuning for the orchestrator.
#[derive(Debug, Clone)]
pub struct RampConfig {
    /// Registrable domain trusted for widget messages.
    pub provider_domain: String,
    /// Cadence of the closed-popup poll.
    pub poll_interval: Duration,
    /// Upper bound on an attempt with no terminal signal.
    pub max_wait: Duration,
    pub fiat_currency: String,
    pub asset: String,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            provider_domain: "coinbase.com".to_string(),
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(15 * 60),
            fiat_currency: "USD".to_string(),
            asset: "USDC".to_string(),
        }
    }
}

/// Orchestrates one ramp attempt at a time.
///
/// A second `open_ramp` while an attempt is pending is rejected through the
/// new call's `on_error`; the pending attempt keeps its popup and timers.
pub struct RampOrchestrator {
    host: Arc<dyn WidgetHost>,
    issuer: Arc<dyn TokenIssuer>,
    account: Arc<dyn AccountProvider>,
    config: RampConfig,
    busy: Arc<AtomicBool>,
    phase: Arc<PhaseCell>,
    watcher: Mutex<Option<AbortHandle>>,
}

impl RampOrchestrator {
    pub fn new(
        host: Arc<dyn WidgetHost>,
        issuer: Arc<dyn TokenIssuer>,
        account: Arc<dyn AccountProvider>,
        config: RampConfig,
    ) -> Self {
        Self {
            host,
            issuer,
            account,
            config,
            busy: Arc::new(AtomicBool::new(false)),
            phase: Arc::new(PhaseCell::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Whether an attempt is currently pending.
    pub fn is_loading(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Phase of the most recent attempt.
    pub fn phase(&self) -> AttemptPhase {
        self.phase.get()
    }

    /// Drive one ramp attempt. The outcome is reported solely through
    /// `callbacks`; this method itself never fails.
    pub async fn open_ramp(&self, request: RampRequest, callbacks: RampCallbacks) {
        let attempt = AttemptId::new();
        let mut dispatch = TerminalDispatch::new(attempt, callbacks);

        let Some(address) = self.account.evm_address() else {
            dispatch.reject(RampError::InvalidParameters("wallet address not resolved"));
            return;
        };
        if !is_positive_decimal(&request.amount) {
            dispatch.reject(RampError::InvalidParameters(
                "amount must be a positive decimal",
            ));
            return;
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            dispatch.reject(RampError::AttemptInFlight);
            return;
        }

        // This call owns the busy flag from here until a terminal path
        // (or the popup guard) releases it.
        self.phase.set(AttemptPhase::RequestingToken);
        info!(
            "ramp attempt {attempt}: {:?} of {} on {}",
            request.kind, request.amount, request.network
        );

        match self.prepare(&request, address).await {
            Ok((popup, messages, url)) => {
                self.phase.set(AttemptPhase::AwaitingWidget);
                info!(
                    "ramp attempt {attempt}: widget opened at {}",
                    &url[..Position::AfterPath]
                );

                let watcher = AttemptWatcher {
                    id: attempt,
                    popup: PopupGuard::new(popup, Arc::clone(&self.busy)),
                    messages,
                    dispatch,
                    phase: Arc::clone(&self.phase),
                    provider_domain: self.config.provider_domain.clone(),
                    poll_interval: self.config.poll_interval,
                    max_wait: self.config.max_wait,
                };
                let handle = tokio::spawn(watcher.run());
                if let Ok(mut slot) = self.watcher.lock() {
                    *slot = Some(handle.abort_handle());
                }
            }
            Err(error) => {
                warn!("ramp attempt {attempt} failed before the widget opened: {error}");
                self.busy.store(false, Ordering::SeqCst);
                self.phase.set(AttemptPhase::Failed);
                dispatch.error(error);
            }
        }
    }

    /// Token acquisition and popup opening; everything that can fail
    /// before the widget takes over.
    async fn prepare(
        &self,
        request: &RampRequest,
        address: alloy::primitives::Address,
    ) -> Result<
        (
            Box<dyn PopupHandle>,
            mpsc::UnboundedReceiver<WidgetMessage>,
            ::url::Url,
        ),
        RampError,
    > {
        let token_request = SessionTokenRequest::single(address, request.network, &self.config.asset);
        let token = self.issuer.issue_session_token(&token_request).await?;

        let params = self.query_params(request);
        let url = build_widget_url(
            request.kind,
            request.network.is_testnet(),
            &token,
            &params,
        );

        // Subscribe before the popup opens so an early message cannot slip
        // past the watcher.
        let messages = self.host.subscribe_messages();
        let popup = self
            .host
            .open_popup(&url, PopupOptions::default())
            .ok_or(RampError::PopupBlocked)?;

        Ok((popup, messages, url))
    }

    fn query_params(&self, request: &RampRequest) -> Vec<(&'static str, String)> {
        vec![
            ("defaultNetwork", request.network.slug().to_string()),
            ("defaultAsset", self.config.asset.clone()),
            ("fiatCurrency", self.config.fiat_currency.clone()),
            match request.kind {
                RampKind::OnRamp => ("presetFiatAmount", request.amount.clone()),
                RampKind::OffRamp => ("presetCryptoAmount", request.amount.clone()),
            },
            (
                "partnerUserId",
                self.account.partner_user_id().unwrap_or_default(),
            ),
            (
                "redirectUrl",
                request
                    .redirect_url
                    .as_ref()
                    .map(::url::Url::to_string)
                    .unwrap_or_default(),
            ),
        ]
    }
}

impl Drop for RampOrchestrator {
    // Tearing down the orchestrator releases any in-flight watcher with
    // its poll timer and message subscription; the popup guard closes the
    // window.
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.lock().ok().and_then(|mut slot| slot.take()) {
            watcher.abort();
        }
    }
}

fn is_positive_decimal(amount: &str) -> bool {
    amount
        .parse::<Decimal>()
        .is_ok_and(|amount| amount > Decimal::ZERO)
}

/// Exclusive ownership of the popup window for one attempt.
///
/// Releases the busy flag exactly once and closes the popup on every exit
/// path, including watcher abort.
struct PopupGuard {
    popup: Option<Box<dyn PopupHandle>>,
    busy: Arc<AtomicBool>,
    released: bool,
}

impl PopupGuard {
    fn new(popup: Box<dyn PopupHandle>, busy: Arc<AtomicBool>) -> Self {
        Self {
            popup: Some(popup),
            busy,
            released: false,
        }
    }

    fn is_closed(&self) -> bool {
        self.popup.as_ref().is_none_or(|popup| popup.is_closed())
    }

    /// Release the busy flag. Must precede callback dispatch so a callback
    /// can immediately start the next attempt.
    fn finish(&mut self) {
        if !self.released {
            self.released = true;
            self.busy.store(false, Ordering::SeqCst);
        }
    }

    fn close_now(&mut self) {
        if let Some(mut popup) = self.popup.take() {
            if !popup.is_closed() {
                popup.close();
            }
        }
    }
}

impl Drop for PopupGuard {
    fn drop(&mut self) {
        self.close_now();
        self.finish();
    }
}

/// Idempotent terminal-callback dispatch for one attempt.
struct TerminalDispatch {
    attempt: AttemptId,
    on_success: Option<Box<dyn FnOnce() + Send>>,
    on_error: Option<Box<dyn FnOnce(RampError) + Send>>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
    resolved: bool,
}

impl TerminalDispatch {
    fn new(attempt: AttemptId, callbacks: RampCallbacks) -> Self {
        Self {
            attempt,
            on_success: callbacks.on_success,
            on_error: callbacks.on_error,
            on_close: callbacks.on_close,
            resolved: false,
        }
    }

    /// Refuse an attempt that never started: `on_error` only, no
    /// lifecycle notification.
    fn reject(mut self, error: RampError) {
        self.resolved = true;
        self.fire_error(error);
    }

    fn success(&mut self) {
        if std::mem::replace(&mut self.resolved, true) {
            return;
        }
        if let Some(on_success) = self.on_success.take() {
            on_success();
        }
        self.close_once();
    }

    fn error(&mut self, error: RampError) {
        if std::mem::replace(&mut self.resolved, true) {
            warn!("ramp attempt {}: stale failure ignored: {error}", self.attempt);
            return;
        }
        self.fire_error(error);
        self.close_once();
    }

    /// Terminal path with neither success nor failure payload (user
    /// closed or exited the widget).
    fn cancelled(&mut self) {
        if std::mem::replace(&mut self.resolved, true) {
            return;
        }
        self.close_once();
    }

    fn fire_error(&mut self, error: RampError) {
        match self.on_error.take() {
            Some(on_error) => on_error(error),
            None => warn!(
                "ramp attempt {} failed with no error callback: {error}",
                self.attempt
            ),
        }
    }

    fn close_once(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

/// Races the widget message channel against the closed-popup poll and the
/// attempt deadline.
struct AttemptWatcher {
    id: AttemptId,
    popup: PopupGuard,
    messages: mpsc::UnboundedReceiver<WidgetMessage>,
    dispatch: TerminalDispatch,
    phase: Arc<PhaseCell>,
    provider_domain: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl AttemptWatcher {
    async fn run(self) {
        let Self {
            id,
            mut popup,
            mut messages,
            mut dispatch,
            phase,
            provider_domain,
            poll_interval,
            max_wait,
        } = self;

        let mut poll = interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let deadline = sleep(max_wait);
        tokio::pin!(deadline);
        let mut channel_open = true;

        loop {
            tokio::select! {
                message = messages.recv(), if channel_open => {
                    let Some(message) = message else {
                        // Host dropped its message sender; the poll and
                        // deadline still settle the attempt.
                        channel_open = false;
                        continue;
                    };
                    let Some(event) = parse_trusted_event(&message, &provider_domain) else {
                        continue;
                    };
                    popup.finish();
                    match event {
                        WidgetEvent::Success => {
                            phase.set(AttemptPhase::Succeeded);
                            info!("ramp attempt {id}: widget reported success");
                            dispatch.success();
                        }
                        WidgetEvent::Exit => {
                            phase.set(AttemptPhase::Cancelled);
                            info!("ramp attempt {id}: widget exited without completing");
                            dispatch.cancelled();
                        }
                        WidgetEvent::Error(text) => {
                            phase.set(AttemptPhase::Failed);
                            let message =
                                text.unwrap_or_else(|| "Transaction failed".to_string());
                            warn!("ramp attempt {id}: widget reported an error: {message}");
                            dispatch.error(RampError::Provider(message));
                        }
                    }
                    popup.close_now();
                    return;
                }
                _ = poll.tick() => {
                    if popup.is_closed() {
                        popup.finish();
                        phase.set(AttemptPhase::Cancelled);
                        info!("ramp attempt {id}: popup closed by the user");
                        dispatch.cancelled();
                        popup.close_now();
                        return;
                    }
                }
                () = &mut deadline => {
                    popup.finish();
                    phase.set(AttemptPhase::Failed);
                    warn!("ramp attempt {id}: no terminal signal within {max_wait:?}");
                    dispatch.error(RampError::TimedOut(max_wait));
                    popup.close_now();
                    return;
                }
            }
        }
    }
}
