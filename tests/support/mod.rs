//! Shared fixtures for the ramp and flow scenario tests.

use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, B256, address};
use async_trait::async_trait;
use rust_decimal::Decimal;

use prizesave::flows::{BalanceLedger, SavingsFlows};
use prizesave::network::Chain;
use prizesave::ramp::widget::{SimulatedWidget, WidgetScript};
use prizesave::ramp::{RampCallbacks, RampConfig, RampError, RampOrchestrator};
use prizesave::session::{StaticTokenIssuer, TokenIssuer};
use prizesave::vault::VaultCoordinator;
use prizesave::wallet::{
    AccountProvider, Call, FixedAccount, SubmissionError, UserOperationReceipt,
    UserOperationSender,
};

pub const ACCOUNT: Address = address!("0x1111111111111111111111111111111111111111");

/// Counts terminal callback invocations and records the last failure.
pub struct CallbackProbe {
    success: AtomicUsize,
    error: AtomicUsize,
    close: AtomicUsize,
    last_error: Mutex<Option<RampError>>,
}

impl CallbackProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            success: AtomicUsize::new(0),
            error: AtomicUsize::new(0),
            close: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        })
    }

    pub fn callbacks(self: &Arc<Self>) -> RampCallbacks {
        let on_success = Arc::clone(self);
        let on_error = Arc::clone(self);
        let on_close = Arc::clone(self);
        RampCallbacks::new()
            .on_success(move || {
                on_success.success.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |error| {
                on_error.error.fetch_add(1, Ordering::SeqCst);
                *on_error.last_error.lock().unwrap() = Some(error);
            })
            .on_close(move || {
                on_close.close.fetch_add(1, Ordering::SeqCst);
            })
    }

    /// `(success, error, close)` invocation counts.
    pub fn totals(&self) -> (usize, usize, usize) {
        (
            self.success.load(Ordering::SeqCst),
            self.error.load(Ordering::SeqCst),
            self.close.load(Ordering::SeqCst),
        )
    }

    pub fn last_error(&self) -> Option<RampError> {
        self.last_error.lock().unwrap().take()
    }

    /// Wait until the attempt has delivered its lifecycle notification.
    pub async fn wait_closed(&self) {
        tokio::time::timeout(Duration::from_secs(30), async {
            while self.close.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("attempt never reached a terminal state");
    }
}

/// [`AccountProvider`] with no signed-in user.
pub struct NoAccount;

impl AccountProvider for NoAccount {
    fn evm_address(&self) -> Option<Address> {
        None
    }

    fn partner_user_id(&self) -> Option<String> {
        None
    }
}

/// [`UserOperationSender`] that records submissions.
#[derive(Default)]
pub struct RecordingSender {
    pub operations: Mutex<Vec<(Chain, Vec<Call>, bool)>>,
}

#[async_trait]
impl UserOperationSender for RecordingSender {
    async fn send_user_operation(
        &self,
        network: Chain,
        calls: Vec<Call>,
        sponsor_gas: bool,
    ) -> Result<UserOperationReceipt, SubmissionError> {
        self.operations
            .lock()
            .unwrap()
            .push((network, calls, sponsor_gas));

        Ok(UserOperationReceipt {
            user_operation_hash: B256::repeat_byte(0x01),
        })
    }
}

/// Ramp tuning with fast timers for paused-clock tests.
pub fn test_config() -> RampConfig {
    RampConfig {
        poll_interval: Duration::from_millis(50),
        max_wait: Duration::from_secs(5),
        ..RampConfig::default()
    }
}

fn account() -> Arc<FixedAccount> {
    Arc::new(FixedAccount::new(ACCOUNT, Some("user-1".to_string())))
}

/// Orchestrator over a scripted widget and a fixed session token.
pub fn scripted_orchestrator(script: WidgetScript) -> (Arc<RampOrchestrator>, SimulatedWidget) {
    orchestrator_with_issuer(script, Arc::new(StaticTokenIssuer::new("test-session-token")))
}

/// Orchestrator over a scripted widget with token issuance through
/// `issuer`.
pub fn orchestrator_with_issuer(
    script: WidgetScript,
    issuer: Arc<dyn TokenIssuer>,
) -> (Arc<RampOrchestrator>, SimulatedWidget) {
    let widget = SimulatedWidget::new(script);
    let orchestrator = RampOrchestrator::new(
        Arc::new(widget.clone()),
        issuer,
        account(),
        test_config(),
    );

    (Arc::new(orchestrator), widget)
}

/// Sandbox-mode flow stack over a scripted widget.
pub fn sandbox_flows(script: WidgetScript, balance: Decimal) -> (SavingsFlows, SimulatedWidget) {
    let (orchestrator, widget) = scripted_orchestrator(script);
    let flows = SavingsFlows::new(
        orchestrator,
        Arc::new(VaultCoordinator::sandbox(Chain::BaseSepolia)),
        account(),
        Arc::new(BalanceLedger::new(balance)),
    );

    (flows, widget)
}

/// Live-mode flow stack recording submissions through `sender`.
pub fn live_flows(
    script: WidgetScript,
    sender: Arc<RecordingSender>,
) -> (SavingsFlows, SimulatedWidget) {
    let (orchestrator, widget) = scripted_orchestrator(script);
    let flows = SavingsFlows::new(
        orchestrator,
        Arc::new(VaultCoordinator::live(Chain::Base, sender as _)),
        account(),
        Arc::new(BalanceLedger::new(Decimal::ZERO)),
    );

    (flows, widget)
}
