//! Page-level savings flows.
//!
//! Composes the ramp orchestrator and the vault coordinator into the two
//! user journeys: save (buy USDC through the on-ramp, then deposit it into
//! the prize vault) and withdraw (pull USDC out of the vault, then cash
//! out through the off-ramp). The flows also keep the locally displayed
//! balance, since the coordinator deliberately reports submission
//! acceptance only.

use std::sync::Arc;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, mpsc};
use tracing::info;
use url::Url;

use crate::config::ExecutionMode;
use crate::ramp::{RampCallbacks, RampError, RampKind, RampOrchestrator, RampRequest};
use crate::vault::{VaultCoordinator, VaultError};
use crate::wallet::{AccountProvider, UserOperationReceipt};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("wallet account not resolved")]
    AccountUnavailable,
    #[error("ramp attempt failed: {0}")]
    Ramp(#[from] RampError),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Outcome of a save flow.
#[derive(Debug)]
pub enum SaveOutcome {
    /// Funds were purchased (or sandbox-assumed) and deposited.
    Deposited { receipt: UserOperationReceipt },
    /// The user left the on-ramp without buying; nothing was deposited.
    Abandoned,
}

/// Whether the off-ramp leg of a withdrawal completed.
#[derive(Debug)]
pub enum CashOut {
    Completed,
    /// The user closed the off-ramp; the withdrawn USDC stays in the
    /// wallet.
    Abandoned,
    Failed(RampError),
}

/// Outcome of a withdraw flow. The vault withdrawal always precedes the
/// off-ramp, so a receipt is present even when the cash-out leg fails.
#[derive(Debug)]
pub struct WithdrawOutcome {
    pub receipt: UserOperationReceipt,
    pub cash_out: CashOut,
}

/// Locally displayed vault balance.
///
/// Credits and debits follow confirmed submissions; the authoritative
/// balance lives onchain.
pub struct BalanceLedger {
    balance: Mutex<Decimal>,
}

impl BalanceLedger {
    pub fn new(initial: Decimal) -> Self {
        Self {
            balance: Mutex::new(initial),
        }
    }

    pub async fn balance(&self) -> Decimal {
        *self.balance.lock().await
    }

    async fn credit(&self, amount: Decimal) {
        *self.balance.lock().await += amount;
    }

    async fn debit(&self, amount: Decimal) {
        *self.balance.lock().await -= amount;
    }
}

/// Terminal signals relayed out of the ramp callbacks.
enum RampSignal {
    Success,
    Failed(RampError),
    Closed,
}

/// Collected terminal state of one ramp attempt.
struct RampOutcome {
    succeeded: bool,
    closed: bool,
    failure: Option<RampError>,
}

/// The user journeys of the savings product.
pub struct SavingsFlows {
    orchestrator: Arc<RampOrchestrator>,
    vault: Arc<VaultCoordinator>,
    account: Arc<dyn AccountProvider>,
    ledger: Arc<BalanceLedger>,
}

impl SavingsFlows {
    pub fn new(
        orchestrator: Arc<RampOrchestrator>,
        vault: Arc<VaultCoordinator>,
        account: Arc<dyn AccountProvider>,
        ledger: Arc<BalanceLedger>,
    ) -> Self {
        Self {
            orchestrator,
            vault,
            account,
            ledger,
        }
    }

    /// Buy `amount` USD of USDC through the on-ramp and deposit it into
    /// the prize vault.
    ///
    /// The sandbox widget cannot complete a real purchase, so in sandbox
    /// mode a plain widget close still proceeds to the deposit.
    pub async fn save(
        &self,
        amount: Decimal,
        redirect_url: Option<Url>,
    ) -> Result<SaveOutcome, FlowError> {
        let receiver = self
            .account
            .evm_address()
            .ok_or(FlowError::AccountUnavailable)?;

        let outcome = self
            .run_ramp(RampKind::OnRamp, amount, redirect_url)
            .await;
        if let Some(failure) = outcome.failure {
            return Err(FlowError::Ramp(failure));
        }

        let sandbox = self.vault.mode() == ExecutionMode::Sandbox;
        if !outcome.succeeded && !(sandbox && outcome.closed) {
            info!("save flow: on-ramp abandoned before purchase");
            return Ok(SaveOutcome::Abandoned);
        }

        let receipt = self.vault.deposit(amount, receiver).await?;
        self.ledger.credit(amount).await;
        info!("save flow: deposited {amount} USDC for {receiver}");

        Ok(SaveOutcome::Deposited { receipt })
    }

    /// Withdraw `amount` USDC from the prize vault, then cash out through
    /// the off-ramp.
    pub async fn withdraw(&self, amount: Decimal) -> Result<WithdrawOutcome, FlowError> {
        let receiver = self
            .account
            .evm_address()
            .ok_or(FlowError::AccountUnavailable)?;

        let receipt = self.vault.withdraw(amount, receiver).await?;
        self.ledger.debit(amount).await;
        info!("withdraw flow: released {amount} USDC to {receiver}");

        let outcome = self.run_ramp(RampKind::OffRamp, amount, None).await;
        let cash_out = if let Some(failure) = outcome.failure {
            CashOut::Failed(failure)
        } else if outcome.succeeded {
            CashOut::Completed
        } else {
            info!("withdraw flow: off-ramp closed before the sale completed");
            CashOut::Abandoned
        };

        Ok(WithdrawOutcome { receipt, cash_out })
    }

    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    /// Open one ramp attempt and gather its terminal signals.
    async fn run_ramp(
        &self,
        kind: RampKind,
        amount: Decimal,
        redirect_url: Option<Url>,
    ) -> RampOutcome {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let on_success = sender.clone();
        let on_error = sender.clone();
        let on_close = sender.clone();
        let callbacks = RampCallbacks::new()
            .on_success(move || {
                on_success.send(RampSignal::Success).ok();
            })
            .on_error(move |error| {
                on_error.send(RampSignal::Failed(error)).ok();
            })
            .on_close(move || {
                on_close.send(RampSignal::Closed).ok();
            });
        drop(sender);

        self.orchestrator
            .open_ramp(
                RampRequest {
                    kind,
                    amount: amount.to_string(),
                    network: self.vault.chain(),
                    redirect_url,
                },
                callbacks,
            )
            .await;

        // The channel drains once the attempt drops its callbacks.
        let mut outcome = RampOutcome {
            succeeded: false,
            closed: false,
            failure: None,
        };
        while let Some(signal) = receiver.recv().await {
            match signal {
                RampSignal::Success => outcome.succeeded = true,
                RampSignal::Failed(error) => outcome.failure = Some(error),
                RampSignal::Closed => outcome.closed = true,
            }
        }

        outcome
    }
}
