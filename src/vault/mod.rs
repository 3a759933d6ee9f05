//! Vault transaction coordination.
//!
//! Translates a caller's decimal amount and receiver into the contract
//! call sequence for the prize vault: an `[approve, deposit]` batch on the
//! way in, a single `withdraw` (or `redeem`) on the way out. The batch is
//! submitted as one user operation, so either both steps are accepted by
//! the submission layer or the whole operation is reported failed.
//!
//! # Sandbox mode
//!
//! In sandbox mode nothing is submitted onchain: operations resolve with a
//! fixed placeholder confirmation after a short simulated delay, so the
//! downstream flows (balance bookkeeping, success screens) can be
//! exercised without a funded network.
//!
//! The coordinator reports submission acceptance, never settled balances;
//! callers own any locally displayed balance state.

mod calls;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::info;

use crate::amount::{AmountError, to_base_units};
use crate::config::ExecutionMode;
use crate::network::{Chain, USDC_DECIMALS};
use crate::wallet::{SubmissionError, UserOperationReceipt, UserOperationSender};

/// Confirmation hash returned by every sandbox submission.
pub const SANDBOX_CONFIRMATION: B256 = B256::repeat_byte(0x5a);

const SANDBOX_CONFIRM_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("user operation submission failed: {0}")]
    Submission(#[from] SubmissionError),
}

enum Submission {
    Sandbox,
    Live(Arc<dyn UserOperationSender>),
}

/// Sequences vault operations for one chain.
pub struct VaultCoordinator {
    chain: Chain,
    submission: Submission,
}

impl VaultCoordinator {
    /// Coordinator that never submits onchain.
    pub fn sandbox(chain: Chain) -> Self {
        Self {
            chain,
            submission: Submission::Sandbox,
        }
    }

    /// Coordinator submitting through the wallet provider.
    pub fn live(chain: Chain, sender: Arc<dyn UserOperationSender>) -> Self {
        Self {
            chain,
            submission: Submission::Live(sender),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.submission {
            Submission::Sandbox => ExecutionMode::Sandbox,
            Submission::Live(_) => ExecutionMode::Live,
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Approve the vault for `amount` USDC and deposit it for `receiver`,
    /// as one batch.
    pub async fn deposit(
        &self,
        amount: Decimal,
        receiver: Address,
    ) -> Result<UserOperationReceipt, VaultError> {
        let units = to_base_units(amount, USDC_DECIMALS)?;
        let calls = calls::deposit_batch(self.chain.contracts(), units, receiver);

        self.submit(calls, "approve+deposit").await
    }

    /// Withdraw `amount` USDC from the vault to `receiver`.
    pub async fn withdraw(
        &self,
        amount: Decimal,
        receiver: Address,
    ) -> Result<UserOperationReceipt, VaultError> {
        let units = to_base_units(amount, USDC_DECIMALS)?;
        let calls = calls::withdraw_call(self.chain.contracts(), units, receiver);

        self.submit(calls, "withdraw").await
    }

    /// Redeem vault shares held by `owner`, paying assets out to
    /// `receiver`.
    pub async fn redeem(
        &self,
        shares: Decimal,
        receiver: Address,
        owner: Address,
    ) -> Result<UserOperationReceipt, VaultError> {
        let units = to_base_units(shares, USDC_DECIMALS)?;
        let calls = calls::redeem_call(self.chain.contracts(), units, receiver, owner);

        self.submit(calls, "redeem").await
    }

    async fn submit(
        &self,
        calls: Vec<crate::wallet::Call>,
        note: &str,
    ) -> Result<UserOperationReceipt, VaultError> {
        match &self.submission {
            Submission::Sandbox => {
                info!("sandbox {note}: skipping user operation submission");
                sleep(SANDBOX_CONFIRM_DELAY).await;

                Ok(UserOperationReceipt {
                    user_operation_hash: SANDBOX_CONFIRMATION,
                })
            }
            Submission::Live(sender) => {
                let receipt = sender.send_user_operation(self.chain, calls, true).await?;
                info!("{note} accepted: {}", receipt.user_operation_hash);

                Ok(receipt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{U256, address};
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::Mutex;

    use crate::wallet::Call;

    const RECEIVER: Address = address!("0x1111111111111111111111111111111111111111");

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[derive(Default)]
    struct RecordingSender {
        operations: Mutex<Vec<(Chain, Vec<Call>, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl UserOperationSender for RecordingSender {
        async fn send_user_operation(
            &self,
            network: Chain,
            calls: Vec<Call>,
            sponsor_gas: bool,
        ) -> Result<UserOperationReceipt, SubmissionError> {
            if self.fail {
                return Err(SubmissionError::Reverted("ERC20: allowance".to_string()));
            }
            self.operations
                .lock()
                .unwrap()
                .push((network, calls, sponsor_gas));

            Ok(UserOperationReceipt {
                user_operation_hash: B256::repeat_byte(0x01),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sandbox_deposit_confirms_without_submission() {
        let coordinator = VaultCoordinator::sandbox(Chain::BaseSepolia);

        let receipt = coordinator.deposit(dec("100"), RECEIVER).await.unwrap();

        assert_eq!(receipt.user_operation_hash, SANDBOX_CONFIRMATION);
        assert_eq!(coordinator.mode(), ExecutionMode::Sandbox);
    }

    #[tokio::test]
    async fn live_deposit_submits_sponsored_approve_deposit_batch() {
        let sender = Arc::new(RecordingSender::default());
        let coordinator = VaultCoordinator::live(Chain::Base, Arc::clone(&sender) as _);

        coordinator.deposit(dec("2.5"), RECEIVER).await.unwrap();

        let operations = sender.operations.lock().unwrap();
        let (network, calls, sponsor_gas) = &operations[0];
        assert_eq!(*network, Chain::Base);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].to, Chain::Base.contracts().usdc);
        assert_eq!(calls[1].to, Chain::Base.contracts().prize_vault);
        assert!(sponsor_gas);
    }

    #[tokio::test]
    async fn live_withdraw_submits_a_single_call() {
        let sender = Arc::new(RecordingSender::default());
        let coordinator = VaultCoordinator::live(Chain::Base, Arc::clone(&sender) as _);

        coordinator.withdraw(dec("10"), RECEIVER).await.unwrap();

        let operations = sender.operations.lock().unwrap();
        assert_eq!(operations[0].1.len(), 1);
        assert_eq!(operations[0].1[0].to, Chain::Base.contracts().prize_vault);
    }

    #[tokio::test]
    async fn submission_failure_surfaces_as_one_error() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..RecordingSender::default()
        });
        let coordinator = VaultCoordinator::live(Chain::Base, sender as _);

        let err = coordinator.deposit(dec("1"), RECEIVER).await.unwrap_err();

        assert!(matches!(
            err,
            VaultError::Submission(SubmissionError::Reverted(_))
        ));
    }

    #[tokio::test]
    async fn invalid_amount_fails_before_any_submission() {
        let sender = Arc::new(RecordingSender::default());
        let coordinator = VaultCoordinator::live(Chain::Base, Arc::clone(&sender) as _);

        let err = coordinator.deposit(dec("0"), RECEIVER).await.unwrap_err();

        assert!(matches!(err, VaultError::Amount(_)));
        assert!(sender.operations.lock().unwrap().is_empty());
    }

    #[test]
    fn amount_scaling_uses_usdc_precision() {
        assert_eq!(
            to_base_units(dec("2.5"), USDC_DECIMALS).unwrap(),
            U256::from(2_500_000u64)
        );
    }
}
