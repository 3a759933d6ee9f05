//! Wallet and account capability seams.
//!
//! Authentication, key custody, and user-operation submission live in an
//! external wallet provider. This module defines the two traits the core
//! consumes: [`AccountProvider`] for the signed-in user's identity and
//! [`UserOperationSender`] for batched contract-call submission under the
//! user's smart account. Implementations wrap the provider SDK; the core
//! never sees keys or signatures.

use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;

use crate::network::Chain;

/// Identity of the signed-in user, as far as the core needs it.
pub trait AccountProvider: Send + Sync {
    /// Resolved smart-account address, if the user has completed sign-in.
    fn evm_address(&self) -> Option<Address>;

    /// Provider-side user identifier, forwarded to the widget as
    /// `partnerUserId`.
    fn partner_user_id(&self) -> Option<String>;
}

/// Static [`AccountProvider`] for binaries and tests.
#[derive(Debug, Clone)]
pub struct FixedAccount {
    address: Address,
    user_id: Option<String>,
}

impl FixedAccount {
    pub fn new(address: Address, user_id: Option<String>) -> Self {
        Self { address, user_id }
    }
}

impl AccountProvider for FixedAccount {
    fn evm_address(&self) -> Option<Address> {
        Some(self.address)
    }

    fn partner_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// One contract call within a user operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Call {
    pub fn new(to: Address, data: Bytes) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data,
        }
    }
}

/// Acknowledgement that a user operation was accepted for inclusion.
///
/// This confirms submission, not settled onchain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserOperationReceipt {
    pub user_operation_hash: B256,
}

/// Errors surfaced by a [`UserOperationSender`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("signature rejected: {0}")]
    SignatureRejected(String),
    #[error("user operation reverted: {0}")]
    Reverted(String),
    #[error("broadcast failed: {0}")]
    Broadcast(String),
}

/// Abstraction over user-operation submission.
///
/// Implementations handle signing and broadcast. Consumers build calldata
/// and pass it as an ordered batch; the batch is accepted or rejected as a
/// whole, never partially.
#[async_trait]
pub trait UserOperationSender: Send + Sync {
    /// Submit an ordered batch of calls as one user operation.
    ///
    /// - `network` -- target chain
    /// - `calls` -- calls executed in order within the operation
    /// - `sponsor_gas` -- request paymaster gas sponsorship
    async fn send_user_operation(
        &self,
        network: Chain,
        calls: Vec<Call>,
        sponsor_gas: bool,
    ) -> Result<UserOperationReceipt, SubmissionError>;
}
