//! Core services for the prize-linked savings application.
//!
//! Users buy USDC through a hosted on-ramp widget, deposit it into a
//! yield-bearing prize vault, and later withdraw and cash out through the
//! off-ramp. This crate owns the orchestration between those pieces:
//!
//! - [`ramp`] drives a widget popup attempt end to end, with exactly-once
//!   terminal callbacks despite racing message and popup-close signals.
//! - [`vault`] sequences the approve/deposit and withdraw/redeem calls,
//!   with a sandbox mode that never touches a network.
//! - [`flows`] composes both into the save and withdraw user journeys.
//! - [`session`] issues the short-lived widget session tokens.
//! - [`wallet`] declares the external wallet capability seams.

pub mod amount;
pub mod config;
pub mod flows;
pub mod network;
pub mod ramp;
pub mod session;
pub mod telemetry;
pub mod vault;
pub mod wallet;

pub use config::{Ctx, Env, ExecutionMode};
pub use network::Chain;
pub use ramp::{RampCallbacks, RampError, RampKind, RampOrchestrator, RampRequest};
pub use vault::VaultCoordinator;
