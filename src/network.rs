//! Chain and contract parameters for the supported networks.
//!
//! The application runs against Base mainnet or the Base Sepolia test
//! network. Each chain carries the deployed USDC token and prize vault
//! addresses; the widget domain selection and the session token scope both
//! key off the chain slug and testnet flag.

use alloy::primitives::{Address, address};
use serde::Deserialize;

/// Decimal precision of the USDC token on both supported chains.
pub const USDC_DECIMALS: u32 = 6;

const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

const PRIZE_VAULT_BASE: Address = address!("6b5a5c55e9dd4bb502ce25bbfbaa49b69cf7e4dd");
const PRIZE_VAULT_BASE_SEPOLIA: Address = address!("513cd9e4d06e86acfda1c5e7b93c4a3400d240d7");

/// Supported target chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    Base,
    BaseSepolia,
}

/// Deployed contract addresses for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractSet {
    pub usdc: Address,
    pub prize_vault: Address,
}

impl Chain {
    pub const fn id(self) -> u64 {
        match self {
            Self::Base => 8453,
            Self::BaseSepolia => 84532,
        }
    }

    /// Chain identifier as used by the token issuer and the hosted widget.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::BaseSepolia => "base-sepolia",
        }
    }

    pub const fn is_testnet(self) -> bool {
        matches!(self, Self::BaseSepolia)
    }

    pub const fn contracts(self) -> ContractSet {
        match self {
            Self::Base => ContractSet {
                usdc: USDC_BASE,
                prize_vault: PRIZE_VAULT_BASE,
            },
            Self::BaseSepolia => ContractSet {
                usdc: USDC_BASE_SEPOLIA,
                prize_vault: PRIZE_VAULT_BASE_SEPOLIA,
            },
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Error for chain slugs outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported network: {0} (expected \"base\" or \"base-sepolia\")")]
pub struct UnknownChainError(pub String);

impl std::str::FromStr for Chain {
    type Err = UnknownChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Self::Base),
            "base-sepolia" => Ok(Self::BaseSepolia),
            other => Err(UnknownChainError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_round_trip() {
        for chain in [Chain::Base, Chain::BaseSepolia] {
            assert_eq!(chain.slug().parse::<Chain>(), Ok(chain));
        }
        assert!("base-goerli".parse::<Chain>().is_err());
    }

    #[test]
    fn testnet_flag_selects_sepolia_contracts() {
        assert!(Chain::BaseSepolia.is_testnet());
        assert!(!Chain::Base.is_testnet());
        assert_ne!(
            Chain::Base.contracts().usdc,
            Chain::BaseSepolia.contracts().usdc
        );
    }

    #[test]
    fn chain_ids_match_base_deployments() {
        assert_eq!(Chain::Base.id(), 8453);
        assert_eq!(Chain::BaseSepolia.id(), 84532);
    }
}
