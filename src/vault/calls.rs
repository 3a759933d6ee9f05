//! Calldata construction for the token and prize vault contracts.

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::network::ContractSet;
use crate::wallet::Call;

sol! {
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface IPrizeVault {
        function deposit(uint256 assets, address receiver) external returns (uint256 shares);
        function withdraw(uint256 assets, address receiver) external;
        function redeem(uint256 shares, address receiver, address owner) external returns (uint256 assets);
    }
}

/// `[approve, deposit]` batch: grant the vault an allowance for exactly
/// this amount, then deposit it for `receiver`.
pub(crate) fn deposit_batch(contracts: ContractSet, units: U256, receiver: Address) -> Vec<Call> {
    let approve = IERC20::approveCall {
        spender: contracts.prize_vault,
        amount: units,
    };
    let deposit = IPrizeVault::depositCall {
        assets: units,
        receiver,
    };

    vec![
        Call::new(contracts.usdc, approve.abi_encode().into()),
        Call::new(contracts.prize_vault, deposit.abi_encode().into()),
    ]
}

pub(crate) fn withdraw_call(contracts: ContractSet, units: U256, receiver: Address) -> Vec<Call> {
    let withdraw = IPrizeVault::withdrawCall {
        assets: units,
        receiver,
    };

    vec![Call::new(contracts.prize_vault, withdraw.abi_encode().into())]
}

pub(crate) fn redeem_call(
    contracts: ContractSet,
    shares: U256,
    receiver: Address,
    owner: Address,
) -> Vec<Call> {
    let redeem = IPrizeVault::redeemCall {
        shares,
        receiver,
        owner,
    };

    vec![Call::new(contracts.prize_vault, redeem.abi_encode().into())]
}
