//! Headless walkthrough of the save and withdraw flows against the
//! simulated widget, for demos and sandbox smoke checks.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use prizesave::config::{Env, ExecutionMode};
use prizesave::flows::{BalanceLedger, SavingsFlows};
use prizesave::ramp::RampOrchestrator;
use prizesave::ramp::widget::{SimulatedWidget, WidgetScript};
use prizesave::session::{HttpTokenIssuer, StaticTokenIssuer, TokenIssuer};
use prizesave::telemetry;
use prizesave::vault::VaultCoordinator;
use prizesave::wallet::FixedAccount;

#[derive(Parser, Debug)]
#[command(name = "sandbox_demo")]
#[command(about = "Run a savings flow headlessly in sandbox mode")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: PathBuf,

    /// Smart account address acting as the signed-in user
    #[arg(long)]
    account: String,

    /// Bypass the session endpoint with a fixed widget token
    #[arg(long)]
    session_token: Option<String>,

    /// Starting displayed balance in USDC
    #[arg(long, default_value = "0")]
    balance: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Buy USDC through the simulated on-ramp and deposit it
    Save {
        #[arg(long)]
        amount: String,
    },
    /// Withdraw USDC and cash out through the simulated off-ramp
    Withdraw {
        #[arg(long)]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ctx = Env { config: cli.config }.into_ctx()?;
    telemetry::init(ctx.log_level)?;
    anyhow::ensure!(
        ctx.mode == ExecutionMode::Sandbox,
        "the demo runner only drives sandbox mode"
    );

    let account = Address::from_str(&cli.account)?;

    let issuer: Arc<dyn TokenIssuer> = match cli.session_token {
        Some(token) => Arc::new(StaticTokenIssuer::new(token)),
        None => Arc::new(HttpTokenIssuer::new(ctx.session_endpoint.clone())),
    };
    let widget = SimulatedWidget::new(WidgetScript::CompletePurchase)
        .with_response_delay(Duration::from_millis(250));
    let orchestrator = Arc::new(RampOrchestrator::new(
        Arc::new(widget),
        issuer,
        Arc::new(FixedAccount::new(account, Some("demo-user".to_string()))),
        ctx.ramp.clone(),
    ));
    let vault = Arc::new(VaultCoordinator::sandbox(ctx.chain));
    let flows = SavingsFlows::new(
        orchestrator,
        vault,
        Arc::new(FixedAccount::new(account, Some("demo-user".to_string()))),
        Arc::new(BalanceLedger::new(Decimal::from_str(&cli.balance)?)),
    );

    match cli.command {
        Command::Save { amount } => {
            let amount = Decimal::from_str(&amount)?;
            let outcome = flows.save(amount, None).await?;
            println!("save outcome: {outcome:?}");
        }
        Command::Withdraw { amount } => {
            let amount = Decimal::from_str(&amount)?;
            let outcome = flows.withdraw(amount).await?;
            println!("withdraw outcome: {outcome:?}");
        }
    }
    println!("displayed balance: {} USDC", flows.ledger().balance().await);

    Ok(())
}
