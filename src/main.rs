//! Bundlr Currency — Entry Point
//!
//! Command-line client for funding a bundler and withdrawing from it.
//!
//! Wiring sequence:
//! 1. Parse CLI arguments
//! 2. Load config.toml + validate
//! 3. Init tracing (JSON structured logging)
//! 4. Load wallet material from the configured env var
//! 5. Create the BundlerClient (HTTP + retry + concurrency limit)
//! 6. Build the currency adapter through the registry and run ready()
//! 7. Spawn the Ctrl-C listener feeding the shutdown broadcast
//! 8. Run the requested command

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use bundlr_currency::adapters::bundler::BundlerClient;
use bundlr_currency::adapters::metrics::SettlementMetrics;
use bundlr_currency::adapters::registry::build_currency_with;
use bundlr_currency::config::{self, AppConfig};
use bundlr_currency::ports::{BundlerApi, Currency};
use bundlr_currency::usecases::{
  FundingCoordinator, FundingRequest, FundingStatus, WithdrawalCoordinator, WithdrawalRequest,
};

#[derive(Debug, Parser)]
#[command(name = "bundlr-currency", version, about = "Fund and withdraw bundler balances")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(long, default_value = "config.toml")]
  config: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Print the adapter's on-chain address.
  Address,
  /// Print the bundler-tracked balance of the adapter's address.
  Balance,
  /// Print the USD price of one whole unit.
  Price,
  /// Transfer funds to the bundler.
  Fund {
    /// Amount in whole units (e.g. "0.5").
    #[arg(long)]
    amount: String,
    /// Scale the initial fee estimate.
    #[arg(long)]
    multiplier: Option<f64>,
  },
  /// Withdraw from the bundler to the adapter's address.
  Withdraw {
    /// Amount in whole units.
    #[arg(long)]
    amount: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // ── 1. Load configuration ───────────────────────────────
  let config = config::loader::load_config(&cli.config).context("Failed to load configuration")?;

  // ── 2. Initialize structured JSON logging ───────────────
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.client.log_level)),
    )
    .json()
    .init();

  info!(
    version = env!("CARGO_PKG_VERSION"),
    currency = %config.currency.name,
    bundler = %config.bundler.url,
    "Starting bundlr-currency"
  );

  // ── 3. Shutdown channel fed by Ctrl-C ───────────────────
  // main holds the sender for the whole run; only a delivered Ctrl-C cancels waits.
  let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
  let signal_handle = tokio::spawn(forward_shutdown(signal::ctrl_c(), shutdown_tx.clone()));

  let metrics = Arc::new(SettlementMetrics::new().context("Failed to register metrics")?);
  let result = run(cli.command, &config, Arc::clone(&metrics), &mut shutdown_rx).await;

  signal_handle.abort();
  drop(shutdown_tx);
  debug!(metrics = %metrics.render(), "Settlement metrics");
  result
}

/// Broadcast shutdown once `signal` resolves successfully. A listener
/// that fails to install never sends.
async fn forward_shutdown<F>(signal: F, shutdown: broadcast::Sender<()>)
where
  F: Future<Output = std::io::Result<()>>,
{
  match signal.await {
    Ok(()) => {
      info!("SIGINT received, cancelling in-flight waits");
      let _ = shutdown.send(());
    }
    Err(e) => warn!(error = %e, "Ctrl-C listener unavailable; waits run to their deadline"),
  }
}

async fn run(
  command: Command,
  config: &AppConfig,
  metrics: Arc<SettlementMetrics>,
  shutdown: &mut broadcast::Receiver<()>,
) -> Result<()> {
  // ── 4. Wallet material from env ─────────────────────────
  let wallet = config::loader::load_wallet(config)?;

  // ── 5. Bundler client shared by adapter and coordinators ─
  let bundler: Arc<dyn BundlerApi> = Arc::new(
    BundlerClient::new(config.bundler.client_config()).context("Failed to create bundler client")?,
  );

  // ── 6. Currency adapter ─────────────────────────────────
  let settings = config.currency.settings(wallet, &config.bundler.url);
  let currency: Arc<dyn Currency> =
    build_currency_with(&config.currency.name, settings, Some(Arc::clone(&bundler)))?;
  currency.ready().await.context("Currency adapter failed to initialize")?;

  match command {
    Command::Address => {
      let address = currency.address().context("Adapter has no address")?;
      println!("{address}");
    }
    Command::Balance => {
      let funding = FundingCoordinator::new(currency.clone(), bundler, config.funding_config());
      let balance = funding.balance().await?;
      println!("{} {}", currency.base().format(balance), currency.ticker());
    }
    Command::Price => {
      let usd = currency.price().await?;
      println!("{usd} USD");
    }
    Command::Fund { amount, multiplier } => {
      let amount = currency.base().to_base_units(&amount)?;
      let mut request = FundingRequest::new(amount);
      if let Some(m) = multiplier {
        request = request.with_fee_multiplier(m);
      }
      let funding = FundingCoordinator::new(currency.clone(), bundler, config.funding_config())
        .with_metrics(metrics);
      let receipt = funding.fund(request, shutdown).await?;
      if !receipt.bundler_notified {
        warn!(tx_id = %receipt.id, "Bundler was not notified; credit may be delayed");
      }
      let status = match &receipt.status {
        FundingStatus::Confirmed(tx) => format!("confirmed at height {}", tx.block_height),
        FundingStatus::Submitted => "submitted".to_string(),
        FundingStatus::TimedOut => "not yet confirmed".to_string(),
        FundingStatus::Failed(reason) => format!("failed on-chain: {reason}"),
        FundingStatus::Unconfirmed(error) => format!("status unknown ({error})"),
      };
      println!(
        "{} sent {} {} to {} (fee {}): {status}",
        receipt.id,
        currency.base().format(receipt.quantity),
        currency.ticker(),
        receipt.target,
        currency.base().format(receipt.fee),
      );
    }
    Command::Withdraw { amount } => {
      let amount = currency.base().to_base_units(&amount)?;
      let destination = currency.address().context("Adapter has no address")?;
      let withdrawal = WithdrawalCoordinator::new(currency.clone(), bundler).with_metrics(metrics);
      let receipt = withdrawal
        .withdraw(WithdrawalRequest {
          amount,
          destination,
        })
        .await?;
      println!("{}", receipt.tx_id);
    }
  }

  Ok(())
}
