//! `relaybench`: load-test a meta-transaction relay.

mod payload;

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use clap::{Parser, Subcommand, ValueEnum};
use eyre::{Result, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relaybench_crypto::{LocalSigner, RelaySigner};
use relaybench_ops::{Config, Dispatcher, JobOutcome};
use relaybench_tx::{BalanceClient, RelayClient};
use relaybench_watch::{wait_for_confirmations, RpcChainReader};

#[derive(Debug, Parser)]
#[command(name = "relaybench", about = "Load-test a meta-transaction relay")]
struct Cli {
    /// JSON config file; built-in defaults are used when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a batch of relay jobs and wait for their confirmations.
    Run {
        /// Contract the relayed calls are sent to.
        #[arg(long)]
        target: Address,
        /// Comma-separated iteration counts, one job each.
        #[arg(long, value_delimiter = ',')]
        jobs: Vec<u64>,
        #[arg(long, env = "RELAYBENCH_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        #[arg(long)]
        skip_balance_check: bool,
    },
    /// Show the relay-side balance of an account.
    Balance {
        #[arg(long)]
        address: Address,
    },
    /// Wait until a funding or deployment transaction is deep enough.
    AwaitTx {
        #[arg(long)]
        hash: B256,
        #[arg(long, value_enum, default_value_t = TxKind::Deposit)]
        kind: TxKind,
        #[arg(long, default_value_t = 2_000)]
        poll_interval_ms: u64,
        #[arg(long, default_value_t = 3_600)]
        max_attempts: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TxKind {
    Deposit,
    Deployment,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => {
            let config = Config::default();
            config.validate()?;
            config
        }
    };
    Ok(config)
}

fn balance_client(config: &Config) -> BalanceClient {
    BalanceClient::new(
        &config.balance_host,
        config.balance_port,
        Some(config.request_timeout_ms),
    )
}

async fn run_batch(
    config: Config,
    target: Address,
    iterations: Vec<u64>,
    private_key: &str,
    skip_balance_check: bool,
) -> Result<()> {
    let signer = LocalSigner::from_hex(private_key)?;
    let iterations = if iterations.is_empty() {
        payload::DEFAULT_JOBS.to_vec()
    } else {
        iterations
    };

    if !skip_balance_check {
        match balance_client(&config).balance(signer.address()).await {
            Ok(balance) => info!(address = %signer.address(), %balance, "relay balance"),
            Err(e) => warn!(address = %signer.address(), error = %e, "balance check failed"),
        }
    }

    let reader = Arc::new(RpcChainReader::new(&config.rpc_url)?);
    let submitter = Arc::new(RelayClient::new(&config.relay_url, Some(config.request_timeout_ms)));
    let dispatcher = Dispatcher::new(config, reader, submitter)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, abandoning batch");
                cancel.cancel();
            }
        });
    }

    let jobs = payload::build_jobs(&iterations);
    let result = dispatcher
        .run_until_cancelled(&jobs, &signer, target, &cancel)
        .await
        .wrap_err("relay batch could not start")?;

    for job in &result.jobs {
        let identifier = job
            .identifier
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into());
        let detail = match &job.outcome {
            JobOutcome::Confirmed(record) => format!(
                "success={} block={}",
                record.success,
                record.block_number.map_or_else(|| "?".into(), |b| b.to_string())
            ),
            JobOutcome::Rejected { status, body } => format!("status={} {}", status, body),
            JobOutcome::TimedOut { deadline } => format!("deadline={}", deadline),
            JobOutcome::Failed(e) => e.to_string(),
        };
        println!(
            "job {:>2} cost={:<5} gas={:<8} {} {:<9} {}",
            job.index,
            job.cost,
            job.gas_limit,
            identifier,
            job.outcome.label(),
            detail
        );
    }
    println!("{}", serde_json::to_string_pretty(&result.summary())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Run { target, jobs, private_key, skip_balance_check } => {
            run_batch(config, target, jobs, &private_key, skip_balance_check).await?;
        }
        Command::Balance { address } => {
            let balance = balance_client(&config).balance(address).await?;
            println!("{}", serde_json::to_string_pretty(&balance)?);
        }
        Command::AwaitTx { hash, kind, poll_interval_ms, max_attempts } => {
            let confirmations = match kind {
                TxKind::Deposit => config.deposit_confirmations,
                TxKind::Deployment => config.deployment_confirmations,
            };
            let reader = RpcChainReader::new(&config.rpc_url)?;
            info!(%hash, ?kind, confirmations, "waiting for transaction");
            let block = wait_for_confirmations(&reader, hash, confirmations, max_attempts, poll_interval_ms).await?;
            println!("{} included in block {} and {} blocks deep", hash, block, confirmations);
        }
    }
    Ok(())
}
