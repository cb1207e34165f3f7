//! Workload driver: runs a configured mix of transactions against a chosen
//! concurrency-control protocol and prints the performance report.
//!
//! Usage:
//!   txnlab --protocol occ --threads 8 --txns-per-thread 500
//!   txnlab --protocol 2pl --total-keys 100 --hotset-size 5 --hotset-prob 0.8

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use txnlab::{
    account_key, ContentionConfig, ExecutorConfig, MetricsCollector, OccManager, Store,
    TransactionManager, TwoPlManager, WorkloadExecutor, WorkloadTemplate,
};

const INITIAL_BALANCE: i64 = 1000;

#[derive(Parser, Debug)]
#[command(name = "txnlab")]
#[command(about = "Transaction processing workload driver (OCC / conservative 2PL)")]
#[command(version)]
struct Args {
    /// Number of worker threads
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Logical transactions per thread
    #[arg(long, default_value_t = 100)]
    txns_per_thread: usize,

    /// Size of the key space
    #[arg(long, default_value_t = 1000)]
    total_keys: usize,

    /// Number of hot keys
    #[arg(long, default_value_t = 10)]
    hotset_size: usize,

    /// Probability that a draw lands in the hot set
    #[arg(long, default_value_t = 0.5)]
    hotset_prob: f64,

    /// Concurrency-control protocol: occ | 2pl
    #[arg(long, default_value = "occ")]
    protocol: String,

    /// Path to the backing store
    #[arg(long, default_value = "transaction_db")]
    db_path: PathBuf,

    /// Distinct keys touched by each write_heavy transaction
    #[arg(long, default_value_t = 4)]
    write_heavy_keys: usize,

    /// Base backoff in microseconds (lock acquisition and retry loop)
    #[arg(long, default_value_t = 100)]
    backoff_base_us: u64,

    /// Also write the report as JSON to this path
    #[arg(long)]
    report_json: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let store = match Store::open(&args.db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("failed to open store at {}: {e}", args.db_path.display());
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "seeding {} accounts with balance {INITIAL_BALANCE}",
        args.total_keys
    );
    let seeded = store.initialize_with_data(
        (0..args.total_keys).map(|i| (account_key(i), INITIAL_BALANCE.to_string())),
    );
    if !seeded {
        log::error!("failed to seed initial account balances");
        return ExitCode::FAILURE;
    }

    let config = ExecutorConfig::new()
        .num_threads(args.threads)
        .txns_per_thread(args.txns_per_thread)
        .contention(
            ContentionConfig::new()
                .total_keys(args.total_keys)
                .hotset_size(args.hotset_size)
                .hotset_probability(args.hotset_prob),
        )
        .templates(vec![
            WorkloadTemplate::Transfer,
            WorkloadTemplate::BalanceCheck,
            WorkloadTemplate::WriteHeavy {
                keys: args.write_heavy_keys,
            },
        ])
        .retry_backoff_base_us(args.backoff_base_us);

    let outcome = match args.protocol.as_str() {
        "occ" => run_workload(OccManager::new(store), config, &args),
        "2pl" => run_workload(
            TwoPlManager::with_base_backoff(store, args.backoff_base_us),
            config,
            &args,
        ),
        other => {
            log::error!("unknown protocol {other:?}, expected \"occ\" or \"2pl\"");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("workload failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_workload<M: TransactionManager>(
    manager: M,
    config: ExecutorConfig,
    args: &Args,
) -> Result<(), txnlab::TxnLabError> {
    let metrics = MetricsCollector::new();
    let mut executor = WorkloadExecutor::new(&manager, &metrics, config);
    executor.run()?;

    let report = metrics.report(executor.elapsed_seconds());
    println!("{report}");

    if let Some(path) = &args.report_json {
        fs::write(path, serde_json::to_vec_pretty(&report)?)?;
        log::info!("report written to {}", path.display());
    }
    Ok(())
}
