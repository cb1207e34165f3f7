use std::sync::Arc;

use tempfile::tempdir;

use txnlab::{
    account_key, ContentionConfig, ExecutorConfig, MetricsCollector, OccManager, Store,
    TransactionManager, TwoPlManager, TxnLabError, WorkloadExecutor, WorkloadTemplate,
};

fn fresh_store() -> (tempfile::TempDir, Arc<Store>) {
    let tmp = tempdir().unwrap();
    let store = Arc::new(Store::open(tmp.path().join("db")).unwrap());
    (tmp, store)
}

fn seed_accounts(store: &Store, n: usize, balance: i64) {
    assert!(store.initialize_with_data((0..n).map(|i| (account_key(i), balance.to_string()))));
}

fn total_balance(store: &Store, n: usize) -> i64 {
    (0..n)
        .map(|i| {
            store
                .get(&account_key(i))
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
        })
        .sum()
}

fn run<M: TransactionManager>(manager: &M, config: ExecutorConfig) -> (MetricsCollector, f64) {
    let metrics = MetricsCollector::new();
    let mut executor = WorkloadExecutor::new(manager, &metrics, config);
    executor.run().unwrap();
    let elapsed = executor.elapsed_seconds();
    (metrics, elapsed)
}

#[test]
fn transfer_only_workload_conserves_balance_under_occ() {
    let (_tmp, store) = fresh_store();
    const ACCOUNTS: usize = 50;
    seed_accounts(&store, ACCOUNTS, 1000);

    let manager = OccManager::new(store.clone());
    let config = ExecutorConfig::new()
        .num_threads(4)
        .txns_per_thread(100)
        .contention(
            ContentionConfig::new()
                .total_keys(ACCOUNTS)
                .hotset_size(5)
                .hotset_probability(0.5),
        )
        .templates(vec![WorkloadTemplate::Transfer])
        .retry_backoff_base_us(50);

    let (metrics, elapsed) = run(&manager, config);

    // Every logical transaction commits exactly once, retries included.
    assert_eq!(metrics.total_commits(), 400);
    assert_eq!(total_balance(&store, ACCOUNTS), 50 * 1000);
    assert!(elapsed > 0.0);
    assert!(metrics.throughput(elapsed) > 0.0);
}

#[test]
fn transfer_only_workload_conserves_balance_under_twopl() {
    let (_tmp, store) = fresh_store();
    const ACCOUNTS: usize = 50;
    seed_accounts(&store, ACCOUNTS, 1000);

    let manager = TwoPlManager::new(store.clone());
    let config = ExecutorConfig::new()
        .num_threads(4)
        .txns_per_thread(100)
        .contention(
            ContentionConfig::new()
                .total_keys(ACCOUNTS)
                .hotset_size(5)
                .hotset_probability(0.5),
        )
        .templates(vec![WorkloadTemplate::Transfer]);

    let (metrics, _elapsed) = run(&manager, config);

    // C2PL never aborts: commits only, no abort rows.
    assert_eq!(metrics.total_commits(), 400);
    assert_eq!(metrics.total_aborts(), 0);
    assert_eq!(total_balance(&store, ACCOUNTS), 50 * 1000);
}

#[test]
fn write_heavy_workload_accounts_for_every_commit() {
    let (_tmp, store) = fresh_store();
    const ACCOUNTS: usize = 20;
    const PER_TXN_KEYS: usize = 3;

    let manager = TwoPlManager::new(store.clone());
    let config = ExecutorConfig::new()
        .num_threads(2)
        .txns_per_thread(50)
        .contention(
            ContentionConfig::new()
                .total_keys(ACCOUNTS)
                .hotset_size(4)
                .hotset_probability(0.3),
        )
        .templates(vec![WorkloadTemplate::WriteHeavy {
            keys: PER_TXN_KEYS,
        }]);

    let (metrics, _elapsed) = run(&manager, config);

    let commits = metrics.total_commits();
    assert_eq!(commits, 100);
    // Unseeded accounts read as 0, so the aggregate equals keys-per-txn
    // times commits.
    assert_eq!(
        total_balance(&store, ACCOUNTS),
        (PER_TXN_KEYS as i64) * commits as i64
    );
}

#[test]
fn mixed_workload_runs_under_both_protocols() {
    for protocol in ["occ", "2pl"] {
        let (_tmp, store) = fresh_store();
        seed_accounts(&store, 100, 1000);

        let config = ExecutorConfig::new()
            .num_threads(2)
            .txns_per_thread(25)
            .contention(ContentionConfig::new().total_keys(100));

        let metrics = match protocol {
            "occ" => {
                let manager = OccManager::new(store.clone());
                assert_eq!(manager.protocol_name(), "OCC");
                run(&manager, config).0
            }
            _ => {
                let manager = TwoPlManager::new(store.clone());
                assert_eq!(manager.protocol_name(), "2PL");
                run(&manager, config).0
            }
        };

        assert_eq!(metrics.total_commits(), 50);
        let report = metrics.report(1.0);
        assert!(!report.per_type.is_empty());
    }
}

#[test]
fn zero_txns_per_thread_yields_zero_row_report() {
    let (_tmp, store) = fresh_store();

    let manager = OccManager::new(store);
    let config = ExecutorConfig::new().num_threads(2).txns_per_thread(0);

    let (metrics, elapsed) = run(&manager, config);
    let report = metrics.report(elapsed);

    assert_eq!(report.total_commits, 0);
    assert_eq!(report.total_aborts, 0);
    assert!(report.per_type.is_empty());
}

#[test]
fn executor_rejects_impossible_key_demand() {
    let (_tmp, store) = fresh_store();

    let manager = OccManager::new(store);
    // transfer needs 2 distinct keys but only 1 exists
    let config = ExecutorConfig::new()
        .contention(ContentionConfig::new().total_keys(1).hotset_size(1))
        .templates(vec![WorkloadTemplate::Transfer]);

    let metrics = MetricsCollector::new();
    let mut executor = WorkloadExecutor::new(&manager, &metrics, config);
    let err = executor.run().unwrap_err();
    assert!(matches!(err, TxnLabError::Config(_)));
}

#[test]
fn executor_rejects_empty_template_list() {
    let (_tmp, store) = fresh_store();

    let manager = OccManager::new(store);
    let config = ExecutorConfig::new().templates(Vec::new());

    let metrics = MetricsCollector::new();
    let mut executor = WorkloadExecutor::new(&manager, &metrics, config);
    assert!(matches!(
        executor.run().unwrap_err(),
        TxnLabError::Config(_)
    ));
}
