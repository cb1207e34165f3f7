use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::selector::{ContentionConfig, KeySelector};
use super::template::WorkloadTemplate;
use crate::manager::TransactionManager;
use crate::metrics::MetricsCollector;
use crate::TxnLabError;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub num_threads: usize,
    pub txns_per_thread: usize,
    pub contention: ContentionConfig,
    pub templates: Vec<WorkloadTemplate>,
    pub retry_backoff_base_us: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            num_threads: 4,
            txns_per_thread: 100,
            contention: ContentionConfig::default(),
            templates: vec![
                WorkloadTemplate::Transfer,
                WorkloadTemplate::BalanceCheck,
                WorkloadTemplate::WriteHeavy { keys: 4 },
            ],
            retry_backoff_base_us: 100,
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn txns_per_thread(mut self, n: usize) -> Self {
        self.txns_per_thread = n;
        self
    }

    pub fn contention(mut self, contention: ContentionConfig) -> Self {
        self.contention = contention;
        self
    }

    pub fn templates(mut self, templates: Vec<WorkloadTemplate>) -> Self {
        self.templates = templates;
        self
    }

    pub fn retry_backoff_base_us(mut self, us: u64) -> Self {
        self.retry_backoff_base_us = us;
        self
    }

    pub fn validate(&self) -> Result<(), TxnLabError> {
        if self.num_threads == 0 {
            return Err(TxnLabError::Config("num_threads must be at least 1".into()));
        }
        let max_input_keys = self
            .templates
            .iter()
            .map(WorkloadTemplate::num_input_keys)
            .max()
            .ok_or_else(|| TxnLabError::Config("template list is empty".into()))?;
        self.contention.validate(max_input_keys)
    }
}

/// Drives a workload against one manager with a pool of OS threads.
///
/// Each worker owns a seeded PRNG and key selector, and runs every logical
/// transaction to a successful commit: a failed attempt is recorded as an
/// abort and retried after exponential backoff with jitter, and the latency
/// recorded on success is end-to-end from the first attempt.
pub struct WorkloadExecutor<'a, M: TransactionManager> {
    manager: &'a M,
    metrics: &'a MetricsCollector,
    config: ExecutorConfig,
    elapsed: Duration,
}

impl<'a, M: TransactionManager> WorkloadExecutor<'a, M> {
    pub fn new(manager: &'a M, metrics: &'a MetricsCollector, config: ExecutorConfig) -> Self {
        Self {
            manager,
            metrics,
            config,
            elapsed: Duration::ZERO,
        }
    }

    /// Wall time from thread spawn to the last join of the previous `run`.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn run(&mut self) -> Result<(), TxnLabError> {
        self.config.validate()?;

        log::info!(
            "running {} threads x {} txns under {}",
            self.config.num_threads,
            self.config.txns_per_thread,
            self.manager.protocol_name()
        );

        let start = Instant::now();
        let this: &Self = self;
        let outcome: Result<(), TxnLabError> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(this.config.num_threads);
            for thread_id in 0..this.config.num_threads {
                handles.push(scope.spawn(move || this.worker(thread_id)));
            }
            for handle in handles {
                match handle.join() {
                    Ok(result) => result?,
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            Ok(())
        });
        outcome?;

        self.elapsed = start.elapsed();
        log::info!(
            "workload finished in {:.3}s: {} commits, {} aborts",
            self.elapsed.as_secs_f64(),
            self.metrics.total_commits(),
            self.metrics.total_aborts()
        );
        Ok(())
    }

    fn worker(&self, thread_id: usize) -> Result<(), TxnLabError> {
        let seed = thread_id as u64
            + SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
        let mut rng = StdRng::seed_from_u64(seed);
        let selector = KeySelector::new(self.config.contention.clone());
        log::debug!("worker {thread_id} started");

        for _ in 0..self.config.txns_per_thread {
            let template = &self.config.templates[rng.gen_range(0..self.config.templates.len())];
            let keys = selector.select_distinct(template.num_input_keys(), &mut rng);

            let wall_start = Instant::now();
            let mut retries: u32 = 0;

            // Retry until commit; the template begins a fresh transaction on
            // every attempt.
            loop {
                let result = template.execute(self.manager, &keys)?;
                if result.success {
                    let latency_us = wall_start.elapsed().as_secs_f64() * 1_000_000.0;
                    self.metrics.record_commit(template.name(), latency_us);
                    break;
                }

                self.metrics.record_abort(template.name());
                retries += 1;

                let backoff_us = self.config.retry_backoff_base_us << retries.min(10);
                let jitter = rng.gen_range(0..=backoff_us);
                log::debug!(
                    "worker {thread_id}: {} aborted, retry {retries} in {}us",
                    template.name(),
                    backoff_us + jitter
                );
                thread::sleep(Duration::from_micros(backoff_us + jitter));
            }
        }
        log::debug!("worker {thread_id} finished");
        Ok(())
    }
}
