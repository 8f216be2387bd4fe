//! Batch processing with customer-based partitioning
//!
//! The `BatchProcessor` partitions a batch of replay commands by customer so
//! commands for different customers run concurrently while each customer's
//! commands keep their file order.
//!
//! ```text
//! BatchProcessor
//!     └── CommandEngine  (shared, cheap to clone)
//!             └── Arc<TransactionService>
//! ```
//!
//! Commands block on ledger locks, so each partition runs on tokio's blocking
//! pool rather than on an async worker. A semaphore caps how many partitions
//! replay at once.
//!
//! Commands for different customers may interleave in any order. Anything
//! that depends on bank-wide state (loan disbursements against usable funds)
//! can therefore resolve differently from a sequential replay.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;

use super::engine::CommandEngine;
use crate::types::{CommandRecord, CustomerId, LedgerError};

/// Outcome of replaying a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub record: CommandRecord,
    pub result: Result<(), LedgerError>,
}

/// Batch processor with customer-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    engine: CommandEngine,
    workers: Arc<Semaphore>,
}

impl BatchProcessor {
    /// `max_workers` partitions replay at once; zero is treated as one
    pub fn new(engine: CommandEngine, max_workers: usize) -> Self {
        Self {
            engine,
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    /// Partition a batch of commands by customer
    ///
    /// # Guarantees
    ///
    /// - Each command appears in exactly one sub-batch
    /// - Commands for each customer keep their original order
    pub fn partition_by_customer(
        &self,
        batch: Vec<CommandRecord>,
    ) -> HashMap<CustomerId, Vec<CommandRecord>> {
        let mut customer_batches: HashMap<CustomerId, Vec<CommandRecord>> = HashMap::new();

        for record in batch {
            customer_batches
                .entry(record.customer)
                .or_default()
                .push(record);
        }

        customer_batches
    }

    /// Replay one customer's commands in order
    ///
    /// Failures are logged and captured in the results; they never stop the
    /// remaining commands.
    pub fn process_customer_commands(&self, commands: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        commands
            .into_iter()
            .map(|record| {
                let result = self.engine.process(&record);
                if let Err(e) = &result {
                    tracing::warn!(
                        command = %record.kind,
                        customer = record.customer,
                        error = %e,
                        "Command rejected"
                    );
                }
                ProcessingResult { record, result }
            })
            .collect()
    }

    /// Replay a batch with customer-based partitioning
    ///
    /// 1. Partitions the batch by customer
    /// 2. Runs each partition on the blocking pool, `max_workers` at a time
    /// 3. Waits for every partition and collects the results
    ///
    /// Results are grouped by customer; the order across customers is
    /// unspecified.
    pub async fn process_batch(&self, batch: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        let jobs = self
            .partition_by_customer(batch)
            .into_values()
            .map(|commands| {
                let processor = self.clone();
                move || processor.process_customer_commands(commands)
            })
            .collect::<Vec<_>>();

        self.run_limited(jobs).await.into_iter().flatten().collect()
    }

    /// Run blocking jobs with at most `max_workers` in flight
    async fn run_limited<T, F>(&self, jobs: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut tasks = Vec::with_capacity(jobs.len());
        for job in jobs {
            // Never closed, so acquisition cannot fail
            let permit = Arc::clone(&self.workers).acquire_owned().await.ok();
            tasks.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job()
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(output) => results.push(output),
                Err(e) => tracing::error!(error = %e, "Replay task panicked"),
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::types::CommandKind;
    use rstest::{fixture, rstest};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[fixture]
    fn processor() -> BatchProcessor {
        BatchProcessor::new(CommandEngine::new(EngineConfig::default()), 4)
    }

    fn deposit(customer: CustomerId, amount: i64) -> CommandRecord {
        CommandRecord::new(CommandKind::Deposit, customer).with_amount(Decimal::new(amount, 0))
    }

    fn open(customer: CustomerId) -> CommandRecord {
        CommandRecord::new(CommandKind::Open, customer)
    }

    #[rstest]
    fn test_partition_by_customer_empty_batch(processor: BatchProcessor) {
        assert!(processor.partition_by_customer(vec![]).is_empty());
    }

    #[rstest]
    fn test_partition_by_customer_keeps_order(processor: BatchProcessor) {
        let batch = vec![
            open(1),
            open(2),
            deposit(1, 10),
            deposit(3, 5),
            deposit(2, 20),
            deposit(1, 30),
        ];

        let partitioned = processor.partition_by_customer(batch);

        assert_eq!(partitioned.len(), 3);
        let customer1: Vec<_> = partitioned[&1]
            .iter()
            .map(|r| (r.kind, r.amount))
            .collect();
        assert_eq!(
            customer1,
            vec![
                (CommandKind::Open, None),
                (CommandKind::Deposit, Some(Decimal::new(10, 0))),
                (CommandKind::Deposit, Some(Decimal::new(30, 0))),
            ]
        );
        assert_eq!(partitioned[&2].len(), 2);
        assert_eq!(partitioned[&3].len(), 1);
    }

    #[rstest]
    fn test_process_customer_commands_continues_after_failure(processor: BatchProcessor) {
        let results = processor.process_customer_commands(vec![deposit(1, 10), open(1), deposit(1, 10)]);

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].result,
            Err(LedgerError::NoActiveAccount { customer: 1 })
        );
        assert!(results[1].result.is_ok());
        assert!(results[2].result.is_ok());
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_process_batch_runs_every_customer(processor: BatchProcessor) {
        let mut batch = Vec::new();
        for customer in 1..=8 {
            batch.push(open(customer));
        }
        for round in 1..=5 {
            for customer in 1..=8 {
                batch.push(deposit(customer, round));
            }
        }

        let results = processor.process_batch(batch).await;

        assert_eq!(results.len(), 48);
        assert!(results.iter().all(|r| r.result.is_ok()));

        let accounts = processor.engine.accounts().unwrap();
        assert_eq!(accounts.len(), 8);
        assert!(accounts
            .iter()
            .all(|account| account.balance == Decimal::new(15, 0)));
    }

    #[rstest]
    #[case::single_worker(1)]
    #[case::two_workers(2)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_limited_caps_parallel_jobs(#[case] max_workers: usize) {
        let processor = BatchProcessor::new(CommandEngine::new(EngineConfig::default()), max_workers);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..8)
            .map(|job| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(50));
                    running.fetch_sub(1, Ordering::SeqCst);
                    job
                }
            })
            .collect();

        let mut finished = processor.run_limited(jobs).await;
        finished.sort_unstable();

        assert_eq!(finished, (0..8).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= max_workers);
    }
}
