//! Benchmark suite comparing replay strategies
//!
//! Compares the sync and async strategies with the divan framework.
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Each run generates a command file for the given number of customers. Every
//! customer opens an account, makes twenty deposits and withdrawals, and one
//! customer in ten takes out a small loan and pays it off.

use divan::Bencher;
use ledger_engine::cli::StrategyType;
use ledger_engine::config::EngineConfig;
use ledger_engine::strategy::{create_strategy, BatchConfig};
use std::io::Write;
use tempfile::NamedTempFile;

fn main() {
    divan::main();
}

fn command_file(customers: u32) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "type,customer,amount,currency,rate,term,note").expect("write header");

    for customer in 1..=customers {
        if customer % 10 == 0 {
            writeln!(file, "apply,{customer},500,,,12").expect("write row");
            writeln!(file, "approve,{customer},,,0.05").expect("write row");
            writeln!(file, "disburse,{customer}").expect("write row");
            writeln!(file, "payment,{customer},250").expect("write row");
            writeln!(file, "payment,{customer},250").expect("write row");
        }
        writeln!(file, "open,{customer},100.00").expect("write row");
        for round in 0..10 {
            writeln!(file, "deposit,{customer},{}.25", 10 + round).expect("write row");
            writeln!(file, "withdrawal,{customer},{}.10", 5 + round).expect("write row");
        }
    }

    file.flush().expect("Failed to flush temp file");
    file
}

fn replay(bencher: Bencher, strategy_type: StrategyType, customers: u32) {
    let file = command_file(customers);
    let batch = matches!(strategy_type, StrategyType::Async).then(BatchConfig::default);
    let strategy = create_strategy(strategy_type, batch, EngineConfig::default());

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(file.path(), &mut output)
            .expect("Processing failed");
        output
    });
}

#[divan::bench(args = [10, 100, 1000])]
fn sync_strategy(bencher: Bencher, customers: u32) {
    replay(bencher, StrategyType::Sync, customers);
}

#[divan::bench(args = [10, 100, 1000])]
fn async_strategy(bencher: Bencher, customers: u32) {
    replay(bencher, StrategyType::Async, customers);
}
