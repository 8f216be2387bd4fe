//! Synchronous processing strategy
//!
//! Single-threaded replay. The SyncProcessingStrategy only orchestrates:
//! - CSV parsing goes to `SyncReader` (iterator interface)
//! - Command processing goes to `CommandEngine`
//! - CSV output goes to `csv_format::write_accounts_csv`
//!
//! Commands run strictly in file order, so bank-wide outcomes such as loan
//! disbursements against usable funds are deterministic.

use crate::config::EngineConfig;
use crate::core::CommandEngine;
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use ledger_engine::config::EngineConfig;
/// use ledger_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(EngineConfig::default());
/// let mut output = io::stdout();
///
/// strategy.process(Path::new("commands.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    config: EngineConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let engine = CommandEngine::new(self.config.clone());
        let reader = SyncReader::new(input_path)?;

        for result in reader {
            match result {
                Ok(record) => {
                    if let Err(e) = engine.process(&record) {
                        tracing::warn!(
                            command = %record.kind,
                            customer = record.customer,
                            error = %e,
                            "Command rejected"
                        );
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Skipping invalid command"),
            }
        }

        let accounts = engine
            .accounts()
            .map_err(|e| format!("Failed to collect accounts: {}", e))?;
        write_accounts_csv(&accounts, output)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const HEADER: &str = "type,customer,amount,currency,rate,term,note\n";

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(rows: &str) -> String {
        let file = create_temp_csv(&format!("{HEADER}{rows}"));
        let mut output = Vec::new();
        SyncProcessingStrategy::default()
            .process(file.path(), &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_sync_strategy_replays_commands() {
        let output = run("open,1,100.00\nwithdrawal,1,40\nopen,2\ndeposit,2,12.5\n");

        assert_eq!(
            output,
            "customer,type,status,balance,currency\n\
             1,CHECKING,ACTIVE,60.00,USD\n\
             2,CHECKING,ACTIVE,12.50,USD\n"
        );
    }

    #[test]
    fn test_sync_strategy_handles_missing_file() {
        let strategy = SyncProcessingStrategy::default();
        let mut output = Vec::new();

        let result = strategy.process(Path::new("nonexistent.csv"), &mut output);
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_sync_strategy_continues_on_bad_rows() {
        let output = run("open,1\ndeposit,1,abc\nwithdrawal,1,5\ndeposit,1,7\n");

        assert_eq!(
            output,
            "customer,type,status,balance,currency\n1,CHECKING,ACTIVE,7.00,USD\n"
        );
    }

    #[test]
    fn test_sync_strategy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncProcessingStrategy>();
    }
}
