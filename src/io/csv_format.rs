//! CSV format handling for replay commands and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to validated commands
//! - Account output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! Input columns: `type,customer,amount,currency,rate,term,note`. Only `type`
//! and `customer` are always required; trailing optional columns may be
//! omitted.

use crate::types::{Account, CommandKind, CommandRecord, Currency, CustomerId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Optional columns stay as raw strings here; conversion parses and validates
/// them against the command type.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub customer: CustomerId,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Convert a CsvRecord to a CommandRecord
///
/// This function:
/// - Parses the command type (case insensitive)
/// - Parses amount, rate, term and currency when present
/// - Checks the columns each command type requires
///
/// # Arguments
///
/// * `csv_record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(CommandRecord) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<CommandRecord, String> {
    let customer = csv_record.customer;
    let kind = match csv_record.kind.to_lowercase().as_str() {
        "open" => CommandKind::Open,
        "close" => CommandKind::Close,
        "deposit" => CommandKind::Deposit,
        "withdrawal" => CommandKind::Withdrawal,
        "payment" => CommandKind::Payment,
        "apply" => CommandKind::Apply,
        "approve" => CommandKind::Approve,
        "reject" => CommandKind::Reject,
        "cancel" => CommandKind::Cancel,
        "disburse" => CommandKind::Disburse,
        _ => {
            return Err(format!(
                "Invalid command type: '{}' for customer {}",
                csv_record.kind, customer
            ))
        }
    };

    let amount = parse_field(csv_record.amount, "amount", customer, |s| {
        Decimal::from_str(s).ok()
    })?;
    let rate = parse_field(csv_record.rate, "rate", customer, |s| Decimal::from_str(s).ok())?;
    let term = parse_field(csv_record.term, "term", customer, |s| s.parse::<u32>().ok())?;
    let currency = parse_field(csv_record.currency, "currency", customer, |s| {
        Currency::new(s).ok()
    })?;
    let note = csv_record
        .note
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let missing = |column: &str| format!("{kind} command for customer {customer} requires {column}");
    match kind {
        CommandKind::Deposit | CommandKind::Withdrawal | CommandKind::Payment
            if amount.is_none() =>
        {
            return Err(missing("an amount"));
        }
        CommandKind::Apply if amount.is_none() => return Err(missing("an amount")),
        CommandKind::Apply if term.is_none() => return Err(missing("a term")),
        CommandKind::Approve if rate.is_none() => return Err(missing("a rate")),
        _ => {}
    }

    Ok(CommandRecord {
        kind,
        customer,
        amount,
        currency,
        rate,
        term,
        note,
    })
}

/// Parse an optional column, treating blank as absent
fn parse_field<T>(
    raw: Option<String>,
    column: &str,
    customer: CustomerId,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<Option<T>, String> {
    match raw {
        Some(value) if !value.trim().is_empty() => parse(value.trim())
            .map(Some)
            .ok_or_else(|| format!("Invalid {column} '{value}' for customer {customer}")),
        _ => Ok(None),
    }
}

/// Write account states to CSV format
///
/// Writes accounts with columns: customer, type, status, balance, currency.
/// Accounts are ordered by customer, then by opening order within a customer.
///
/// # Arguments
///
/// * `accounts` - Accounts in opening order per customer
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["customer", "type", "status", "balance", "currency"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    // Stable sort keeps opening order within a customer
    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.owner);

    for account in sorted_accounts {
        // A paid-off loan can carry a negative zero
        let balance = if account.balance.is_zero() {
            Decimal::ZERO
        } else {
            account.balance
        };
        writer
            .write_record(&[
                account.owner.to_string(),
                account.account_type.to_string(),
                account.status.to_string(),
                format!("{:.2}", balance),
                account.currency.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
