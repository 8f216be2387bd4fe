//! In-memory ledger storage with timed row locks
//!
//! The `LedgerStore` owns every account row, journal, loan application and
//! uniqueness index. It is shared across threads behind an `Arc` and uses
//! `DashMap` for the indexes and one `parking_lot::Mutex` per row.
//!
//! # Locking
//!
//! Four kinds of lock exist and are always taken in this order:
//!
//! ```text
//! ledger gate (RwLock)  →  customer row  →  loan application  →  account row
//! ```
//!
//! - Money movements hold the gate **shared** for their whole duration.
//! - Solvency reads and loan disbursement hold it **exclusive**, so the
//!   ledger-wide sum they compute cannot change underneath them.
//! - The customer row serializes the "at most one ACTIVE account" and
//!   "at most one PENDING application" checks with the inserts they guard.
//!
//! Every wait is bounded by the configured lock timeout. A wait that runs out
//! surfaces as [`LedgerError::Contention`] and leaves nothing half-written.
//!
//! Writes to account rows are only reachable through a [`LedgerScope`], which
//! is the proof that the gate is held.

use crate::types::{
    Account, AccountId, CustomerId, LedgerError, LoanApplication, LoanApplicationId, Transaction,
    TransactionId,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;
use std::time::Duration;

/// Account row: the account and its append-only journal
///
/// Journal entries are never removed. The only in-place change an entry may
/// see is COMPLETED → REVERSED.
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub account: Account,
    pub journal: Vec<Transaction>,
}

impl AccountRow {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            journal: Vec::new(),
        }
    }
}

/// Per-customer index, guarded by the customer lock
#[derive(Debug, Default)]
pub struct CustomerRow {
    /// Accounts in opening order
    pub accounts: Vec<AccountId>,

    /// Loan applications in submission order
    pub applications: Vec<LoanApplicationId>,
}

/// Held ledger gate
///
/// Shared scopes permit concurrent money movements; an exclusive scope
/// freezes every balance for a consistent ledger-wide read.
pub struct LedgerScope<'a> {
    store: &'a LedgerStore,
    guard: GateGuard<'a>,
}

enum GateGuard<'a> {
    Shared(#[allow(dead_code)] RwLockReadGuard<'a, ()>),
    Exclusive(#[allow(dead_code)] RwLockWriteGuard<'a, ()>),
}

impl<'a> LedgerScope<'a> {
    pub fn store(&self) -> &'a LedgerStore {
        self.store
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self.guard, GateGuard::Exclusive(_))
    }

    /// Lock one account row and run `f` against it
    ///
    /// The row lock is released when `f` returns. `f` must perform all of its
    /// fallible work before its first write so an error leaves the row
    /// untouched.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if no such account exists
    /// - `Contention` if the row lock is not acquired within the timeout
    /// - whatever `f` returns
    pub fn with_account<T, F>(&self, id: AccountId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut AccountRow) -> Result<T, LedgerError>,
    {
        let row = self.store.account_row(id)?;
        let mut guard = row
            .try_lock_for(self.store.lock_timeout)
            .ok_or_else(|| LedgerError::contention(format!("account {id}")))?;
        f(&mut guard)
    }

    /// Insert a freshly opened account
    ///
    /// The caller proves it holds the owner's customer lock by passing the
    /// customer row, which records the account in opening order.
    pub fn insert_account(&self, customer: &mut CustomerRow, account: Account) {
        let id = account.id;
        self.store
            .accounts
            .insert(id, Arc::new(Mutex::new(AccountRow::new(account))));
        customer.accounts.push(id);
    }

    /// Undo [`insert_account`](Self::insert_account) for an account nobody
    /// has posted to yet
    pub fn discard_account(&self, customer: &mut CustomerRow, id: AccountId) {
        if let Some((_, row)) = self.store.accounts.remove(&id) {
            let number = row.lock().account.number.clone();
            self.store.account_numbers.remove(&number);
        }
        customer.accounts.retain(|account| *account != id);
    }

    /// Sum a value over every account row
    ///
    /// Only available on an exclusive scope, where no balance can move while
    /// rows are visited one at a time.
    pub fn fold_accounts<T, F>(&self, init: T, mut f: F) -> Result<T, LedgerError>
    where
        F: FnMut(T, &AccountRow) -> Result<T, LedgerError>,
    {
        debug_assert!(self.is_exclusive(), "ledger-wide fold needs the gate exclusive");

        let rows: Vec<(AccountId, Arc<Mutex<AccountRow>>)> = self
            .store
            .accounts
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut acc = init;
        for (id, row) in rows {
            let guard = row
                .try_lock_for(self.store.lock_timeout)
                .ok_or_else(|| LedgerError::contention(format!("account {id}")))?;
            acc = f(acc, &guard)?;
        }
        Ok(acc)
    }
}

/// Shared in-memory ledger
#[derive(Debug)]
pub struct LedgerStore {
    gate: RwLock<()>,

    accounts: DashMap<AccountId, Arc<Mutex<AccountRow>>>,

    customers: DashMap<CustomerId, Arc<Mutex<CustomerRow>>>,

    applications: DashMap<LoanApplicationId, Arc<Mutex<LoanApplication>>>,

    /// Transaction id → owning account
    transactions: DashMap<TransactionId, AccountId>,

    /// Unique indexes: reference and number → owner
    references: DashMap<String, TransactionId>,
    account_numbers: DashMap<String, AccountId>,
    application_numbers: DashMap<String, LoanApplicationId>,

    lock_timeout: Duration,
}

impl LedgerStore {
    /// Create an empty store
    ///
    /// # Arguments
    ///
    /// * `lock_timeout` - Longest any single lock wait may take
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            gate: RwLock::new(()),
            accounts: DashMap::new(),
            customers: DashMap::new(),
            applications: DashMap::new(),
            transactions: DashMap::new(),
            references: DashMap::new(),
            account_numbers: DashMap::new(),
            application_numbers: DashMap::new(),
            lock_timeout,
        }
    }

    /// Enter the ledger for a money movement
    ///
    /// # Errors
    ///
    /// `Contention` if an exclusive holder keeps the gate past the timeout.
    pub fn shared(&self) -> Result<LedgerScope<'_>, LedgerError> {
        let guard = self
            .gate
            .try_read_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::contention("ledger gate"))?;
        Ok(LedgerScope {
            store: self,
            guard: GateGuard::Shared(guard),
        })
    }

    /// Freeze the ledger for a consistent ledger-wide read or a disbursement
    ///
    /// # Errors
    ///
    /// `Contention` if in-flight movements keep the gate past the timeout.
    pub fn exclusive(&self) -> Result<LedgerScope<'_>, LedgerError> {
        let guard = self
            .gate
            .try_write_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::contention("ledger gate"))?;
        Ok(LedgerScope {
            store: self,
            guard: GateGuard::Exclusive(guard),
        })
    }

    /// Lock a customer's row and run `f` against it
    ///
    /// The row is created empty on first use.
    pub fn with_customer<T, F>(&self, customer: CustomerId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut CustomerRow) -> Result<T, LedgerError>,
    {
        let row = Arc::clone(
            self.customers
                .entry(customer)
                .or_insert_with(|| Arc::new(Mutex::new(CustomerRow::default())))
                .value(),
        );
        let mut guard = row
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::contention(format!("customer {customer}")))?;
        f(&mut guard)
    }

    /// Lock a loan application and run `f` against it
    pub fn with_application<T, F>(&self, id: LoanApplicationId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut LoanApplication) -> Result<T, LedgerError>,
    {
        let row = self.application_row(id)?;
        let mut guard = row
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::contention(format!("loan application {id}")))?;
        f(&mut guard)
    }

    /// Insert a new application under its customer's lock
    pub fn insert_application(&self, customer: &mut CustomerRow, application: LoanApplication) {
        let id = application.id;
        self.applications
            .insert(id, Arc::new(Mutex::new(application)));
        customer.applications.push(id);
    }

    /// Claim a transaction reference
    ///
    /// # Returns
    ///
    /// `true` if the reference was free and now belongs to `owner`
    pub fn reserve_reference(&self, reference: &str, owner: TransactionId) -> bool {
        *self
            .references
            .entry(reference.to_string())
            .or_insert(owner)
            .value()
            == owner
    }

    /// Claim an account number
    pub fn reserve_account_number(&self, number: &str, owner: AccountId) -> bool {
        *self
            .account_numbers
            .entry(number.to_string())
            .or_insert(owner)
            .value()
            == owner
    }

    /// Claim a loan application number
    pub fn reserve_application_number(&self, number: &str, owner: LoanApplicationId) -> bool {
        *self
            .application_numbers
            .entry(number.to_string())
            .or_insert(owner)
            .value()
            == owner
    }

    /// Record which account a posted transaction belongs to
    pub fn index_transaction(&self, transaction: TransactionId, account: AccountId) {
        self.transactions.insert(transaction, account);
    }

    /// Account owning a transaction
    pub fn transaction_account(&self, id: TransactionId) -> Result<AccountId, LedgerError> {
        self.transactions
            .get(&id)
            .map(|entry| *entry.value())
            .ok_or(LedgerError::TransactionNotFound { transaction: id })
    }

    // Snapshot reads
    //
    // These lock a single row just long enough to clone it. They do not take
    // the gate, so two snapshots may straddle a concurrent movement.

    /// Snapshot of one account
    pub fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.read_account(id, |row| row.account.clone())
    }

    /// Snapshot of one account with its journal
    pub fn account_row_snapshot(&self, id: AccountId) -> Result<AccountRow, LedgerError> {
        self.read_account(id, AccountRow::clone)
    }

    /// Snapshot of one transaction
    pub fn transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let account = self.transaction_account(id)?;
        self.read_account(account, |row| {
            row.journal.iter().find(|tx| tx.id == id).cloned()
        })?
        .ok_or(LedgerError::TransactionNotFound { transaction: id })
    }

    /// Snapshot of one loan application
    pub fn application(&self, id: LoanApplicationId) -> Result<LoanApplication, LedgerError> {
        let row = self.application_row(id)?;
        let guard = row
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::contention(format!("loan application {id}")))?;
        Ok(guard.clone())
    }

    /// Account ids of a customer in opening order
    pub fn customer_account_ids(&self, customer: CustomerId) -> Result<Vec<AccountId>, LedgerError> {
        self.with_customer(customer, |row| Ok(row.accounts.clone()))
    }

    /// Accounts of a customer in opening order
    pub fn customer_accounts(&self, customer: CustomerId) -> Result<Vec<Account>, LedgerError> {
        self.customer_account_ids(customer)?
            .into_iter()
            .map(|id| self.account(id))
            .collect()
    }

    /// The ACTIVE account among those indexed in `customer`
    ///
    /// Call with the customer lock held to make the answer stick.
    pub fn active_account_in(&self, customer: &CustomerRow) -> Result<Option<Account>, LedgerError> {
        for id in customer.accounts.iter().rev() {
            let account = self.account(*id)?;
            if account.is_active() {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }

    /// Snapshot of the customer's ACTIVE account, if any
    pub fn active_account(&self, customer: CustomerId) -> Result<Option<Account>, LedgerError> {
        self.with_customer(customer, |row| self.active_account_in(row))
    }

    /// Loan applications of a customer, newest first
    pub fn customer_applications(
        &self,
        customer: CustomerId,
    ) -> Result<Vec<LoanApplication>, LedgerError> {
        let ids = self.with_customer(customer, |row| Ok(row.applications.clone()))?;
        // Row order is submission order, which breaks created_at ties
        ids.into_iter().rev().map(|id| self.application(id)).collect()
    }

    /// Every known customer, ascending
    pub fn customers(&self) -> Vec<CustomerId> {
        let mut customers: Vec<CustomerId> =
            self.customers.iter().map(|entry| *entry.key()).collect();
        customers.sort_unstable();
        customers
    }

    /// Every loan application, oldest first
    pub fn applications(&self) -> Result<Vec<LoanApplication>, LedgerError> {
        let ids: Vec<LoanApplicationId> =
            self.applications.iter().map(|entry| *entry.key()).collect();
        let mut applications = ids
            .into_iter()
            .map(|id| self.application(id))
            .collect::<Result<Vec<_>, _>>()?;
        applications.sort_by_key(|app| app.created_at);
        Ok(applications)
    }

    fn account_row(&self, id: AccountId) -> Result<Arc<Mutex<AccountRow>>, LedgerError> {
        // Clone the Arc out so the map shard is released before the row lock is taken
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    fn application_row(
        &self,
        id: LoanApplicationId,
    ) -> Result<Arc<Mutex<LoanApplication>>, LedgerError> {
        self.applications
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::LoanApplicationNotFound { application: id })
    }

    fn read_account<T>(
        &self,
        id: AccountId,
        f: impl FnOnce(&AccountRow) -> T,
    ) -> Result<T, LedgerError> {
        let row = self.account_row(id)?;
        let guard = row
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::contention(format!("account {id}")))?;
        Ok(f(&guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountType, Currency};
    use chrono::Utc;
    use std::sync::mpsc;
    use std::thread;

    fn store() -> LedgerStore {
        LedgerStore::new(Duration::from_millis(50))
    }

    fn checking(owner: CustomerId) -> Account {
        Account::new(
            owner,
            AccountType::Checking,
            format!("CHK-{owner:010}"),
            Currency::usd(),
            Utc::now(),
        )
    }

    fn open(store: &LedgerStore, owner: CustomerId) -> AccountId {
        let scope = store.shared().unwrap();
        store
            .with_customer(owner, |row| {
                let account = checking(owner);
                let id = account.id;
                scope.insert_account(row, account);
                Ok(id)
            })
            .unwrap()
    }

    #[test]
    fn test_insert_and_snapshot_account() {
        let store = store();
        let id = open(&store, 1);

        let account = store.account(id).unwrap();
        assert_eq!(account.owner, 1);
        assert_eq!(store.customer_account_ids(1).unwrap(), vec![id]);
    }

    #[test]
    fn test_unknown_account_is_not_found() {
        let store = store();
        let id = AccountId::new();

        assert_eq!(
            store.account(id),
            Err(LedgerError::AccountNotFound { account: id })
        );
    }

    #[test]
    fn test_reserve_reference_is_first_come() {
        let store = store();
        let first = TransactionId::new();
        let second = TransactionId::new();

        assert!(store.reserve_reference("TXN-20260101-AAAAAA", first));
        assert!(!store.reserve_reference("TXN-20260101-AAAAAA", second));
        // Re-claiming by the owner is idempotent
        assert!(store.reserve_reference("TXN-20260101-AAAAAA", first));
    }

    #[test]
    fn test_discard_account_releases_number() {
        let store = store();
        let scope = store.shared().unwrap();
        let account = checking(5);
        let id = account.id;
        assert!(store.reserve_account_number(&account.number, id));

        store
            .with_customer(5, |row| {
                scope.insert_account(row, account.clone());
                scope.discard_account(row, id);
                Ok(())
            })
            .unwrap();

        assert!(store.account(id).is_err());
        assert!(store.customer_account_ids(5).unwrap().is_empty());
        assert!(store.reserve_account_number(&account.number, AccountId::new()));
    }

    #[test]
    fn test_held_row_lock_times_out_as_contention() {
        let store = Arc::new(store());
        let id = open(&store, 2);
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let scope = store.shared().unwrap();
                scope
                    .with_account(id, |_| {
                        locked_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(())
                    })
                    .unwrap();
            })
        };

        locked_rx.recv().unwrap();
        let scope = store.shared().unwrap();
        let result = scope.with_account(id, |_| Ok(()));
        assert!(matches!(result, Err(LedgerError::Contention { .. })));

        release_tx.send(()).unwrap();
        holder.join().unwrap();
    }

    #[test]
    fn test_exclusive_gate_blocks_shared_entry() {
        let store = Arc::new(store());
        let exclusive = store.exclusive().unwrap();

        let store_clone = Arc::clone(&store);
        let result = thread::spawn(move || store_clone.shared().map(|_| ()))
            .join()
            .unwrap();

        assert_eq!(result, Err(LedgerError::contention("ledger gate")));
        drop(exclusive);
        assert!(store.shared().is_ok());
    }

    #[test]
    fn test_fold_accounts_visits_every_row() {
        let store = store();
        open(&store, 1);
        open(&store, 2);
        open(&store, 3);

        let scope = store.exclusive().unwrap();
        let count = scope.fold_accounts(0usize, |n, _| Ok(n + 1)).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_customers_are_sorted() {
        let store = store();
        open(&store, 9);
        open(&store, 3);
        open(&store, 5);

        assert_eq!(store.customers(), vec![3, 5, 9]);
    }
}
