//! Account storage contract and JSON snapshot implementation.
//!
//! # Responsibility
//! - Provide the account lookup/mutation APIs used by session handlers.
//! - Persist the complete account set to one JSON file after each mutation.
//!
//! # Invariants
//! - Ids are allocated as `max(id) + 1` (or `0`; lowest unused id once
//!   `AccountId::MAX` is taken) inside the writer critical
//!   section, so concurrent `add` calls never share an id.
//! - Queries never observe a half-applied append; they read published
//!   snapshots only.
//! - A present but unreadable store file aborts construction instead of
//!   starting empty.
//! - Mutations never surface persistence failures; those are logged and
//!   counted in `PersistStatus`.

use crate::model::account::{Account, AccountDetail, AccountId, AccountState};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;
use tempfile::NamedTempFile;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reading an existing store file.
#[derive(Debug)]
pub enum LoadFailure {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl Display for LoadFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "read failed: {err}"),
            Self::Parse(err) => write!(f, "not an account array: {err}"),
        }
    }
}

impl Error for LoadFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<io::Error> for LoadFailure {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for LoadFailure {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Failure writing a snapshot to the store file.
#[derive(Debug)]
pub enum PersistFailure {
    Serialize(serde_json::Error),
    Io(io::Error),
}

impl Display for PersistFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(err) => write!(f, "serialization failed: {err}"),
            Self::Io(err) => write!(f, "write failed: {err}"),
        }
    }
}

impl Error for PersistFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for PersistFailure {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for PersistFailure {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

impl From<tempfile::PersistError> for PersistFailure {
    fn from(value: tempfile::PersistError) -> Self {
        Self::Io(value.error)
    }
}

/// Store-level error.
#[derive(Debug)]
pub enum StoreError {
    /// Parent directory of the store file could not be created.
    Initialization { path: PathBuf, source: io::Error },
    /// Store file exists but could not be read as an account array.
    Load { path: PathBuf, source: LoadFailure },
    /// Snapshot could not be written.
    Persist { path: PathBuf, source: PersistFailure },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialization { path, source } => write!(
                f,
                "cannot create store directory `{}`: {source}",
                path.display()
            ),
            Self::Load { path, source } => {
                write!(f, "cannot load store file `{}`: {source}", path.display())
            }
            Self::Persist { path, source } => {
                write!(f, "cannot save store file `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Initialization { source, .. } => Some(source),
            Self::Load { source, .. } => Some(source),
            Self::Persist { source, .. } => Some(source),
        }
    }
}

/// Account data-access contract consumed by session and profile handlers.
///
/// Lookup misses are not errors: queries return `None` and updates are
/// silent no-ops.
pub trait AccountStorage: Send + Sync {
    fn find_by_id(&self, id: AccountId) -> Option<Account>;
    fn find_by_username(&self, username: &str) -> Option<Account>;
    /// Point-in-time copy of every account, in insertion order.
    fn find_all(&self) -> Vec<Account>;
    /// Assigns a free id to `candidate`, stores and persists it.
    fn add(&self, candidate: Account) -> Account;
    /// Overwrites `display_name` and `status` only.
    fn update_detail(&self, account_id: AccountId, detail: &AccountDetail);
    fn update_password_hash(&self, account_id: AccountId, password_hash: &str);
    /// Updates runtime presence. Never persisted.
    ///
    /// Returns `false` when no account matches.
    fn set_state(&self, account_id: AccountId, state: AccountState) -> bool;
}

impl<S: AccountStorage + ?Sized> AccountStorage for Arc<S> {
    fn find_by_id(&self, id: AccountId) -> Option<Account> {
        (**self).find_by_id(id)
    }

    fn find_by_username(&self, username: &str) -> Option<Account> {
        (**self).find_by_username(username)
    }

    fn find_all(&self) -> Vec<Account> {
        (**self).find_all()
    }

    fn add(&self, candidate: Account) -> Account {
        (**self).add(candidate)
    }

    fn update_detail(&self, account_id: AccountId, detail: &AccountDetail) {
        (**self).update_detail(account_id, detail)
    }

    fn update_password_hash(&self, account_id: AccountId, password_hash: &str) {
        (**self).update_password_hash(account_id, password_hash)
    }

    fn set_state(&self, account_id: AccountId, state: AccountState) -> bool {
        (**self).set_state(account_id, state)
    }
}

/// Behavior switches for `JsonAccountStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Save even when an update matches no account.
    pub persist_on_miss: bool,
    /// Write indented JSON.
    pub pretty: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            persist_on_miss: true,
            pretty: true,
        }
    }
}

/// Persistence counters exposed to operators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistStatus {
    /// Successful saves since the store was opened.
    pub saves: u64,
    /// Failed saves since the store was opened.
    pub failures: u64,
    /// Message of the most recent failed save.
    pub last_failure: Option<String>,
}

/// Account store backed by a single JSON snapshot file.
#[derive(Debug)]
pub struct JsonAccountStore {
    path: PathBuf,
    options: StoreOptions,
    accounts: RwLock<Arc<Vec<Account>>>,
    // Held across id allocation, publish and save.
    writer: Mutex<PersistStatus>,
}

impl JsonAccountStore {
    /// Opens the store at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_options(path, StoreOptions::default())
    }

    /// Opens the store at `path`, creating its parent directory if needed.
    ///
    /// # Errors
    /// - `StoreError::Initialization` when the parent directory cannot be created.
    /// - `StoreError::Load` when the file exists but is not an account array.
    ///
    /// # Side effects
    /// - Loaded accounts have `detail.account_id` re-synced and `state` reset
    ///   to `Offline`.
    pub fn open_with_options(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let started_at = Instant::now();
        let path = path.as_ref().to_path_buf();
        info!("event=store_open module=store status=start");

        let dir = store_dir(&path);
        if let Err(source) = fs::create_dir_all(dir) {
            error!(
                "event=store_open module=store status=error duration_ms={} error_code=store_dir_failed error={}",
                started_at.elapsed().as_millis(),
                source
            );
            return Err(StoreError::Initialization {
                path: dir.to_path_buf(),
                source,
            });
        }

        let accounts = match load_accounts(&path) {
            Ok(accounts) => accounts,
            Err(source) => {
                error!(
                    "event=store_open module=store status=error duration_ms={} error_code=store_load_failed error={}",
                    started_at.elapsed().as_millis(),
                    source
                );
                return Err(StoreError::Load { path, source });
            }
        };

        info!(
            "event=store_open module=store status=ok duration_ms={} accounts={}",
            started_at.elapsed().as_millis(),
            accounts.len()
        );

        Ok(Self {
            path,
            options,
            accounts: RwLock::new(Arc::new(accounts)),
            writer: Mutex::new(PersistStatus::default()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Returns persistence counters for failure monitoring.
    pub fn persist_status(&self) -> PersistStatus {
        self.lock_writer().clone()
    }

    /// Persists the current snapshot and reports the outcome.
    ///
    /// Unlike mutations, this surfaces the failure to the caller. The failure
    /// is still counted in `persist_status()`.
    pub fn flush(&self) -> StoreResult<()> {
        let mut status = self.lock_writer();
        let accounts = self.snapshot();
        self.save(&mut status, &accounts)
    }

    fn snapshot(&self) -> Arc<Vec<Account>> {
        let guard = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn publish(&self, accounts: Vec<Account>) -> Arc<Vec<Account>> {
        let accounts = Arc::new(accounts);
        let mut guard = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&accounts);
        accounts
    }

    fn lock_writer(&self) -> MutexGuard<'_, PersistStatus> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `apply` to the first account with `account_id` and persists.
    ///
    /// Caller must not hold the writer lock.
    fn update_matching(
        &self,
        event: &str,
        account_id: AccountId,
        apply: impl FnOnce(&mut Account),
    ) {
        let mut status = self.lock_writer();
        let current = self.snapshot();

        let Some(index) = current.iter().position(|account| account.id == account_id) else {
            info!("event={event} module=store status=miss account_id={account_id}");
            if self.options.persist_on_miss {
                self.save_logged(&mut status, &current);
            }
            return;
        };

        let mut next = current.as_ref().clone();
        apply(&mut next[index]);
        let next = self.publish(next);
        info!("event={event} module=store status=ok account_id={account_id}");
        self.save_logged(&mut status, &next);
    }

    /// Saves and swallows the error; it stays visible via `persist_status()`.
    fn save_logged(&self, status: &mut PersistStatus, accounts: &[Account]) {
        let _ = self.save(status, accounts);
    }

    fn save(&self, status: &mut PersistStatus, accounts: &[Account]) -> StoreResult<()> {
        let started_at = Instant::now();
        match write_snapshot(&self.path, accounts, self.options.pretty) {
            Ok(()) => {
                status.saves += 1;
                info!(
                    "event=store_save module=store status=ok duration_ms={} accounts={}",
                    started_at.elapsed().as_millis(),
                    accounts.len()
                );
                Ok(())
            }
            Err(source) => {
                let err = StoreError::Persist {
                    path: self.path.clone(),
                    source,
                };
                status.failures += 1;
                status.last_failure = Some(err.to_string());
                error!(
                    "event=store_save module=store status=error duration_ms={} error_code=store_save_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

impl AccountStorage for JsonAccountStore {
    fn find_by_id(&self, id: AccountId) -> Option<Account> {
        self.snapshot()
            .iter()
            .find(|account| account.id == id)
            .cloned()
    }

    fn find_by_username(&self, username: &str) -> Option<Account> {
        self.snapshot()
            .iter()
            .find(|account| account.username == username)
            .cloned()
    }

    fn find_all(&self) -> Vec<Account> {
        self.snapshot().as_ref().clone()
    }

    fn add(&self, mut candidate: Account) -> Account {
        let mut status = self.lock_writer();
        let mut next = self.snapshot().as_ref().clone();

        let id = compute_free_id(&next);
        candidate.assign_id(id);
        next.push(candidate.clone());

        let next = self.publish(next);
        info!("event=account_add module=store status=ok account_id={id}");
        self.save_logged(&mut status, &next);
        candidate
    }

    fn update_detail(&self, account_id: AccountId, detail: &AccountDetail) {
        self.update_matching("account_update_detail", account_id, |account| {
            account.detail.display_name = detail.display_name.clone();
            account.detail.status = detail.status.clone();
        });
    }

    fn update_password_hash(&self, account_id: AccountId, password_hash: &str) {
        self.update_matching("account_update_password", account_id, |account| {
            account.password_hash = password_hash.to_string();
        });
    }

    fn set_state(&self, account_id: AccountId, state: AccountState) -> bool {
        let _status = self.lock_writer();
        let current = self.snapshot();
        let Some(index) = current.iter().position(|account| account.id == account_id) else {
            return false;
        };

        let mut next = current.as_ref().clone();
        next[index].detail.state = state;
        self.publish(next);
        info!("event=account_state module=store status=ok account_id={account_id} state={state}");
        true
    }
}

/// Returns `1 + max(id)`, or `0` for an empty set.
///
/// Once `AccountId::MAX` is taken, falls back to the lowest unused id.
fn compute_free_id(accounts: &[Account]) -> AccountId {
    let Some(max_id) = accounts.iter().map(|account| account.id).max() else {
        return 0;
    };
    match max_id.checked_add(1) {
        Some(next) => next,
        None => lowest_unused_id(accounts),
    }
}

fn lowest_unused_id(accounts: &[Account]) -> AccountId {
    let mut ids = accounts
        .iter()
        .map(|account| account.id)
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids.dedup();

    let mut candidate: AccountId = 0;
    for id in ids {
        if id != candidate {
            break;
        }
        candidate += 1;
    }
    warn!("event=account_id_wrap module=store status=ok account_id={candidate}");
    candidate
}

fn store_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn load_accounts(path: &Path) -> Result<Vec<Account>, LoadFailure> {
    if !path.is_file() {
        if path.exists() {
            warn!("event=store_load module=store status=skip reason=not_a_file");
        }
        return Ok(Vec::new());
    }

    let raw = fs::read(path)?;
    let mut accounts: Vec<Account> = serde_json::from_slice(&raw)?;
    for account in &mut accounts {
        account.detail.account_id = account.id;
        account.detail.state = AccountState::Offline;
    }
    Ok(accounts)
}

/// Writes `accounts` to a temp file beside `path`, then renames it into place.
fn write_snapshot(path: &Path, accounts: &[Account], pretty: bool) -> Result<(), PersistFailure> {
    let payload = if pretty {
        serde_json::to_vec_pretty(accounts)?
    } else {
        serde_json::to_vec(accounts)?
    };

    let mut temp = NamedTempFile::new_in(store_dir(path))?;
    temp.write_all(&payload)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{compute_free_id, store_dir};
    use crate::model::account::{Account, AccountDetail};
    use std::path::Path;

    fn account_with_id(id: u32) -> Account {
        let mut account = Account::new(format!("user{id}"), "hash", AccountDetail::default());
        account.assign_id(id);
        account
    }

    #[test]
    fn free_id_starts_at_zero() {
        assert_eq!(compute_free_id(&[]), 0);
    }

    #[test]
    fn free_id_follows_max_not_count() {
        let accounts = vec![account_with_id(4), account_with_id(1)];
        assert_eq!(compute_free_id(&accounts), 5);
    }

    #[test]
    fn free_id_reuses_lowest_gap_after_max_id_is_taken() {
        let accounts = vec![
            account_with_id(u32::MAX),
            account_with_id(0),
            account_with_id(2),
        ];
        assert_eq!(compute_free_id(&accounts), 1);
        assert_eq!(compute_free_id(&[account_with_id(u32::MAX - 1)]), u32::MAX);
    }

    #[test]
    fn store_dir_falls_back_to_current_dir_for_bare_file_name() {
        assert_eq!(store_dir(Path::new("accounts.json")), Path::new("."));
        assert_eq!(
            store_dir(Path::new("data/accounts.json")),
            Path::new("data")
        );
    }
}
