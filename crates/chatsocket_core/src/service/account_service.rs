//! Account use-case service.
//!
//! # Responsibility
//! - Provide registration, login and profile-edit entry points for
//!   connection handlers.
//! - Delegate storage to `AccountStorage` implementations.
//!
//! # Invariants
//! - Password hashes are compared as opaque strings; no hashing happens here.
//! - Profile edits only ever touch `display_name`, `status` or the hash.

use crate::model::account::{
    Account, AccountDetail, AccountId, AccountState, AccountValidationError,
};
use crate::repo::account_repo::AccountStorage;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Use-case level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    Validation(AccountValidationError),
    UsernameTaken(String),
    /// Unknown username or hash mismatch; the two are not distinguished.
    InvalidCredentials,
    NotFound(AccountId),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UsernameTaken(username) => write!(f, "username already taken: {username}"),
            Self::InvalidCredentials => write!(f, "invalid username or password"),
            Self::NotFound(id) => write!(f, "account not found: {id}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccountValidationError> for ServiceError {
    fn from(value: AccountValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Profile view shown to the account owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub display_name: String,
    pub status: String,
}

impl From<&Account> for Profile {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            display_name: account.detail.display_name.clone(),
            status: account.detail.status.clone(),
        }
    }
}

/// Use-case service wrapper over an account store.
pub struct AccountService<S: AccountStorage> {
    store: S,
}

impl<S: AccountStorage> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new account with an empty status.
    ///
    /// # Contract
    /// - `password_hash` is stored verbatim.
    /// - Username uniqueness is checked by lookup, not reserved; two
    ///   concurrent registrations of one name may both succeed.
    pub fn register(
        &self,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> ServiceResult<Account> {
        let candidate = Account::new(
            username,
            password_hash,
            AccountDetail::new(display_name, ""),
        );
        candidate.validate()?;

        if self.store.find_by_username(username).is_some() {
            warn!("event=account_register module=service status=rejected reason=username_taken");
            return Err(ServiceError::UsernameTaken(username.to_string()));
        }

        let account = self.store.add(candidate);
        info!(
            "event=account_register module=service status=ok account_id={}",
            account.id
        );
        Ok(account)
    }

    /// Returns the account whose stored hash equals `password_hash`.
    pub fn authenticate(&self, username: &str, password_hash: &str) -> ServiceResult<Account> {
        match self.store.find_by_username(username) {
            Some(account) if account.password_hash == password_hash => Ok(account),
            _ => {
                warn!("event=account_login module=service status=rejected");
                Err(ServiceError::InvalidCredentials)
            }
        }
    }

    pub fn profile(&self, account_id: AccountId) -> ServiceResult<Profile> {
        self.existing(account_id).map(|account| Profile::from(&account))
    }

    pub fn change_display_name(
        &self,
        account_id: AccountId,
        display_name: &str,
    ) -> ServiceResult<()> {
        let account = self.existing(account_id)?;
        let detail = AccountDetail {
            display_name: display_name.to_string(),
            ..account.detail
        };
        self.store.update_detail(account_id, &detail);
        Ok(())
    }

    pub fn change_status(&self, account_id: AccountId, status: &str) -> ServiceResult<()> {
        let account = self.existing(account_id)?;
        let detail = AccountDetail {
            status: status.to_string(),
            ..account.detail
        };
        self.store.update_detail(account_id, &detail);
        Ok(())
    }

    /// Replaces the stored hash; the caller hashes the new password.
    pub fn change_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> ServiceResult<()> {
        if password_hash.is_empty() {
            return Err(AccountValidationError::EmptyPasswordHash.into());
        }
        self.existing(account_id)?;
        self.store.update_password_hash(account_id, password_hash);
        Ok(())
    }

    pub fn mark_online(&self, account_id: AccountId) -> ServiceResult<()> {
        self.set_state(account_id, AccountState::Online)
    }

    pub fn mark_offline(&self, account_id: AccountId) -> ServiceResult<()> {
        self.set_state(account_id, AccountState::Offline)
    }

    /// Accounts currently marked online, in insertion order.
    pub fn online_accounts(&self) -> Vec<Account> {
        self.store
            .find_all()
            .into_iter()
            .filter(|account| account.detail.state.is_online())
            .collect()
    }

    fn set_state(&self, account_id: AccountId, state: AccountState) -> ServiceResult<()> {
        if self.store.set_state(account_id, state) {
            Ok(())
        } else {
            Err(ServiceError::NotFound(account_id))
        }
    }

    fn existing(&self, account_id: AccountId) -> ServiceResult<Account> {
        self.store
            .find_by_id(account_id)
            .ok_or(ServiceError::NotFound(account_id))
    }
}
