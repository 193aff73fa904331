//! Account domain model.
//!
//! # Responsibility
//! - Define the persisted account record and its embedded profile detail.
//! - Fix the JSON wire names used by the account file.
//!
//! # Invariants
//! - `detail.account_id` mirrors the owning `Account::id`.
//! - `state` is runtime presence only; loading always resets it to `Offline`.
//! - `password_hash` is opaque: core never computes or inspects it.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Numeric account identifier, allocated by the store.
pub type AccountId = u32;

/// Presence of an account's owner on the chat service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountState {
    Online,
    #[default]
    Offline,
}

impl AccountState {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl Display for AccountState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => f.write_str("ONLINE"),
            Self::Offline => f.write_str("OFFLINE"),
        }
    }
}

/// Mutable profile and presence information owned by one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetail {
    /// Denormalized copy of the owning account id.
    #[serde(default)]
    pub account_id: AccountId,
    pub display_name: String,
    /// Free-text status message.
    pub status: String,
    /// Not meaningful on disk; overwritten with `Offline` on load.
    #[serde(default)]
    pub state: AccountState,
}

impl AccountDetail {
    /// Creates an offline detail not yet bound to any account.
    pub fn new(display_name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            account_id: 0,
            display_name: display_name.into(),
            status: status.into(),
            state: AccountState::Offline,
        }
    }
}

/// Persisted identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    /// Unique by usage; the store itself does not enforce it.
    pub username: String,
    pub password_hash: String,
    pub detail: AccountDetail,
}

impl Account {
    /// Creates an unassigned candidate for `AccountStorage::add`.
    ///
    /// The id is a placeholder; `add` overwrites it with a free id.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        detail: AccountDetail,
    ) -> Self {
        Self {
            id: 0,
            username: username.into(),
            password_hash: password_hash.into(),
            detail,
        }
    }

    /// Binds this account (and its detail) to `id`.
    pub(crate) fn assign_id(&mut self, id: AccountId) {
        self.id = id;
        self.detail.account_id = id;
    }

    /// Validates registration-level invariants.
    ///
    /// The store does not call this; registration paths do.
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if self.username.trim().is_empty() {
            return Err(AccountValidationError::EmptyUsername);
        }
        if self.password_hash.is_empty() {
            return Err(AccountValidationError::EmptyPasswordHash);
        }
        Ok(())
    }
}

/// Validation failures for account candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyUsername,
    EmptyPasswordHash,
}

impl Display for AccountValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "username cannot be empty"),
            Self::EmptyPasswordHash => write!(f, "password hash cannot be empty"),
        }
    }
}

impl Error for AccountValidationError {}
