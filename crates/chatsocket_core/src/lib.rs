//! Account storage core for the chat socket server.
//! This crate owns account identity, credential hashes and profile detail.

pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::account::{
    Account, AccountDetail, AccountId, AccountState, AccountValidationError,
};
pub use repo::account_repo::{
    AccountStorage, JsonAccountStore, LoadFailure, PersistFailure, PersistStatus, StoreError,
    StoreOptions, StoreResult,
};
pub use service::account_service::{AccountService, Profile, ServiceError, ServiceResult};

/// Minimal health-check API for server wiring probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
