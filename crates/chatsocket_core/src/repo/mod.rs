//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the account data-access contract used by session handlers.
//! - Keep file format and locking details inside the persistence boundary.
//!
//! # Invariants
//! - Only copies of stored accounts ever leave the repository.
//! - The store file is always a complete snapshot, never a delta log.

pub mod account_repo;
