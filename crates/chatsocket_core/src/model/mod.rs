//! Account domain model shared by storage and session handlers.
//!
//! # Responsibility
//! - Define the canonical account record persisted by the store.
//! - Keep presence (`AccountState`) next to the profile fields it decorates.
//!
//! # Invariants
//! - Every account is identified by a stable `AccountId`.
//! - Accounts are never deleted; ids are never reused.

pub mod account;
