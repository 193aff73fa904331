//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into session/profile level APIs.
//! - Keep network handlers decoupled from storage details.

pub mod account_service;
