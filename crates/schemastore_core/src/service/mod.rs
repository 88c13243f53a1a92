//! Store facade exposed to callers.
//!
//! # Responsibility
//! - Orchestrate registry checks, repository calls and error reporting.
//! - Keep callers decoupled from SQL details.

pub mod store;
