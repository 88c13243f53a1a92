//! Repository layer over per-schema tables.
//!
//! # Responsibility
//! - Isolate SQLite statement building from the store facade.
//!
//! # Invariants
//! - Writes check property names and value kinds before SQL runs.
//! - Repository APIs return semantic errors (`RecordNotFound`,
//!   `InvalidValue`) in addition to engine transport errors.

pub mod record_repo;
