//! Record shape returned by every store read and write.
//!
//! # Invariants
//! - A record is a snapshot; it does not track later engine changes.
//! - `row_id` is the engine identity used for deletion.

pub mod record;
