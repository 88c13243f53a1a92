//! Schema declarations and the per-store registry.
//!
//! # Responsibility
//! - Hold the set of record types declared at setup.
//! - Reject type names that were never declared before the engine is touched.

pub mod definition;
pub mod registry;

pub use definition::{is_identifier, PropertyKind, PropertySpec, SchemaDefinition};
pub use registry::SchemaRegistry;
