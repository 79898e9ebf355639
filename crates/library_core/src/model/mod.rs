//! Library domain model.
//!
//! # Responsibility
//! - Define the `Persistable` capability every stored entity implements.
//! - Define catalog entities and their per-stage validation rules.
//!
//! # Invariants
//! - Every entity lives in exactly one collection named by `COLLECTION`.
//! - Entity identifiers are strings assigned once and never changed.

pub mod book;
pub mod loan;
pub mod persistable;
pub mod user;
