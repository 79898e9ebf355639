//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define generic, type-safe data access contracts over `Persistable`
//!   entities.
//! - Isolate SQLite/JSON document details from services.
//!
//! # Invariants
//! - Writes run `Persistable::validate()` before the store mutation.
//! - Listeners are notified only after the store accepted the mutation.

pub mod data_access;
pub mod listener;
pub mod sqlite_data_access;
