//! Persistable capability shared by every stored entity.
//!
//! # Responsibility
//! - Describe how an entity exposes its identifier and collection.
//! - Define the lifecycle stages passed to entity self-validation.
//!
//! # Invariants
//! - An identifier, once assigned, is never replaced by the repository.
//! - `validate` runs before the matching mutation and may abort it.

use crate::repo::data_access::{DataAccess, RepoResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lifecycle stage handed to `Persistable::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationOperation {
    Add,
    Update,
    Delete,
}

impl ValidationOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for ValidationOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain rule violation raised by entity validation.
///
/// The repository passes these through untouched, so callers can tell them
/// apart from store failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty.
    Required { field: &'static str },
    /// A field value breaks a local rule.
    Invalid { field: &'static str, reason: String },
    /// Another entity already uses this unique value.
    Duplicate { field: &'static str, value: String },
    /// A referenced entity does not exist.
    UnknownReference { collection: &'static str, id: String },
    /// The entity is still referenced and cannot be removed.
    InUse {
        id: String,
        referenced_by: &'static str,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required { field } => write!(f, "field `{field}` is required"),
            Self::Invalid { field, reason } => write!(f, "field `{field}` is invalid: {reason}"),
            Self::Duplicate { field, value } => {
                write!(f, "field `{field}` must be unique; `{value}` is already used")
            }
            Self::UnknownReference { collection, id } => {
                write!(f, "referenced {collection} document `{id}` does not exist")
            }
            Self::InUse { id, referenced_by } => {
                write!(f, "`{id}` is still referenced by {referenced_by}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Capability implemented by every entity stored through the repository.
///
/// `COLLECTION` is the runtime type descriptor: documents of one entity type
/// share a collection and identifiers are unique within it.
pub trait Persistable: Serialize + DeserializeOwned + 'static {
    const COLLECTION: &'static str;

    /// Current identifier, `None` until first save.
    fn id(&self) -> Option<&str>;

    /// Assigns the identifier. Called by the repository only when `id()` is
    /// absent or after decoding a stored document.
    fn set_id(&mut self, id: String);

    /// Canonicalizes field values before validation and storage.
    fn normalize(&mut self) {}

    /// Self-check before the repository applies `operation`.
    ///
    /// `data` allows cross-entity lookups. Store failures during those
    /// lookups surface as `RepoError::Access`.
    fn validate<D: DataAccess>(&self, operation: ValidationOperation, data: &D) -> RepoResult<()> {
        let _ = (operation, data);
        Ok(())
    }

    /// Identity comparison: both carry the same assigned identifier.
    fn same_entity(&self, other: &Self) -> bool {
        matches!((self.id(), other.id()), (Some(a), Some(b)) if a == b)
    }
}

/// Returns the identifier when it is present and non-empty.
pub fn assigned_id<T: Persistable>(entity: &T) -> Option<&str> {
    entity.id().filter(|id| !id.is_empty())
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(())
}
