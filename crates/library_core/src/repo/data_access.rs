//! Generic data access contracts and error types.
//!
//! # Responsibility
//! - Define typed read (`DataAccess`) and write (`MutableDataAccess`)
//!   contracts over any `Persistable` entity.
//! - Separate store failures (`DataAccessError`) from domain rule
//!   violations (`ValidationError`).
//!
//! # Invariants
//! - Store failures are always wrapped in `DataAccessError`, never retried.
//! - Validation failures reach callers unwrapped as `RepoError::Validation`.
//! - `exists`-then-`save` is not atomic.

use crate::model::persistable::{Persistable, ValidationError};
use crate::repo::listener::EntityChangeListener;
use serde_json::Value as JsonValue;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type DataResult<T> = Result<T, DataAccessError>;
pub type RepoResult<T> = Result<T, RepoError>;

/// Lazy sequence of decoded entities; each item may carry a store failure.
pub type EntityStream<'a, T> = Box<dyn Iterator<Item = DataResult<T>> + 'a>;

/// Underlying cause of a `DataAccessError`.
#[derive(Debug)]
pub enum StoreFailure {
    Sqlite(rusqlite::Error),
    /// Entity could not be turned into a JSON document.
    Encode(serde_json::Error),
    /// Stored document could not be turned back into the entity type.
    Decode(serde_json::Error),
    /// Field filter cannot be expressed against the store.
    InvalidFilter(String),
}

impl Display for StoreFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "document encoding failed: {err}"),
            Self::Decode(err) => write!(f, "document decoding failed: {err}"),
            Self::InvalidFilter(message) => write!(f, "invalid field filter: {message}"),
        }
    }
}

impl From<rusqlite::Error> for StoreFailure {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Unexpected store failure, tagged with the operation that hit it.
#[derive(Debug)]
pub struct DataAccessError {
    message: String,
    failure: StoreFailure,
}

impl DataAccessError {
    pub fn new(message: impl Into<String>, failure: StoreFailure) -> Self {
        Self {
            message: message.into(),
            failure,
        }
    }

    /// Operation and entity description, without the underlying cause.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn failure(&self) -> &StoreFailure {
        &self.failure
    }
}

impl Display for DataAccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.message, self.failure)
    }
}

impl Error for DataAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.failure {
            StoreFailure::Sqlite(err) => Some(err),
            StoreFailure::Encode(err) | StoreFailure::Decode(err) => Some(err),
            StoreFailure::InvalidFilter(_) => None,
        }
    }
}

/// Error returned by mutating repository and service calls.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Access(DataAccessError),
    NotFound {
        collection: &'static str,
        id: String,
    },
}

impl RepoError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => {
                write!(f, "{collection} document not found: {id}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DataAccessError> for RepoError {
    fn from(value: DataAccessError) -> Self {
        Self::Access(value)
    }
}

/// Equality match on one top-level or dotted JSON field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter<'a> {
    pub field: &'a str,
    /// `JsonValue::Null` matches missing or null fields.
    pub value: JsonValue,
}

impl<'a> FieldFilter<'a> {
    pub fn eq(field: &'a str, value: impl Into<JsonValue>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn is_null(field: &'a str) -> Self {
        Self {
            field,
            value: JsonValue::Null,
        }
    }
}

/// Read contract over persisted entities.
pub trait DataAccess {
    /// Lazily iterates every entity of `T` in insertion order.
    fn list_all<T: Persistable>(&self) -> DataResult<EntityStream<'_, T>>;

    /// Returns one page of `T` in insertion order.
    fn list_page<T: Persistable>(&self, offset: u32, limit: u32) -> DataResult<Vec<T>>;

    /// Counts stored entities of `T`.
    fn count<T: Persistable>(&self) -> DataResult<u64>;

    fn find_by_id<T: Persistable>(&self, id: &str) -> DataResult<Option<T>>;

    fn exists<T: Persistable>(&self, id: &str) -> DataResult<bool>;

    /// Returns entities whose fields equal every filter.
    fn find_by_fields<T: Persistable>(&self, filters: &[FieldFilter<'_>]) -> DataResult<Vec<T>>;

    /// Returns the first entity, in insertion order, matching every filter.
    fn find_one_by_fields<T: Persistable>(
        &self,
        filters: &[FieldFilter<'_>],
    ) -> DataResult<Option<T>>;
}

/// Write contract: validated saves and deletes with change notification.
pub trait MutableDataAccess: DataAccess {
    /// Inserts or updates `entity`, assigning an identifier when absent.
    ///
    /// Returns the entity identifier.
    fn save<T: Persistable>(&self, entity: &mut T) -> RepoResult<String>;

    /// Deletes the entity with `id`. Absent ids are a no-op returning
    /// `false`.
    fn delete<T: Persistable>(&self, id: &str) -> RepoResult<bool>;

    /// Registers a listener for subsequent saves and deletes.
    fn add_listener(&self, listener: Arc<dyn EntityChangeListener>);
}

impl<D: DataAccess> DataAccess for &D {
    fn list_all<T: Persistable>(&self) -> DataResult<EntityStream<'_, T>> {
        (**self).list_all()
    }

    fn list_page<T: Persistable>(&self, offset: u32, limit: u32) -> DataResult<Vec<T>> {
        (**self).list_page(offset, limit)
    }

    fn count<T: Persistable>(&self) -> DataResult<u64> {
        (**self).count::<T>()
    }

    fn find_by_id<T: Persistable>(&self, id: &str) -> DataResult<Option<T>> {
        (**self).find_by_id(id)
    }

    fn exists<T: Persistable>(&self, id: &str) -> DataResult<bool> {
        (**self).exists::<T>(id)
    }

    fn find_by_fields<T: Persistable>(&self, filters: &[FieldFilter<'_>]) -> DataResult<Vec<T>> {
        (**self).find_by_fields(filters)
    }

    fn find_one_by_fields<T: Persistable>(
        &self,
        filters: &[FieldFilter<'_>],
    ) -> DataResult<Option<T>> {
        (**self).find_one_by_fields(filters)
    }
}

impl<D: MutableDataAccess> MutableDataAccess for &D {
    fn save<T: Persistable>(&self, entity: &mut T) -> RepoResult<String> {
        (**self).save(entity)
    }

    fn delete<T: Persistable>(&self, id: &str) -> RepoResult<bool> {
        (**self).delete::<T>(id)
    }

    fn add_listener(&self, listener: Arc<dyn EntityChangeListener>) {
        (**self).add_listener(listener)
    }
}
