//! SQLite document-store implementation of the data access contracts.
//!
//! # Responsibility
//! - Store each entity as one JSON document in `documents`, keyed by
//!   `(collection, id)`.
//! - Assign identifiers, run entity validation and notify listeners around
//!   the store call.
//!
//! # Invariants
//! - New identifiers are random UUID v4 strings.
//! - Entities are normalized, then validated, before the store mutation; a rejection leaves the store
//!   and listeners untouched.
//! - Every rusqlite/serde failure leaves this module as `DataAccessError`.

use crate::config::StoreConfig;
use crate::db::migrations::latest_version;
use crate::db::{open_store, DbError, DbResult};
use crate::model::persistable::{assigned_id, Persistable, ValidationOperation};
use crate::repo::data_access::{
    DataAccess, DataAccessError, DataResult, EntityStream, FieldFilter, MutableDataAccess,
    RepoError, RepoResult, StoreFailure,
};
use crate::repo::listener::{EntityChange, EntityChangeListener, ListenerRegistry};
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Documents fetched per store round-trip by `list_all`.
pub const LIST_BATCH_SIZE: u32 = 64;

/// Repository owning one SQLite connection for its whole lifetime.
pub struct SqliteDataAccess {
    conn: Connection,
    listeners: ListenerRegistry,
}

impl SqliteDataAccess {
    /// Takes ownership of a connection returned by `db::open_db*`.
    ///
    /// Connections whose schema version differs from the latest migration
    /// are rejected.
    pub fn try_new(conn: Connection) -> DbResult<Self> {
        ensure_migrated(&conn)?;
        Ok(Self {
            conn,
            listeners: ListenerRegistry::new(),
        })
    }

    /// Opens and migrates the store described by `config`.
    pub fn open(config: &StoreConfig) -> DbResult<Self> {
        Self::try_new(open_store(config)?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn save_inner<T: Persistable>(&self, entity: &mut T) -> RepoResult<(String, bool)> {
        entity.normalize();
        let existing_id = assigned_id(entity).map(str::to_string);
        let (id, is_new) = match existing_id {
            Some(id) => {
                let exists = self.exists::<T>(&id)?;
                (id, !exists)
            }
            None => {
                let id = Uuid::new_v4().to_string();
                entity.set_id(id.clone());
                (id, true)
            }
        };

        let operation = if is_new {
            ValidationOperation::Add
        } else {
            ValidationOperation::Update
        };
        entity.validate(operation, self)?;

        let document = serde_json::to_value(&*entity)
            .map_err(|err| save_error::<T>(&id, StoreFailure::Encode(err)))?;
        self.conn
            .execute(
                "INSERT INTO documents (collection, id, body)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (collection, id) DO UPDATE SET
                    body = excluded.body,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![T::COLLECTION, id.as_str(), document.to_string()],
            )
            .map_err(|err| save_error::<T>(&id, err.into()))?;

        self.listeners.fire_item_saved(
            &EntityChange {
                collection: T::COLLECTION,
                id: id.as_str(),
                document: &document,
            },
            is_new,
        );
        Ok((id, is_new))
    }

    fn delete_inner<T: Persistable>(&self, id: &str) -> RepoResult<bool> {
        let Some(existing) = self.find_by_id::<T>(id)? else {
            return Ok(false);
        };

        existing.validate(ValidationOperation::Delete, self)?;

        let document = serde_json::to_value(&existing)
            .map_err(|err| delete_error::<T>(id, StoreFailure::Encode(err)))?;
        let changed = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2;",
                params![T::COLLECTION, id],
            )
            .map_err(|err| delete_error::<T>(id, err.into()))?;
        if changed == 0 {
            return Ok(false);
        }

        self.listeners.fire_item_deleted(&EntityChange {
            collection: T::COLLECTION,
            id,
            document: &document,
        });
        Ok(true)
    }

    fn query_documents<T: Persistable>(
        &self,
        filters: &[FieldFilter<'_>],
        limit: Option<u32>,
    ) -> Result<Vec<T>, StoreFailure> {
        let (sql, bind_values) = filter_query(T::COLLECTION, filters, limit)?;
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(decode_document(row.get("id")?, &row.get::<_, String>("body")?)?);
        }
        Ok(entities)
    }
}

impl DataAccess for SqliteDataAccess {
    fn list_all<T: Persistable>(&self) -> DataResult<EntityStream<'_, T>> {
        let mut documents = Documents::<T>::new(&self.conn, LIST_BATCH_SIZE);
        documents.fill().map_err(|err| {
            log_access_error("entity_list", T::COLLECTION, None, &err);
            err
        })?;
        Ok(Box::new(documents))
    }

    fn list_page<T: Persistable>(&self, offset: u32, limit: u32) -> DataResult<Vec<T>> {
        let fetch = || -> Result<Vec<T>, StoreFailure> {
            let mut stmt = self.conn.prepare(
                "SELECT id, body
                 FROM documents
                 WHERE collection = ?1
                 ORDER BY seq ASC
                 LIMIT ?2 OFFSET ?3;",
            )?;
            let mut rows = stmt.query(params![
                T::COLLECTION,
                i64::from(limit),
                i64::from(offset)
            ])?;
            let mut entities = Vec::new();
            while let Some(row) = rows.next()? {
                entities.push(decode_document(row.get("id")?, &row.get::<_, String>("body")?)?);
            }
            Ok(entities)
        };

        fetch().map_err(|failure| {
            let err = DataAccessError::new(
                format!(
                    "could not list {} documents at offset {offset}",
                    T::COLLECTION
                ),
                failure,
            );
            log_access_error("entity_list", T::COLLECTION, None, &err);
            err
        })
    }

    fn count<T: Persistable>(&self) -> DataResult<u64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1;",
                [T::COLLECTION],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count.max(0) as u64)
            .map_err(|err| {
                let err = DataAccessError::new(
                    format!("could not count {} documents", T::COLLECTION),
                    err.into(),
                );
                log_access_error("entity_count", T::COLLECTION, None, &err);
                err
            })
    }

    fn find_by_id<T: Persistable>(&self, id: &str) -> DataResult<Option<T>> {
        let lookup = || -> Result<Option<T>, StoreFailure> {
            let body = self
                .conn
                .query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2;",
                    params![T::COLLECTION, id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            body.map(|body| decode_document(id.to_string(), &body))
                .transpose()
        };

        lookup().map_err(|failure| {
            let err = DataAccessError::new(
                format!("could not look up {} document with id {id}", T::COLLECTION),
                failure,
            );
            log_access_error("entity_find", T::COLLECTION, Some(id), &err);
            err
        })
    }

    fn exists<T: Persistable>(&self, id: &str) -> DataResult<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1 AND id = ?2;",
                params![T::COLLECTION, id],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count != 0)
            .map_err(|err| {
                let err = DataAccessError::new(
                    format!(
                        "could not determine existence of {} document with id {id}",
                        T::COLLECTION
                    ),
                    err.into(),
                );
                log_access_error("entity_exists", T::COLLECTION, Some(id), &err);
                err
            })
    }

    fn find_by_fields<T: Persistable>(&self, filters: &[FieldFilter<'_>]) -> DataResult<Vec<T>> {
        self.query_documents(filters, None)
            .map_err(|failure| filter_error::<T>(filters, failure))
    }

    fn find_one_by_fields<T: Persistable>(
        &self,
        filters: &[FieldFilter<'_>],
    ) -> DataResult<Option<T>> {
        self.query_documents(filters, Some(1))
            .map(|entities| entities.into_iter().next())
            .map_err(|failure| filter_error::<T>(filters, failure))
    }
}

impl MutableDataAccess for SqliteDataAccess {
    fn save<T: Persistable>(&self, entity: &mut T) -> RepoResult<String> {
        let started_at = Instant::now();
        match self.save_inner(entity) {
            Ok((id, is_new)) => {
                info!(
                    "event=entity_save module=repo status=ok collection={} id={} is_new={} duration_ms={}",
                    T::COLLECTION,
                    id,
                    is_new,
                    started_at.elapsed().as_millis()
                );
                Ok(id)
            }
            Err(err) => {
                log_repo_error("entity_save", T::COLLECTION, assigned_id(entity), &err);
                Err(err)
            }
        }
    }

    fn delete<T: Persistable>(&self, id: &str) -> RepoResult<bool> {
        let started_at = Instant::now();
        match self.delete_inner::<T>(id) {
            Ok(true) => {
                info!(
                    "event=entity_delete module=repo status=ok collection={} id={} duration_ms={}",
                    T::COLLECTION,
                    id,
                    started_at.elapsed().as_millis()
                );
                Ok(true)
            }
            Ok(false) => {
                debug!(
                    "event=entity_delete module=repo status=noop collection={} id={}",
                    T::COLLECTION,
                    id
                );
                Ok(false)
            }
            Err(err) => {
                log_repo_error("entity_delete", T::COLLECTION, Some(id), &err);
                Err(err)
            }
        }
    }

    fn add_listener(&self, listener: Arc<dyn EntityChangeListener>) {
        self.listeners.add(listener);
        debug!(
            "event=listener_add module=repo status=ok listeners={}",
            self.listeners.len()
        );
    }
}

/// Keyset-paged cursor over one collection, fetched lazily.
struct Documents<'conn, T> {
    conn: &'conn Connection,
    batch_size: u32,
    last_seq: i64,
    buffer: VecDeque<T>,
    finished: bool,
}

impl<'conn, T: Persistable> Documents<'conn, T> {
    fn new(conn: &'conn Connection, batch_size: u32) -> Self {
        Self {
            conn,
            batch_size: batch_size.max(1),
            last_seq: 0,
            buffer: VecDeque::new(),
            finished: false,
        }
    }

    fn fill(&mut self) -> DataResult<()> {
        let batch = self.fetch_batch().map_err(|failure| {
            DataAccessError::new(format!("could not list {} documents", T::COLLECTION), failure)
        })?;
        if batch.len() < self.batch_size as usize {
            self.finished = true;
        }
        if let Some((seq, _)) = batch.last() {
            self.last_seq = *seq;
        }
        self.buffer.extend(batch.into_iter().map(|(_, entity)| entity));
        Ok(())
    }

    fn fetch_batch(&self) -> Result<Vec<(i64, T)>, StoreFailure> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, id, body
             FROM documents
             WHERE collection = ?1 AND seq > ?2
             ORDER BY seq ASC
             LIMIT ?3;",
        )?;
        let mut rows = stmt.query(params![
            T::COLLECTION,
            self.last_seq,
            i64::from(self.batch_size)
        ])?;
        let mut batch = Vec::new();
        while let Some(row) = rows.next()? {
            let seq: i64 = row.get("seq")?;
            let entity = decode_document(row.get("id")?, &row.get::<_, String>("body")?)?;
            batch.push((seq, entity));
        }
        Ok(batch)
    }
}

impl<T: Persistable> Iterator for Documents<'_, T> {
    type Item = DataResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.finished {
            if let Err(err) = self.fill() {
                self.finished = true;
                log_access_error("entity_list", T::COLLECTION, None, &err);
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

fn ensure_migrated(conn: &Connection) -> DbResult<()> {
    let actual_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(DbError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn decode_document<T: Persistable>(id: String, body: &str) -> Result<T, StoreFailure> {
    let mut entity: T = serde_json::from_str(body).map_err(StoreFailure::Decode)?;
    if entity.id() != Some(id.as_str()) {
        entity.set_id(id);
    }
    Ok(entity)
}

/// Builds the filtered document query and its bind values.
///
/// Paths are inlined so lookups match the expression indexes.
fn filter_query(
    collection: &str,
    filters: &[FieldFilter<'_>],
    limit: Option<u32>,
) -> Result<(String, Vec<Value>), StoreFailure> {
    let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
    let mut bind_values: Vec<Value> = vec![Value::Text(collection.to_string())];

    for filter in filters {
        let path = json_path(filter.field)?;
        match sql_value(&filter.value)? {
            Some(value) => {
                sql.push_str(&format!(" AND json_extract(body, '{path}') = ?"));
                bind_values.push(value);
            }
            None => sql.push_str(&format!(" AND json_extract(body, '{path}') IS NULL")),
        }
    }

    sql.push_str(" ORDER BY seq ASC");
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
    }
    Ok((sql, bind_values))
}

fn json_path(field: &str) -> Result<String, StoreFailure> {
    let valid = !field.is_empty()
        && !field.starts_with('.')
        && !field.ends_with('.')
        && !field.contains("..")
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err(StoreFailure::InvalidFilter(format!(
            "field name `{field}` must match [A-Za-z0-9_.]"
        )));
    }
    Ok(format!("$.{field}"))
}

/// Maps a JSON filter value onto what `json_extract` yields for it.
///
/// `None` means the filter matches SQL NULL.
fn sql_value(value: &JsonValue) -> Result<Option<Value>, StoreFailure> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Bool(flag) => Ok(Some(Value::Integer(i64::from(*flag)))),
        JsonValue::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(Some(Value::Integer(integer)))
            } else if let Some(real) = number.as_f64() {
                Ok(Some(Value::Real(real)))
            } else {
                Err(StoreFailure::InvalidFilter(format!(
                    "number `{number}` is out of range"
                )))
            }
        }
        JsonValue::String(text) => Ok(Some(Value::Text(text.clone()))),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(StoreFailure::InvalidFilter(
            "only scalar values can be matched".to_string(),
        )),
    }
}

fn save_error<T: Persistable>(id: &str, failure: StoreFailure) -> DataAccessError {
    DataAccessError::new(
        format!("failed to save {} document {id}", T::COLLECTION),
        failure,
    )
}

fn delete_error<T: Persistable>(id: &str, failure: StoreFailure) -> DataAccessError {
    DataAccessError::new(
        format!("failed to delete {} document with id {id}", T::COLLECTION),
        failure,
    )
}

fn filter_error<T: Persistable>(
    filters: &[FieldFilter<'_>],
    failure: StoreFailure,
) -> DataAccessError {
    let fields = filters
        .iter()
        .map(|filter| filter.field)
        .collect::<Vec<_>>()
        .join(",");
    let err = DataAccessError::new(
        format!("could not query {} documents by [{fields}]", T::COLLECTION),
        failure,
    );
    log_access_error("entity_query", T::COLLECTION, None, &err);
    err
}

fn log_access_error(event: &str, collection: &str, id: Option<&str>, err: &DataAccessError) {
    error!(
        "event={} module=repo status=error collection={} id={} error_code=store_failure error={}",
        event,
        collection,
        id.unwrap_or("-"),
        err
    );
}

fn log_repo_error(event: &str, collection: &str, id: Option<&str>, err: &RepoError) {
    match err {
        RepoError::Validation(reason) => warn!(
            "event={} module=repo status=rejected collection={} id={} reason={}",
            event,
            collection,
            id.unwrap_or("-"),
            reason
        ),
        other => error!(
            "event={} module=repo status=error collection={} id={} error={}",
            event,
            collection,
            id.unwrap_or("-"),
            other
        ),
    }
}
