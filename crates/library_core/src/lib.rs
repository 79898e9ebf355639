//! Data access core for the online library.
//! Generic, validated CRUD over JSON documents plus catalog services.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{StoreConfig, StoreLocation};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::book::Book;
pub use model::loan::Loan;
pub use model::persistable::{Persistable, ValidationError, ValidationOperation};
pub use model::user::{find_user_by_name, User, UserRole};
pub use repo::data_access::{
    DataAccess, DataAccessError, DataResult, EntityStream, FieldFilter, MutableDataAccess,
    RepoError, RepoResult, StoreFailure,
};
pub use repo::listener::{EntityChange, EntityChangeListener};
pub use repo::sqlite_data_access::SqliteDataAccess;
pub use service::book_service::{BookService, BOOKS_PAGE_SIZE};
pub use service::view_model::{BookEditModel, Pager};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
