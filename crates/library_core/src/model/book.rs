//! Book catalog entity.
//!
//! # Invariants
//! - `title`, `author` and `isbn` are non-empty.
//! - `available_copies <= total_copies`.
//! - `isbn` is unique across the `books` collection.
//! - A book referenced by any loan cannot be deleted.
//! - Text fields are stored trimmed.

use crate::model::loan::Loan;
use crate::model::persistable::{
    assigned_id, require, Persistable, ValidationError, ValidationOperation,
};
use crate::repo::data_access::{DataAccess, FieldFilter, RepoResult};
use serde::{Deserialize, Serialize};

pub const BOOKS_COLLECTION: &str = "books";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub author: String,
    pub isbn: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub published_year: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    pub total_copies: u32,
    pub available_copies: u32,
}

impl Book {
    /// Creates an unsaved book with a single available copy.
    pub fn new(title: impl Into<String>, author: impl Into<String>, isbn: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            publisher: None,
            published_year: None,
            description: None,
            total_copies: 1,
            available_copies: 1,
        }
    }

    /// Local field rules that need no store lookup.
    pub fn check_fields(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("author", &self.author)?;
        require("isbn", &self.isbn)?;
        if self.available_copies > self.total_copies {
            return Err(ValidationError::Invalid {
                field: "available_copies",
                reason: format!(
                    "{} available exceeds {} total",
                    self.available_copies, self.total_copies
                ),
            });
        }
        Ok(())
    }
}

impl Persistable for Book {
    const COLLECTION: &'static str = BOOKS_COLLECTION;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn normalize(&mut self) {
        trim_in_place(&mut self.title);
        trim_in_place(&mut self.author);
        trim_in_place(&mut self.isbn);
    }

    fn validate<D: DataAccess>(&self, operation: ValidationOperation, data: &D) -> RepoResult<()> {
        match operation {
            ValidationOperation::Add | ValidationOperation::Update => {
                self.check_fields()?;
                let same_isbn =
                    data.find_by_fields::<Book>(&[FieldFilter::eq("isbn", self.isbn.as_str())])?;
                if same_isbn
                    .iter()
                    .any(|other| assigned_id(other) != assigned_id(self))
                {
                    return Err(ValidationError::Duplicate {
                        field: "isbn",
                        value: self.isbn.clone(),
                    }
                    .into());
                }
                Ok(())
            }
            ValidationOperation::Delete => {
                let Some(id) = assigned_id(self) else {
                    return Ok(());
                };
                let loan =
                    data.find_one_by_fields::<Loan>(&[FieldFilter::eq("book_id", id)])?;
                if loan.is_some() {
                    return Err(ValidationError::InUse {
                        id: id.to_string(),
                        referenced_by: "a loan",
                    }
                    .into());
                }
                Ok(())
            }
        }
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}
