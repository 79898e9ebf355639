//! Loan of one book to one user.
//!
//! # Invariants
//! - Referenced book and user exist when the loan is added.
//! - `due_at >= borrowed_at`; `returned_at`, when set, is not before
//!   `borrowed_at`.

use crate::model::book::Book;
use crate::model::persistable::{require, Persistable, ValidationError, ValidationOperation};
use crate::model::user::User;
use crate::repo::data_access::{DataAccess, RepoResult};
use serde::{Deserialize, Serialize};

pub const LOANS_COLLECTION: &str = "loans";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub book_id: String,
    pub user_id: String,
    /// Unix epoch milliseconds.
    pub borrowed_at: i64,
    /// Unix epoch milliseconds.
    pub due_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<i64>,
}

impl Loan {
    pub fn new(
        book_id: impl Into<String>,
        user_id: impl Into<String>,
        borrowed_at: i64,
        due_at: i64,
    ) -> Self {
        Self {
            id: None,
            book_id: book_id.into(),
            user_id: user_id.into(),
            borrowed_at,
            due_at,
            returned_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn check_fields(&self) -> Result<(), ValidationError> {
        require("book_id", &self.book_id)?;
        require("user_id", &self.user_id)?;
        if self.due_at < self.borrowed_at {
            return Err(ValidationError::Invalid {
                field: "due_at",
                reason: "due before borrowed".to_string(),
            });
        }
        if let Some(returned_at) = self.returned_at {
            if returned_at < self.borrowed_at {
                return Err(ValidationError::Invalid {
                    field: "returned_at",
                    reason: "returned before borrowed".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Persistable for Loan {
    const COLLECTION: &'static str = LOANS_COLLECTION;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn validate<D: DataAccess>(&self, operation: ValidationOperation, data: &D) -> RepoResult<()> {
        match operation {
            ValidationOperation::Add => {
                self.check_fields()?;
                if !data.exists::<Book>(&self.book_id)? {
                    return Err(ValidationError::UnknownReference {
                        collection: Book::COLLECTION,
                        id: self.book_id.clone(),
                    }
                    .into());
                }
                if !data.exists::<User>(&self.user_id)? {
                    return Err(ValidationError::UnknownReference {
                        collection: User::COLLECTION,
                        id: self.user_id.clone(),
                    }
                    .into());
                }
                Ok(())
            }
            ValidationOperation::Update => Ok(self.check_fields()?),
            ValidationOperation::Delete => Ok(()),
        }
    }
}
