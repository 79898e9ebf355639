//! Library member entity.

use crate::model::loan::Loan;
use crate::model::persistable::{
    assigned_id, require, Persistable, ValidationError, ValidationOperation,
};
use crate::repo::data_access::{DataAccess, FieldFilter, RepoResult};
use serde::{Deserialize, Serialize};

pub const USERS_COLLECTION: &str = "users";

/// Access level of a library member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Reader,
    Librarian,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Login name, unique across users.
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            role: UserRole::Reader,
        }
    }

    pub fn check_fields(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("email", &self.email)?;
        if !self.email.contains('@') {
            return Err(ValidationError::Invalid {
                field: "email",
                reason: "missing `@`".to_string(),
            });
        }
        Ok(())
    }
}

impl Persistable for User {
    const COLLECTION: &'static str = USERS_COLLECTION;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn validate<D: DataAccess>(&self, operation: ValidationOperation, data: &D) -> RepoResult<()> {
        match operation {
            ValidationOperation::Add | ValidationOperation::Update => {
                self.check_fields()?;
                if let Some(other) = find_user_by_name(data, &self.name)? {
                    if assigned_id(&other) != assigned_id(self) {
                        return Err(ValidationError::Duplicate {
                            field: "name",
                            value: self.name.clone(),
                        }
                        .into());
                    }
                }
                Ok(())
            }
            ValidationOperation::Delete => {
                let Some(id) = assigned_id(self) else {
                    return Ok(());
                };
                let loan =
                    data.find_one_by_fields::<Loan>(&[FieldFilter::eq("user_id", id)])?;
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

/// Looks up a user by login name.
pub fn find_user_by_name<D: DataAccess>(data: &D, name: &str) -> RepoResult<Option<User>> {
    Ok(data.find_one_by_fields::<User>(&[FieldFilter::eq("name", name)])?)
}
