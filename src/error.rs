use std::fmt;

use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Student,
    Subject,
    Grade,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Student => "student",
            EntityKind::Subject => "subject",
            EntityKind::Grade => "grade",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt collection {key}: {message}")]
    Corrupt { key: String, message: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("dangling reference: {entity} {id} does not exist")]
    DanglingReference { entity: EntityKind, id: i64 },
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::validation(
            field,
            format!("{} is outside the allowed range {}..={}", value, min, max),
        )
    }

    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation { .. } => "validation_failed",
            LedgerError::DanglingReference { .. } => "dangling_reference",
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::Storage(_) => "storage_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            LedgerError::Validation { field, .. } => Some(json!({ "field": field })),
            LedgerError::DanglingReference { entity, id } | LedgerError::NotFound { entity, id } => {
                Some(json!({ "entity": entity.as_str(), "id": id }))
            }
            LedgerError::Storage(_) => None,
        }
    }
}
