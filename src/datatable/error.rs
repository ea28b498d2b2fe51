use std::collections::HashMap;

use thiserror::Error;

use super::types::Action;

/// Rejection raised by an access check.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct AccessDenied(pub String);

impl AccessDenied {
    pub fn new(message: impl Into<String>) -> Self {
        AccessDenied(message.into())
    }
}

/// Everything that stops a data-table request before a normal response.
///
/// Handler-reported failures (`success: false`) are not errors; they travel
/// inside `DataTableResponse`.
#[derive(Debug, Error)]
pub enum DataTableError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    #[error("{0}")]
    Forbidden(#[from] AccessDenied),

    #[error("{family} has no {action} handler configured")]
    NotConfigured { family: &'static str, action: Action },

    #[error("{action} handler failed: {source}")]
    Handler {
        action: Action,
        #[source]
        source: anyhow::Error,
    },
}

impl DataTableError {
    pub fn validation(message: impl Into<String>) -> Self {
        DataTableError::Validation {
            message: message.into(),
            field_errors: HashMap::new(),
        }
    }

    pub fn field(field: impl Into<String>, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), problem.into());
        DataTableError::Validation {
            message: "Invalid request".to_string(),
            field_errors,
        }
    }

    pub fn fields(field_errors: HashMap<String, String>) -> Self {
        DataTableError::Validation {
            message: "Invalid request".to_string(),
            field_errors,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DataTableError::Validation { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, DataTableError::Forbidden(_))
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, DataTableError::NotConfigured { .. })
    }
}
