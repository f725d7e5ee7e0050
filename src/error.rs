//! Error taxonomy shared by the router, dispatcher, repositories and configuration.
//!
//! Every error keeps its internal detail (for `tracing`) apart from the text shown to
//! a visitor. Call [`RepositoryError::user_message`] when building a flash message or a
//! JSON error body; never format the error itself into a response.

use http::Method;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Per-field validation messages, in the order the fields were checked.
///
/// A field may carry several messages; the first one is what forms display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// First message recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.errors.iter().map(|e| e.field.as_str()).collect();
        write!(f, "validation failed for: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("unsupported method {0}: only GET and POST routes can be registered")]
    UnsupportedMethod(Method),

    #[error("pattern {pattern} declares placeholder {{{name}}} more than once")]
    DuplicateParam { pattern: String, name: String },

    #[error("pattern {pattern} contains an empty placeholder")]
    EmptyParam { pattern: String },

    #[error("pattern {pattern} does not compile: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while resolving a matched route to a callable handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("route {method} {pattern} references unknown handler {handler}")]
    HandlerResolution {
        method: String,
        pattern: String,
        handler: String,
    },
}

/// Errors crossing the repository contract boundary.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("duplicate value for unique field {field}")]
    DuplicateKey { field: &'static str, value: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend operation {operation} failed: {detail}")]
    Backend {
        operation: &'static str,
        detail: String,
    },
}

/// Shown to users when an operation fails for reasons they cannot fix.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "No pudimos completar la operación. Inténtalo de nuevo más tarde.";

impl RepositoryError {
    /// Text safe to show a visitor. Backend detail stays in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RepositoryError::Validation(errors) => errors
                .iter()
                .next()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Los datos enviados no son válidos".to_string()),
            RepositoryError::DuplicateKey { field, .. } if *field == "email" => {
                "Este correo electrónico ya está registrado".to_string()
            }
            RepositoryError::DuplicateKey { .. } => "El valor ya está registrado".to_string(),
            RepositoryError::NotFound { .. } => "El recurso solicitado no existe".to_string(),
            RepositoryError::BackendUnavailable(_) | RepositoryError::Backend { .. } => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
