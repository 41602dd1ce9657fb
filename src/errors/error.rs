use std::fmt;
use serde::Serialize;
use thiserror::Error;

/// Key-value persistence errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum StorageError {
    #[error("Storage read failed for key {key}: {reason}")]
    Read {
        key: String,
        reason: String,
    },

    #[error("Storage write failed for key {key}: {reason}")]
    Write {
        key: String,
        reason: String,
    },

    #[error("Stored value for key {key} is corrupt: {reason}")]
    Corrupt {
        key: String,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn read(key: &str, reason: impl fmt::Display) -> Self {
        Self::Read {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn write(key: &str, reason: impl fmt::Display) -> Self {
        Self::Write {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn corrupt(key: &str, reason: impl fmt::Display) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Domain-level errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum DomainError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External error: {0}")]
    External(String),
}

/// Service-level errors (application specific)
#[derive(Debug, Error, Clone, Serialize)]
pub enum ServiceError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        ServiceError::Domain(DomainError::Validation(error))
    }
}

impl From<StorageError> for ServiceError {
    fn from(error: StorageError) -> Self {
        ServiceError::Domain(DomainError::Storage(error))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ServiceError::ExternalService(format!("Failed to parse response: {}", error))
        } else {
            ServiceError::Network(error.to_string())
        }
    }
}

/// Validation errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },

    #[error("Malformed sample record at index {index}: {reason}")]
    MalformedSample {
        index: usize,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Custom(String),
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed_sample(index: usize, reason: &str) -> Self {
        Self::MalformedSample {
            index,
            reason: reason.to_string(),
        }
    }

    pub fn custom(message: &str) -> Self {
        Self::Custom(message.to_string())
    }
}
