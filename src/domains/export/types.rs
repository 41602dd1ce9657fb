use crate::domains::export::pagination::PageSource;
use crate::domains::fields::types::FieldMapping;
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Export formats supported by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    /// Spreadsheet; written as annotated JSON while no binary encoder is wired in
    Xlsx,
}

impl ExportFormat {
    /// Extension of the file actually produced for this format
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json | ExportFormat::Xlsx => "json",
        }
    }
}

/// Export job statuses. `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Preparing,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportStatus::Completed | ExportStatus::Failed | ExportStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::Preparing => "preparing",
            ExportStatus::Processing => "processing",
            ExportStatus::Completed => "completed",
            ExportStatus::Failed => "failed",
            ExportStatus::Cancelled => "cancelled",
        }
    }
}

/// How a job obtains its records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    InMemory,
    Streaming,
}

/// Polled snapshot of an export job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    pub job_id: Uuid,
    pub status: ExportStatus,
    pub mode: ExportMode,
    /// Percentage, 0..=100
    pub progress: u8,
    pub processed_records: usize,
    pub total_records: Option<usize>,
    pub start_time: DateTime<Utc>,
    /// Seconds, once a rate can be estimated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What to export and how
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
    /// Column model; only included fields are exported, in `order`.
    /// Empty means columns are derived from the records.
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    /// Expected record count, when the caller knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<usize>,
}

impl ExportRequest {
    pub fn new(entity_type: &str, tenant_slug: Option<&str>, format: ExportFormat) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            tenant_slug: tenant_slug.map(str::to_string),
            format,
            fields: Vec::new(),
            total_records: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldMapping>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_total(mut self, total_records: usize) -> Self {
        self.total_records = Some(total_records);
        self
    }
}

/// Where an export's records come from
#[derive(Clone)]
pub enum ExportSource {
    /// Records already resident in memory
    Records(Vec<Value>),
    /// Paged data provider pulled on demand
    Provider(Arc<dyn PageSource>),
}

/// Export operation errors
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Export job failed: {0}")]
    JobFailed(String),

    #[error("Export job not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid job state: {0}")]
    InvalidState(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<ServiceError> for ExportError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Network(msg) => ExportError::Network(msg),
            other => ExportError::JobFailed(other.to_string()),
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(error: csv::Error) -> Self {
        ExportError::Serialization(error.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(error: serde_json::Error) -> Self {
        ExportError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for ExportError {
    fn from(error: std::io::Error) -> Self {
        ExportError::Io(error.to_string())
    }
}
