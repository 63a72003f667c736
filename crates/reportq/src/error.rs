use std::path::PathBuf;
use thiserror::Error;

use crate::model::ReportId;

#[derive(Error, Debug)]
pub enum ReportqError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors raised by queue operations.
///
/// Absence of a record and a lost booking race are not errors: those come
/// back as `Ok(None)`.
#[derive(Error, Debug)]
pub enum QueueError {
    /// A required field of a new report was missing.
    #[error("Invalid report: missing {field}")]
    Validation { field: &'static str },

    /// The caller passed an argument that can never be valid.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// The operation exists on the repository surface but is not implemented.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: &'static str },

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Report {0} has no stored payload")]
    ArtifactMissing(ReportId),

    #[error("Payload of report {id} is not a valid archive: {reason}")]
    ArchiveCorrupt { id: ReportId, reason: String },

    #[error("Archive IO failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build archive: {0}")]
    Pack(String),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unknown resource type for '{name}': {role}")]
    Classification { name: String, role: String },

    #[error("Failed to write export '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Report processing failed: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, ReportqError>;
