use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OppError {
    #[error("invalid ingest configuration: {0}")]
    Configuration(String),

    #[error("missing config file opp-ingest.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("unknown ontology version: {0}")]
    UnknownOntologyVersion(String),

    #[error("invalid descriptor for field {field}: {detail}")]
    InvalidDescriptor { field: String, detail: String },

    #[error("cannot convert {value:?} to {expected}")]
    ValueConversion { value: String, expected: String },

    #[error("missing required key field: {0}")]
    MissingKeyField(String),

    #[error("row {row} failed: {detail}; raw row: {raw}")]
    TypeConversion {
        row: usize,
        raw: String,
        detail: String,
    },

    #[error("invalid data package: {0}")]
    DataPackage(String),

    #[error("table read error: {0}")]
    TableRead(String),

    #[error("FASTA read error: {0}")]
    FastaRead(String),

    #[error("store operation failed: {0}")]
    Store(String),

    #[error("store returned status {status}: {message}")]
    StoreStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
