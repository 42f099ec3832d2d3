use std::path::PathBuf;

use thiserror::Error;

use crate::models::RecordId;
use crate::store::StoreError;

/// Whole-batch extraction failure. Nothing is staged when this is returned.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Upload failed: {0}")]
    Upload(StoreError),

    #[error("Malformed recognition output: {0}")]
    Malformed(String),

    #[error("Recognition returned {got} entries for {expected} images")]
    CountMismatch { expected: usize, got: usize },

    #[error("Could not read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<StoreError> for ExtractionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ResponseParsing(msg) => ExtractionError::Malformed(msg),
            other => ExtractionError::Upload(other),
        }
    }
}

/// Link precondition failure. No record has been created when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Patient {0} does not exist")]
    UnknownPatient(RecordId),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}
