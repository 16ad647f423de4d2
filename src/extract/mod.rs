//! Metadata extraction
//!
//! Turns a loaded page into a [`MetadataRecord`], either by reading the
//! fields of the matching metadata rule or by running an external
//! extraction program, and writes the result to the collection's output
//! directories.

mod extractor;
mod fields;
mod record;
mod script;

pub use extractor::Extractor;
pub use fields::{extract_field, extract_fields};
pub use record::{record_id, MetadataRecord, URL_FIELD};
pub use script::{run_extraction_program, PROGRAM_TIMEOUT};

use crate::driver::DriverError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while extracting or saving metadata
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("Extraction program output is not a JSON object")]
    NotAnObject,

    #[error("Extraction program exited with {status}: {stderr}")]
    ProgramFailed { status: String, stderr: String },

    #[error("Extraction program timed out after {0:?}")]
    ProgramTimeout(Duration),
}

/// Result type for extraction operations
pub type ExtractResult<T> = Result<T, ExtractError>;
