//! Error types for pdfcompare.

use std::io;
use thiserror::Error;

/// Result type alias for pdfcompare operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while comparing documents.
///
/// Only failures that stop a whole comparison surface as `Err`. Failures local
/// to one page or one region are recorded in the
/// [`ComparisonReport`](crate::report::ComparisonReport) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Page index is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// The backend could not supply the words of a page.
    #[error("Word extraction failed on page {page}: {message}")]
    Extraction { page: u32, message: String },

    /// The backend rejected an annotation write.
    #[error("Annotation write failed on page {page}: {message}")]
    AnnotationWrite { page: u32, message: String },

    /// The document backend cannot be used at all.
    #[error("Document backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The vision diff service timed out or failed.
    #[error("External diff service error: {0}")]
    ExternalService(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The comparison service is not running.
    #[error("Comparison service is not running")]
    ServiceStopped,

    /// The job was cancelled before it completed.
    #[error("Comparison cancelled")]
    Cancelled,

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}
