//! Error types for the PDF watermark library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF watermark library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Watermark configuration rejected before any file was processed
    #[error("Invalid watermark spec: {0}")]
    InvalidSpec(String),

    /// Watermark text cannot be represented in the overlay font encoding
    #[error("Watermark text cannot be encoded: {0}")]
    Encoding(String),

    /// Source file cannot be opened or parsed as a PDF
    #[error("Cannot read source PDF {}: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    /// A page within an otherwise valid document could not be stamped
    #[error("Failed to stamp page {page}: {reason}")]
    Composition { page: u32, reason: String },

    /// Destination directory or file could not be written
    #[error("Cannot write output {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Source folder missing or not a directory
    #[error("Source folder not found: {}", .0.display())]
    SourceFolderNotFound(PathBuf),

    /// Invalid glob pattern built from the source root
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether this error should abort the whole run rather than just the
    /// file being processed. A watermark spec that cannot be rendered at all
    /// would otherwise fail identically on every file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidSpec(_) | Error::Encoding(_))
    }
}
