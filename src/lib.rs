//! PDF Watermark Library
//!
//! A library for stamping a semi-transparent diagonal text watermark onto
//! every page of every PDF found under a source folder. This library provides
//! functionality to:
//! - Generate a translucent watermark overlay sized to any page
//! - Stamp the overlay onto each page of a PDF without touching the original file
//! - Mirror a whole directory tree into an output folder, copying non-PDF files
//! - Extract page counts and page geometry for verification
//!
//! # Example
//!
//! ```no_run
//! use pdf_watermark::batch::{run_batch, BatchOptions};
//! use pdf_watermark::pdf::OverlaySpec;
//! use std::path::PathBuf;
//!
//! let options = BatchOptions {
//!     source_root: PathBuf::from("docs"),
//!     output_root: PathBuf::from("docs - watermarked"),
//!     spec: OverlaySpec::new("DRAFT"),
//!     copy_other_files: true,
//! };
//!
//! let report = run_batch(&options).expect("batch failed to start");
//! assert!(report.is_success());
//! ```

pub mod batch;
pub mod error;
pub mod pdf;

// Re-export commonly used items
pub use error::{Error, Result};
