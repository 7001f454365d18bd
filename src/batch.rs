//! Batch processing of a source folder tree
//!
//! Discovers every file under the source root, watermarks PDFs into a
//! mirrored output tree, and copies everything else unchanged. Files are
//! processed strictly one at a time in sorted order; per-file failures are
//! recorded and the batch keeps going, while run-level failures (an
//! unrenderable watermark spec) abort immediately.

use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::error::{Error, Result};
use crate::pdf::{watermark_pdf, OverlaySpec};

/// Options for one batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Folder scanned recursively for input files
    pub source_root: PathBuf,
    /// Folder the mirrored tree is written into
    pub output_root: PathBuf,
    /// Watermark applied to every page of every PDF
    pub spec: OverlaySpec,
    /// Copy non-PDF files to the output tree unchanged
    pub copy_other_files: bool,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Source-relative paths of successfully watermarked PDFs
    pub watermarked: Vec<PathBuf>,
    /// Source-relative paths of files copied unchanged
    pub copied: Vec<PathBuf>,
    /// Source-relative paths that failed, with the error for each
    pub failures: Vec<(PathBuf, Error)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Watermark every PDF under `source_root` into a mirrored tree
///
/// The watermark spec is validated once up front; a spec that cannot render
/// fails the run before any file is touched. Each file is then processed
/// independently: a failure is recorded in the report with its source path
/// and leaves nothing at the mirrored output path.
pub fn run_batch(options: &BatchOptions) -> Result<BatchReport> {
    options.spec.validate()?;

    if !options.source_root.is_dir() {
        return Err(Error::SourceFolderNotFound(options.source_root.clone()));
    }

    let files = discover_files(&options.source_root)?;
    let mut report = BatchReport::default();

    for path in files {
        let rel = path
            .strip_prefix(&options.source_root)
            .map_err(|e| Error::General(format!("path outside source root: {}", e)))?
            .to_path_buf();
        let out_path = options.output_root.join(&rel);

        if is_pdf(&path) {
            eprintln!("Watermarking: {}", rel.display());
            match watermark_pdf(&path, &out_path, &options.spec) {
                Ok(()) => report.watermarked.push(rel),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    eprintln!("  failed: {}", e);
                    report.failures.push((rel, e));
                }
            }
        } else if options.copy_other_files {
            eprintln!("Copying: {}", rel.display());
            match copy_unchanged(&path, &out_path) {
                Ok(()) => report.copied.push(rel),
                Err(e) => {
                    eprintln!("  failed: {}", e);
                    report.failures.push((rel, e));
                }
            }
        }
    }

    Ok(report)
}

/// Recursively enumerate files under a root, sorted for reproducible order
fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    // Escape the root itself so bracket or star characters in folder names
    // aren't interpreted as glob syntax
    let pattern = format!("{}/**/*", Pattern::escape(&root.to_string_lossy()));

    let mut paths = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| Error::InvalidGlob(e.to_string()))? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => eprintln!("Warning: skipping unreadable entry: {}", e),
        }
    }

    paths.sort();
    Ok(paths)
}

/// Case-insensitive `.pdf` extension check
fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Copy a non-PDF file to the output tree unchanged
fn copy_unchanged(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::OutputWrite {
            path: destination.to_path_buf(),
            source: e,
        })?;
    }
    fs::copy(source, destination).map_err(|e| Error::OutputWrite {
        path: destination.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_case_insensitive() {
        assert!(is_pdf(Path::new("a/b/report.pdf")));
        assert!(is_pdf(Path::new("a/b/REPORT.PDF")));
        assert!(is_pdf(Path::new("scan.Pdf")));
        assert!(!is_pdf(Path::new("photo.png")));
        assert!(!is_pdf(Path::new("notes.pdf.txt")));
        assert!(!is_pdf(Path::new("no_extension")));
    }

    #[test]
    fn test_report_success_only_without_failures() {
        let mut report = BatchReport::default();
        assert!(report.is_success());

        report.watermarked.push(PathBuf::from("a.pdf"));
        assert!(report.is_success());

        report.failures.push((
            PathBuf::from("b.pdf"),
            Error::General("boom".to_string()),
        ));
        assert!(!report.is_success());
    }

    #[test]
    fn test_run_batch_missing_source_folder() {
        let options = BatchOptions {
            source_root: PathBuf::from("definitely/not/a/real/folder"),
            output_root: PathBuf::from("out"),
            spec: OverlaySpec::new("DRAFT"),
            copy_other_files: true,
        };
        assert!(matches!(
            run_batch(&options),
            Err(Error::SourceFolderNotFound(_))
        ));
    }

    #[test]
    fn test_run_batch_rejects_empty_text_before_touching_disk() {
        let options = BatchOptions {
            source_root: PathBuf::from("definitely/not/a/real/folder"),
            output_root: PathBuf::from("out"),
            spec: OverlaySpec::new(""),
            copy_other_files: true,
        };
        // Spec validation fires before the source folder is even checked
        assert!(matches!(run_batch(&options), Err(Error::InvalidSpec(_))));
    }
}
