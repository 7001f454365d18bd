//! PDF Watermark CLI tool
//!
//! Stamps a semi-transparent diagonal text watermark on every page of every
//! PDF found under a source folder, mirroring the directory structure into an
//! output folder. Originals are never modified.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;

use pdf_watermark::batch::{run_batch, BatchOptions};
use pdf_watermark::pdf::OverlaySpec;

/// PDF Watermark - stamp watermark text on every PDF in a folder tree
#[derive(Parser)]
#[command(name = "pdf-watermark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Watermark every PDF under ./docs into ./docs-watermarked
    pdf-watermark docs -o docs-watermarked --text \"CONFIDENTIAL\"

    # Only process PDFs, leave other files out of the output tree
    pdf-watermark docs -o docs-watermarked --text DRAFT --skip-other")]
struct Cli {
    /// Source folder, scanned recursively for PDF files
    source: PathBuf,

    /// Output folder mirroring the source tree (created if missing)
    #[arg(short, long)]
    output: PathBuf,

    /// Watermark text stamped diagonally across each page
    #[arg(short, long, default_value = "DRAFT")]
    text: String,

    /// Do not copy non-PDF files into the output tree
    #[arg(long)]
    skip_other: bool,
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

/// Run the batch and print the summary. Returns whether every file succeeded.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let options = BatchOptions {
        source_root: cli.source,
        output_root: cli.output,
        spec: OverlaySpec::new(cli.text),
        copy_other_files: !cli.skip_other,
    };

    let report = run_batch(&options)
        .with_context(|| format!("processing {}", options.source_root.display()))?;

    println!(
        "\nDone. {} PDF(s) watermarked, {} file(s) copied to:\n  {}",
        report.watermarked.len(),
        report.copied.len(),
        options.output_root.display()
    );

    if !report.is_success() {
        println!("\n{} file(s) failed:", report.failures.len());
        for (path, error) in &report.failures {
            println!("  {}: {}", path.display(), error);
        }
    }

    Ok(report.is_success())
}
