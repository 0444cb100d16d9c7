//! Directory batch processing
//!
//! Every PDF in a directory is processed on a rayon pool. A failing
//! document is recorded in its outcome and does not stop the batch.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::writer::{write_processing_report, write_report_file};
use crate::{extract_report, render_page_dump, ExtractionOptions, PdfReport, ReportError, ReportExtraction};

/// Result of processing one document
#[derive(Debug)]
pub struct DocumentOutcome {
    pub pdf_file: PathBuf,
    pub output_file: PathBuf,
    /// Raw page text, when a dump was requested and the PDF could be opened
    pub page_dump: Option<String>,
    pub result: Result<ReportExtraction, ReportError>,
}

/// Outcomes of a batch run, in file-name order
#[derive(Debug)]
pub struct BatchSummary {
    pub outcomes: Vec<DocumentOutcome>,
    /// Processing report path; `None` when the directory held no PDFs
    pub report_path: Option<PathBuf>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// PDF files directly inside `dir`, sorted by name
pub fn list_pdf_files(dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_pdf_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `<output_dir>/<stem>_output.csv`
pub fn output_path_for(pdf: &Path, output_dir: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output_dir.join(format!("{}_output.csv", stem))
}

/// Open, extract and write one document
pub fn process_document(
    pdf: &Path,
    output: &Path,
    options: &ExtractionOptions,
    dump_text: bool,
) -> DocumentOutcome {
    let mut page_dump = None;

    let result = PdfReport::open(pdf, options).and_then(|report| {
        if dump_text {
            page_dump = Some(render_page_dump(&report));
        }
        let extraction = extract_report(&report, options)?;
        write_report_file(output, &extraction)?;
        Ok(extraction)
    });

    match &result {
        Ok(extraction) => log::info!(
            "{}: {} items written to {}",
            pdf.display(),
            extraction.items.len(),
            output.display()
        ),
        Err(e) => log::error!("{}: {}", pdf.display(), e),
    }

    DocumentOutcome {
        pdf_file: pdf.to_path_buf(),
        output_file: output.to_path_buf(),
        page_dump,
        result,
    }
}

/// Process every PDF in `input_dir` and write the processing report.
///
/// `jobs` sets the pool size; `None` uses the global rayon pool.
pub fn process_directory(
    input_dir: &Path,
    output_dir: &Path,
    options: &ExtractionOptions,
    jobs: Option<usize>,
    dump_text: bool,
) -> Result<BatchSummary, ReportError> {
    let files = list_pdf_files(input_dir)?;
    if files.is_empty() {
        log::warn!("no PDF files found in {}", input_dir.display());
        return Ok(BatchSummary {
            outcomes: vec![],
            report_path: None,
        });
    }

    fs::create_dir_all(output_dir)?;
    log::info!("processing {} PDF files from {}", files.len(), input_dir.display());

    let run = || -> Vec<DocumentOutcome> {
        files
            .par_iter()
            .map(|pdf| process_document(pdf, &output_path_for(pdf, output_dir), options, dump_text))
            .collect()
    };

    let outcomes = match jobs {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| ReportError::WorkerPool(e.to_string()))?
            .install(run),
        None => run(),
    };

    let report_path = write_processing_report(output_dir, &outcomes)?;
    let summary = BatchSummary {
        outcomes,
        report_path: Some(report_path),
    };
    log::info!(
        "batch done: {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    Ok(summary)
}
