//! Service inspection form extraction using lopdf
//!
//! This crate provides:
//! - Positioned text and stream-mode table extraction from report PDFs
//! - A line-by-line parser that rebuilds the numbered inspection items
//! - Table reconciliation for items the text pass missed
//! - Compliance ratio, header metadata and CSV output

pub mod accumulator;
pub mod batch;
pub mod classifier;
pub mod compliance;
pub mod extractor;
pub mod metadata;
pub mod source;
pub mod status;
pub mod tables;
pub mod writer;

pub use accumulator::{InspectionItem, InspectionItemAccumulator, ItemCollection, ParserState};
pub use classifier::{classify_line, LineClass};
pub use compliance::Compliance;
pub use extractor::{LineOptions, PdfReport, TextItem};
pub use metadata::{extract_metadata, Metadata, MetadataField, MetadataValue};
pub use source::{MemoryReport, PageTableSource, PageTextSource, TableGrid};
pub use status::{extract_status, Status};
pub use tables::TableSettings;

use std::path::Path;

/// Marker text identifying the inspection form pages
pub const FORM_MARKER: &str = "Service Inspection Form";

/// Options for report extraction
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Table detection settings for the reconciliation pass
    pub table: TableSettings,
    /// Line grouping for page text
    pub lines: LineOptions,
    /// Fail with `NoItemsExtracted` when both passes find nothing
    pub require_items: bool,
    /// Number of leading pages searched for header metadata
    pub metadata_pages: usize,
    /// Text marking the first page of the inspection form
    pub form_marker: String,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            table: TableSettings::default(),
            lines: LineOptions::default(),
            require_items: true,
            metadata_pages: 2,
            form_marker: FORM_MARKER.to_string(),
        }
    }
}

/// Everything extracted from one report
#[derive(Debug, Clone)]
pub struct ReportExtraction {
    pub metadata: Metadata,
    /// Items in first-seen order
    pub items: Vec<InspectionItem>,
    pub compliance: Compliance,
    /// Index of the first inspection form page (0-indexed)
    pub form_page: usize,
    pub page_count: usize,
    /// Item numbers the text pass detected more than once
    pub merged_duplicates: Vec<String>,
    /// Items only the table pass found
    pub recovered_from_tables: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Find the first page whose text contains `marker`
pub fn find_form_page<S: PageTextSource + ?Sized>(
    source: &S,
    marker: &str,
) -> Result<usize, ReportError> {
    for page_index in 0..source.page_count() {
        match source.page_text(page_index) {
            Ok(text) if text.contains(marker) => return Ok(page_index),
            Ok(_) => {}
            Err(e) => log::warn!("page {}: skipped while searching form: {}", page_index, e),
        }
    }
    Err(ReportError::NoInspectionFormFound {
        marker: marker.to_string(),
    })
}

/// Extract metadata, items and compliance from an opened report.
///
/// Both the text pass and the table pass start at the form page. Pages that
/// fail to yield text or tables are skipped.
pub fn extract_report<S>(source: &S, options: &ExtractionOptions) -> Result<ReportExtraction, ReportError>
where
    S: PageTextSource + PageTableSource + ?Sized,
{
    let start = std::time::Instant::now();
    let page_count = source.page_count();

    let form_page = find_form_page(source, &options.form_marker)?;

    let header_text = (0..page_count.min(options.metadata_pages))
        .filter_map(|page_index| source.page_text(page_index).ok())
        .collect::<Vec<_>>()
        .join("\n");
    let metadata = extract_metadata(&header_text);

    let mut accumulator = InspectionItemAccumulator::with_form_marker(&options.form_marker);
    for page_index in form_page..page_count {
        match source.page_text(page_index) {
            Ok(text) => accumulator.feed_text(&text),
            Err(e) => log::warn!("page {}: no text: {}", page_index, e),
        }
    }
    accumulator.finish_text_pass();
    log::debug!("text pass found {} items", accumulator.items().len());

    for page_index in form_page..page_count {
        match source.page_tables(page_index) {
            Ok(tables) => {
                accumulator.reconcile_tables(&tables);
            }
            Err(ReportError::NoTableFound { page }) => {
                log::debug!("page {}: no table found, skipping", page);
            }
            Err(e) => log::warn!("page {}: table extraction failed: {}", page_index, e),
        }
    }

    let accumulated = accumulator.finish();
    if accumulated.items.is_empty() && options.require_items {
        return Err(ReportError::NoItemsExtracted);
    }

    let compliance = Compliance::from_items(&accumulated.items);
    log::info!(
        "{} items ({} from tables), compliance {:.2}%",
        accumulated.items.len(),
        accumulated.recovered_from_tables,
        compliance.ratio_percent
    );

    Ok(ReportExtraction {
        metadata,
        items: accumulated.items,
        compliance,
        form_page,
        page_count,
        merged_duplicates: accumulated.merged_duplicates,
        recovered_from_tables: accumulated.recovered_from_tables,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

/// Process a report PDF file
pub fn process_report<P: AsRef<Path>>(
    path: P,
    options: &ExtractionOptions,
) -> Result<ReportExtraction, ReportError> {
    let report = PdfReport::open(path, options)?;
    extract_report(&report, options)
}

/// Process a report PDF from a memory buffer
pub fn process_report_mem(
    buffer: &[u8],
    options: &ExtractionOptions,
) -> Result<ReportExtraction, ReportError> {
    let report = PdfReport::from_mem(buffer, options)?;
    extract_report(&report, options)
}

/// Raw text of every page between page banners
pub fn render_page_dump<S: PageTextSource + ?Sized>(source: &S) -> String {
    let mut out = String::new();
    for page_index in 0..source.page_count() {
        out.push_str(&format!("--- PAGE {} ---\n", page_index + 1));
        match source.page_text(page_index) {
            Ok(text) => out.push_str(&text),
            Err(e) => out.push_str(&format!("<unreadable: {}>", e)),
        }
        out.push_str("\n\n");
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("no '{marker}' page found in document")]
    NoInspectionFormFound { marker: String },
    #[error("no table found on page {page}")]
    NoTableFound { page: usize },
    #[error("no inspection items extracted")]
    NoItemsExtracted,
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl From<lopdf::Error> for ReportError {
    fn from(e: lopdf::Error) -> Self {
        ReportError::Parse(e.to_string())
    }
}
