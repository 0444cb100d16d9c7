//! CSV output
//!
//! Two files are produced: one report CSV per document in the fixed
//! five-column layout, and one processing report per batch run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::accumulator::InspectionItem;
use crate::batch::DocumentOutcome;
use crate::metadata::Metadata;
use crate::{ReportError, ReportExtraction, FORM_MARKER};

const REPORT_COLUMNS: usize = 5;

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Append one row, padded with empty cells to the report width
fn push_row(out: &mut String, cells: &[&str]) {
    let mut row: Vec<String> = cells.iter().map(|c| csv_escape(c)).collect();
    row.resize(REPORT_COLUMNS.max(cells.len()), String::new());
    out.push_str(&row.join(","));
    out.push('\n');
}

/// Title of a section: the first item of that section with a non-empty
/// description that does not start with a digit
fn section_title<'a>(items: &'a [InspectionItem], section: &str) -> &'a str {
    items
        .iter()
        .filter(|item| item.section() == section)
        .map(|item| item.description.as_str())
        .find(|desc| desc.chars().next().is_some_and(|c| !c.is_ascii_digit()))
        .unwrap_or("")
}

/// Render the report CSV for one document
pub fn render_report_csv(metadata: &Metadata, items: &[InspectionItem]) -> String {
    let mut out = String::new();

    push_row(&mut out, &["0", "1", "2", "3", "4"]);
    push_row(&mut out, &[]);
    push_row(&mut out, &[FORM_MARKER]);

    for (field, value) in metadata.iter() {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        push_row(&mut out, &[field.key(), value.as_str()]);
    }

    let mut current_section: Option<&str> = None;
    for item in items {
        let section = item.section();
        if current_section != Some(section) {
            current_section = Some(section);
            push_row(&mut out, &[section, section_title(items, section)]);
        }

        push_row(
            &mut out,
            &[
                item.item_number.as_str(),
                item.description.as_str(),
                item.comment.as_deref().unwrap_or(""),
                item.status.as_str(),
                "",
            ],
        );
    }

    out
}

/// Write the report CSV, creating parent directories as needed
pub fn write_report_file(path: &Path, extraction: &ReportExtraction) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_report_csv(&extraction.metadata, &extraction.items))?;
    Ok(())
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Render the batch processing report, one row per document
pub fn render_processing_report(outcomes: &[DocumentOutcome]) -> String {
    let mut out =
        String::from("pdf_file,output_file,ok_items,total_items,compliance_ratio,error\n");

    for outcome in outcomes {
        let pdf_file = base_name(&outcome.pdf_file);
        let output_file = base_name(&outcome.output_file);
        let (ok, total, ratio, error) = match &outcome.result {
            Ok(extraction) => {
                let c = &extraction.compliance;
                (
                    c.ok_count.to_string(),
                    c.total_with_status.to_string(),
                    format!("{:.2}", c.ratio_percent),
                    String::new(),
                )
            }
            Err(e) => (String::new(), String::new(), String::new(), e.to_string()),
        };

        let cells = [pdf_file, output_file, ok, total, ratio, error];
        let row: Vec<String> = cells.iter().map(|c| csv_escape(c)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Write `processing_report_<timestamp>.csv` into `output_dir`
pub fn write_processing_report(
    output_dir: &Path,
    outcomes: &[DocumentOutcome],
) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(output_dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("processing_report_{}.csv", stamp));
    fs::write(&path, render_processing_report(outcomes))?;
    Ok(path)
}
