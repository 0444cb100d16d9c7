//! Integration tests for inspection form extraction

use std::fs;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use sif_extract::batch::process_directory;
use sif_extract::source::MemoryPage;
use sif_extract::writer::render_report_csv;
use sif_extract::{
    extract_report, process_report_mem, ExtractionOptions, InspectionItemAccumulator,
    MemoryReport, MetadataField, PageTableSource, PageTextSource, PdfReport, ReportError, Status,
    TableGrid,
};

// Helper to build a page with pre-extracted text and tables
fn make_page(text: &str, tables: Vec<TableGrid>) -> MemoryPage {
    MemoryPage {
        text: text.to_string(),
        tables,
    }
}

fn row(cells: &[&str]) -> Vec<Option<String>> {
    cells
        .iter()
        .map(|c| (!c.is_empty()).then(|| c.to_string()))
        .collect()
}

fn numbers(items: &[sif_extract::InspectionItem]) -> Vec<&str> {
    items.iter().map(|i| i.item_number.as_str()).collect()
}

/// Text run placed at an absolute position
struct Run<'a> {
    text: &'a str,
    x: i64,
    y: i64,
}

fn run(text: &str, x: i64, y: i64) -> Run<'_> {
    Run { text, x, y }
}

/// Build a PDF with one Courier text run per `Run`, one page per slice
fn build_pdf(pages: &[&[Run<'_>]]) -> Vec<u8> {
    let pages = pages
        .iter()
        .map(|runs| {
            let mut operations = Vec::new();
            for r in runs.iter() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]));
                operations.push(Operation::new("Td", vec![r.x.into(), r.y.into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(r.text)]));
                operations.push(Operation::new("ET", vec![]));
            }
            operations
        })
        .collect();
    build_pdf_from_operations(pages)
}

/// Build a PDF from raw content operations, one page per entry; the font is `F1`
fn build_pdf_from_operations(pages: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Cover page plus one form page. Item 1.03 has its number and
/// description on different baselines, so only the table pass finds it.
fn sample_report_pdf() -> Vec<u8> {
    let cover = [
        run("Turbine No./Id: 21345", 40, 800),
        run("Service Order: 4001234567", 40, 780),
        run("Turbine Type: V112", 40, 760),
    ];
    let form = [
        run("Service Inspection Form", 40, 800),
        run("Check hub", 70, 720),
        run("N/A", 360, 720),
        run("1.03", 40, 714),
        run("1.01", 40, 700),
        run("Check tower door", 70, 700),
        run("OK", 360, 700),
        run("1.02", 40, 680),
        run("Check ladder", 70, 680),
        run("NOK", 360, 680),
    ];
    build_pdf(&[&cover[..], &form[..]])
}

// ============================================================================
// Text Pass Tests
// ============================================================================

#[test]
fn test_continuation_merge() {
    let report = MemoryReport::from_texts([
        "Service Inspection Form\n1.01 Check torque\ncontinues on next line OK",
    ]);
    let extraction = extract_report(&report, &ExtractionOptions::default()).unwrap();

    assert_eq!(extraction.items.len(), 1);
    let item = &extraction.items[0];
    assert_eq!(item.item_number, "1.01");
    assert_eq!(item.description, "Check torque continues on next line");
    assert_eq!(item.status, Status::Ok);
    assert_eq!(item.comment, None);
}

#[test]
fn test_first_seen_order_is_kept() {
    let report = MemoryReport::from_texts([
        "Service Inspection Form\n2.01 Yaw brake OK\n1.01 Tower door NOK\n1.10 Ladder OK\n1.02 Lift N/A",
    ]);
    let extraction = extract_report(&report, &ExtractionOptions::default()).unwrap();
    assert_eq!(numbers(&extraction.items), vec!["2.01", "1.01", "1.10", "1.02"]);
}

#[test]
fn test_duplicate_detection_appends_to_existing_entry() {
    let report = MemoryReport::from_texts([
        "Service Inspection Form\n1.01 Check cable OK\n1.02 Check lift NOK\n1.01 and loop",
    ]);
    let extraction = extract_report(&report, &ExtractionOptions::default()).unwrap();

    assert_eq!(numbers(&extraction.items), vec!["1.01", "1.02"]);
    assert_eq!(extraction.items[0].description, "Check cable and loop");
    assert_eq!(extraction.items[0].status, Status::Ok);
    assert_eq!(extraction.merged_duplicates, vec!["1.01".to_string()]);
}

#[test]
fn test_items_span_pages() {
    let report = MemoryReport::from_texts([
        "Service Inspection Form\n0. DMS: 1234\n1.01 Check gearbox: oil",
        "Service Inspection Form\nlevel low NOK\n1.02 Check brake OK",
    ]);
    let extraction = extract_report(&report, &ExtractionOptions::default()).unwrap();

    let first = &extraction.items[0];
    assert_eq!(first.description, "Check gearbox");
    assert_eq!(first.comment.as_deref(), Some("oil level low"));
    assert_eq!(first.status, Status::Nok);
    assert_eq!(extraction.items[1].status, Status::Ok);
}

#[test]
fn test_lines_before_form_page_are_ignored() {
    let report = MemoryReport::from_texts([
        "Cover\n9.99 Not an inspection item OK",
        "Service Inspection Form\n1.01 Check OK",
    ]);
    let extraction = extract_report(&report, &ExtractionOptions::default()).unwrap();
    assert_eq!(extraction.form_page, 1);
    assert_eq!(numbers(&extraction.items), vec!["1.01"]);
}

// ============================================================================
// Table Reconciliation Tests
// ============================================================================

#[test]
fn test_table_recovery() {
    let report = MemoryReport {
        pages: vec![make_page(
            "Service Inspection Form\n1.01 Check tower OK",
            vec![vec![
                row(&["1.01", "Something else", "", "NOK"]),
                row(&["1.02", "Check bolt: loose NOK"]),
            ]],
        )],
    };
    let extraction = extract_report(&report, &ExtractionOptions::default()).unwrap();

    assert_eq!(numbers(&extraction.items), vec!["1.01", "1.02"]);
    // Seen rows are not merged
    assert_eq!(extraction.items[0].description, "Check tower");
    assert_eq!(extraction.items[0].status, Status::Ok);

    let recovered = &extraction.items[1];
    assert_eq!(recovered.description, "Check bolt");
    assert_eq!(recovered.comment.as_deref(), Some("loose"));
    assert_eq!(recovered.status, Status::Nok);
    assert_eq!(extraction.recovered_from_tables, 1);
}

#[test]
fn test_pages_without_tables_are_skipped() {
    let report = MemoryReport {
        pages: vec![
            make_page("Service Inspection Form\n1.01 Check OK", vec![]),
            make_page("", vec![vec![row(&["2.01", "Yaw", "", "Not Applicable"])]]),
        ],
    };
    assert!(matches!(
        report.page_tables(0),
        Err(ReportError::NoTableFound { page: 0 })
    ));

    let extraction = extract_report(&report, &ExtractionOptions::default()).unwrap();
    assert_eq!(numbers(&extraction.items), vec!["1.01", "2.01"]);
    assert_eq!(extraction.items[1].status, Status::NotApplicable);
}

#[test]
fn test_accumulator_uniqueness_across_passes() {
    let mut accumulator = InspectionItemAccumulator::new();
    accumulator.feed_text("1.01 A OK\n1.02 B OK\n1.01 A again");
    accumulator.reconcile_tables(&[vec![row(&["1.02", "B NOK"]), row(&["1.03", "C OK"])]]);
    let accumulated = accumulator.finish();

    assert_eq!(numbers(&accumulated.items), vec!["1.01", "1.02", "1.03"]);
    assert_eq!(accumulated.items[1].status, Status::Ok);
}

// ============================================================================
// Compliance And Error Tests
// ============================================================================

#[test]
fn test_compliance_ignores_items_without_status() {
    let report = MemoryReport::from_texts([
        "Service Inspection Form\n1.01 Safety\n1.02 Door OK\n1.03 Ladder NOK\n1.04 Lift OK\n1.05 Crane N/A",
    ]);
    let extraction = extract_report(&report, &ExtractionOptions::default()).unwrap();
    let compliance = extraction.compliance;

    assert_eq!(compliance.ok_count, 2);
    assert_eq!(compliance.total_with_status, 4);
    assert!((compliance.ratio_percent - 50.0).abs() < 1e-9);
}

#[test]
fn test_no_inspection_form_found() {
    let report = MemoryReport::from_texts(["Delivery note", "1.01 Check OK"]);
    let result = extract_report(&report, &ExtractionOptions::default());
    assert!(matches!(result, Err(ReportError::NoInspectionFormFound { .. })));
}

#[test]
fn test_no_items_extracted() {
    let report = MemoryReport::from_texts(["Service Inspection Form\nSignature"]);
    let result = extract_report(&report, &ExtractionOptions::default());
    assert!(matches!(result, Err(ReportError::NoItemsExtracted)));
}

#[test]
fn test_custom_form_marker() {
    let options = ExtractionOptions {
        form_marker: "Checklist".to_string(),
        ..ExtractionOptions::default()
    };
    let report = MemoryReport::from_texts(["Checklist\n1.01 Check OK"]);
    let extraction = extract_report(&report, &options).unwrap();
    assert_eq!(extraction.items.len(), 1);
}

// ============================================================================
// PDF End-to-End Tests
// ============================================================================

#[test]
fn test_pdf_page_text() {
    let report = PdfReport::from_mem(&sample_report_pdf(), &ExtractionOptions::default()).unwrap();
    assert_eq!(report.page_count(), 2);

    let text = report.page_text(1).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Service Inspection Form");
    assert!(lines.contains(&"1.01 Check tower door OK"));
    assert!(lines.contains(&"1.02 Check ladder NOK"));
    assert!(lines.contains(&"1.03"));
}

#[test]
fn test_pdf_page_tables() {
    let report = PdfReport::from_mem(&sample_report_pdf(), &ExtractionOptions::default()).unwrap();
    let tables = report.page_tables(1).unwrap();
    assert_eq!(tables.len(), 1);

    let recovered_row = tables[0]
        .iter()
        .find(|r| r.first().and_then(|c| c.as_deref()) == Some("1.03"))
        .unwrap();
    assert_eq!(recovered_row[1].as_deref(), Some("Check hub"));
    assert_eq!(recovered_row[3].as_deref(), Some("N/A"));
}

#[test]
fn test_process_report_mem() {
    let extraction =
        process_report_mem(&sample_report_pdf(), &ExtractionOptions::default()).unwrap();

    assert_eq!(extraction.page_count, 2);
    assert_eq!(extraction.form_page, 1);
    assert_eq!(numbers(&extraction.items), vec!["1.01", "1.02", "1.03"]);
    assert_eq!(extraction.items[0].description, "Check tower door");
    assert_eq!(extraction.items[1].status, Status::Nok);
    assert_eq!(extraction.items[2].description, "Check hub");
    assert_eq!(extraction.items[2].status, Status::NotApplicable);
    assert_eq!(extraction.recovered_from_tables, 1);

    assert_eq!(extraction.compliance.ok_count, 1);
    assert_eq!(extraction.compliance.total_with_status, 3);

    let turbine = extraction.metadata.get(MetadataField::TurbineNumber);
    assert_eq!(turbine.map(|v| v.to_string()).as_deref(), Some("21345"));

    let csv = render_report_csv(&extraction.metadata, &extraction.items);
    assert!(csv.contains("\n1,Check tower door,,,\n1.01,Check tower door,,OK,\n"));
}

#[test]
fn test_scaled_text_matrix_keeps_lines_apart() {
    let ints = |values: &[i64]| values.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>();
    let show = |text: &str| Operation::new("Tj", vec![Object::string_literal(text)]);
    let pdf = build_pdf_from_operations(vec![vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(1)]),
        Operation::new("Tm", ints(&[10, 0, 0, 10, 40, 780])),
        show("Service Inspection Form"),
        Operation::new("Td", ints(&[0, -2])),
        show("1.01 Check door OK"),
        Operation::new("Td", ints(&[0, -2])),
        show("1.02 Check ladder NOK"),
        Operation::new("ET", vec![]),
    ]]);

    let report = PdfReport::from_mem(&pdf, &ExtractionOptions::default()).unwrap();
    assert_eq!(
        report.page_text(0).unwrap(),
        "Service Inspection Form\n1.01 Check door OK\n1.02 Check ladder NOK"
    );

    let extraction = process_report_mem(&pdf, &ExtractionOptions::default()).unwrap();
    assert_eq!(numbers(&extraction.items), vec!["1.01", "1.02"]);
    assert_eq!(extraction.items[0].status, Status::Ok);
}

#[test]
fn test_invalid_pdf_bytes() {
    let result = process_report_mem(b"definitely not a pdf", &ExtractionOptions::default());
    assert!(matches!(result, Err(ReportError::Parse(_))));
}

// ============================================================================
// Batch Tests
// ============================================================================

#[test]
fn test_process_directory_writes_outputs_and_report() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("good.pdf"), sample_report_pdf()).unwrap();
    fs::write(input.path().join("bad.pdf"), b"garbage").unwrap();
    let output = input.path().join("out");

    let summary =
        process_directory(input.path(), &output, &ExtractionOptions::default(), Some(2), false)
            .unwrap();
    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);

    let csv = fs::read_to_string(output.join("good_output.csv")).unwrap();
    assert!(csv.starts_with("0,1,2,3,4\n,,,,\nService Inspection Form,,,,\n"));
    assert!(!output.join("bad_output.csv").exists());

    let report = fs::read_to_string(summary.report_path.unwrap()).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 3);
    // File-name order: bad.pdf before good.pdf
    assert!(lines[1].contains("bad.pdf"));
    assert!(lines[2].contains("good.pdf"));
    assert!(lines[2].ends_with(",1,3,33.33,"));
}

#[test]
fn test_process_directory_with_page_dump() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("report.pdf"), sample_report_pdf()).unwrap();

    let summary = process_directory(
        input.path(),
        &input.path().join("out"),
        &ExtractionOptions::default(),
        None,
        true,
    )
    .unwrap();
    let dump = summary.outcomes[0].page_dump.as_deref().unwrap();
    assert!(dump.contains("--- PAGE 1 ---\nTurbine No./Id: 21345"));
    assert!(dump.contains("--- PAGE 2 ---\nService Inspection Form"));
}
