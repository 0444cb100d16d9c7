//! CLI tool for inspection form PDF to CSV extraction

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sif_extract::batch::{output_path_for, process_directory, process_document, DocumentOutcome};
use sif_extract::{ExtractionOptions, TableSettings};

const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Parser)]
#[command(
    name = "sif-extract",
    version,
    about = "Extract service inspection form data from PDF reports into CSV"
)]
struct Cli {
    /// PDF file or directory of PDF files
    input_path: PathBuf,

    /// Output CSV file (single PDF) or output directory (directory input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the extracted text of every page before parsing
    #[arg(short, long)]
    debug: bool,

    /// Column separator x positions for table detection
    #[arg(long, value_delimiter = ',', num_args = 1.., default_values_t = [65.0, 330.0, 350.0])]
    columns: Vec<f32>,

    /// Infer table columns from the text instead of using --columns
    #[arg(long, conflicts_with = "columns")]
    infer_columns: bool,

    /// Row tolerance for table detection, in points
    #[arg(long, default_value_t = 10.0)]
    row_tol: f32,

    /// Worker threads for directory input (defaults to one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Write a report even when no inspection item is found
    #[arg(long)]
    allow_empty: bool,
}

impl Cli {
    fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            table: TableSettings {
                columns: (!self.infer_columns).then(|| self.columns.clone()),
                row_tolerance: self.row_tol,
                ..TableSettings::default()
            },
            require_items: !self.allow_empty,
            ..ExtractionOptions::default()
        }
    }
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        log::error!("{}", err);
        for cause in err.chain().skip(1) {
            log::error!("caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let options = cli.extraction_options();

    if cli.input_path.is_dir() {
        run_directory(&cli, &options)
    } else if cli.input_path.is_file() {
        run_file(&cli, &options)
    } else {
        bail!("input path does not exist: {}", cli.input_path.display())
    }
}

fn run_file(cli: &Cli, options: &ExtractionOptions) -> Result<()> {
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| output_path_for(&cli.input_path, Path::new(DEFAULT_OUTPUT_DIR)));

    let outcome = process_document(&cli.input_path, &output, options, cli.debug);
    print_outcome(&outcome);

    outcome
        .result
        .map(|_| ())
        .with_context(|| format!("failed to process {}", cli.input_path.display()))
}

fn run_directory(cli: &Cli, options: &ExtractionOptions) -> Result<()> {
    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let summary = process_directory(&cli.input_path, &output_dir, options, cli.jobs, cli.debug)
        .with_context(|| format!("failed to process directory {}", cli.input_path.display()))?;

    for outcome in &summary.outcomes {
        print_outcome(outcome);
    }

    if let Some(report) = &summary.report_path {
        println!();
        println!(
            "Processed {} files ({} failed). Report: {}",
            summary.outcomes.len(),
            summary.failed(),
            report.display()
        );
    }
    Ok(())
}

fn print_outcome(outcome: &DocumentOutcome) {
    if let Some(dump) = &outcome.page_dump {
        println!("{}", dump);
    }

    match &outcome.result {
        Ok(extraction) => {
            let c = &extraction.compliance;
            println!("File: {}", outcome.pdf_file.display());
            println!("Output: {}", outcome.output_file.display());
            println!(
                "Compliance: {} OK out of {} items ({:.2}%)",
                c.ok_count, c.total_with_status, c.ratio_percent
            );
            if !extraction.merged_duplicates.is_empty() {
                println!("Merged duplicates: {}", extraction.merged_duplicates.join(", "));
            }
        }
        Err(e) => println!("File: {} FAILED: {}", outcome.pdf_file.display(), e),
    }
}
