use std::error::Error;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use card_misuse_analytics::{
    IngestReport, Settings, Store, dashboard::format_count, ingest_file, logging::setup_logging,
};

/// Load card transaction files into the risk database.
///
/// Each file is parsed, every transaction is given a risk label, and the
/// labelled batch is appended to the database in a single transaction.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path of the SQLite database, created if it does not exist.
    #[arg(long, short)]
    db_path: PathBuf,

    /// An optional TOML file with the risk thresholds.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// The log level, overridden by `RUST_LOG`.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append debug logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print each report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// The CSV, TSV or spreadsheet files to load.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    setup_logging(&args.log_level, args.log_file.as_deref())?;

    let settings = Settings::load(args.config.as_deref())?;
    let mut store = Store::open(&args.db_path)?;
    let mut failed_files = 0;

    for path in &args.files {
        match ingest_file(&mut store, path, &settings.risk) {
            Ok(report) if args.json => println!("{}", serde_json::to_string_pretty(&report)?),
            Ok(report) => print_report(&report),
            Err(error) => {
                eprintln!("Could not load {}: {error}", path.display());
                failed_files += 1;
            }
        }
    }

    store.close()?;

    if failed_files > 0 {
        eprintln!("{failed_files} of {} files could not be loaded.", args.files.len());
        exit(1);
    }

    Ok(())
}

fn print_report(report: &IngestReport) {
    let counts = &report.risk_counts;

    println!("Loaded '{}' as batch {}", report.source_name, report.batch_id);
    println!(
        "  {} rows read, {} written, {} duplicates skipped, {} blank rows skipped",
        format_count(report.rows_read),
        format_count(report.rows_written),
        format_count(report.duplicates_skipped),
        format_count(report.blank_rows_skipped),
    );
    println!(
        "  Normal: {}  Medium Risk: {}  High Risk: {}  Unclassified: {}",
        format_count(counts.normal),
        format_count(counts.medium_risk),
        format_count(counts.high_risk),
        format_count(counts.unclassified),
    );

    for warning in &report.ingest_warnings {
        println!("  warning: {warning}");
    }
    for warning in &report.classification_warnings {
        println!("  warning: {warning}");
    }
}
