//! A CLI tool for reporting the transfer syntax, compression scheme
//! and image geometry of DICOM files.
use clap::Parser;
use dicom_compinfo::{CompressionReport, Error, InspectOptions};
use snafu::{Report, ResultExt, Whatever};
use std::path::{Path, PathBuf};
use tracing::{error, Level};

/// Exit code for when an error emerged while inspecting a DICOM file.
const ERROR_READ: i32 = -2;

/// Report the compression scheme and image geometry of DICOM files
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// The DICOM file(s) to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Accept files without the 128-byte preamble
    #[arg(long = "no-preamble")]
    no_preamble: bool,
    /// Skip over sequences of undefined length
    /// instead of failing
    #[arg(long = "skip-undefined-length")]
    skip_undefined_length: bool,
    /// Refuse files larger than this number of bytes
    #[arg(long = "max-size", value_name = "BYTES")]
    max_size: Option<u64>,
    /// Print the outcome for each file as a JSON object
    #[arg(long = "json")]
    json: bool,
    /// Stop at the first file which cannot be inspected
    #[arg(long = "fail-first")]
    fail_first: bool,
    /// Print more information about the inspection process
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let App {
        files,
        no_preamble,
        skip_undefined_length,
        max_size,
        json,
        fail_first,
        verbose,
    } = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
            .with_writer(std::io::stderr)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    let options = InspectOptions::new()
        .require_preamble(!no_preamble)
        .skip_undefined_length(skip_undefined_length)
        .max_input_length(max_size);
    let fail_first = files.len() == 1 || fail_first;
    let mut errors: i32 = 0;

    for file in &files {
        match options.inspect_file(file) {
            Ok(report) => {
                if json {
                    println!("{}", report_to_json(file, &report));
                } else {
                    print_report(file, &report);
                }
            }
            Err(e) => {
                if json {
                    println!("{}", error_to_json(file, &e));
                } else {
                    error!("{}: {}", file.display(), Report::from_error(&e));
                }
                if fail_first {
                    std::process::exit(ERROR_READ);
                }
                errors += 1;
            }
        }
    }

    std::process::exit(errors);
}

fn print_report(file: &Path, report: &CompressionReport) {
    println!("{}:", file.display());
    println!("  Transfer Syntax UID: {}", report.transfer_syntax_uid);
    println!("  Compression:         {}", report.compression_label);
    println!(
        "  Dimensions:          {} x {}",
        report.columns(),
        report.rows()
    );
    println!("  Bits Allocated:      {}", report.bits_allocated());
}

fn report_to_json(file: &Path, report: &CompressionReport) -> serde_json::Value {
    let mut value = serde_json::json!({ "file": file.display().to_string() });
    if let (Some(object), Ok(serde_json::Value::Object(fields))) =
        (value.as_object_mut(), serde_json::to_value(report))
    {
        object.extend(fields);
    }
    value
}

fn error_to_json(file: &Path, e: &Error) -> serde_json::Value {
    serde_json::json!({
        "file": file.display().to_string(),
        "error": {
            "kind": e.kind().as_str(),
            "stage": e.stage().as_str(),
            "message": Report::from_error(e).to_string(),
        }
    })
}
