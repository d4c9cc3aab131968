//! csv-forge CLI - dialect-detecting CSV converter

use clap::Parser;
use csv_forge::{resource, Converter, OutputFormat};
use std::path::PathBuf;
use std::process::ExitCode;

/// Convert delimited text files into columnar and record-oriented formats.
///
/// The encoding, delimiter, quoting convention, and compression wrapper of
/// each input are detected automatically; wrong guesses are corrected by
/// re-reading with alternates.
#[derive(Parser, Debug)]
#[command(name = "csv-forge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file(s): .csv, .csv.gz, or .csv.zip
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, default_value = "parquet")]
    format: String,

    /// Directory for converted output files
    #[arg(short = 'o', long, default_value = "converted")]
    output_dir: PathBuf,

    /// Force low-memory chunked conversion regardless of available RAM
    #[arg(long)]
    low_memory: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let format: OutputFormat = match args.format.parse() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut verdict = resource::evaluate_paths(&args.files, available_memory());
    if args.low_memory {
        verdict.low_memory_mode = true;
    }

    if let Some(reason) = &verdict.reason {
        eprintln!("Error: resource limit exceeded: {reason}");
        return ExitCode::FAILURE;
    }

    let converter = match Converter::new(&args.output_dir, verdict) {
        Ok(converter) => converter,
        Err(e) => {
            eprintln!("Error: could not prepare output directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut exit_code = ExitCode::SUCCESS;

    // One file is fully converted before the next begins.
    for file in &args.files {
        let outcome = converter.convert(file, format);
        match (outcome.succeeded, outcome.output_path) {
            (true, Some(path)) => println!("{} -> {}", file.display(), path.display()),
            (true, None) => println!("{}: no rows, skipped", file.display()),
            (false, _) => {
                if let Some(err) = outcome.error {
                    eprintln!("Error processing {}: {err}", file.display());
                }
                exit_code = ExitCode::FAILURE;
            }
        }
    }

    exit_code
}

fn available_memory() -> u64 {
    use sysinfo::System;

    let mut system = System::new();
    system.refresh_memory();
    system.available_memory()
}
