use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use serde::Serialize;

use altdoc::{AltTextAssignment, ApplyStatus, Error, Extraction, ImageRecord};

/// Extract document images and write alt text back.
#[derive(Parser, Debug)]
#[command(name = "altdoc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract images from a .docx, .pptx or .pdf file
    Extract {
        /// Input document
        input: PathBuf,

        /// Directory for the image files and manifest.json
        #[arg(short, long)]
        out_dir: PathBuf,
    },
    /// Apply alt-text assignments to a .docx or .pptx file
    Apply {
        /// Input document
        input: PathBuf,

        /// JSON array of {"image_id": ..., "text": ...} assignments
        #[arg(short, long)]
        assignments: PathBuf,

        /// Where to write the updated document
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let result = match cli.command {
        Command::Extract { input, out_dir } => run_extract(&input, &out_dir),
        Command::Apply {
            input,
            assignments,
            output,
        } => run_apply(&input, &assignments, &output),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run_extract(input: &PathBuf, out_dir: &PathBuf) -> Result<ExitCode, Error> {
    let extraction = altdoc::extract_images(input)?;
    fs::create_dir_all(out_dir)?;

    for record in &extraction.images {
        fs::write(out_dir.join(&record.filename), &record.bytes)?;
    }
    write_manifest(out_dir, &extraction)?;

    println!(
        "{} images written to {}",
        extraction.images.len(),
        out_dir.display()
    );
    for failure in &extraction.failures {
        println!("skipped {}: {}", failure.context, failure.error);
    }

    if extraction.failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

#[derive(Serialize)]
struct Manifest<'a> {
    images: &'a [ImageRecord],
    failures: Vec<ManifestFailure>,
}

#[derive(Serialize)]
struct ManifestFailure {
    context: String,
    error: String,
}

fn write_manifest(out_dir: &PathBuf, extraction: &Extraction) -> Result<(), Error> {
    let manifest = Manifest {
        images: &extraction.images,
        failures: extraction
            .failures
            .iter()
            .map(|f| ManifestFailure {
                context: f.context.clone(),
                error: f.error.to_string(),
            })
            .collect(),
    };
    let json = serde_json::to_vec_pretty(&manifest).map_err(std::io::Error::other)?;
    let path = out_dir.join("manifest.json");
    fs::write(&path, json).map_err(|source| Error::Save { path, source })?;
    Ok(())
}

fn run_apply(
    input: &PathBuf,
    assignments_path: &PathBuf,
    output: &PathBuf,
) -> Result<ExitCode, Error> {
    let data = fs::read(assignments_path).map_err(|_| Error::NotFound {
        path: assignments_path.clone(),
    })?;
    let assignments: Vec<AltTextAssignment> =
        serde_json::from_slice(&data).map_err(|e| Error::FormatMismatch {
            path: assignments_path.clone(),
            detail: format!("invalid assignments JSON: {e}"),
        })?;

    let statuses = altdoc::apply_alt_text(input, &assignments, output)?;

    let mut failed = 0usize;
    for (image_id, status) in &statuses {
        match status {
            ApplyStatus::Applied => println!("{image_id}: applied"),
            ApplyStatus::AppliedDecorative => println!("{image_id}: applied (decorative)"),
            ApplyStatus::Failed { reason } => {
                failed += 1;
                println!("{image_id}: FAILED ({reason})");
            }
        }
    }
    println!(
        "{} of {} applied, saved to {}",
        statuses.len() - failed,
        statuses.len(),
        output.display()
    );

    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}
