use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use disc_scrubber::{logging, scrub_with_progress, ClearPartitionOpener, FstWalker, ScrubOptions, ScrubOutcome};

/// Overwrite unused clusters of a disc image with 0xFF
#[derive(Debug, Parser)]
#[command(name = "disc-scrub", version)]
struct Cli {
    /// Disc image to scrub in place
    image: PathBuf,

    /// JSON options file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Analyze only; do not modify the image
    #[arg(long)]
    dry_run: bool,

    /// Re-scrub images from older versions without asking
    #[arg(short, long)]
    yes: bool,

    /// Clip out-of-range partition regions instead of failing
    #[arg(long)]
    lenient: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (file:line, thread IDs)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        logging::init_verbose();
    } else {
        logging::init();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("disc-scrub: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = match &cli.config {
        Some(path) => ScrubOptions::load(path)?,
        None => ScrubOptions::default(),
    };
    options.dry_run |= cli.dry_run;
    options.rescrub_stale |= cli.yes;
    if cli.lenient {
        options.strict_layout = false;
    }

    let opener = ClearPartitionOpener::new(&cli.image);
    let mut last_percent = None;
    let outcome = scrub_with_progress(
        &cli.image,
        &opener,
        &FstWalker,
        &options,
        |status, fraction| {
            let percent = (fraction * 100.0) as u32;
            if last_percent != Some(percent) && !cli.json {
                last_percent = Some(percent);
                eprint!("\r{:>3}% {:<40}", percent, status);
            }
        },
        |version| options.rescrub_stale || (!cli.json && ask_rescrub(version)),
    )?;
    if !cli.json {
        eprintln!();
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        ScrubOutcome::Scrubbed(report) | ScrubOutcome::Analyzed(report) => {
            println!(
                "{}: {} of {} clusters free, {} MiB {}{}",
                report.path,
                report.free_clusters,
                report.cluster_count,
                report.reclaimed_bytes / (1024 * 1024),
                if report.dry_run { "reclaimable" } else { "reclaimed" },
                if !report.dry_run && !report.tag_committed { " (version tag not written)" } else { "" }
            );
        }
        ScrubOutcome::AlreadyScrubbed { version } => {
            println!("{}: already scrubbed (version {})", cli.image.display(), version);
        }
        ScrubOutcome::Declined { version } => {
            println!("{}: scrubbed by version {}, skipped", cli.image.display(), version);
        }
    }
    Ok(())
}

fn ask_rescrub(version: u8) -> bool {
    eprint!("Image was scrubbed by an older version ({}). Re-scrub? [y/N] ", version);
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
