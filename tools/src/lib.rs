//! Shared plumbing for the capture binaries: argument parsing with the
//! documented exit codes, logging setup, and terminal display helpers.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod display;
pub mod replay;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Parse arguments; `--help`/`--version` exit 0, any parse failure
/// exits 1 after printing the diagnostic.
#[must_use]
pub fn parse_args<T: Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(
                e.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                e.exit();
            }
            let _ = e.print();
            std::process::exit(1);
        }
    }
}

/// Install the tracing subscriber: env-filter driven, `info` default
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Depths the book channel accepts
pub const BOOK_DEPTHS: [u32; 5] = [10, 25, 100, 500, 1000];

/// Depths the level3 channel accepts
pub const LEVEL3_DEPTHS: [u32; 3] = [10, 100, 1000];

/// Validate a depth argument against the channel's accepted set
pub fn validate_depth(depth: u32, allowed: &[u32]) -> anyhow::Result<()> {
    if allowed.contains(&depth) {
        return Ok(());
    }
    let allowed: Vec<String> = allowed.iter().map(u32::to_string).collect();
    anyhow::bail!("depth must be one of: {}", allowed.join(", "))
}

/// Resolve the `--hourly`/`--daily` pair into a segmentation mode;
/// combining them is an argument error
pub fn segment_mode(hourly: bool, daily: bool) -> anyhow::Result<storage::SegmentMode> {
    match (hourly, daily) {
        (true, true) => anyhow::bail!("--hourly and --daily cannot be used together"),
        (true, false) => Ok(storage::SegmentMode::Hourly),
        (false, true) => Ok(storage::SegmentMode::Daily),
        (false, false) => Ok(storage::SegmentMode::None),
    }
}

/// Log where the symbol list came from and what it holds
pub fn log_pairs(parsed: &cli::ParsedPairs) {
    use cli::PairsSource;

    match &parsed.source {
        PairsSource::Inline => {
            tracing::info!(pairs = parsed.symbols.len(), "input source: direct list");
        }
        PairsSource::CsvFile {
            path,
            column,
            limit,
        } => {
            tracing::info!(
                path,
                column,
                ?limit,
                pairs = parsed.symbols.len(),
                "input source: CSV file"
            );
        }
        PairsSource::TextFile { path, limit } => {
            tracing::info!(
                path,
                ?limit,
                pairs = parsed.symbols.len(),
                "input source: text file"
            );
        }
    }
    for symbol in parsed.symbols.iter().take(10) {
        tracing::info!("  - {symbol}");
    }
    if parsed.symbols.len() > 10 {
        tracing::info!("  ... and {} more", parsed.symbols.len() - 10);
    }
}
