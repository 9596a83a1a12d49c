//! Live Level 2 capture: subscribe to the book channel, reconstruct the
//! aggregated book per symbol, validate checksums, and persist every raw
//! record as JSON Lines.
//!
//! ```text
//! kraken-book -p "BTC/USD" -d 25 --show-top
//! kraken-book -p pairs.txt:10 --separate-files --hourly
//! ```

use anyhow::Result;
use clap::Parser;
use feeds::BookClient;
use std::time::Duration;
use storage::{DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MEMORY_THRESHOLD_BYTES};
use tools::display;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "kraken-book",
    version,
    about = "Capture real-time Level 2 order book data from the Kraken WebSocket v2 API",
    after_help = "Default display is a minimal status line every 10 seconds. \
                  Polling consumers must call get_updates at least twice per \
                  flush interval; this tool relies on the writer drain instead."
)]
struct Args {
    /// Pairs: inline list ("BTC/USD,ETH/USD"), CSV column
    /// (pairs.csv:symbol[:N]), or text file (pairs.txt[:N])
    #[arg(short, long, value_name = "SPEC")]
    pairs: String,

    /// Order book depth
    #[arg(short, long, value_name = "NUM", default_value_t = 10)]
    depth: u32,

    /// Output file (JSON Lines)
    #[arg(short, long, value_name = "FILE", default_value = "kraken_orderbook.jsonl")]
    output: String,

    /// Create a separate file per symbol
    #[arg(long)]
    separate_files: bool,

    /// Skip checksum validation
    #[arg(long)]
    skip_validation: bool,

    /// Show update details
    #[arg(short = 'v', long)]
    show_updates: bool,

    /// Show top-of-book on every record
    #[arg(long)]
    show_top: bool,

    /// Show the full order book (single pair only)
    #[arg(long)]
    show_book: bool,

    /// Flush interval in seconds (0 disables the time trigger)
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_FLUSH_INTERVAL_SECS)]
    flush_interval: u64,

    /// Memory threshold in bytes (0 disables the memory trigger)
    #[arg(short, long, value_name = "BYTES", default_value_t = DEFAULT_MEMORY_THRESHOLD_BYTES)]
    memory_threshold: usize,

    /// Rotate the output file hourly (UTC): output.YYYYMMDD_HH.jsonl
    #[arg(long)]
    hourly: bool,

    /// Rotate the output file daily (UTC): output.YYYYMMDD.jsonl
    #[arg(long)]
    daily: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tools::init_tracing();
    let args = tools::parse_args::<Args>();

    let mode = tools::segment_mode(args.hourly, args.daily)?;
    tools::validate_depth(args.depth, &tools::BOOK_DEPTHS)?;

    let parsed = cli::parse_pairs_spec(&args.pairs)?;
    if args.show_book && parsed.symbols.len() > 1 {
        anyhow::bail!(
            "--show-book can only be used with a single pair (you specified {})",
            parsed.symbols.len()
        );
    }
    tools::log_pairs(&parsed);
    info!(
        depth = args.depth,
        validation = !args.skip_validation,
        output = %args.output,
        separate_files = args.separate_files,
        segmentation = ?mode,
        "book capture starting"
    );

    let client = BookClient::book(args.depth, !args.skip_validation);
    client.set_output(&args.output, args.separate_files);
    client.set_flush_interval(args.flush_interval);
    client.set_memory_threshold(args.memory_threshold);
    client.set_segment_mode(mode)?;

    let (show_updates, show_top, show_book, depth) =
        (args.show_updates, args.show_top, args.show_book, args.depth);
    client.set_update_callback(move |record| {
        if show_book {
            display::show_full_book(record, depth as usize);
        } else if show_top {
            display::show_top_of_book(record);
        } else if show_updates {
            display::show_update_details(record);
        }
    });
    client.set_connection_callback(|connected| {
        info!(
            "websocket {}",
            if connected { "connected" } else { "disconnected" }
        );
    });
    client.set_error_callback(|e| error!("{e}"));

    if !client.start(&parsed.symbols) {
        anyhow::bail!("failed to start book client");
    }
    info!("streaming live order book data; Ctrl+C to stop and save");

    let minimal = !(args.show_updates || args.show_top || args.show_book);
    let mut status = tokio::time::interval(Duration::from_secs(10));
    status.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            _ = status.tick() => {
                if minimal {
                    let stats = client.stats();
                    if !stats.is_empty() {
                        display::show_book_status(&stats);
                    }
                }
                if !client.is_running() {
                    anyhow::bail!("worker exited; see errors above");
                }
            }
        }
    }

    client.flush()?;
    client.stop();

    let stats = client.stats();
    let snapshots: u64 = stats.values().map(|s| s.snapshot_count).sum();
    let updates: u64 = stats.values().map(|s| s.update_count).sum();
    info!(
        pairs = stats.len(),
        snapshots,
        updates,
        written = client.records_written(),
        "capture finished"
    );
    Ok(())
}
