//! Live Level 3 capture: subscribe to the authenticated level3 channel,
//! reconstruct the order-by-order book per symbol, and persist every raw
//! record as JSON Lines.
//!
//! The channel needs an auth token, resolved in precedence order:
//! `--token`, then `--token-file`, then the `KRAKEN_WS_TOKEN` environment
//! variable.
//!
//! ```text
//! kraken-level3 -p "BTC/USD" --token-file token.txt --show-top
//! KRAKEN_WS_TOKEN=... kraken-level3 -p pairs.txt:5 --separate-files --daily
//! ```

use anyhow::Result;
use clap::Parser;
use common::types::Side;
use feeds::Level3Client;
use std::time::Duration;
use storage::{DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MEMORY_THRESHOLD_BYTES};
use tools::display;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "kraken-level3",
    version,
    about = "Capture real-time Level 3 order-by-order data from the Kraken WebSocket v2 API",
    after_help = "Event counters count successfully applied events only: a modify or \
                  delete for an unknown order id is dropped without incrementing \
                  them. Token precedence: --token, then --token-file, then \
                  KRAKEN_WS_TOKEN."
)]
struct Args {
    /// Pairs: inline list ("BTC/USD,ETH/USD"), CSV column
    /// (pairs.csv:symbol[:N]), or text file (pairs.txt[:N])
    #[arg(short, long, value_name = "SPEC")]
    pairs: String,

    /// Auth token (highest precedence)
    #[arg(long, value_name = "T")]
    token: Option<String>,

    /// File holding the auth token on its first line
    #[arg(long, value_name = "F")]
    token_file: Option<String>,

    /// Order book depth
    #[arg(short, long, value_name = "NUM", default_value_t = 10)]
    depth: u32,

    /// Output file (JSON Lines)
    #[arg(short, long, value_name = "FILE", default_value = "kraken_level3.jsonl")]
    output: String,

    /// Create a separate file per symbol
    #[arg(long)]
    separate_files: bool,

    /// Show per-symbol event counters
    #[arg(short = 'v', long)]
    show_events: bool,

    /// Show top-of-book on every record
    #[arg(long)]
    show_top: bool,

    /// Show every individual order event
    #[arg(long)]
    show_orders: bool,

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
    tools::validate_depth(args.depth, &tools::LEVEL3_DEPTHS)?;
    let parsed = cli::parse_pairs_spec(&args.pairs)?;
    tools::log_pairs(&parsed);

    let client = Level3Client::level3(args.depth);

    // Token precedence: explicit argument, then file, then environment.
    let resolved = match (&args.token, &args.token_file) {
        (Some(token), _) => client.set_token(token.clone()),
        (None, Some(path)) => client.set_token_from_file(path),
        (None, None) => client.set_token_from_env(),
    };
    if !resolved {
        anyhow::bail!("no authentication token: set --token, --token-file, or KRAKEN_WS_TOKEN");
    }

    info!(
        depth = args.depth,
        output = %args.output,
        separate_files = args.separate_files,
        segmentation = ?mode,
        "level3 capture starting"
    );

    client.set_output(&args.output, args.separate_files);
    client.set_flush_interval(args.flush_interval);
    client.set_memory_threshold(args.memory_threshold);
    client.set_segment_mode(mode)?;

    let (show_top, show_orders) = (args.show_top, args.show_orders);
    client.set_update_callback(move |record| {
        if show_orders {
            for order in &record.bids {
                display::show_order_event(&record.symbol, Side::Bid, order);
            }
            for order in &record.asks {
                display::show_order_event(&record.symbol, Side::Ask, order);
            }
        } else if show_top {
            display::show_level3_top(record);
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
        anyhow::bail!("failed to start level3 client");
    }
    info!("streaming live level3 data; Ctrl+C to stop and save");

    let mut status = tokio::time::interval(Duration::from_secs(10));
    status.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            _ = status.tick() => {
                let stats = client.stats();
                if !stats.is_empty() {
                    if args.show_events {
                        display::show_event_counts(&stats);
                    } else if !(show_top || show_orders) {
                        display::show_level3_status(&stats);
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
    let adds: u64 = stats.values().map(|s| s.add_events).sum();
    let deletes: u64 = stats.values().map(|s| s.delete_events).sum();
    info!(
        pairs = stats.len(),
        adds,
        deletes,
        written = client.records_written(),
        "capture finished"
    );
    Ok(())
}
