//! Live Level 1 capture: subscribe to the ticker channel and persist
//! every record to CSV.
//!
//! ```text
//! kraken-ticker -p "BTC/USD,ETH/USD"
//! kraken-ticker -p pairs.csv:symbol:25 -o ticks.csv --hourly
//! ```

use anyhow::Result;
use clap::Parser;
use feeds::TickerClient;
use std::time::Duration;
use storage::{DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MEMORY_THRESHOLD_BYTES};
use tools::display;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "kraken-ticker",
    version,
    about = "Capture real-time Level 1 ticker data from the Kraken WebSocket v2 API",
    after_help = "Polling consumers must call get_updates at least twice per flush \
                  interval; this tool relies on the writer drain instead."
)]
struct Args {
    /// Pairs: inline list ("BTC/USD,ETH/USD"), CSV column
    /// (pairs.csv:symbol[:N]), or text file (pairs.txt[:N])
    #[arg(short, long, value_name = "SPEC")]
    pairs: String,

    /// Output CSV file
    #[arg(short, long, value_name = "FILE", default_value = "kraken_ticker.csv")]
    output: String,

    /// Flush interval in seconds (0 disables the time trigger)
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_FLUSH_INTERVAL_SECS)]
    flush_interval: u64,

    /// Memory threshold in bytes (0 disables the memory trigger)
    #[arg(short, long, value_name = "BYTES", default_value_t = DEFAULT_MEMORY_THRESHOLD_BYTES)]
    memory_threshold: usize,

    /// Rotate the output file hourly (UTC): output.YYYYMMDD_HH.csv
    #[arg(long)]
    hourly: bool,

    /// Rotate the output file daily (UTC): output.YYYYMMDD.csv
    #[arg(long)]
    daily: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tools::init_tracing();
    let args = tools::parse_args::<Args>();

    let mode = tools::segment_mode(args.hourly, args.daily)?;
    let parsed = cli::parse_pairs_spec(&args.pairs)?;
    tools::log_pairs(&parsed);
    info!(
        output = %args.output,
        flush_interval = args.flush_interval,
        memory_threshold = args.memory_threshold,
        segmentation = ?mode,
        "ticker capture starting"
    );

    let client = TickerClient::ticker();
    client.set_output(&args.output, false);
    client.set_flush_interval(args.flush_interval);
    client.set_memory_threshold(args.memory_threshold);
    client.set_segment_mode(mode)?;

    client.set_connection_callback(|connected| {
        info!(
            "websocket {}",
            if connected { "connected" } else { "disconnected" }
        );
    });
    client.set_error_callback(|e| error!("{e}"));

    if !client.start(&parsed.symbols) {
        anyhow::bail!("failed to start ticker client");
    }
    info!("streaming live ticker data; Ctrl+C to stop and save");

    let mut status = tokio::time::interval(Duration::from_secs(10));
    status.tick().await; // first tick is immediate
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            _ = status.tick() => {
                let stats = client.stats();
                if !stats.is_empty() {
                    display::show_ticker_status(&stats);
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
    let total: u64 = stats.values().map(|s| s.total_messages).sum();
    info!(
        pairs = stats.len(),
        records = total,
        written = client.records_written(),
        "capture finished"
    );
    Ok(())
}
