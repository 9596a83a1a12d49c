//! Callback-driven consumer: everything happens on the client's worker
//! thread, the main thread just waits. Callbacks must stay short — they
//! run before the next frame is read.
//!
//! ```text
//! cargo run --example callback_driven -- "BTC/USD"
//! ```

use feeds::BookClient;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let pairs: Vec<String> = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "BTC/USD".to_string())
        .split(',')
        .map(str::to_string)
        .collect();

    let client = BookClient::book(10, true);
    client.set_connection_callback(|connected| {
        println!("connection: {}", if connected { "up" } else { "down" });
    });
    client.set_error_callback(|e| eprintln!("error: {e}"));
    client.set_update_callback(|record| {
        if let (Some(bid), Some(ask)) = (record.bids.first(), record.asks.first()) {
            println!(
                "[{}] {} bid {} x {} | ask {} x {}",
                record.kind, record.symbol, bid.price, bid.qty, ask.price, ask.qty
            );
        }
    });

    if !client.start(&pairs) {
        eprintln!("failed to start client");
        std::process::exit(1);
    }

    std::thread::sleep(Duration::from_secs(30));
    client.stop();

    for (symbol, stats) in client.stats() {
        println!(
            "{symbol}: {} snapshots, {} updates",
            stats.snapshot_count, stats.update_count
        );
    }
}
