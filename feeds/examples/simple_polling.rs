//! Minimal polling consumer: start the ticker client, poll the pending
//! queue a few times a second, print what arrives, save the session
//! history on exit.
//!
//! ```text
//! cargo run --example simple_polling -- "BTC/USD,ETH/USD"
//! ```

use feeds::TickerClient;
use std::time::{Duration, Instant};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let pairs: Vec<String> = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "BTC/USD".to_string())
        .split(',')
        .map(str::to_string)
        .collect();

    let client = TickerClient::ticker();
    client.set_error_callback(|e| eprintln!("error: {e}"));

    if !client.start(&pairs) {
        eprintln!("failed to start client");
        std::process::exit(1);
    }
    println!("polling for 30 seconds...");

    // Poll well above twice per flush interval so the pending queue
    // never grows unbounded.
    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline {
        for record in client.get_updates() {
            println!(
                "{} {} last={} bid={} ask={}",
                record.timestamp, record.pair, record.last, record.bid, record.ask
            );
        }
        std::thread::sleep(Duration::from_millis(250));
    }

    client.stop();
    if let Err(e) = client.save_snapshot("ticker_history.csv") {
        eprintln!("could not save history: {e}");
    } else {
        println!("saved {} records to ticker_history.csv", client.history_len());
    }
}
