//! Terminal rendering for the capture tools. These print to stdout —
//! they are the product of the `--show-*` flags, not logging.

use common::stats::{BookStats, Level3Stats, TickerStats};
use common::types::{Level3Order, Level3Record, OrderBookRecord, RecordKind, Side};
use rustc_hash::FxHashMap;

/// Periodic one-line status for the ticker tool
pub fn show_ticker_status(stats: &FxHashMap<String, TickerStats>) {
    let mut parts: Vec<String> = stats
        .iter()
        .map(|(symbol, s)| {
            format!(
                "{symbol}: {} msgs, last {}",
                s.total_messages, s.last
            )
        })
        .collect();
    parts.sort();
    println!("[STATUS] {}", parts.join(" | "));
}

/// Periodic one-line status for the book tool
pub fn show_book_status(stats: &FxHashMap<String, BookStats>) {
    let mut parts: Vec<String> = stats
        .iter()
        .map(|(symbol, s)| {
            format!(
                "{symbol}: {} snapshots, {} updates",
                s.snapshot_count, s.update_count
            )
        })
        .collect();
    parts.sort();
    println!("[STATUS] {}", parts.join(" | "));
}

/// What changed in one book record (`-v` on the book tool)
pub fn show_update_details(r: &OrderBookRecord) {
    if r.kind == RecordKind::Snapshot {
        println!(
            "[SNAPSHOT] {}: {} bids, {} asks",
            r.symbol,
            r.bids.len(),
            r.asks.len()
        );
        return;
    }
    let bid_changes = r.bids.iter().filter(|l| l.qty > 0.0).count();
    let ask_changes = r.asks.iter().filter(|l| l.qty > 0.0).count();
    println!(
        "[UPDATE] {}: {} bid{} changed, {} ask{} changed",
        r.symbol,
        bid_changes,
        if bid_changes == 1 { "" } else { "s" },
        ask_changes,
        if ask_changes == 1 { "" } else { "s" },
    );
}

/// Top-of-book line for a record that carries both sides
pub fn show_top_of_book(r: &OrderBookRecord) {
    let (Some(bid), Some(ask)) = (r.bids.first(), r.asks.first()) else {
        return;
    };
    println!(
        "[{}] Bid: ${:.2} ({}) | Ask: ${:.2} ({}) | Spread: ${:.2}",
        r.symbol,
        bid.price,
        bid.qty,
        ask.price,
        ask.qty,
        ask.price - bid.price
    );
}

/// Boxed two-column book view (single pair only)
pub fn show_full_book(r: &OrderBookRecord, max_depth: usize) {
    if r.bids.is_empty() || r.asks.is_empty() {
        println!("[{}] Order book empty", r.symbol);
        return;
    }
    let depth = max_depth.min(r.bids.len()).min(r.asks.len());

    println!("\n+--- {} Order Book (Depth: {depth}) ---+", r.symbol);
    println!("| Bids                  | Asks                  |");
    println!("+-----------------------+-----------------------+");
    for i in 0..depth {
        println!(
            "| ${:>9.2} [{:>8.4}] | [{:>8.4}] ${:>9.2} |",
            r.bids[i].price, r.bids[i].qty, r.asks[i].qty, r.asks[i].price
        );
    }
    println!("+-----------------------------------------------+\n");
}

/// Periodic one-line status for the level3 tool
pub fn show_level3_status(stats: &FxHashMap<String, Level3Stats>) {
    let mut parts: Vec<String> = stats
        .iter()
        .map(|(symbol, s)| {
            format!(
                "{symbol}: {} orders ({}b/{}a)",
                s.bid_order_count + s.ask_order_count,
                s.bid_order_count,
                s.ask_order_count
            )
        })
        .collect();
    parts.sort();
    println!("[STATUS] {}", parts.join(" | "));
}

/// Event counters per symbol (`-v` on the level3 tool)
pub fn show_event_counts(stats: &FxHashMap<String, Level3Stats>) {
    let mut parts: Vec<String> = stats
        .iter()
        .map(|(symbol, s)| {
            format!(
                "{symbol}: +{} ~{} -{}",
                s.add_events, s.modify_events, s.delete_events
            )
        })
        .collect();
    parts.sort();
    println!("[EVENTS] {}", parts.join(" | "));
}

/// Top-of-book line from a level3 record's leading orders
pub fn show_level3_top(r: &Level3Record) {
    let (Some(bid), Some(ask)) = (r.bids.first(), r.asks.first()) else {
        return;
    };
    println!(
        "[{}] Bid: ${:.2} ({}) | Ask: ${:.2} ({})",
        r.symbol, bid.limit_price, bid.order_qty, ask.limit_price, ask.order_qty
    );
}

/// One order event line (`--show-orders`)
pub fn show_order_event(symbol: &str, side: Side, order: &Level3Order) {
    let event = order.event.map_or("open", |e| e.as_str());
    println!(
        "[{event:>6}] {symbol} {side} {} @ ${} x {}",
        order.order_id, order.limit_price, order.order_qty
    );
}
