//! Sampling-cadence and flow-rate tests for the archive replay engine.

use common::types::{
    Level3Order, Level3Record, OrderBookRecord, OrderEvent, PriceLevel, RecordKind,
};
use storage::{BookJsonl, Level3Jsonl, Level3SnapshotCsv, LineFormat, SnapshotCsv};
use tools::replay;

fn stamp(second: u64) -> String {
    format!("2025-04-17 14:00:{second:02}.000")
}

fn line<F: LineFormat>(record: &F::Record) -> std::io::Result<String> {
    let mut s = String::new();
    F::write_line(record, &mut s);
    Ok(s)
}

fn l2_snapshot(symbol: &str, second: u64) -> OrderBookRecord {
    OrderBookRecord {
        timestamp: stamp(second),
        symbol: symbol.into(),
        kind: RecordKind::Snapshot,
        bids: vec![PriceLevel::new(100.0, 1.0), PriceLevel::new(99.0, 2.0)],
        asks: vec![PriceLevel::new(101.0, 1.0), PriceLevel::new(102.0, 2.0)],
        checksum: 0,
    }
}

fn l2_update(symbol: &str, second: u64) -> OrderBookRecord {
    OrderBookRecord {
        timestamp: stamp(second),
        symbol: symbol.into(),
        kind: RecordKind::Update,
        bids: vec![PriceLevel::new(99.5, second as f64)],
        asks: vec![],
        checksum: 0,
    }
}

fn l3_snapshot(symbol: &str, second: u64) -> Level3Record {
    Level3Record {
        timestamp: stamp(second),
        symbol: symbol.into(),
        kind: RecordKind::Snapshot,
        bids: vec![Level3Order {
            order_id: "seed".into(),
            limit_price: 100.0,
            order_qty: 1.0,
            timestamp: "2025-04-17T14:00:00Z".into(),
            event: None,
        }],
        asks: vec![Level3Order {
            order_id: "seed-ask".into(),
            limit_price: 101.0,
            order_qty: 1.0,
            timestamp: "2025-04-17T14:00:00Z".into(),
            event: None,
        }],
        checksum: 0,
    }
}

fn l3_add(symbol: &str, second: u64) -> Level3Record {
    Level3Record {
        timestamp: stamp(second),
        symbol: symbol.into(),
        kind: RecordKind::Update,
        bids: vec![Level3Order {
            order_id: format!("o{second}"),
            limit_price: 99.0,
            order_qty: 1.0,
            timestamp: "2025-04-17T14:00:00Z".into(),
            event: Some(OrderEvent::Add),
        }],
        asks: vec![],
        checksum: 0,
    }
}

#[test]
fn l2_sampling_rows_match_interval() {
    // 10 seconds of records, sampled every 3 seconds -> floor(10/3) rows
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("metrics.csv");

    let mut lines = vec![line::<BookJsonl>(&l2_snapshot("BTC/USD", 0))];
    for second in 1..=10 {
        lines.push(line::<BookJsonl>(&l2_update("BTC/USD", second)));
    }

    let mut sink = replay::make_sink::<SnapshotCsv>(out.to_str().unwrap(), false);
    let summary = replay::replay_book(lines.into_iter(), 3, None, &mut sink).unwrap();

    assert_eq!(summary.records, 11);
    assert_eq!(summary.symbols, 1);
    assert_eq!(summary.rows, 3);

    let content = std::fs::read_to_string(&out).unwrap();
    let rows: Vec<&str> = content.lines().collect();
    assert_eq!(rows.len(), 4); // header + 3 rows
    assert!(rows[0].starts_with("timestamp,symbol,best_bid"));
    assert!(rows[1].starts_with(&stamp(3)));
    assert!(rows[2].starts_with(&stamp(6)));
    assert!(rows[3].starts_with(&stamp(9)));
}

#[test]
fn l3_sampling_emits_flow_rates_and_resets_counters() {
    // one add per second, sampled every 2 seconds -> 2 adds per window,
    // arrival rate 1.0/s in every row
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("metrics.csv");

    let mut lines = vec![line::<Level3Jsonl>(&l3_snapshot("BTC/USD", 0))];
    for second in 1..=10 {
        lines.push(line::<Level3Jsonl>(&l3_add("BTC/USD", second)));
    }

    let mut sink = replay::make_sink::<Level3SnapshotCsv>(out.to_str().unwrap(), false);
    let summary = replay::replay_level3(lines.into_iter(), 2, None, &mut sink).unwrap();

    assert_eq!(summary.rows, 5);

    let content = std::fs::read_to_string(&out).unwrap();
    let header: Vec<&str> = content.lines().next().unwrap().split(',').collect();
    let add_idx = header.iter().position(|c| *c == "add_events").unwrap();
    let rate_idx = header
        .iter()
        .position(|c| *c == "order_arrival_rate")
        .unwrap();

    for row in content.lines().skip(1) {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields[add_idx], "2", "row: {row}");
        assert_eq!(fields[rate_idx], "1", "row: {row}");
    }
}

#[test]
fn symbol_filter_restricts_processing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("metrics.csv");

    let mut lines = vec![
        line::<BookJsonl>(&l2_snapshot("BTC/USD", 0)),
        line::<BookJsonl>(&l2_snapshot("ETH/USD", 0)),
    ];
    for second in 1..=5 {
        lines.push(line::<BookJsonl>(&l2_update("BTC/USD", second)));
        lines.push(line::<BookJsonl>(&l2_update("ETH/USD", second)));
    }

    let filter = vec!["BTC/USD".to_string()];
    let mut sink = replay::make_sink::<SnapshotCsv>(out.to_str().unwrap(), false);
    let summary =
        replay::replay_book(lines.into_iter(), 2, Some(&filter), &mut sink).unwrap();

    assert_eq!(summary.symbols, 1);
    let content = std::fs::read_to_string(&out).unwrap();
    assert!(content.contains("BTC/USD"));
    assert!(!content.contains("ETH/USD"));
}

#[test]
fn separate_files_fan_out_per_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("metrics.csv");

    let mut lines = Vec::new();
    for symbol in ["BTC/USD", "ETH/USD"] {
        lines.push(line::<BookJsonl>(&l2_snapshot(symbol, 0)));
        for second in 1..=4 {
            lines.push(line::<BookJsonl>(&l2_update(symbol, second)));
        }
    }

    let mut sink = replay::make_sink::<SnapshotCsv>(out.to_str().unwrap(), true);
    let summary = replay::replay_book(lines.into_iter(), 2, None, &mut sink).unwrap();
    assert_eq!(summary.symbols, 2);

    let btc = std::fs::read_to_string(dir.path().join("metrics_BTC_USD.csv")).unwrap();
    let eth = std::fs::read_to_string(dir.path().join("metrics_ETH_USD.csv")).unwrap();
    assert_eq!(btc.lines().count(), 3); // header + 2 samples
    assert_eq!(eth.lines().count(), 3);
}

#[test]
fn crossed_book_is_reported_and_row_still_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("metrics.csv");

    // bid 102 over ask 101 at the sample point
    let crossed = OrderBookRecord {
        timestamp: stamp(0),
        symbol: "BTC/USD".into(),
        kind: RecordKind::Snapshot,
        bids: vec![PriceLevel::new(102.0, 1.0)],
        asks: vec![PriceLevel::new(101.0, 1.0)],
        checksum: 0,
    };
    let lines = vec![
        line::<BookJsonl>(&crossed),
        line::<BookJsonl>(&l2_update("BTC/USD", 3)),
    ];

    let mut sink = replay::make_sink::<SnapshotCsv>(out.to_str().unwrap(), false);
    let summary = replay::replay_book(lines.into_iter(), 2, None, &mut sink).unwrap();

    assert_eq!(summary.crossed, 1);
    assert_eq!(summary.rows, 1);
    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content.lines().count(), 2); // header + the sampled row
    assert!(content.contains("BTC/USD"));
}

#[test]
fn undecodable_lines_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("metrics.csv");

    let lines = vec![
        line::<BookJsonl>(&l2_snapshot("BTC/USD", 0)),
        Ok("this is not json".to_string()),
        line::<BookJsonl>(&l2_update("BTC/USD", 3)),
    ];

    let mut sink = replay::make_sink::<SnapshotCsv>(out.to_str().unwrap(), false);
    let summary = replay::replay_book(lines.into_iter(), 2, None, &mut sink).unwrap();
    assert_eq!(summary.records, 2);
    assert_eq!(summary.skipped, 1);
}
