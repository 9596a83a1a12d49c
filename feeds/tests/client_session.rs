//! End-to-end ingestion tests against a local WebSocket server: connect,
//! subscribe, receive frames, persist, poll, shut down.

use feeds::{BookChannel, BookClient, FeedClient, TickerChannel, TickerClient};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const ACK: &str = r#"{"method":"subscribe","success":true}"#;

/// Accept one connection, expect a subscribe message, reply with `ack`,
/// stream `frames`, then hold the socket until the client closes.
async fn serve_once(listener: TcpListener, ack: &str, frames: Vec<String>) -> String {
    let (socket, _) = listener.accept().await.expect("accept");
    let mut ws = accept_async(socket).await.expect("handshake");

    let subscription = match ws.next().await {
        Some(Ok(Message::Text(text))) => text,
        other => panic!("expected subscription, got {other:?}"),
    };

    ws.send(Message::Text(ack.to_string())).await.expect("ack");
    for frame in frames {
        ws.send(Message::Text(frame)).await.expect("frame");
    }

    // Drain until the client closes.
    while let Some(Ok(message)) = ws.next().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }
    subscription
}

async fn bound_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    (listener, addr)
}

async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ticker_session_polling_and_writer() {
    let (listener, addr) = bound_listener().await;
    let frames = vec![
        r#"{"channel":"heartbeat"}"#.to_string(),
        r#"{"channel":"ticker","type":"snapshot","data":[{"symbol":"BTC/USD","bid":100.0,"ask":101.0,"last":100.5}]}"#.to_string(),
        r#"{"channel":"ticker","type":"update","data":[{"symbol":"BTC/USD","bid":100.1,"ask":101.1,"last":100.6}]}"#.to_string(),
    ];
    let server = tokio::spawn(serve_once(listener, ACK, frames));

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("ticks.csv");

    let client: TickerClient = FeedClient::with_endpoint(TickerChannel::new(), format!("ws://{addr}"));
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_cb = Arc::clone(&seen);
    client.set_update_callback(move |_record| {
        seen_cb.fetch_add(1, Ordering::SeqCst);
    });
    client.set_output(out.to_str().unwrap(), false);
    client.set_flush_interval(0);
    client.set_memory_threshold(0);

    assert!(client.start(&["BTC/USD".to_string()]));
    assert!(client.is_running());
    // starting twice is refused
    assert!(!client.start(&["BTC/USD".to_string()]));

    wait_for("two ticker records", || {
        seen.load(Ordering::SeqCst) >= 2
    })
    .await;
    wait_for("pending queue", || client.pending_count() >= 2).await;

    let updates = client.get_updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].pair, "BTC/USD");
    assert_eq!(updates[0].bid, 100.0);
    assert_eq!(client.pending_count(), 0);

    let stats = client.stats();
    assert_eq!(stats["BTC/USD"].snapshot_count, 1);
    assert_eq!(stats["BTC/USD"].update_count, 1);

    client.stop();
    assert!(!client.is_running());

    // final drain on shutdown wrote header + 2 rows
    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.starts_with("timestamp,pair,type"));

    let subscription = server.await.unwrap();
    assert!(subscription.contains("\"channel\":\"ticker\""));
    assert!(subscription.contains("BTC/USD"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn book_session_reconstructs_state() {
    let (listener, addr) = bound_listener().await;
    let frames = vec![
        r#"{"channel":"book","type":"snapshot","data":[{"symbol":"BTC/USD","bids":[{"price":100.0,"qty":1.0},{"price":99.0,"qty":2.0}],"asks":[{"price":101.0,"qty":1.0},{"price":102.0,"qty":2.0}],"checksum":0}]}"#.to_string(),
        r#"{"channel":"book","type":"update","data":[{"symbol":"BTC/USD","bids":[{"price":99.0,"qty":0.0},{"price":98.0,"qty":3.0}],"asks":[],"checksum":0}]}"#.to_string(),
    ];
    let server = tokio::spawn(serve_once(listener, ACK, frames));

    let client: BookClient =
        FeedClient::with_endpoint(BookChannel::new(10, false), format!("ws://{addr}"));
    assert!(client.start(&["BTC/USD".to_string()]));

    wait_for("two book records", || client.pending_count() >= 2).await;

    let updates = client.get_updates();
    assert_eq!(updates.len(), 2);

    let stats = client.stats();
    assert_eq!(stats["BTC/USD"].snapshot_count, 1);
    assert_eq!(stats["BTC/USD"].update_count, 1);
    assert_eq!(stats["BTC/USD"].best_bid, 100.0);

    client.stop();
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_subscription_surfaces_and_stops() {
    let (listener, addr) = bound_listener().await;
    let reject = r#"{"method":"subscribe","success":false,"error":"Currency pair not supported"}"#;
    let server = tokio::spawn(serve_once(listener, reject, Vec::new()));

    let client: TickerClient =
        FeedClient::with_endpoint(TickerChannel::new(), format!("ws://{addr}"));
    let errors = Arc::new(AtomicUsize::new(0));
    let errors_cb = Arc::clone(&errors);
    client.set_error_callback(move |_e| {
        errors_cb.fetch_add(1, Ordering::SeqCst);
    });

    assert!(client.start(&["NOPE/NOPE".to_string()]));
    wait_for("worker exit", || !client.is_running()).await;
    assert!(errors.load(Ordering::SeqCst) >= 1);

    client.stop();
    server.abort();
    let _ = server.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writer_drain_clears_the_pending_queue() {
    let (listener, addr) = bound_listener().await;
    let mut frames = Vec::new();
    for i in 0..20 {
        frames.push(format!(
            r#"{{"channel":"ticker","type":"update","data":[{{"symbol":"BTC/USD","last":{i}.0}}]}}"#
        ));
    }
    let server = tokio::spawn(serve_once(listener, ACK, frames));

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("ticks.csv");

    let client: TickerClient =
        FeedClient::with_endpoint(TickerChannel::new(), format!("ws://{addr}"));
    client.set_output(out.to_str().unwrap(), false);
    client.set_flush_interval(0);
    client.set_memory_threshold(1); // drain on every record

    assert!(client.start(&["BTC/USD".to_string()]));
    wait_for("all records on disk", || client.records_written() >= 20).await;

    // every write drained, so the queue never accumulated
    assert_eq!(client.pending_count(), 0);

    client.stop();
    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content.lines().count(), 21); // header + 20 rows

    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_writer_degrades_and_bounds_the_pending_queue() {
    let (listener, addr) = bound_listener().await;
    let mut frames = Vec::new();
    for i in 0..50 {
        frames.push(format!(
            r#"{{"channel":"ticker","type":"update","data":[{{"symbol":"BTC/USD","last":{i}.0}}]}}"#
        ));
    }
    let server = tokio::spawn(serve_once(listener, ACK, frames));

    let client: TickerClient =
        FeedClient::with_endpoint(TickerChannel::new(), format!("ws://{addr}"));
    let errors = Arc::new(AtomicUsize::new(0));
    let errors_cb = Arc::clone(&errors);
    client.set_error_callback(move |_e| {
        errors_cb.fetch_add(1, Ordering::SeqCst);
    });
    // unwritable target; the memory trigger fires on the first record
    client.set_output("/nonexistent-dir/definitely/absent.csv", false);
    client.set_flush_interval(0);
    client.set_memory_threshold(1);

    let seen = Arc::new(AtomicUsize::new(0));
    let seen_cb = Arc::clone(&seen);
    client.set_update_callback(move |_record| {
        seen_cb.fetch_add(1, Ordering::SeqCst);
    });

    assert!(client.start(&["BTC/USD".to_string()]));
    wait_for("all records processed", || {
        seen.load(Ordering::SeqCst) >= 50
    })
    .await;

    // writer failed at least once, ingestion kept going, queue bounded
    assert!(errors.load(Ordering::SeqCst) >= 1);
    assert_eq!(client.pending_count(), 0);
    assert_eq!(client.records_written(), 0);

    client.stop();
    server.abort();
    let _ = server.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn level3_without_token_refuses_to_start() {
    let client = feeds::Level3Client::level3(10);
    let errors = Arc::new(AtomicUsize::new(0));
    let errors_cb = Arc::clone(&errors);
    client.set_error_callback(move |_e| {
        errors_cb.fetch_add(1, Ordering::SeqCst);
    });

    assert!(!client.start(&["BTC/USD".to_string()]));
    assert!(!client.is_running());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_symbol_list_refuses_to_start() {
    let client = TickerClient::ticker();
    assert!(!client.start(&[]));
    assert!(!client.is_running());
}
