//! Ingestion client: one TLS WebSocket, one background worker, a pending
//! queue for polling consumers, a policy-driven writer, and synchronous
//! callbacks.
//!
//! All decoding, state mutation, buffer appends, writes, and callback
//! invocations happen on the worker thread; the public API is thread-safe
//! and non-blocking. Callbacks run on the worker before the next frame is
//! read — keep them short.
//!
//! The pending queue and the writer buffer are independent, but the
//! pending queue is cleared whenever the writer drains to disk, so
//! callback-only consumers do not leak memory. Polling consumers must
//! call [`FeedClient::get_updates`] at least twice per flush interval.

use crate::channels::{Channel, Level3Channel};
use crate::codec;
use common::time::utc_timestamp_millis;
use common::FeedError;
use futures_util::{SinkExt, StreamExt};
use rustc_hash::FxHashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use storage::{MultiFileWriter, SegmentMode, SegmentedWriter, Sink};
use tokio::sync::Notify;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

/// Production endpoint for the exchange's WebSocket v2 API
pub const DEFAULT_ENDPOINT: &str = "wss://ws.kraken.com/v2";

type UpdateCallback<R> = Box<dyn Fn(&R) + Send>;
type ConnectionCallback = Box<dyn Fn(bool) + Send>;
type ErrorCallback = Box<dyn Fn(&FeedError) + Send>;

struct Callbacks<R> {
    update: Option<UpdateCallback<R>>,
    connection: Option<ConnectionCallback>,
    error: Option<ErrorCallback>,
}

impl<R> Default for Callbacks<R> {
    fn default() -> Self {
        Self {
            update: None,
            connection: None,
            error: None,
        }
    }
}

/// Pending queue and writer, guarded together: the queue is cleared at
/// the same moment the writer drains.
struct DataState<C: Channel> {
    pending: Vec<C::Record>,
    sink: Sink<C::Format>,
}

impl<C: Channel> Default for DataState<C> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            sink: Sink::Disabled,
        }
    }
}

struct ClientShared<C: Channel> {
    running: AtomicBool,
    connected: AtomicBool,
    endpoint: String,
    channel: Mutex<C>,
    data: Mutex<DataState<C>>,
    callbacks: Mutex<Callbacks<C::Record>>,
    symbols: Mutex<Vec<String>>,
    shutdown: Notify,
}

/// A channel-generic ingestion client. Concrete instantiations:
/// [`TickerClient`], [`BookClient`], [`Level3Client`].
pub struct FeedClient<C: Channel> {
    shared: Arc<ClientShared<C>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Level 1 ticker client
pub type TickerClient = FeedClient<crate::channels::TickerChannel>;
/// Level 2 aggregated book client
pub type BookClient = FeedClient<crate::channels::BookChannel>;
/// Level 3 order-by-order client
pub type Level3Client = FeedClient<Level3Channel>;

impl TickerClient {
    /// Ticker client against the production endpoint
    #[must_use]
    pub fn ticker() -> Self {
        Self::new(crate::channels::TickerChannel::new())
    }

    /// Ticker records retained in the session history
    #[must_use]
    pub fn history_len(&self) -> usize {
        lock(&self.shared.channel).history_len()
    }
}

impl BookClient {
    /// Book client subscribing at `depth` levels
    #[must_use]
    pub fn book(depth: u32, validate_checksums: bool) -> Self {
        Self::new(crate::channels::BookChannel::new(depth, validate_checksums))
    }
}

impl Level3Client {
    /// Level 3 client subscribing at `depth` orders per side
    #[must_use]
    pub fn level3(depth: u32) -> Self {
        Self::new(Level3Channel::new(depth))
    }
}

impl<C: Channel> FeedClient<C> {
    /// Client over `channel` against the production endpoint
    #[must_use]
    pub fn new(channel: C) -> Self {
        Self::with_endpoint(channel, DEFAULT_ENDPOINT)
    }

    /// Client against a non-default endpoint (tests, mirrors)
    #[must_use]
    pub fn with_endpoint(channel: C, endpoint: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                running: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                endpoint: endpoint.into(),
                channel: Mutex::new(channel),
                data: Mutex::new(DataState::default()),
                callbacks: Mutex::new(Callbacks::default()),
                symbols: Mutex::new(Vec::new()),
                shutdown: Notify::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Begin the worker. Returns immediately; `false` when already
    /// running, when `symbols` is empty, or when channel preparation
    /// fails (missing level3 token).
    pub fn start(&self, symbols: &[String]) -> bool {
        if symbols.is_empty() {
            warn!(channel = C::NAME, "no symbols provided");
            return false;
        }
        if self.shared.running.swap(true, Ordering::AcqRel) {
            warn!(channel = C::NAME, "client already running");
            return false;
        }

        if let Err(e) = lock(&self.shared.channel).prepare(symbols) {
            self.shared.report(&e);
            self.shared.running.store(false, Ordering::Release);
            return false;
        }
        *lock(&self.shared.symbols) = symbols.to_vec();

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name(format!("{}-worker", C::NAME))
            .spawn(move || worker_main(shared));
        match spawned {
            Ok(handle) => {
                *lock(&self.worker) = Some(handle);
                info!(channel = C::NAME, symbols = symbols.len(), "client started");
                true
            }
            Err(e) => {
                self.shared.report(&FeedError::ConnectionLost(format!(
                    "cannot spawn worker thread: {e}"
                )));
                self.shared.running.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Signal shutdown, drain the writer, join the worker. Idempotent.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.shutdown.notify_one();
        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                error!(channel = C::NAME, "worker thread panicked");
            }
        }
    }

    /// Whether the worker is alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Whether the socket is currently open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Records waiting in the polling queue
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.data).pending.len()
    }

    /// Move the pending queue out, leaving it empty
    #[must_use]
    pub fn get_updates(&self) -> Vec<C::Record> {
        std::mem::take(&mut lock(&self.shared.data).pending)
    }

    /// Callback invoked synchronously on the worker for every record
    pub fn set_update_callback(&self, callback: impl Fn(&C::Record) + Send + 'static) {
        lock(&self.shared.callbacks).update = Some(Box::new(callback));
    }

    /// Callback invoked on connect (true) and disconnect (false)
    pub fn set_connection_callback(&self, callback: impl Fn(bool) + Send + 'static) {
        lock(&self.shared.callbacks).connection = Some(Box::new(callback));
    }

    /// Callback invoked for every surfaced error
    pub fn set_error_callback(&self, callback: impl Fn(&FeedError) + Send + 'static) {
        lock(&self.shared.callbacks).error = Some(Box::new(callback));
    }

    /// Route records to `path`; with `separate_files` each symbol gets
    /// its own file (symbol token inserted before the extension)
    pub fn set_output(&self, path: &str, separate_files: bool) {
        let sink = if separate_files {
            Sink::PerSymbol(MultiFileWriter::create(path))
        } else {
            Sink::Single(SegmentedWriter::create(path))
        };
        lock(&self.shared.data).sink = sink;
    }

    /// Writer time trigger in seconds; 0 disables
    pub fn set_flush_interval(&self, secs: u64) {
        lock(&self.shared.data).sink.set_flush_interval(secs);
    }

    /// Writer memory trigger in bytes; 0 disables
    pub fn set_memory_threshold(&self, bytes: usize) {
        lock(&self.shared.data).sink.set_memory_threshold(bytes);
    }

    /// Writer wall-clock segmentation
    pub fn set_segment_mode(&self, mode: SegmentMode) -> Result<(), FeedError> {
        lock(&self.shared.data).sink.set_segment_mode(mode)
    }

    /// Force a writer drain; also clears the pending queue, keeping the
    /// documented queue/disk coupling
    pub fn flush(&self) -> Result<(), FeedError> {
        let mut data = lock(&self.shared.data);
        data.sink.flush()?;
        data.pending.clear();
        Ok(())
    }

    /// Records the writer has put on disk
    #[must_use]
    pub fn records_written(&self) -> u64 {
        lock(&self.shared.data).sink.records_written()
    }

    /// Per-symbol statistics snapshot
    #[must_use]
    pub fn stats(&self) -> FxHashMap<String, C::Stats> {
        lock(&self.shared.channel).stats()
    }

    /// Write the channel's current state to `path` (ticker history CSV,
    /// or one metrics row per symbol for the book channels). Invariant
    /// violations found while sampling — a crossed book — reach the
    /// error callback; their rows are still written.
    pub fn save_snapshot(&self, path: &str) -> Result<(), FeedError> {
        let mut reports = Vec::new();
        let result = lock(&self.shared.channel).save_snapshot(path, &mut reports);
        for report in &reports {
            self.shared.report(report);
        }
        result
    }
}

impl Level3Client {
    /// Install the auth token directly (highest precedence)
    pub fn set_token(&self, token: impl Into<String>) -> bool {
        lock(&self.shared.channel).set_token(token)
    }

    /// Read the auth token from a file (middle precedence)
    pub fn set_token_from_file(&self, path: &str) -> bool {
        lock(&self.shared.channel).set_token_from_file(path)
    }

    /// Read the auth token from `KRAKEN_WS_TOKEN` (lowest precedence)
    pub fn set_token_from_env(&self) -> bool {
        lock(&self.shared.channel).set_token_from_env()
    }
}

impl<C: Channel> Drop for FeedClient<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Mutex poisoning cannot leave these structures in a half-written state
/// worth preserving; recover the guard and continue.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl<C: Channel> ClientShared<C> {
    fn report(&self, e: &FeedError) {
        error!(channel = C::NAME, error = %e, "feed error");
        if let Some(callback) = &lock(&self.callbacks).error {
            callback(e);
        }
    }

    fn notify_connection(&self, connected: bool) {
        if let Some(callback) = &lock(&self.callbacks).connection {
            callback(connected);
        }
    }

    /// Decode one frame, fold it into channel state, persist, and fan
    /// out. `Break` ends the session (rejected subscription).
    fn handle_frame(&self, payload: &str) -> ControlFlow<()> {
        let received = utc_timestamp_millis();
        let event = match codec::decode(payload, &received) {
            Ok(event) => event,
            Err(e) => {
                self.report(&e);
                return ControlFlow::Continue(());
            }
        };
        // Ticker scale: one symbol per item, so per-frame vectors stay tiny.
        let mut records = Vec::new();
        let mut reports = Vec::new();
        let outcome = lock(&self.channel).apply(event, &mut records, &mut reports);
        for report in &reports {
            self.report(report);
        }
        if let Err(fatal) = outcome {
            self.report(&fatal);
            return ControlFlow::Break(());
        }

        for record in records {
            {
                let mut data = lock(&self.data);
                data.pending.push(record.clone());
                match data.sink.write(&record) {
                    Ok(true) => data.pending.clear(),
                    Ok(false) => {
                        // A degraded sink will never drain again; dropping
                        // here keeps the queue bounded in callback-only mode.
                        if data.sink.is_degraded() {
                            data.pending.clear();
                        }
                    }
                    Err(e) => {
                        data.pending.clear();
                        drop(data);
                        self.report(&e);
                    }
                }
            }
            if let Some(callback) = &lock(&self.callbacks).update {
                callback(&record);
            }
        }
        ControlFlow::Continue(())
    }
}

/// Worker thread body: a current-thread runtime driving one socket
/// session, then a final drain.
fn worker_main<C: Channel>(shared: Arc<ClientShared<C>>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    match runtime {
        Ok(runtime) => runtime.block_on(run_session(&shared)),
        Err(e) => shared.report(&FeedError::ConnectionLost(format!(
            "cannot build worker runtime: {e}"
        ))),
    }

    // Final drain: records in flight at shutdown complete their write.
    {
        let mut data = lock(&shared.data);
        if let Err(e) = data.sink.flush() {
            drop(data);
            shared.report(&e);
        } else {
            data.pending.clear();
        }
    }
    shared.connected.store(false, Ordering::Release);
    shared.running.store(false, Ordering::Release);
}

async fn run_session<C: Channel>(shared: &Arc<ClientShared<C>>) {
    let subscription = {
        let symbols = lock(&shared.symbols).clone();
        lock(&shared.channel).subscription(&symbols)
    };

    info!(channel = C::NAME, endpoint = %shared.endpoint, "connecting");
    let (stream, _response) = match connect_async(shared.endpoint.as_str()).await {
        Ok(connected) => connected,
        Err(e) => {
            shared.report(&FeedError::ConnectionLost(e.to_string()));
            return;
        }
    };
    shared.connected.store(true, Ordering::Release);
    shared.notify_connection(true);

    let (mut tx, mut rx) = stream.split();
    if let Err(e) = tx.send(Message::Text(subscription)).await {
        shared.report(&FeedError::ConnectionLost(format!("subscribe send: {e}")));
        shared.connected.store(false, Ordering::Release);
        shared.notify_connection(false);
        return;
    }
    info!(channel = C::NAME, "subscription sent");

    loop {
        tokio::select! {
            _ = shared.shutdown.notified() => {
                let _ = tx.send(Message::Close(None)).await;
                break;
            }
            frame = rx.next() => match frame {
                Some(Ok(Message::Text(payload))) => {
                    if shared.handle_frame(&payload).is_break() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if tx.send(Message::Pong(payload)).await.is_err() {
                        shared.report(&FeedError::ConnectionLost("pong send failed".into()));
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    shared.report(&FeedError::ConnectionLost("closed by server".into()));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    shared.report(&FeedError::ConnectionLost(e.to_string()));
                    break;
                }
                None => {
                    shared.report(&FeedError::ConnectionLost("stream ended".into()));
                    break;
                }
            }
        }
        if !shared.running.load(Ordering::Acquire) {
            break;
        }
    }

    shared.connected.store(false, Ordering::Release);
    shared.notify_connection(false);
}
