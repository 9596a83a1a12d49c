//! Real-time ingestion of Kraken WebSocket v2 market data.
//!
//! [`codec`] turns one inbound text frame into one typed event;
//! [`FeedClient`] owns the TLS socket and a single worker thread that
//! decodes, maintains per-symbol book state, persists through the
//! storage writers, and fans records out to a polling queue and
//! synchronous callbacks. Three channel instantiations cover the depth
//! tiers: [`TickerClient`] (L1), [`BookClient`] (L2), [`Level3Client`]
//! (L3).
//!
//! There is no automatic reconnection: a disconnect surfaces through the
//! connection and error callbacks and the worker exits; restart policy
//! belongs to the consumer.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod channels;
pub mod client;
pub mod codec;

pub use channels::{BookChannel, Channel, Level3Channel, TickerChannel};
pub use client::{BookClient, FeedClient, Level3Client, TickerClient, DEFAULT_ENDPOINT};
pub use codec::{decode, decode_book_line, decode_level3_line, peek_channel, WsEvent};
