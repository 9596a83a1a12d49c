//! Order book state reconstruction for Kraken WebSocket v2 feeds.
//!
//! Two reconstructors live here:
//! - [`BookState`] applies Level 2 snapshot/delta records to sorted
//!   price-to-quantity maps
//! - [`Level3Book`] applies individual order events over a dual index
//!   (order id locator plus per-price buckets)
//!
//! plus the CRC32 top-of-book verifier and the microstructure metrics
//! calculated from either book.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod checksum;
pub mod l2;
pub mod l3;
pub mod metrics;

pub use checksum::{canonical_top_of_book, crc32_top_of_book, validate_record};
pub use l2::BookState;
pub use l3::{ApplySummary, Level3Book};
pub use metrics::{Level3SnapshotMetrics, SnapshotMetrics};
