//! CRC32 verification of the reconstructed top of book.
//!
//! The exchange hashes a canonical rendering of the top 10 levels:
//! each ask as fixed-precision price then quantity, concatenated without
//! separators, then each bid likewise. The hash is plain IEEE CRC32
//! (reflected polynomial 0xEDB88320, init and final XOR 0xFFFFFFFF).

use common::types::{OrderBookRecord, PriceLevel};
use std::fmt::Write as _;

/// Levels per side included in the checksum
const CHECKSUM_DEPTH: usize = 10;

/// Build the canonical string the exchange hashes.
///
/// Takes `min(10, min(bids, asks))` levels per side; precision is pinned
/// to what the exchange hashes (10 decimals for price, 8 for quantity),
/// so the inputs must be the unrounded wire values.
#[must_use]
pub fn canonical_top_of_book(bids: &[PriceLevel], asks: &[PriceLevel]) -> String {
    let levels = CHECKSUM_DEPTH.min(bids.len()).min(asks.len());
    let mut out = String::with_capacity(levels * 44);

    for level in &asks[..levels] {
        let _ = write!(out, "{:.10}{:.8}", level.price, level.qty);
    }
    for level in &bids[..levels] {
        let _ = write!(out, "{:.10}{:.8}", level.price, level.qty);
    }

    out
}

/// CRC32 over the canonical top-of-book rendering
#[must_use]
pub fn crc32_top_of_book(bids: &[PriceLevel], asks: &[PriceLevel]) -> u32 {
    crc32fast::hash(canonical_top_of_book(bids, asks).as_bytes())
}

/// Validate a record's own levels against its announced checksum.
///
/// A book with an empty side cannot be validated and passes trivially.
#[must_use]
pub fn validate_record(record: &OrderBookRecord) -> bool {
    if record.bids.is_empty() || record.asks.is_empty() {
        return true;
    }
    crc32_top_of_book(&record.bids, &record.asks) == record.checksum
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::RecordKind;

    fn levels(pairs: &[(f64, f64)]) -> Vec<PriceLevel> {
        pairs.iter().map(|&(p, q)| PriceLevel::new(p, q)).collect()
    }

    #[test]
    fn canonical_string_is_asks_then_bids_fixed_precision() {
        let bids = levels(&[(100.0, 1.0)]);
        let asks = levels(&[(101.5, 2.25)]);
        let s = canonical_top_of_book(&bids, &asks);
        assert_eq!(
            s,
            "101.50000000002.25000000100.00000000001.00000000"
        );
    }

    #[test]
    fn canonical_string_truncates_to_shorter_side() {
        let bids = levels(&[(100.0, 1.0), (99.0, 1.0), (98.0, 1.0)]);
        let asks = levels(&[(101.0, 1.0)]);
        let s = canonical_top_of_book(&bids, &asks);
        // one level per side only
        assert_eq!(s, "101.00000000001.00000000100.00000000001.00000000");
    }

    #[test]
    fn crc_is_stable_and_order_sensitive() {
        let bids = levels(&[(100.0, 1.0), (99.0, 2.0)]);
        let asks = levels(&[(101.0, 1.0), (102.0, 2.0)]);
        let a = crc32_top_of_book(&bids, &asks);
        let b = crc32_top_of_book(&bids, &asks);
        assert_eq!(a, b);

        let swapped = crc32_top_of_book(&asks, &bids);
        assert_ne!(a, swapped);
    }

    #[test]
    fn tampered_checksum_fails_validation() {
        let bids = levels(&[(100.0, 1.0)]);
        let asks = levels(&[(101.0, 1.0)]);
        let good = crc32_top_of_book(&bids, &asks);

        let mut record = OrderBookRecord {
            timestamp: String::new(),
            symbol: "BTC/USD".into(),
            kind: RecordKind::Snapshot,
            bids,
            asks,
            checksum: good,
        };
        assert!(validate_record(&record));

        record.checksum = good.wrapping_add(1);
        assert!(!validate_record(&record));
    }

    #[test]
    fn empty_side_validates_trivially() {
        let record = OrderBookRecord {
            timestamp: String::new(),
            symbol: "BTC/USD".into(),
            kind: RecordKind::Update,
            bids: levels(&[(100.0, 1.0)]),
            asks: Vec::new(),
            checksum: 12345,
        };
        assert!(validate_record(&record));
    }

    #[test]
    fn known_crc32_vector() {
        // IEEE CRC32 of "123456789" is the classic check value
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
    }
}
