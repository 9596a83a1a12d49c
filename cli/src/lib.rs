//! Command-line plumbing shared by the capture tools: the pairs
//! specification parser and the sampling-interval parser.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod input;
pub mod interval;

pub use input::{parse_pairs_spec, PairsSource, ParsedPairs};
pub use interval::parse_interval;
