//! Sampling-interval parser for the offline snapshotter: `<number><unit>`
//! with units `s`, `m`, `h` (e.g. `1s`, `5m`, `1h`).

use common::FeedError;

/// Parse an interval string into whole seconds
pub fn parse_interval(s: &str) -> Result<u64, FeedError> {
    let s = s.trim();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| bad_interval(s, "missing unit"))?;
    if digits_end == 0 {
        return Err(bad_interval(s, "missing number"));
    }

    let value: u64 = s[..digits_end]
        .parse()
        .map_err(|_| bad_interval(s, "number out of range"))?;
    let seconds = match &s[digits_end..] {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        unit => return Err(bad_interval(s, &format!("unknown unit '{unit}'"))),
    };
    if seconds == 0 {
        return Err(bad_interval(s, "interval must be positive"));
    }
    Ok(seconds)
}

fn bad_interval(s: &str, why: &str) -> FeedError {
    FeedError::InputSpec(format!(
        "invalid interval '{s}' ({why}); expected <number><unit> such as 1s, 5m, 1h"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_forms() {
        assert_eq!(parse_interval("1s").unwrap(), 1);
        assert_eq!(parse_interval("30s").unwrap(), 30);
        assert_eq!(parse_interval("5m").unwrap(), 300);
        assert_eq!(parse_interval("2h").unwrap(), 7200);
    }

    #[test]
    fn rejected_forms() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("10").is_err());
        assert!(parse_interval("s").is_err());
        assert!(parse_interval("10d").is_err());
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("-5s").is_err());
    }
}
