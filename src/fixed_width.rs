//! Column slicing for NOAA fixed-width text formats.

use crate::{Error, Result};

/// Characters `start..end` of `line`, or an error naming the line when it is too short.
pub fn require(line: &str, start: usize, end: usize) -> Result<&str> {
    line.get(start..end).ok_or_else(|| {
        Error::decode(format!(
            "line of {} chars, need columns {}..{}: {:?}",
            line.len(),
            start,
            end,
            truncate(line)
        ))
    })
}

/// Characters `start..end` of `line`, clipped to the line length. Trailing
/// columns that are blank are often dropped from the files entirely.
pub fn lenient(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("")
}

/// Trimmed text, `None` when blank.
pub fn text(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Single flag character, `None` when blank.
pub fn flag(s: &str) -> Option<char> {
    s.chars().next().filter(|c| !c.is_whitespace())
}

/// Integer with an explicit missing-value sentinel.
pub fn int(s: &str, missing: i32) -> Option<i32> {
    s.trim().parse::<i32>().ok().filter(|&v| v != missing)
}

/// Float with an explicit missing-value sentinel.
pub fn float(s: &str, missing: f64) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|&v| (v - missing).abs() > f64::EPSILON)
}

fn truncate(line: &str) -> String {
    line.chars().take(40).collect()
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_slice_or_fail() {
        assert_eq!(require("USC00011084", 0, 2).unwrap(), "US");
        assert!(require("USC", 0, 11).is_err());
    }

    #[test]
    fn should_clip_lenient_slices() {
        assert_eq!(lenient("abcdef", 2, 10), "cdef");
        assert_eq!(lenient("abc", 5, 10), "");
    }

    #[test]
    fn should_filter_sentinels() {
        assert_eq!(int("-9999", -9999), None);
        assert_eq!(int("  217", -9999), Some(217));
        assert_eq!(int("+0123", 9999), Some(123));
        assert_eq!(float(" -999.9 ", -999.9), None);
        assert_eq!(float("  44.4200", -999.9), Some(44.42));
    }

    #[test]
    fn should_read_flags() {
        assert_eq!(flag(" "), None);
        assert_eq!(flag("S"), Some('S'));
        assert_eq!(text("   "), None);
        assert_eq!(text(" VT "), Some("VT".to_string()));
    }
}
