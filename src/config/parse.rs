//! Suffix parsing for sizes, counts, and times
//!
//! Command-line quantities accept a numeric literal (float allowed) with an
//! optional unit suffix: `4k` request size, `1.5s` interval, `10M` request
//! count. Counts use decimal multipliers, sizes binary multipliers, times
//! scale to nanoseconds internally.

use anyhow::{bail, Result};

/// Split a literal into its numeric value and suffix text.
fn split_literal(input: &str) -> Result<(f64, &str)> {
    let s = input.trim();
    let mut end = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-')) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    let value: f64 = s[..end]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid number: \"{}\"", input))?;
    Ok((value, &s[end..]))
}

fn parse_suffix(input: &str, table: &[(&str, f64)]) -> Result<i64> {
    let (value, suffix) = split_literal(input)?;
    for &(txt, mul) in table {
        if suffix.eq_ignore_ascii_case(txt) {
            return Ok((value * mul) as i64);
        }
    }
    bail!("invalid suffix: \"{}\"", suffix);
}

/// Parse a count with decimal multipliers (`2k` = 2000).
pub fn parse_int(input: &str) -> Result<u64> {
    let table: &[(&str, f64)] = &[
        ("", 1.0),
        ("da", 10.0),
        ("k", 1e3),
        ("m", 1e6),
        ("g", 1e9),
        ("t", 1e12),
        ("p", 1e15),
        ("e", 1e18),
    ];
    let v = parse_suffix(input, table)?;
    if v < 0 {
        bail!("negative count: \"{}\"", input);
    }
    Ok(v as u64)
}

/// Parse a byte size with binary multipliers (`4k` = 4096, `s` = 512-byte
/// sectors, `p` = 4 KiB pages).
pub fn parse_size(input: &str) -> Result<u64> {
    let table: &[(&str, f64)] = &[
        ("", 1.0),
        ("b", 1.0),
        ("s", (1u64 << 9) as f64),
        ("k", (1u64 << 10) as f64),
        ("kb", (1u64 << 10) as f64),
        ("p", (1u64 << 12) as f64),
        ("m", (1u64 << 20) as f64),
        ("mb", (1u64 << 20) as f64),
        ("g", (1u64 << 30) as f64),
        ("gb", (1u64 << 30) as f64),
        ("t", (1u64 << 40) as f64),
        ("tb", (1u64 << 40) as f64),
        ("e", (1u64 << 60) as f64),
        ("eb", (1u64 << 60) as f64),
    ];
    let v = parse_suffix(input, table)?;
    if v < 0 {
        bail!("negative size: \"{}\"", input);
    }
    Ok(v as u64)
}

/// Parse a time span into nanoseconds. A bare number means seconds.
pub fn parse_time_ns(input: &str) -> Result<u64> {
    const US: f64 = 1e3;
    const MS: f64 = 1e6;
    const S: f64 = 1e9;
    let table: &[(&str, f64)] = &[
        ("ns", 1.0),
        ("nsec", 1.0),
        ("us", US),
        ("usec", US),
        ("ms", MS),
        ("msec", MS),
        ("", S),
        ("s", S),
        ("sec", S),
        ("m", S * 60.0),
        ("min", S * 60.0),
        ("h", S * 3600.0),
        ("hour", S * 3600.0),
        ("day", S * 86400.0),
        ("week", S * 86400.0 * 7.0),
        ("month", S * 86400.0 * 30.0),
        ("year", S * 86400.0 * 365.0),
    ];
    let v = parse_suffix(input, table)?;
    if v < 0 {
        bail!("negative time: \"{}\"", input);
    }
    Ok(v as u64)
}
