//! Formatting helpers for durations, sizes, and rates

use std::time::Duration;

/// Format a duration with an auto-scaled unit.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use iolat::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_nanos(500)), "500 ns");
/// assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50 us");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50 ms");
/// assert_eq!(format_duration(Duration::from_secs(5)), "5.00 s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    format_duration_ns(duration.as_nanos() as u64)
}

/// Format a nanosecond count with an auto-scaled unit.
pub fn format_duration_ns(nanos: u64) -> String {
    if nanos < 1_000 {
        format!("{} ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2} us", nanos as f64 / 1e3)
    } else if nanos < 1_000_000_000 {
        format!("{:.2} ms", nanos as f64 / 1e6)
    } else {
        format!("{:.2} s", nanos as f64 / 1e9)
    }
}

/// Format a byte count with binary units.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    const TIB: u64 = GIB * 1024;

    if bytes >= TIB {
        format!("{:.1} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format an operation rate (requests per second).
pub fn format_rate(rate: f64) -> String {
    if rate < 1_000.0 {
        format!("{:.0}", rate)
    } else if rate < 1_000_000.0 {
        format!("{:.1} k", rate / 1e3)
    } else {
        format!("{:.1} M", rate / 1e6)
    }
}

/// Format a throughput in bytes per second with binary units.
pub fn format_throughput(bytes_per_sec: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    if bytes_per_sec >= GIB {
        format!("{:.2} GiB/s", bytes_per_sec / GIB)
    } else if bytes_per_sec >= MIB {
        format!("{:.2} MiB/s", bytes_per_sec / MIB)
    } else if bytes_per_sec >= KIB {
        format!("{:.2} KiB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.1} B/s", bytes_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_nanos(500)), "500 ns");
        assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50 us");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.50 ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50 s");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(100), "100 B");
        assert_eq!(format_size(4096), "4.0 KiB");
        assert_eq!(format_size(1 << 20), "1.0 MiB");
        assert_eq!(format_size(3 * (1u64 << 30) / 2), "1.5 GiB");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(500.0), "500");
        assert_eq!(format_rate(1500.0), "1.5 k");
        assert_eq!(format_rate(2_500_000.0), "2.5 M");
    }

    #[test]
    fn test_format_throughput() {
        assert_eq!(format_throughput(500.0), "500.0 B/s");
        assert_eq!(format_throughput(1536.0), "1.50 KiB/s");
        assert_eq!(format_throughput(1536.0 * 1024.0), "1.50 MiB/s");
    }
}
