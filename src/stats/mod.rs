//! Streaming latency statistics
//!
//! One `Statistics` instance accumulates per-request latencies over a period
//! as online moments (count, sum, sum of squares, min, max). Derived values
//! (mean, standard deviation, IOPS, bandwidth) are computed only when a
//! period is finalized, never incrementally, so the hot path is a handful of
//! integer adds per request.
//!
//! Periods merge into a running total by summing moments and combining
//! extrema, which is also how the final summary is produced.
//!
//! # Classification
//!
//! Every sample is classified before it is folded in, in priority order:
//! warmup (initial requests, excluded from everything), too fast / too slow
//! (outside the configured validity window, counted but excluded from the
//! moments), valid. Valid samples may additionally carry an advisory
//! fast/slow tag relative to the running mean; the advisory is display-only
//! and never changes what is counted.

use serde::Serialize;
use std::time::Instant;

/// Validity window and request geometry shared by all periods of a run.
#[derive(Debug, Clone, Copy)]
pub struct StatsLimits {
    /// Samples strictly below this are counted as too fast.
    pub min_valid_ns: u64,
    /// Samples strictly above this are counted as too slow.
    pub max_valid_ns: u64,
    /// Request size in bytes, for bandwidth derivation.
    pub request_size: u64,
}

impl Default for StatsLimits {
    fn default() -> Self {
        Self {
            min_valid_ns: 0,
            max_valid_ns: u64::MAX,
            request_size: 4096,
        }
    }
}

/// Display-only annotation relative to the running mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    None,
    Fast,
    Slow,
}

/// Outcome of feeding one sample into the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Initial request excluded from all statistics.
    Warmup,
    /// Below the minimum valid latency; counted, excluded from moments.
    TooFast,
    /// Above the maximum valid latency; counted, excluded from moments.
    TooSlow,
    /// Folded into the moments and extrema.
    Valid(Advisory),
}

/// Online latency accumulator for one period (or the running total).
#[derive(Debug, Clone)]
pub struct Statistics {
    limits: StatsLimits,
    warmup_left: u64,

    count: u64,
    valid: u64,
    too_fast: u64,
    too_slow: u64,
    sum: u64,
    sum2: f64,
    min: u64,
    max: u64,

    started: Option<Instant>,
    finished: Option<Instant>,
}

impl Statistics {
    /// Create an empty accumulator. `warmup` requests are swallowed before
    /// anything is counted; periods after the first are created with the
    /// remaining warmup budget (usually zero).
    pub fn new(limits: StatsLimits, warmup: u64) -> Self {
        Self {
            limits,
            warmup_left: warmup,
            count: 0,
            valid: 0,
            too_fast: 0,
            too_slow: 0,
            sum: 0,
            sum2: 0.0,
            min: u64::MAX,
            max: 0,
            started: None,
            finished: None,
        }
    }

    /// Mark the start of this period.
    pub fn start(&mut self, at: Instant) {
        self.started = Some(at);
    }

    /// Feed one latency sample and classify it.
    pub fn add(&mut self, latency_ns: u64) -> Classification {
        if self.warmup_left > 0 {
            self.warmup_left -= 1;
            return Classification::Warmup;
        }

        self.count += 1;

        if latency_ns < self.limits.min_valid_ns {
            self.too_fast += 1;
            return Classification::TooFast;
        }
        if latency_ns > self.limits.max_valid_ns {
            self.too_slow += 1;
            return Classification::TooSlow;
        }

        // Advisory tag against the mean of the samples seen so far; only
        // meaningful once the mean has settled a little.
        let advisory = if self.valid > 5 {
            let mean = self.sum / self.valid;
            if latency_ns * 2 < mean {
                Advisory::Fast
            } else if latency_ns > mean * 2 {
                Advisory::Slow
            } else {
                Advisory::None
            }
        } else {
            Advisory::None
        };

        self.valid += 1;
        self.sum += latency_ns;
        self.sum2 += (latency_ns as f64) * (latency_ns as f64);
        self.min = self.min.min(latency_ns);
        self.max = self.max.max(latency_ns);

        Classification::Valid(advisory)
    }

    /// Fold another accumulator into this one (period into running total).
    pub fn merge(&mut self, other: &Statistics) {
        self.count += other.count;
        self.valid += other.valid;
        self.too_fast += other.too_fast;
        self.too_slow += other.too_slow;
        self.sum += other.sum;
        self.sum2 += other.sum2;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);

        self.started = match (self.started, other.started) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.finished = match (self.finished, other.finished) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Mark the end of this period. Calling again has no effect.
    pub fn finish(&mut self, at: Instant) {
        if self.finished.is_none() {
            self.finished = Some(at);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn valid(&self) -> u64 {
        self.valid
    }

    /// Warmup budget not yet consumed, carried into the next period.
    pub fn warmup_left(&self) -> u64 {
        self.warmup_left
    }

    /// Project the accumulated state plus derived values.
    pub fn snapshot(&self) -> StatsSnapshot {
        let period_ns = match (self.started, self.finished) {
            (Some(s), Some(f)) => f.duration_since(s).as_nanos() as u64,
            _ => 0,
        };

        let (min_ns, max_ns) = if self.valid > 0 {
            (self.min, self.max)
        } else {
            (0, 0)
        };

        let mean_ns = if self.valid > 0 {
            self.sum as f64 / self.valid as f64
        } else {
            0.0
        };
        let stddev_ns = if self.valid > 0 {
            (self.sum2 / self.valid as f64 - mean_ns * mean_ns)
                .max(0.0)
                .sqrt()
        } else {
            0.0
        };

        let iops = if self.sum > 0 {
            self.valid as f64 * 1e9 / self.sum as f64
        } else {
            0.0
        };
        let load_iops = if period_ns > 0 {
            self.count as f64 * 1e9 / period_ns as f64
        } else {
            0.0
        };
        let size = self.limits.request_size as f64;

        StatsSnapshot {
            count: self.count,
            valid: self.valid,
            too_fast: self.too_fast,
            too_slow: self.too_slow,
            sum_ns: self.sum,
            min_ns,
            max_ns,
            mean_ns,
            stddev_ns,
            iops,
            bandwidth: iops * size,
            load_iops,
            load_bandwidth: load_iops * size,
            period_ns,
        }
    }
}

/// Finalized view of one period or of the whole run.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Requests counted in this period (excludes warmup).
    pub count: u64,
    /// Requests folded into the moments.
    pub valid: u64,
    pub too_fast: u64,
    pub too_slow: u64,
    /// Sum of valid latencies in nanoseconds.
    pub sum_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub mean_ns: f64,
    pub stddev_ns: f64,
    /// Valid requests per second of measured latency.
    pub iops: f64,
    /// Bytes per second implied by `iops` and the request size.
    pub bandwidth: f64,
    /// All counted requests over the wall-clock period.
    pub load_iops: f64,
    pub load_bandwidth: f64,
    /// Wall-clock length of the period in nanoseconds.
    pub period_ns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limits() -> StatsLimits {
        StatsLimits {
            min_valid_ns: 0,
            max_valid_ns: u64::MAX,
            request_size: 4096,
        }
    }

    #[test]
    fn test_fixed_latency_with_warmup() {
        // warmup=1, ten samples of exactly 500us: 9 valid, degenerate
        // distribution.
        let mut stats = Statistics::new(limits(), 1);
        let t0 = Instant::now();
        stats.start(t0);

        for _ in 0..10 {
            stats.add(500_000);
        }
        stats.finish(t0 + Duration::from_millis(10));

        let snap = stats.snapshot();
        assert_eq!(snap.count, 9);
        assert_eq!(snap.valid, 9);
        assert_eq!(snap.min_ns, 500_000);
        assert_eq!(snap.max_ns, 500_000);
        assert_eq!(snap.mean_ns, 500_000.0);
        assert_eq!(snap.stddev_ns, 0.0);
        assert_eq!(snap.sum_ns, 9 * 500_000);
    }

    #[test]
    fn test_warmup_excluded_entirely() {
        let mut stats = Statistics::new(limits(), 3);

        assert_eq!(stats.add(100), Classification::Warmup);
        assert_eq!(stats.add(100), Classification::Warmup);
        assert_eq!(stats.warmup_left(), 1);
        assert_eq!(stats.add(100), Classification::Warmup);
        assert_eq!(stats.add(100), Classification::Valid(Advisory::None));

        assert_eq!(stats.count(), 1);
        assert_eq!(stats.valid(), 1);
    }

    #[test]
    fn test_threshold_boundaries_are_valid() {
        let mut stats = Statistics::new(
            StatsLimits {
                min_valid_ns: 1000,
                max_valid_ns: 2000,
                request_size: 4096,
            },
            0,
        );

        assert_eq!(stats.add(999), Classification::TooFast);
        assert_eq!(stats.add(1000), Classification::Valid(Advisory::None));
        assert_eq!(stats.add(2000), Classification::Valid(Advisory::None));
        assert_eq!(stats.add(2001), Classification::TooSlow);

        let snap = stats.snapshot();
        assert_eq!(snap.count, 4);
        assert_eq!(snap.valid, 2);
        assert_eq!(snap.too_fast, 1);
        assert_eq!(snap.too_slow, 1);
        assert_eq!(snap.min_ns, 1000);
        assert_eq!(snap.max_ns, 2000);
    }

    #[test]
    fn test_zero_valid_finish_is_safe() {
        let mut stats = Statistics::new(limits(), 0);
        let t0 = Instant::now();
        stats.start(t0);
        stats.finish(t0 + Duration::from_secs(1));

        let snap = stats.snapshot();
        assert_eq!(snap.min_ns, 0);
        assert_eq!(snap.max_ns, 0);
        assert_eq!(snap.mean_ns, 0.0);
        assert_eq!(snap.stddev_ns, 0.0);
        assert_eq!(snap.iops, 0.0);
        assert_eq!(snap.bandwidth, 0.0);
    }

    #[test]
    fn test_finish_idempotent() {
        let mut stats = Statistics::new(limits(), 0);
        let t0 = Instant::now();
        stats.start(t0);
        stats.finish(t0 + Duration::from_secs(1));
        let first = stats.snapshot().period_ns;
        stats.finish(t0 + Duration::from_secs(5));
        assert_eq!(stats.snapshot().period_ns, first);
    }

    #[test]
    fn test_merge_commutative_and_associative() {
        let samples_a = [100u64, 200, 300];
        let samples_b = [50u64, 5000];
        let samples_c = [77u64];

        let build = |samples: &[u64]| {
            let mut s = Statistics::new(limits(), 0);
            for &v in samples {
                s.add(v);
            }
            s
        };

        // (a+b)+c
        let mut left = build(&samples_a);
        left.merge(&build(&samples_b));
        left.merge(&build(&samples_c));

        // a+(b+c), built in the other order
        let mut bc = build(&samples_c);
        bc.merge(&build(&samples_b));
        let mut right = build(&samples_a);
        right.merge(&bc);

        let (l, r) = (left.snapshot(), right.snapshot());
        assert_eq!(l.count, r.count);
        assert_eq!(l.valid, r.valid);
        assert_eq!(l.sum_ns, r.sum_ns);
        assert_eq!(l.min_ns, r.min_ns);
        assert_eq!(l.max_ns, r.max_ns);
        assert_eq!(l.min_ns, 50);
        assert_eq!(l.max_ns, 5000);
    }

    #[test]
    fn test_merge_with_empty_period() {
        let mut total = Statistics::new(limits(), 0);
        let mut period = Statistics::new(limits(), 0);
        period.add(400);
        total.merge(&period);
        total.merge(&Statistics::new(limits(), 0));

        let snap = total.snapshot();
        assert_eq!(snap.valid, 1);
        assert_eq!(snap.min_ns, 400);
        assert_eq!(snap.max_ns, 400);
    }

    #[test]
    fn test_advisory_tags() {
        let mut stats = Statistics::new(limits(), 0);
        // Establish a mean of 1000ns over more than 5 samples.
        for _ in 0..8 {
            assert_eq!(stats.add(1000), Classification::Valid(Advisory::None));
        }
        assert_eq!(stats.add(400), Classification::Valid(Advisory::Fast));
        assert_eq!(stats.add(5000), Classification::Valid(Advisory::Slow));
        // Advisory never changes the counted classification.
        assert_eq!(stats.valid(), 10);
    }

    #[test]
    fn test_stddev() {
        let mut stats = Statistics::new(limits(), 0);
        stats.add(100);
        stats.add(300);

        let snap = stats.snapshot();
        assert_eq!(snap.mean_ns, 200.0);
        assert!((snap.stddev_ns - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_iops_and_bandwidth() {
        let mut stats = Statistics::new(limits(), 0);
        // 4 requests of 1ms each: 1000 iops, 4 MiB/s-ish with 4 KiB requests.
        for _ in 0..4 {
            stats.add(1_000_000);
        }

        let snap = stats.snapshot();
        assert!((snap.iops - 1000.0).abs() < 1e-6);
        assert!((snap.bandwidth - 1000.0 * 4096.0).abs() < 1e-3);
    }
}
