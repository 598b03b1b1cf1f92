//! Human text and raw statistics output
//!
//! The text reporter prints one line per request, the raw per-period
//! statistics line, and a closing summary block. The raw reporter prints
//! only the integer statistics line, one per period and one at exit, for
//! scripts to consume with `cut` and friends.

use super::{Observation, Reporter, RunSummary};
use crate::engine::OpKind;
use crate::stats::{Advisory, Classification, StatsSnapshot};
use crate::util::time::{format_duration_ns, format_rate, format_size, format_throughput};

pub struct TextReporter {
    path: String,
    location: String,
    request_size: u64,
    verb: &'static str,
    quiet: bool,
}

impl TextReporter {
    pub fn new(
        path: String,
        location: String,
        request_size: u64,
        verb: &'static str,
        quiet: bool,
    ) -> Self {
        Self {
            path,
            location,
            request_size,
            verb,
            quiet,
        }
    }
}

fn classification_tag(classification: Classification) -> &'static str {
    match classification {
        Classification::Warmup => " (warmup)",
        Classification::TooFast => " (too fast)",
        Classification::TooSlow => " (too slow)",
        Classification::Valid(Advisory::Fast) => " (fast)",
        Classification::Valid(Advisory::Slow) => " (slow)",
        Classification::Valid(Advisory::None) => "",
    }
}

impl TextReporter {
    fn observation_line(&self, obs: &Observation) -> String {
        let direction = match obs.kind {
            OpKind::Read => "<<<",
            OpKind::Write => ">>>",
        };
        format!(
            "{} {} {} ({}): request={} time={}{}",
            format_size(obs.bytes),
            direction,
            self.path,
            self.location,
            obs.request,
            format_duration_ns(obs.latency_ns),
            classification_tag(obs.classification),
        )
    }
}

impl Reporter for TextReporter {
    fn observation(&mut self, obs: &Observation) {
        if self.quiet {
            return;
        }
        println!("{}", self.observation_line(obs));
    }

    fn period(&mut self, snap: &StatsSnapshot) {
        println!("{}", raw_line(snap));
    }

    fn summary(&mut self, summary: &RunSummary) {
        let total = &summary.total;
        println!();
        println!("--- {} ({}) iolat statistics ---", self.path, self.location);
        println!(
            "{} requests completed in {}, {} {}, {} iops, {}",
            total.valid,
            format_duration_ns(total.sum_ns),
            format_size(total.valid * self.request_size),
            self.verb,
            format_rate(total.iops),
            format_throughput(total.bandwidth),
        );
        println!(
            "generated {} requests in {}, {}, {} iops, {}",
            total.count,
            format_duration_ns(total.period_ns),
            format_size(total.count * self.request_size),
            format_rate(total.load_iops),
            format_throughput(total.load_bandwidth),
        );
        if total.too_fast > 0 || total.too_slow > 0 {
            println!(
                "{} too fast, {} too slow",
                total.too_fast, total.too_slow
            );
        }
        if summary.would_block > 0 {
            println!("{} requests would have blocked", summary.would_block);
        }
        if summary.short_transfers > 0 {
            println!("{} short transfers", summary.short_transfers);
        }
        if summary.interrupted > 0 {
            println!("{} requests interrupted", summary.interrupted);
        }
        println!(
            "min/avg/max/mdev = {} / {} / {} / {}",
            format_duration_ns(total.min_ns),
            format_duration_ns(total.mean_ns as u64),
            format_duration_ns(total.max_ns),
            format_duration_ns(total.stddev_ns as u64),
        );
    }
}

/// Space-separated integers: count, sum of latencies (ns), iops, bandwidth
/// (B/s), min, avg, max, mdev (ns).
fn raw_line(snap: &StatsSnapshot) -> String {
    format!(
        "{} {} {} {} {} {} {} {}",
        snap.count,
        snap.sum_ns,
        snap.iops as u64,
        snap.bandwidth as u64,
        snap.min_ns,
        snap.mean_ns as u64,
        snap.max_ns,
        snap.stddev_ns as u64,
    )
}

/// Machine-readable output only, for batch use.
pub struct RawReporter;

impl RawReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RawReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for RawReporter {
    fn observation(&mut self, _obs: &Observation) {}

    fn period(&mut self, snap: &StatsSnapshot) {
        println!("{}", raw_line(snap));
    }

    fn summary(&mut self, summary: &RunSummary) {
        println!("{}", raw_line(&summary.total));
    }
}
