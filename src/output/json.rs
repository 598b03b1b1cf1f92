//! JSON output
//!
//! Periods are buffered and the whole document is emitted once at exit:
//! `{"periods": [...], "summary": {...}}` with the snapshot field names as
//! they appear in [`crate::stats::StatsSnapshot`].

use super::{Observation, Reporter, RunSummary};
use crate::stats::StatsSnapshot;
use serde::Serialize;

#[derive(Serialize)]
struct Document<'a> {
    periods: &'a [StatsSnapshot],
    summary: &'a RunSummary,
}

pub struct JsonReporter {
    periods: Vec<StatsSnapshot>,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self {
            periods: Vec::new(),
        }
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for JsonReporter {
    fn observation(&mut self, _obs: &Observation) {}

    fn period(&mut self, snap: &StatsSnapshot) {
        self.periods.push(snap.clone());
    }

    fn summary(&mut self, summary: &RunSummary) {
        let doc = Document {
            periods: &self.periods,
            summary,
        };
        match serde_json::to_string_pretty(&doc) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("error: failed to serialize results: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Statistics, StatsLimits};
    use std::time::{Duration, Instant};

    #[test]
    fn test_document_shape() {
        let mut stats = Statistics::new(StatsLimits::default(), 0);
        let t0 = Instant::now();
        stats.start(t0);
        stats.add(500_000);
        stats.finish(t0 + Duration::from_secs(1));
        let snap = stats.snapshot();

        let summary = RunSummary {
            total: snap.clone(),
            would_block: 0,
            short_transfers: 1,
            interrupted: 0,
        };
        let doc = Document {
            periods: std::slice::from_ref(&snap),
            summary: &summary,
        };

        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&doc).unwrap()).unwrap();
        assert_eq!(value["periods"][0]["count"], 1);
        assert_eq!(value["periods"][0]["sum_ns"], 500_000);
        assert_eq!(value["summary"]["total"]["valid"], 1);
        assert_eq!(value["summary"]["short_transfers"], 1);
        assert!(value["summary"]["total"]["iops"].is_number());
    }
}
