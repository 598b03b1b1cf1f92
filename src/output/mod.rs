//! Result reporting
//!
//! Three renderings of the same data: human text (the default), the
//! machine-readable raw line per period, and a JSON document at exit.
//! Reporters receive per-request observations, finalized period snapshots,
//! and one run summary; what each does with them is its own business.

pub mod json;
pub mod text;

use crate::config::{Config, OutputMode};
use crate::engine::OpKind;
use crate::stats::{Classification, StatsSnapshot};
use crate::target::TargetHandle;
use serde::Serialize;

/// One timed request, as seen by the measurement loop.
#[derive(Debug, Clone)]
pub struct Observation {
    /// 1-based request number.
    pub request: u64,
    pub kind: OpKind,
    pub offset: u64,
    /// Bytes actually transferred; less than the request size on a short
    /// transfer, zero for interrupted or would-block requests.
    pub bytes: u64,
    pub latency_ns: u64,
    pub classification: Classification,
}

/// Whole-run totals handed to the reporter at exit.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: StatsSnapshot,
    /// Requests that failed with RWF_NOWAIT set.
    pub would_block: u64,
    /// Requests the kernel completed only partially.
    pub short_transfers: u64,
    /// Requests interrupted by a signal before transferring.
    pub interrupted: u64,
}

pub trait Reporter {
    fn observation(&mut self, obs: &Observation);
    fn period(&mut self, snap: &StatsSnapshot);
    fn summary(&mut self, summary: &RunSummary);
}

/// Build the reporter the configuration asks for.
pub fn make_reporter(cfg: &Config, target: &TargetHandle) -> Box<dyn Reporter> {
    match cfg.output {
        OutputMode::Text => Box::new(text::TextReporter::new(
            target.path.display().to_string(),
            target.describe(),
            cfg.request_size,
            transfer_verb(cfg),
            cfg.quiet,
        )),
        OutputMode::Raw => Box::new(text::RawReporter::new()),
        OutputMode::Json => Box::new(json::JsonReporter::new()),
    }
}

fn transfer_verb(cfg: &Config) -> &'static str {
    if cfg.ping_pong {
        "transferred"
    } else if cfg.writes() {
        "written"
    } else {
        "read"
    }
}
