//! Run configuration
//!
//! [`Config`] is the validated, unit-normalized form of the command line:
//! all times in nanoseconds, all sizes in bytes, defaults and presets
//! resolved, and the rate/speed limits folded into a single effective
//! request interval. Everything downstream works from this struct and never
//! sees clap types.

pub mod cli;
pub mod parse;

use crate::engine::{BackendKind, FlushMode};
use crate::stats::StatsLimits;
use crate::target::TargetOptions;
use crate::RunError;
use std::path::PathBuf;

pub use cli::Cli;

const NS_PER_SEC: u64 = 1_000_000_000;
const DEFAULT_INTERVAL_NS: u64 = NS_PER_SEC;
const DEFAULT_REQUEST_SIZE: u64 = 4 << 10;
const SEQUENTIAL_REQUEST_SIZE: u64 = 256 << 10;
const DEFAULT_WORKING_SET: u64 = 1 << 20;
const RATE_TEST_WORKING_SET: u64 = 64 << 20;
const RATE_TEST_DEADLINE_NS: u64 = 3 * NS_PER_SEC;

/// Which reporter renders the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Raw,
    Json,
}

/// Validated run parameters.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub count: Option<u64>,
    pub deadline_ns: Option<u64>,
    /// Effective pacing interval with rate and speed limits folded in.
    pub interval_ns: u64,
    pub burst: u64,
    pub period_requests: Option<u64>,
    pub period_time_ns: Option<u64>,
    pub request_size: u64,
    pub working_set: Option<u64>,
    pub default_working_set: u64,
    pub offset: u64,
    pub warmup: u64,
    pub sequential: bool,
    pub write_level: u8,
    pub ping_pong: bool,
    pub backend: BackendKind,
    pub direct: bool,
    pub sync: bool,
    pub dsync: bool,
    pub cached: bool,
    pub min_valid_ns: u64,
    pub max_valid_ns: u64,
    pub quiet: bool,
    pub output: OutputMode,
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> std::result::Result<Self, RunError> {
        if cli.async_io && (cli.nowait || cli.hipri) {
            return Err(config_error(
                "the async backend does not take per-request flags (-N/-H)",
            ));
        }
        if cli.burst == 0 {
            return Err(config_error("burst must be at least 1"));
        }
        if cli.count == Some(0) {
            return Err(config_error("request count must be at least 1"));
        }

        let request_size = cli.size.unwrap_or(if cli.sequential {
            SEQUENTIAL_REQUEST_SIZE
        } else {
            DEFAULT_REQUEST_SIZE
        });
        if request_size == 0 {
            return Err(config_error("request size must be non-zero"));
        }

        let min_valid_ns = cli.min_valid.unwrap_or(0);
        let max_valid_ns = cli.max_valid.unwrap_or(u64::MAX);
        if min_valid_ns > max_valid_ns {
            return Err(config_error(
                "minimum valid latency exceeds the maximum",
            ));
        }

        // The rate test preset is a shorthand; explicit flags still win.
        let rate_test = cli.rate_test;
        let base_interval = cli
            .interval
            .unwrap_or(if rate_test { 0 } else { DEFAULT_INTERVAL_NS });
        let deadline_ns = cli
            .deadline
            .or(if rate_test { Some(RATE_TEST_DEADLINE_NS) } else { None });
        let working_set = cli
            .wsize
            .or(if rate_test { Some(RATE_TEST_WORKING_SET) } else { None });

        let interval_ns = effective_interval(base_interval, request_size, cli.rate, cli.speed)?;

        let backend = if cli.async_io {
            BackendKind::Async
        } else if cli.nowait || cli.hipri {
            BackendKind::Vector {
                nowait: cli.nowait,
                hipri: cli.hipri,
            }
        } else if cli.direct {
            BackendKind::Direct
        } else {
            BackendKind::Buffered
        };

        let output = if cli.json {
            OutputMode::Json
        } else if cli.batch {
            OutputMode::Raw
        } else {
            OutputMode::Text
        };

        Ok(Self {
            path: cli.target,
            count: cli.count,
            deadline_ns,
            interval_ns,
            burst: cli.burst,
            period_requests: cli.period,
            period_time_ns: cli.period_time,
            request_size,
            working_set,
            default_working_set: if rate_test {
                RATE_TEST_WORKING_SET
            } else {
                DEFAULT_WORKING_SET
            },
            offset: cli.offset,
            warmup: cli.warmup,
            sequential: cli.sequential,
            write_level: cli.write,
            ping_pong: cli.ping_pong,
            backend,
            direct: cli.direct,
            sync: cli.sync,
            dsync: cli.dsync,
            cached: cli.cached,
            min_valid_ns,
            max_valid_ns,
            quiet: cli.quiet || rate_test,
            output,
            seed: cli.seed,
        })
    }

    pub fn writes(&self) -> bool {
        self.write_level > 0 || self.ping_pong
    }

    /// Non-cached write tests flush to media inside the timed window.
    pub fn flush_mode(&self) -> FlushMode {
        if self.writes() && !self.cached {
            FlushMode::DataSync
        } else {
            FlushMode::None
        }
    }

    pub fn stats_limits(&self) -> StatsLimits {
        StatsLimits {
            min_valid_ns: self.min_valid_ns,
            max_valid_ns: self.max_valid_ns,
            request_size: self.request_size,
        }
    }

    pub fn target_options(&self) -> TargetOptions {
        TargetOptions {
            path: self.path.clone(),
            request_size: self.request_size,
            offset: self.offset,
            working_set: self.working_set,
            default_working_set: self.default_working_set,
            write_level: self.write_level,
            ping_pong: self.ping_pong,
            direct: self.direct,
            sync: self.sync,
            dsync: self.dsync,
            cached: self.cached,
        }
    }
}

/// Fold the rate limit (requests/s) and speed limit (bytes/s) into the
/// minimum interval between requests.
fn effective_interval(
    base_ns: u64,
    request_size: u64,
    rate: Option<u64>,
    speed: Option<u64>,
) -> std::result::Result<u64, RunError> {
    let mut interval = base_ns;
    if let Some(rate) = rate {
        if rate == 0 {
            return Err(config_error("rate limit must be non-zero"));
        }
        interval = interval.max(NS_PER_SEC / rate);
    }
    if let Some(speed) = speed {
        if speed == 0 {
            return Err(config_error("speed limit must be non-zero"));
        }
        let per_request = (request_size as u128 * NS_PER_SEC as u128 / speed as u128) as u64;
        interval = interval.max(per_request);
    }
    Ok(interval)
}

fn config_error(msg: &str) -> RunError {
    RunError::Config(anyhow::anyhow!("{}", msg))
}
