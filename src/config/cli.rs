//! CLI argument parsing using clap
//!
//! Single-letter flags in the tradition of ping-like tools: quantities
//! accept unit suffixes (`-s 4k`, `-w 30s`, `-c 1M`) via the parsers in
//! [`super::parse`], wired in as clap value parsers so a bad suffix fails at
//! parse time with exit code 1.

use super::parse::{parse_int, parse_size, parse_time_ns};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// iolat - storage I/O latency measurement tool
#[derive(Parser, Debug)]
#[command(name = "iolat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Target path (file, directory, or block device)
    #[arg(value_name = "PATH")]
    pub target: PathBuf,

    /// Stop after this many requests (e.g. 100, 10k)
    #[arg(short = 'c', long = "count", value_parser = parse_int)]
    pub count: Option<u64>,

    /// Stop after this much time (e.g. 30s, 5m)
    #[arg(short = 'w', long = "deadline", value_parser = parse_time_ns)]
    pub deadline: Option<u64>,

    /// Report statistics every N requests
    #[arg(short = 'p', long = "period", value_parser = parse_int)]
    pub period: Option<u64>,

    /// Report statistics every interval of time (e.g. 1s)
    #[arg(short = 'P', long = "period-time", value_parser = parse_time_ns)]
    pub period_time: Option<u64>,

    /// Interval between requests (default 1s)
    #[arg(short = 'i', long = "interval", value_parser = parse_time_ns)]
    pub interval: Option<u64>,

    /// Request size (default 4k, 256k for sequential)
    #[arg(short = 's', long = "size", value_parser = parse_size)]
    pub size: Option<u64>,

    /// Working set size (default: whole target, 1m for directories)
    #[arg(short = 'S', long = "wsize", value_parser = parse_size)]
    pub wsize: Option<u64>,

    /// Offset of the working set within the target
    #[arg(short = 'o', long = "offset", value_parser = parse_size, default_value = "0")]
    pub offset: u64,

    /// Use the io_uring backend
    #[arg(short = 'A', long = "async")]
    pub async_io: bool,

    /// Use cached I/O (skip per-request cache eviction)
    #[arg(short = 'C', long = "cached")]
    pub cached: bool,

    /// Open the target with O_DIRECT
    #[arg(short = 'D', long = "direct")]
    pub direct: bool,

    /// Sequential access instead of random
    #[arg(short = 'L', long = "sequential")]
    pub sequential: bool,

    /// Issue writes instead of reads (give three times for block devices)
    #[arg(short = 'W', long = "write", action = ArgAction::Count)]
    pub write: u8,

    /// Alternate writes and reads
    #[arg(short = 'G', long = "ping-pong")]
    pub ping_pong: bool,

    /// Open the target with O_SYNC
    #[arg(short = 'Y', long = "sync")]
    pub sync: bool,

    /// Open the target with O_DSYNC
    #[arg(short = 'y', long = "dsync")]
    pub dsync: bool,

    /// Issue requests with RWF_NOWAIT
    #[arg(short = 'N', long = "nowait")]
    pub nowait: bool,

    /// Issue requests with RWF_HIPRI
    #[arg(short = 'H', long = "hipri")]
    pub hipri: bool,

    /// Initial requests excluded from statistics (default 1)
    #[arg(short = 'a', long = "warmup", value_parser = parse_int, default_value = "1")]
    pub warmup: u64,

    /// Requests per pacing interval
    #[arg(short = 'b', long = "burst", value_parser = parse_int, default_value = "1")]
    pub burst: u64,

    /// Latencies below this count as too fast (e.g. 10us)
    #[arg(short = 't', long = "min-valid", value_parser = parse_time_ns)]
    pub min_valid: Option<u64>,

    /// Latencies above this count as too slow (e.g. 100ms)
    #[arg(short = 'T', long = "max-valid", value_parser = parse_time_ns)]
    pub max_valid: Option<u64>,

    /// Request rate limit in requests per second
    #[arg(short = 'r', long = "rate", value_parser = parse_int)]
    pub rate: Option<u64>,

    /// Throughput limit in bytes per second (e.g. 10m)
    #[arg(short = 'l', long = "speed", value_parser = parse_size)]
    pub speed: Option<u64>,

    /// Seek rate test preset: -q -i 0 -w 3s -S 64m
    #[arg(short = 'R', long = "rate-test")]
    pub rate_test: bool,

    /// Machine-readable raw statistics output
    #[arg(short = 'B', long = "batch", conflicts_with = "json")]
    pub batch: bool,

    /// JSON statistics output
    #[arg(short = 'J', long = "json")]
    pub json: bool,

    /// Suppress per-request lines
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Seed for the offset generator (default: wall clock)
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}
