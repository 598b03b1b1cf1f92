//! iolat - storage I/O latency measurement tool
//!
//! iolat issues a paced sequence of read or write requests against a file,
//! block device, or directory and reports streaming latency statistics
//! (distribution, IOPS, bandwidth) during and after the run.
//!
//! # Architecture
//!
//! - **Pluggable I/O backends**: buffered, O_DIRECT, single-outstanding
//!   async (io_uring), flag-augmented vectored I/O (RWF_NOWAIT / RWF_HIPRI)
//! - **Flexible targets**: files, block devices, directories (via an
//!   unlinked temporary file)
//! - **Deterministic offsets**: xorshift128+ PRNG, reproducible with a seed
//! - **Streaming statistics**: online moments with periodic reporting and
//!   warmup/outlier filtering

pub mod config;
pub mod engine;
pub mod output;
pub mod rng;
pub mod scheduler;
pub mod stats;
pub mod target;
pub mod util;

/// Result type used throughout iolat
pub type Result<T> = anyhow::Result<T>;

/// Fatal error surfaced at the process boundary.
///
/// Each category maps to a reserved exit status so scripts can tell a bad
/// invocation apart from a target that failed mid-run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Invalid option, size, offset, or geometry. Exit status 1.
    #[error("{0:#}")]
    Config(anyhow::Error),

    /// Target discovery, open, or backend setup failed. Exit status 2.
    #[error("{0:#}")]
    Setup(anyhow::Error),

    /// An I/O request failed during the measurement loop. Exit status 3.
    #[error("{0:#}")]
    Runtime(anyhow::Error),
}

impl RunError {
    /// Reserved exit status for this error category.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => 1,
            RunError::Setup(_) => 2,
            RunError::Runtime(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_taxonomy() {
        assert_eq!(RunError::Config(anyhow::anyhow!("bad geometry")).exit_code(), 1);
        // Setup covers target open failures and unavailable backends alike.
        assert_eq!(RunError::Setup(anyhow::anyhow!("no such backend")).exit_code(), 2);
        assert_eq!(RunError::Runtime(anyhow::anyhow!("EIO")).exit_code(), 3);
    }
}
