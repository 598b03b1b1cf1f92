//! I/O backends
//!
//! A backend issues exactly one request at a time and reports how it went;
//! the measurement loop times the call from the outside. Four backends are
//! available:
//!
//! - buffered: plain `pread`/`pwrite` through the page cache
//! - direct: the same syscalls against an `O_DIRECT` descriptor
//! - async: a one-entry io_uring, submit then wait for the single completion
//! - vector: `preadv2`/`pwritev2` with per-request flags (`RWF_NOWAIT`,
//!   `RWF_HIPRI`)
//!
//! Buffered and direct share the same dispatch path since direct I/O is a
//! property of the file descriptor, not of the syscall.
//!
//! A request is never retried internally: a short transfer or `EINTR` is
//! surfaced as an [`IoFault`] and the caller decides what to count. Retrying
//! inside the backend would fold several syscalls into one latency sample.

use crate::Result;
use std::io;
use std::os::unix::io::RawFd;

#[cfg(all(target_os = "linux", feature = "io_uring"))]
pub mod aio;
pub mod mock;
pub mod sync;
#[cfg(target_os = "linux")]
pub mod vector;

/// Direction of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
}

impl OpKind {
    fn syscall(self) -> &'static str {
        match self {
            OpKind::Read => "read",
            OpKind::Write => "write",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.syscall())
    }
}

/// Everything that can go wrong with a single request.
///
/// Only [`IoFault::is_fatal`] faults abort the run; the rest are counted or
/// warned about and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum IoFault {
    /// The kernel transferred fewer bytes than requested.
    #[error("short transfer: {got} of {want} bytes")]
    ShortTransfer { got: usize, want: usize },

    /// The kernel reported more bytes than requested. Should not happen.
    #[error("transfer overrun: {got} of {want} bytes")]
    Overrun { got: usize, want: usize },

    /// The syscall was interrupted by a signal before transferring anything.
    #[error("interrupted")]
    Interrupted,

    /// `RWF_NOWAIT` was set and the request could not complete immediately.
    #[error("would block")]
    WouldBlock,

    /// The syscall failed outright.
    #[error("{op} failed: {source}")]
    Syscall {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The post-write data flush failed.
    #[error("data flush failed: {source}")]
    Flush {
        #[source]
        source: io::Error,
    },
}

impl IoFault {
    /// True if the run cannot meaningfully continue after this fault.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IoFault::Overrun { .. } | IoFault::Syscall { .. } | IoFault::Flush { .. }
        )
    }
}

/// Map a syscall errno to a fault.
pub(crate) fn fault_from_errno(op: &'static str, err: io::Error) -> IoFault {
    match err.raw_os_error() {
        Some(libc::EINTR) => IoFault::Interrupted,
        Some(libc::EAGAIN) => IoFault::WouldBlock,
        _ => IoFault::Syscall { op, source: err },
    }
}

/// Turn a non-negative syscall return into a fault-checked byte count.
pub(crate) fn check_transfer(got: usize, want: usize) -> std::result::Result<usize, IoFault> {
    use std::cmp::Ordering;
    match got.cmp(&want) {
        Ordering::Equal => Ok(got),
        Ordering::Less => Err(IoFault::ShortTransfer { got, want }),
        Ordering::Greater => Err(IoFault::Overrun { got, want }),
    }
}

/// One positioned request against an open descriptor.
///
/// Implementations must issue exactly one kernel request per call; the caller
/// times the call and must not see retries folded into one sample.
pub trait Dispatch {
    fn perform(
        &mut self,
        fd: RawFd,
        buf: &mut [u8],
        offset: u64,
        kind: OpKind,
    ) -> std::result::Result<usize, IoFault>;
}

/// Which backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Buffered,
    Direct,
    Async,
    Vector { nowait: bool, hipri: bool },
}

/// Whether writes are followed by a data flush inside the timed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Leave written data in the page cache.
    None,
    /// `fdatasync` after every write so the sample covers media persistence.
    DataSync,
}

/// Flush file data to storage, metadata excluded where the platform allows.
pub(crate) fn flush_data(fd: RawFd) -> std::result::Result<(), IoFault> {
    #[cfg(target_os = "linux")]
    // SAFETY: fd is an open descriptor owned by the caller.
    let rc = unsafe { libc::fdatasync(fd) };
    #[cfg(not(target_os = "linux"))]
    // SAFETY: fd is an open descriptor owned by the caller.
    let rc = unsafe { libc::fsync(fd) };

    if rc < 0 {
        return Err(IoFault::Flush {
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

#[cfg(all(target_os = "linux", feature = "io_uring"))]
fn build_async() -> Result<Box<dyn Dispatch>> {
    Ok(Box::new(aio::UringQueue::new()?))
}

#[cfg(not(all(target_os = "linux", feature = "io_uring")))]
fn build_async() -> Result<Box<dyn Dispatch>> {
    anyhow::bail!("the async backend requires io_uring support on Linux")
}

#[cfg(target_os = "linux")]
fn build_vector(nowait: bool, hipri: bool) -> Result<Box<dyn Dispatch>> {
    Ok(Box::new(vector::VectorIo::new(nowait, hipri)))
}

#[cfg(not(target_os = "linux"))]
fn build_vector(_nowait: bool, _hipri: bool) -> Result<Box<dyn Dispatch>> {
    anyhow::bail!("the vector backend requires preadv2/pwritev2 on Linux")
}

/// A constructed backend plus the write-flush policy.
pub struct Engine {
    backend: Box<dyn Dispatch>,
    flush: FlushMode,
}

impl Engine {
    pub fn new(kind: BackendKind, flush: FlushMode) -> Result<Self> {
        let backend: Box<dyn Dispatch> = match kind {
            BackendKind::Buffered | BackendKind::Direct => Box::new(sync::SyncIo),
            BackendKind::Async => build_async()?,
            BackendKind::Vector { nowait, hipri } => build_vector(nowait, hipri)?,
        };
        Ok(Self { backend, flush })
    }

    /// Wrap an arbitrary dispatch implementation, used by tests with the
    /// mock backend.
    pub fn with_backend(backend: Box<dyn Dispatch>, flush: FlushMode) -> Self {
        Self { backend, flush }
    }
}

impl Dispatch for Engine {
    fn perform(
        &mut self,
        fd: RawFd,
        buf: &mut [u8],
        offset: u64,
        kind: OpKind,
    ) -> std::result::Result<usize, IoFault> {
        let res = self.backend.perform(fd, buf, offset, kind);

        // The flush belongs inside the timed window, and data may have hit
        // the cache even on a short write.
        if kind == OpKind::Write && self.flush == FlushMode::DataSync {
            match res {
                Ok(_) | Err(IoFault::ShortTransfer { .. }) => flush_data(fd)?,
                Err(_) => {}
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_check_transfer() {
        assert_eq!(check_transfer(4096, 4096).unwrap(), 4096);
        assert!(matches!(
            check_transfer(100, 4096),
            Err(IoFault::ShortTransfer { got: 100, want: 4096 })
        ));
        assert!(matches!(
            check_transfer(5000, 4096),
            Err(IoFault::Overrun { got: 5000, want: 4096 })
        ));
    }

    #[test]
    fn test_fault_from_errno() {
        let eintr = io::Error::from_raw_os_error(libc::EINTR);
        assert!(matches!(fault_from_errno("read", eintr), IoFault::Interrupted));

        let eagain = io::Error::from_raw_os_error(libc::EAGAIN);
        assert!(matches!(fault_from_errno("read", eagain), IoFault::WouldBlock));

        let ebadf = io::Error::from_raw_os_error(libc::EBADF);
        assert!(matches!(
            fault_from_errno("read", ebadf),
            IoFault::Syscall { op: "read", .. }
        ));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!IoFault::ShortTransfer { got: 1, want: 2 }.is_fatal());
        assert!(!IoFault::Interrupted.is_fatal());
        assert!(!IoFault::WouldBlock.is_fatal());
        assert!(IoFault::Overrun { got: 2, want: 1 }.is_fatal());
        assert!(IoFault::Syscall {
            op: "read",
            source: io::Error::from_raw_os_error(libc::EIO),
        }
        .is_fatal());
    }

    #[test]
    fn test_engine_buffered_roundtrip() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0xA5u8; 8192]).unwrap();

        let mut engine = Engine::new(BackendKind::Buffered, FlushMode::None).unwrap();
        let mut buf = vec![0u8; 4096];
        let n = engine
            .perform(file.as_raw_fd(), &mut buf, 4096, OpKind::Read)
            .unwrap();
        assert_eq!(n, 4096);
        assert!(buf.iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn test_engine_write_with_flush() {
        let file = tempfile::tempfile().unwrap();
        let mut engine = Engine::new(BackendKind::Buffered, FlushMode::DataSync).unwrap();

        let mut buf = vec![0x5Au8; 4096];
        let n = engine
            .perform(file.as_raw_fd(), &mut buf, 0, OpKind::Write)
            .unwrap();
        assert_eq!(n, 4096);
    }

    #[test]
    fn test_engine_short_read_at_eof() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[1u8; 1000]).unwrap();

        let mut engine = Engine::new(BackendKind::Buffered, FlushMode::None).unwrap();
        let mut buf = vec![0u8; 4096];
        let err = engine
            .perform(file.as_raw_fd(), &mut buf, 0, OpKind::Read)
            .unwrap_err();
        assert!(matches!(
            err,
            IoFault::ShortTransfer { got: 1000, want: 4096 }
        ));
    }
}
