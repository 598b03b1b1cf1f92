//! io_uring backend with a single outstanding request
//!
//! Latency measurement wants exactly one request in flight, so the ring is
//! created with one entry and every call is submit-and-wait for its single
//! completion. This measures the io_uring round trip itself rather than any
//! batching benefit.
//!
//! Requires Linux 5.1+ and the `io_uring` cargo feature.

use super::{check_transfer, fault_from_errno, Dispatch, IoFault, OpKind};
use crate::Result;
use anyhow::Context;
use io_uring::{opcode, types, IoUring};
use std::io;
use std::os::unix::io::RawFd;

/// One-entry ring, one request at a time.
pub struct UringQueue {
    ring: IoUring,
}

impl UringQueue {
    pub fn new() -> Result<Self> {
        let ring = IoUring::new(1).context("failed to create io_uring instance")?;
        Ok(Self { ring })
    }
}

impl Dispatch for UringQueue {
    fn perform(
        &mut self,
        fd: RawFd,
        buf: &mut [u8],
        offset: u64,
        kind: OpKind,
    ) -> std::result::Result<usize, IoFault> {
        let entry = match kind {
            OpKind::Read => opcode::Read::new(types::Fd(fd), buf.as_mut_ptr(), buf.len() as u32)
                .offset(offset)
                .build(),
            OpKind::Write => {
                opcode::Write::new(types::Fd(fd), buf.as_ptr(), buf.len() as u32)
                    .offset(offset)
                    .build()
            }
        };

        // SAFETY: buf outlives the synchronous wait below, so the kernel
        // never touches a dangling pointer.
        unsafe {
            self.ring.submission().push(&entry).map_err(|_| IoFault::Syscall {
                op: "io_uring push",
                source: io::Error::new(io::ErrorKind::Other, "submission queue full"),
            })?;
        }

        self.ring
            .submit_and_wait(1)
            .map_err(|e| IoFault::Syscall {
                op: "io_uring submit",
                source: e,
            })?;

        let cqe = self.ring.completion().next().ok_or_else(|| IoFault::Syscall {
            op: "io_uring completion",
            source: io::Error::new(io::ErrorKind::Other, "completion queue empty after wait"),
        })?;

        let rc = cqe.result();
        if rc < 0 {
            // Negative result is -errno.
            return Err(fault_from_errno(
                kind.syscall(),
                io::Error::from_raw_os_error(-rc),
            ));
        }
        check_transfer(rc as usize, buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_uring_read() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0xC3u8; 8192]).unwrap();

        let mut queue = UringQueue::new().unwrap();
        let mut buf = vec![0u8; 4096];
        let n = queue
            .perform(file.as_raw_fd(), &mut buf, 4096, OpKind::Read)
            .unwrap();
        assert_eq!(n, 4096);
        assert!(buf.iter().all(|&b| b == 0xC3));
    }

    #[test]
    fn test_uring_write_then_read() {
        let file = tempfile::tempfile().unwrap();
        let mut queue = UringQueue::new().unwrap();

        let mut out = vec![0x3Cu8; 512];
        queue
            .perform(file.as_raw_fd(), &mut out, 0, OpKind::Write)
            .unwrap();

        let mut back = vec![0u8; 512];
        queue
            .perform(file.as_raw_fd(), &mut back, 0, OpKind::Read)
            .unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn test_uring_invalid_fd() {
        let mut queue = UringQueue::new().unwrap();
        let mut buf = vec![0u8; 64];
        let err = queue.perform(-1, &mut buf, 0, OpKind::Read).unwrap_err();
        assert!(matches!(err, IoFault::Syscall { .. }));
    }

    #[test]
    fn test_uring_short_read() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[1u8; 100]).unwrap();

        let mut queue = UringQueue::new().unwrap();
        let mut buf = vec![0u8; 4096];
        let err = queue
            .perform(file.as_raw_fd(), &mut buf, 0, OpKind::Read)
            .unwrap_err();
        assert!(matches!(
            err,
            IoFault::ShortTransfer { got: 100, want: 4096 }
        ));
    }
}
