//! Synchronous backend using pread/pwrite
//!
//! The default path for both buffered and direct targets: one positioned
//! syscall per request, blocking until the kernel is done. Whether the
//! transfer bypasses the page cache is decided by `O_DIRECT` on the
//! descriptor, not here.

use super::{check_transfer, fault_from_errno, Dispatch, IoFault, OpKind};
use std::io;
use std::os::unix::io::RawFd;

/// Blocking positioned I/O, one syscall per request.
pub struct SyncIo;

impl Dispatch for SyncIo {
    fn perform(
        &mut self,
        fd: RawFd,
        buf: &mut [u8],
        offset: u64,
        kind: OpKind,
    ) -> Result<usize, IoFault> {
        let rc = match kind {
            // SAFETY: buf is valid for buf.len() bytes for the duration of
            // the call and the fd is owned by the caller.
            OpKind::Read => unsafe {
                libc::pread(
                    fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    offset as libc::off_t,
                )
            },
            // SAFETY: as above; pwrite only reads from buf.
            OpKind::Write => unsafe {
                libc::pwrite(
                    fd,
                    buf.as_ptr() as *const libc::c_void,
                    buf.len(),
                    offset as libc::off_t,
                )
            },
        };

        if rc < 0 {
            let op = match kind {
                OpKind::Read => "pread",
                OpKind::Write => "pwrite",
            };
            return Err(fault_from_errno(op, io::Error::last_os_error()));
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
    fn test_read_at_offset() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789ABCDEFGHIJ").unwrap();

        let mut io = SyncIo;
        let mut buf = vec![0u8; 10];
        let n = io
            .perform(file.as_raw_fd(), &mut buf, 10, OpKind::Read)
            .unwrap();
        assert_eq!(n, 10);
        assert_eq!(&buf[..], b"ABCDEFGHIJ");
    }

    #[test]
    fn test_write_then_read_back() {
        let file = tempfile::tempfile().unwrap();
        let mut io = SyncIo;

        let mut out = b"positioned write".to_vec();
        let n = io
            .perform(file.as_raw_fd(), &mut out, 100, OpKind::Write)
            .unwrap();
        assert_eq!(n, out.len());

        let mut back = vec![0u8; out.len()];
        io.perform(file.as_raw_fd(), &mut back, 100, OpKind::Read)
            .unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn test_short_read_past_eof() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[7u8; 16]).unwrap();

        let mut io = SyncIo;
        let mut buf = vec![0u8; 64];
        let err = io
            .perform(file.as_raw_fd(), &mut buf, 0, OpKind::Read)
            .unwrap_err();
        assert!(matches!(err, IoFault::ShortTransfer { got: 16, want: 64 }));
    }

    #[test]
    fn test_invalid_fd() {
        let mut io = SyncIo;
        let mut buf = vec![0u8; 8];
        let err = io.perform(-1, &mut buf, 0, OpKind::Read).unwrap_err();
        assert!(matches!(err, IoFault::Syscall { op: "pread", .. }));
    }
}
