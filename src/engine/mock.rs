//! Scripted backend for exercising the measurement loop
//!
//! Performs no real I/O: each call consumes the next scripted outcome (or
//! succeeds if the script ran out), optionally sleeps to simulate device
//! latency, and records the request so tests can assert on the access
//! pattern the loop generated.

use super::{fault_from_errno, Dispatch, IoFault, OpKind};
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub kind: OpKind,
    pub offset: u64,
    pub len: usize,
}

/// What the next scripted request should do.
#[derive(Debug, Clone, Copy)]
pub enum MockOutcome {
    Success,
    Short(usize),
    Interrupted,
    WouldBlock,
    Errno(i32),
}

/// Fake backend with a scripted outcome sequence and a shared call log.
pub struct MockBackend {
    script: VecDeque<MockOutcome>,
    latency: Option<Duration>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            latency: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep this long inside every call, so samples have a known floor.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue outcomes for the next calls; once drained, calls succeed.
    pub fn with_script(mut self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.script = outcomes.into_iter().collect();
        self
    }

    /// Handle to the call log, valid after the backend has been moved into
    /// an engine.
    pub fn call_log(&self) -> Arc<Mutex<Vec<MockCall>>> {
        Arc::clone(&self.calls)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatch for MockBackend {
    fn perform(
        &mut self,
        _fd: RawFd,
        buf: &mut [u8],
        offset: u64,
        kind: OpKind,
    ) -> Result<usize, IoFault> {
        self.calls.lock().unwrap().push(MockCall {
            kind,
            offset,
            len: buf.len(),
        });

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        match self.script.pop_front().unwrap_or(MockOutcome::Success) {
            MockOutcome::Success => {
                if kind == OpKind::Read {
                    buf.fill(0xAB);
                }
                Ok(buf.len())
            }
            MockOutcome::Short(got) => Err(IoFault::ShortTransfer {
                got,
                want: buf.len(),
            }),
            MockOutcome::Interrupted => Err(IoFault::Interrupted),
            MockOutcome::WouldBlock => Err(IoFault::WouldBlock),
            MockOutcome::Errno(errno) => Err(fault_from_errno(
                kind.syscall(),
                io::Error::from_raw_os_error(errno),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_default_success() {
        let mut mock = MockBackend::new().with_script([
            MockOutcome::Short(100),
            MockOutcome::WouldBlock,
        ]);

        let mut buf = vec![0u8; 4096];
        assert!(matches!(
            mock.perform(3, &mut buf, 0, OpKind::Read),
            Err(IoFault::ShortTransfer { got: 100, want: 4096 })
        ));
        assert!(matches!(
            mock.perform(3, &mut buf, 0, OpKind::Read),
            Err(IoFault::WouldBlock)
        ));
        assert_eq!(mock.perform(3, &mut buf, 0, OpKind::Read).unwrap(), 4096);
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_call_log_records_pattern() {
        let mut mock = MockBackend::new();
        let log = mock.call_log();

        let mut buf = vec![0u8; 512];
        mock.perform(3, &mut buf, 0, OpKind::Write).unwrap();
        mock.perform(3, &mut buf, 512, OpKind::Read).unwrap();

        let calls = log.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, OpKind::Write);
        assert_eq!(calls[0].offset, 0);
        assert_eq!(calls[1].kind, OpKind::Read);
        assert_eq!(calls[1].offset, 512);
    }

    #[test]
    fn test_errno_mapping() {
        let mut mock = MockBackend::new().with_script([MockOutcome::Errno(libc::EIO)]);
        let mut buf = vec![0u8; 8];
        let err = mock.perform(3, &mut buf, 0, OpKind::Read).unwrap_err();
        assert!(err.is_fatal());
    }
}
