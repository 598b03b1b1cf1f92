//! Request scheduling and the measurement loop
//!
//! The scheduler owns the run: it picks each request's offset and direction,
//! times exactly one backend call per iteration, classifies the sample, and
//! paces the next request with a monotonic `time_next` cursor. A burst of N
//! requests shares one pacing interval; when the loop falls behind, the
//! cursor is clamped to now rather than letting sleep debt accumulate.
//!
//! Termination is cooperative: a cancel signal, the request count, or the
//! deadline (compared against `time_next`, so a sleep never overshoots it)
//! moves the run to draining, which finishes the in-flight bookkeeping and
//! emits the summary. A second interrupt exits immediately from the signal
//! handler.
//!
//! Non-fatal faults (short transfers, `EINTR`, `EAGAIN` under nowait) are
//! counted and the loop keeps going; anything else finalizes what was
//! measured so far, emits a best-effort summary, and aborts the run.

use crate::config::Config;
use crate::engine::{Dispatch, IoFault, OpKind};
use crate::output::{Observation, Reporter, RunSummary};
use crate::rng::Xorshift128Plus;
use crate::stats::Statistics;
use crate::target::TargetHandle;
use crate::util::buffer::AlignedBuffer;
use crate::RunError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Set by the SIGINT handler; checked by every token.
static GLOBAL_STOP: AtomicBool = AtomicBool::new(false);

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Where the run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Termination requested; finishing bookkeeping.
    Draining,
    Stopped,
}

/// Cooperative stop flag, cloneable across owners, also observing the
/// process-wide interrupt flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    local: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.local.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.local.load(Ordering::SeqCst) || GLOBAL_STOP.load(Ordering::SeqCst)
    }
}

extern "C" fn interrupt_handler(_sig: libc::c_int) {
    // Second interrupt: the user means it. _exit is async-signal-safe.
    if GLOBAL_STOP.swap(true, Ordering::SeqCst) {
        // SAFETY: _exit is safe to call from a signal handler.
        unsafe { libc::_exit(3) };
    }
}

/// Route SIGINT to the drain-then-exit logic. No SA_RESTART: an in-flight
/// syscall should come back with EINTR so the loop can drain promptly.
pub fn install_interrupt_handler() {
    // SAFETY: the handler only touches an atomic and _exit.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = interrupt_handler as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
    }
}

#[derive(Default)]
struct FaultCounters {
    would_block: u64,
    short_transfers: u64,
    interrupted: u64,
}

pub struct Scheduler<'a> {
    cfg: &'a Config,
    target: &'a TargetHandle,
    engine: &'a mut dyn Dispatch,
    reporter: &'a mut dyn Reporter,
    rng: Xorshift128Plus,
    cancel: CancelToken,
    state: RunState,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        cfg: &'a Config,
        target: &'a TargetHandle,
        engine: &'a mut dyn Dispatch,
        reporter: &'a mut dyn Reporter,
        rng: Xorshift128Plus,
        cancel: CancelToken,
    ) -> Self {
        Self {
            cfg,
            target,
            engine,
            reporter,
            rng,
            cancel,
            state: RunState::Running,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run(&mut self) -> std::result::Result<(), RunError> {
        let limits = self.cfg.stats_limits();
        let mut buffer =
            AlignedBuffer::new(self.cfg.request_size as usize).map_err(RunError::Setup)?;

        let mut total = Statistics::new(limits, 0);
        let mut period = Statistics::new(limits, self.cfg.warmup);
        let mut counters = FaultCounters::default();

        let start = Instant::now();
        total.start(start);
        period.start(start);

        let interval = Duration::from_nanos(self.cfg.interval_ns);
        let mut time_next = start;
        let deadline = self
            .cfg
            .deadline_ns
            .map(|ns| start + Duration::from_nanos(ns));
        let mut period_deadline = self
            .cfg
            .period_time_ns
            .map(|ns| start + Duration::from_nanos(ns));

        // Working set geometry is validated at target preparation, so there
        // is at least one slot.
        let slots = self.target.working_set / self.cfg.request_size;
        let mut cursor: u64 = 0;
        let mut request: u64 = 0;

        while self.state == RunState::Running {
            if self.cancel.is_cancelled() {
                self.state = RunState::Draining;
                break;
            }
            request += 1;

            let slot = if self.cfg.sequential {
                let current = cursor;
                cursor = (cursor + 1) % slots;
                current
            } else {
                self.rng.next_bounded(slots)
            };
            let offset = self.target.offset + slot * self.cfg.request_size;

            // Request 1 writes in ping-pong mode so the read that follows
            // has fresh data.
            let kind = if self.cfg.ping_pong {
                if request % 2 == 1 {
                    OpKind::Write
                } else {
                    OpKind::Read
                }
            } else if self.cfg.writes() {
                OpKind::Write
            } else {
                OpKind::Read
            };

            if !self.cfg.cached {
                if let Err(e) = self.target.advise_dontneed(offset, self.cfg.request_size) {
                    self.finish_run(period, total, &counters, Instant::now());
                    self.state = RunState::Stopped;
                    return Err(RunError::Runtime(
                        anyhow::Error::from(e).context("cache eviction failed"),
                    ));
                }
            }

            if kind == OpKind::Write {
                self.rng.fill_bytes(buffer.as_mut_slice());
            }

            let issued = Instant::now();
            let result = self
                .engine
                .perform(self.target.fd(), buffer.as_mut_slice(), offset, kind);
            let latency_ns = issued.elapsed().as_nanos() as u64;

            let bytes = match result {
                Ok(n) => n as u64,
                Err(IoFault::ShortTransfer { got, want }) => {
                    counters.short_transfers += 1;
                    eprintln!(
                        "warning: short {} at offset {}: {} of {} bytes",
                        kind, offset, got, want
                    );
                    got as u64
                }
                Err(IoFault::WouldBlock) => {
                    counters.would_block += 1;
                    0
                }
                // Interruption transfers nothing but still consumed
                // wall-clock time, so the sample stands.
                Err(IoFault::Interrupted) => {
                    counters.interrupted += 1;
                    0
                }
                // Overrun, Syscall, Flush: nothing left to measure.
                Err(fault) => {
                    self.finish_run(period, total, &counters, Instant::now());
                    self.state = RunState::Stopped;
                    return Err(RunError::Runtime(anyhow::Error::new(fault).context(
                        format!("request {} at offset {} failed", request, offset),
                    )));
                }
            };

            let classification = period.add(latency_ns);
            self.reporter.observation(&Observation {
                request,
                kind,
                offset,
                bytes,
                latency_ns,
                classification,
            });

            // Pacing: one interval per burst, clamp forward when behind.
            if request % self.cfg.burst == 0 {
                time_next += interval;
            }
            let now = Instant::now();
            if now > time_next {
                time_next = now;
            }

            if self.cancel.is_cancelled()
                || self.cfg.count.map_or(false, |c| request >= c)
                || deadline.map_or(false, |d| time_next >= d)
            {
                self.state = RunState::Draining;
            }

            let period_hit = self
                .cfg
                .period_requests
                .map_or(false, |p| period.count() >= p)
                || period_deadline.map_or(false, |pd| time_next >= pd);
            if self.state == RunState::Running && period_hit {
                let carry = period.warmup_left();
                let mut done = std::mem::replace(&mut period, Statistics::new(limits, carry));
                done.finish(now);
                self.reporter.period(&done.snapshot());
                total.merge(&done);
                period.start(now);
                // Re-armed from now; late periods do not compound.
                if let Some(ns) = self.cfg.period_time_ns {
                    period_deadline = Some(now + Duration::from_nanos(ns));
                }
            }

            if self.state == RunState::Running {
                self.paced_sleep(time_next);
            }
        }

        self.finish_run(period, total, &counters, Instant::now());
        self.state = RunState::Stopped;
        Ok(())
    }

    /// Sleep until `until` in slices so a cancel cuts the wait short.
    fn paced_sleep(&self, until: Instant) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let remaining = until.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }

    fn finish_run(
        &mut self,
        mut period: Statistics,
        mut total: Statistics,
        counters: &FaultCounters,
        at: Instant,
    ) {
        period.finish(at);
        total.merge(&period);
        total.finish(at);
        self.reporter.summary(&RunSummary {
            total: total.snapshot(),
            would_block: counters.would_block,
            short_transfers: counters.short_transfers,
            interrupted: counters.interrupted,
        });
    }
}
