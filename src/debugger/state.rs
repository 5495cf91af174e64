//! Process-wide debugger state.
//!
//! `DebugControl` is the single owner of the enabled flag and of the queue
//! of paused handlers. The gate and the dispatcher share it through an
//! `Arc`; every read or write goes through its one mutex, and the mutex is
//! never held across an await.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Why a paused handler was let go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// An operator sent `Continue`.
    Continued,
    /// Debugging was switched off while the handler was paused.
    DebuggingDisabled,
    /// The bounded wait elapsed.
    TimedOut,
}

impl Resume {
    pub fn name(self) -> &'static str {
        match self {
            Resume::Continued => "continued",
            Resume::DebuggingDisabled => "debugging_disabled",
            Resume::TimedOut => "timed_out",
        }
    }
}

/// Point-in-time view of the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugSnapshot {
    pub enabled: bool,
    /// At least one handler is parked in the gate.
    pub paused: bool,
    /// Number of parked handlers.
    pub waiting: usize,
}

struct WaitHandle {
    id: u64,
    tx: oneshot::Sender<Resume>,
}

#[derive(Default)]
struct DebugState {
    enabled: bool,
    waiters: VecDeque<WaitHandle>,
    next_waiter: u64,
}

impl DebugState {
    /// Drop handles whose handler has gone away.
    fn prune(&mut self) {
        self.waiters.retain(|w| !w.tx.is_closed());
    }

    /// Wake the oldest live waiter.
    fn release_one(&mut self, reason: Resume) -> bool {
        while let Some(handle) = self.waiters.pop_front() {
            if handle.tx.send(reason).is_ok() {
                return true;
            }
        }
        false
    }

    fn snapshot(&mut self) -> DebugSnapshot {
        self.prune();
        DebugSnapshot {
            enabled: self.enabled,
            paused: !self.waiters.is_empty(),
            waiting: self.waiters.len(),
        }
    }
}

/// A handler's place in the pause queue.
#[derive(Debug)]
pub struct Parked {
    id: u64,
    rx: oneshot::Receiver<Resume>,
}

impl Parked {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn receiver(&mut self) -> &mut oneshot::Receiver<Resume> {
        &mut self.rx
    }
}

/// Outcome of switching debugging off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disabled {
    /// A paused handler was released.
    pub released: bool,
    /// State after the transition.
    pub snapshot: DebugSnapshot,
}

/// Shared, lock-protected debugger state.
pub struct DebugControl {
    inner: Mutex<DebugState>,
}

impl DebugControl {
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Mutex::new(DebugState {
                enabled,
                ..DebugState::default()
            }),
        }
    }

    pub fn snapshot(&self) -> DebugSnapshot {
        self.lock().snapshot()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Join the pause queue if debugging is on.
    ///
    /// The check and the enqueue happen under one lock, so a `Continue`
    /// that arrives after this returns is guaranteed to see the handle.
    pub fn park(&self) -> Option<Parked> {
        let mut state = self.lock();
        if !state.enabled {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        let id = state.next_waiter;
        state.next_waiter += 1;
        state.waiters.push_back(WaitHandle { id, tx });
        Some(Parked { id, rx })
    }

    /// Remove a handle that stopped waiting on its own.
    ///
    /// Returns false if the handle was already released.
    pub fn forget(&self, parked: &Parked) -> bool {
        let mut state = self.lock();
        let before = state.waiters.len();
        state.waiters.retain(|w| w.id != parked.id);
        state.waiters.len() != before
    }

    pub fn enable(&self) -> DebugSnapshot {
        let mut state = self.lock();
        state.enabled = true;
        state.snapshot()
    }

    /// Switch debugging off and force-resume one paused handler.
    pub fn disable(&self) -> Disabled {
        let mut state = self.lock();
        state.enabled = false;
        let released = state.release_one(Resume::DebuggingDisabled);
        Disabled {
            released,
            snapshot: state.snapshot(),
        }
    }

    /// Release one paused handler. No-op when nothing is paused.
    pub fn resume(&self) -> bool {
        self.lock().release_one(Resume::Continued)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DebugState> {
        self.inner.lock().expect("debug state mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn park_is_refused_while_disabled() {
        let control = DebugControl::new(false);
        assert!(control.park().is_none());
        assert!(!control.snapshot().paused);
    }

    #[test]
    fn paused_tracks_parked_handlers() {
        let control = DebugControl::new(true);
        let mut first = control.park().unwrap();
        let mut second = control.park().unwrap();
        assert_eq!(control.snapshot().waiting, 2);

        assert!(control.resume());
        assert_eq!(first.receiver().try_recv().unwrap(), Resume::Continued);
        assert!(second.receiver().try_recv().is_err());
        assert!(control.snapshot().paused);

        assert!(control.resume());
        assert!(!control.snapshot().paused);
    }

    #[test]
    fn resume_without_waiters_is_noop() {
        let control = DebugControl::new(true);
        assert!(!control.resume());
        assert_eq!(
            control.snapshot(),
            DebugSnapshot {
                enabled: true,
                paused: false,
                waiting: 0
            }
        );
    }

    #[test]
    fn resume_skips_departed_handlers() {
        let control = DebugControl::new(true);
        let gone = control.park().unwrap();
        let mut alive = control.park().unwrap();
        drop(gone);

        assert!(control.resume());
        assert_eq!(alive.receiver().try_recv().unwrap(), Resume::Continued);
    }

    #[test]
    fn disable_releases_one_and_clears_flag() {
        let control = DebugControl::new(true);
        let mut parked = control.park().unwrap();

        let outcome = control.disable();
        assert!(outcome.released);
        assert!(!outcome.snapshot.enabled);
        assert!(!outcome.snapshot.paused);
        assert_eq!(
            parked.receiver().try_recv().unwrap(),
            Resume::DebuggingDisabled
        );
        assert!(control.park().is_none());
    }

    #[test]
    fn forget_removes_only_pending_handles() {
        let control = DebugControl::new(true);
        let parked = control.park().unwrap();
        assert!(control.forget(&parked));
        assert!(!control.forget(&parked));
        assert!(!control.snapshot().paused);
    }
}
