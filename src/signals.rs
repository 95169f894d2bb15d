//! Global signal-handler installation (§5, §9).
//!
//! Handlers never run supervisor logic inside the OS signal frame: they
//! only ever set an atomic flag or push a signal number onto a lock-free
//! queue, which the watchdog drains once per tick.
use signal_hook::{
    consts::{SIGCHLD, SIGHUP, SIGINT, SIGQUIT, SIGTERM},
    iterator::Signals,
};

/// What the watchdog should do in response to the signals observed since
/// the last drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SignalEvents {
    pub shutdown: bool,
    pub reload: bool,
}

/// Owns the background thread that turns OS signals into queued numbers;
/// `poll()` drains whatever arrived since the last call.
pub struct SignalWatch {
    signals: Signals,
}

impl SignalWatch {
    /// Installs handlers for every signal the supervisor recognizes.
    /// `SIGCHLD` is accepted into the set but intentionally left unused
    /// for driving reaping (see spec design notes, Open Question #4);
    /// reaping stays poll-driven through `Process::reap`.
    pub fn install() -> std::io::Result<Self> {
        let signals = Signals::new([SIGINT, SIGTERM, SIGQUIT, SIGHUP, SIGCHLD])?;
        Ok(Self { signals })
    }

    /// Non-blocking: returns whatever signals have arrived since the last
    /// call, coalesced into a single [`SignalEvents`].
    pub fn poll(&mut self) -> SignalEvents {
        let mut events = SignalEvents::default();
        for signal in self.signals.pending() {
            match signal {
                SIGINT | SIGTERM | SIGQUIT => events.shutdown = true,
                SIGHUP => events.reload = true,
                SIGCHLD => {}
                _ => {}
            }
        }
        events
    }
}
