//! A single managed child process (Component B).
use std::{
    fmt,
    os::unix::process::CommandExt,
    process::{Child, Command, Stdio},
    time::Instant,
};

use nix::{
    errno::Errno,
    sys::{
        signal::{self, Signal},
        wait::{WaitPidFlag, WaitStatus, waitpid},
    },
    unistd::Pid,
};
use tracing::{debug, error};

use crate::error::ProcessError;

/// A death is considered premature if it happens before this many seconds
/// have elapsed since the process was last started.
const PREMATURE_EXIT_THRESHOLD_SECS: u64 = 3;

/// Default bound on consecutive failed launches/premature deaths before a
/// Process is retired to `fatal`.
pub(crate) const DEFAULT_MAX_RETRY: u32 = 5;

/// Delay between non-blocking `waitpid` polls in [`Process::reap`].
const REAP_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

/// Lifecycle state of a managed process.
///
/// Mirrors the state diagram in the supervisor design: a healthy process
/// cycles `stopped -> running -> stopping -> stopped`; a process that keeps
/// dying too quickly cycles through `backoff` until it either recovers or
/// is retired to `fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// No child attached; not expected to run.
    Stopped,
    /// A spawn is in flight (only observed transiently between `spawn()`
    /// calls; never held across calls).
    Starting,
    /// A child is attached and believed to be alive.
    Running,
    /// The stop signal has been sent; waiting for the child to exit.
    Stopping,
    /// The process died too quickly and is waiting to be retried.
    Backoff,
    /// Retries are exhausted; `spawn()` is now a permanent no-op.
    Fatal,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Starting => "starting",
            ProcessStatus::Running => "running",
            ProcessStatus::Stopping => "stopping",
            ProcessStatus::Backoff => "backoff",
            ProcessStatus::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// One managed child, with its own backoff counter and state machine.
pub struct Process {
    command: String,
    stop_signal: Signal,
    max_retry: u32,
    use_sockets: bool,

    status: ProcessStatus,
    worker: Option<Child>,
    backoff: u32,
    last_start: Option<Instant>,
    last_stop: Option<Instant>,
}

impl Process {
    /// Creates a new, unstarted process.
    pub fn new(command: String, stop_signal: Signal, max_retry: u32, use_sockets: bool) -> Self {
        Self {
            command,
            stop_signal,
            max_retry,
            use_sockets,
            status: ProcessStatus::Stopped,
            worker: None,
            backoff: 0,
            last_start: None,
            last_stop: None,
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    /// OS pid of the attached child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.worker.as_ref().map(Child::id)
    }

    /// Consecutive failed launches or premature deaths.
    pub fn backoff(&self) -> u32 {
        self.backoff
    }

    /// Attempts one spawn. A no-op if already `running` or `fatal`.
    ///
    /// This is the single-attempt model: the caller (the watchdog, via
    /// [`crate::service::Service::watch_processes`]) is responsible for
    /// calling `spawn()` again on a later tick if this attempt leaves the
    /// process in `backoff`.
    pub fn spawn(&mut self) -> Result<(), ProcessError> {
        if matches!(self.status, ProcessStatus::Running | ProcessStatus::Fatal) {
            return Ok(());
        }

        if self.status != ProcessStatus::Backoff {
            self.status = ProcessStatus::Starting;
        }

        let mut command = Command::new("sh");
        command.arg("-c").arg(&self.command);
        command.stdin(Stdio::inherit());
        command.stdout(Stdio::inherit());
        command.stderr(Stdio::inherit());

        if !self.use_sockets {
            unsafe {
                command.pre_exec(close_inherited_fds);
            }
        }

        match command.spawn() {
            Ok(child) => {
                self.worker = Some(child);
                self.status = ProcessStatus::Running;
                self.last_start = Some(Instant::now());
                self.backoff = 0;
                Ok(())
            }
            Err(source) => {
                self.backoff += 1;
                self.status = if self.backoff >= self.max_retry {
                    ProcessStatus::Fatal
                } else {
                    ProcessStatus::Backoff
                };
                error!(command = %self.command, %source, "failed to spawn process");
                Err(ProcessError::Spawn {
                    command: self.command.clone(),
                    source,
                })
            }
        }
    }

    /// Requests that the process stop. Non-blocking: delivers the stop
    /// signal and moves to `stopping`; the caller must still `reap()`.
    pub fn kill(&mut self) -> Result<(), ProcessError> {
        if self.status == ProcessStatus::Stopped {
            return Ok(());
        }

        self.status = ProcessStatus::Stopping;

        let Some(pid) = self.pid() else {
            return Ok(());
        };

        match signal::kill(Pid::from_raw(pid as i32), self.stop_signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(ProcessError::Signal {
                pid: pid as i32,
                source,
            }),
        }
    }

    /// Waits for the attached child to exit, polling non-blockingly.
    ///
    /// Retries through `EINTR`; treats `ECHILD` ("no such child") as
    /// already reaped. On return the worker handle is cleared, backoff is
    /// reset, and the process is `stopped`.
    pub fn reap(&mut self) -> Result<(), ProcessError> {
        let Some(pid) = self.pid() else {
            return Ok(());
        };
        let nix_pid = Pid::from_raw(pid as i32);

        loop {
            match waitpid(nix_pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {
                    std::thread::sleep(REAP_POLL_INTERVAL);
                    continue;
                }
                Ok(_exited) => break,
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => break,
                Err(source) => {
                    return Err(ProcessError::Wait {
                        pid: pid as i32,
                        source,
                    });
                }
            }
        }

        self.status = ProcessStatus::Stopped;
        self.worker = None;
        self.backoff = 0;
        self.last_stop = Some(Instant::now());
        Ok(())
    }

    /// OS-level liveness probe, safe against the child having disappeared
    /// out from under us.
    pub fn is_active(&self) -> bool {
        let Some(pid) = self.pid() else {
            return false;
        };

        match waitpid(Pid::from_raw(pid as i32), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => true,
            // Any non-StillAlive status (exited, signaled, or the wait call
            // itself failing) means the child is no longer something we can
            // consider running.
            _ => false,
        }
    }

    /// One watchdog tick. Returns `true` if this process is healthy or not
    /// currently expected to be running. Returns `false` (and self-drives
    /// the state machine toward `backoff` or `stopped`) if it was expected
    /// to run but has died.
    pub fn watch(&mut self) -> bool {
        if self.status != ProcessStatus::Running {
            return true;
        }
        if self.is_active() {
            return true;
        }

        let last_stop = Instant::now();
        self.last_stop = Some(last_stop);

        if let Some(pid) = self.pid() {
            match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) | Err(Errno::EPERM) => {}
                Err(source) => {
                    debug!(pid, %source, "best-effort terminate of dead process failed");
                }
            }
        }

        let delay = self
            .last_start
            .map(|start| last_stop.saturating_duration_since(start).as_secs())
            .unwrap_or(0);

        if delay < PREMATURE_EXIT_THRESHOLD_SECS {
            error!(command = %self.command, "process exited too quickly (after {delay}s)");
            self.backoff += 1;
            self.status = ProcessStatus::Backoff;
        } else {
            self.backoff = 0;
            self.status = ProcessStatus::Stopped;
        }

        self.worker = None;
        false
    }
}

/// Closes every file descriptor above stderr in the child, run inside the
/// fork but before exec. Mirrors the default `close_fds=True` policy; a
/// service that sets `use_sockets` skips this so pre-opened listening
/// sockets survive into the child.
fn close_inherited_fds() -> std::io::Result<()> {
    let max_fd = match unsafe { libc::sysconf(libc::_SC_OPEN_MAX) } {
        n if n > 0 => n,
        _ => 1024,
    };
    for fd in 3..max_fd as i32 {
        unsafe {
            libc::close(fd);
        }
    }
    Ok(())
}
