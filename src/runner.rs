//! Timed subprocess execution with combined output capture
//!
//! Each invocation runs in its own process group so a timeout kill takes
//! down the measurement wrapper and the benchmark together. Being outside
//! the terminal's foreground group, the benchmark does not see Ctrl-C;
//! [`forward_interrupts`] makes the harness kill it on the way out.

use crate::error::{HarnessError, Result};
use nix::sys::signal::{
    killpg, raise, sigaction, signal, SaFlags, SigAction, SigHandler, SigSet, Signal,
};
use nix::unistd::Pid;
use std::fmt;
use std::fs::File;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Process group of the invocation currently running, 0 when idle
static ACTIVE_GROUP: AtomicI32 = AtomicI32::new(0);

fn active_group() -> Option<Pid> {
    match ACTIVE_GROUP.load(Ordering::SeqCst) {
        0 => None,
        pgid => Some(Pid::from_raw(pgid)),
    }
}

extern "C" fn kill_active_group(signum: nix::libc::c_int) {
    // Only async-signal-safe calls from here on
    if let Some(pgid) = active_group() {
        let _ = killpg(pgid, Signal::SIGKILL);
    }
    if let Ok(sig) = Signal::try_from(signum) {
        // SAFETY: resetting to the default disposition installs no handler
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
        let _ = raise(sig);
    }
}

/// Kill the running benchmark's process group on SIGINT or SIGTERM, then
/// terminate with the same signal
pub fn forward_interrupts() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(kill_active_group),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only reads an atomic and calls killpg, signal and raise
        unsafe { sigaction(sig, &action) }.map_err(std::io::Error::from)?;
    }
    Ok(())
}

/// How a single invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Process exited normally with this code
    Exited(i32),
    /// Process was terminated by this signal
    Signaled(i32),
    /// Process exceeded the timeout and was killed
    TimedOut,
    /// Process could not be started at all
    LaunchFailed,
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitOutcome::Exited(code),
            (None, Some(sig)) => ExitOutcome::Signaled(sig),
            // Neither code nor signal: report as abnormal exit
            (None, None) => ExitOutcome::Exited(-1),
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exit code {code}"),
            ExitOutcome::Signaled(sig) => write!(f, "killed by signal {sig}"),
            ExitOutcome::TimedOut => f.write_str("timed out"),
            ExitOutcome::LaunchFailed => f.write_str("failed to launch"),
        }
    }
}

/// A fully described subprocess invocation
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Command prefix, e.g. `/usr/bin/time -f ...`; empty runs the program directly
    pub wrapper: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_wrapper(mut self, wrapper: &[String]) -> Self {
        self.wrapper = wrapper.to_vec();
        self
    }

    pub fn with_env(mut self, env: &[(String, String)]) -> Self {
        self.env.extend(env.iter().cloned());
        self
    }

    /// Render the invocation as a shell-like string for logs
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = self.wrapper.clone();
        parts.push(self.program.display().to_string());
        parts.extend(self.args.iter().cloned());
        let env: Vec<String> = self.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        if env.is_empty() {
            parts.join(" ")
        } else {
            format!("{} {}", env.join(" "), parts.join(" "))
        }
    }

    fn command(&self) -> Command {
        let mut cmd = match self.wrapper.split_first() {
            Some((head, rest)) => {
                let mut cmd = Command::new(head);
                cmd.args(rest).arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        };
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .process_group(0);
        cmd
    }

    fn launched_program(&self) -> PathBuf {
        self.wrapper
            .first()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.program.clone())
    }
}

/// Run `invocation`, writing stdout and stderr into `output`, killing it after `timeout`
///
/// The output file is created before launch, so it exists (possibly empty)
/// whatever the outcome.
pub fn run_to_file(invocation: &Invocation, output: &Path, timeout: Duration) -> Result<ExitOutcome> {
    let stdout = File::create(output)?;
    let stderr = stdout.try_clone()?;

    tracing::debug!("run: {}", invocation.display());

    let mut cmd = invocation.command();
    cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
    let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
        program: invocation.launched_program(),
        source,
    })?;

    ACTIVE_GROUP.store(child.id() as i32, Ordering::SeqCst);
    let outcome = wait_with_timeout(&mut child, timeout);
    ACTIVE_GROUP.store(0, Ordering::SeqCst);
    outcome
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitOutcome> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(ExitOutcome::from(status)),
            Ok(None) => {}
            Err(e) => {
                // Still running and writing its artifact
                if let Err(reap_err) = abandon(child) {
                    tracing::warn!("Could not reap child {}: {}", child.id(), reap_err);
                }
                return Err(e.into());
            }
        }
        if start.elapsed() >= timeout {
            abandon(child)?;
            return Ok(ExitOutcome::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child's whole process group and reap the child
fn abandon(child: &mut Child) -> Result<()> {
    kill_process_group(child);
    child.wait()?;
    Ok(())
}

fn kill_process_group(child: &mut Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        tracing::warn!("Failed to kill process group {}: {}", pgid, e);
        let _ = child.kill();
    }
}
