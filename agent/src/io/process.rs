//! Script execution under a wall-clock timeout with bounded output capture.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::error::{ActionError, ActionOutcome};
use crate::core::report::{RunReport, compose_run_report};
use crate::io::workspace::WorkingRoot;

pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 100_000;

/// Which scripts may run, with what, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPolicy {
    /// Program that receives the script path as its first argument.
    pub interpreter: String,
    /// Required file extension, without the leading dot.
    pub extension: String,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Default for ScriptPolicy {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            extension: "py".to_string(),
            timeout: DEFAULT_SCRIPT_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

/// Run `file_path` inside the root with the policy's interpreter.
///
/// The working directory is the root itself. The timeout covers the script
/// and everything it spawns: if the deadline passes while any of them still
/// holds stdout or stderr open, the whole process group is killed and
/// whatever was printed is discarded.
#[instrument(skip(root, policy), fields(interpreter = %policy.interpreter))]
pub fn run_script(
    root: &WorkingRoot,
    policy: &ScriptPolicy,
    file_path: &str,
    args: &[String],
) -> ActionOutcome {
    let script = resolve_script(root, policy, file_path)?;

    let mut cmd = Command::new(&policy.interpreter);
    cmd.arg(&script).args(args).current_dir(root.path());

    let finished = execute(cmd, policy.timeout, policy.output_limit_bytes)
        .map_err(|err| ActionError::io(format!("execute \"{file_path}\""), err))?;
    let Completion::Exited(run) = finished else {
        return Err(ActionError::Timeout {
            secs: policy.timeout.as_secs(),
        });
    };

    let stdout = String::from_utf8_lossy(&run.stdout.bytes);
    let stderr = String::from_utf8_lossy(&run.stderr.bytes);
    Ok(compose_run_report(&RunReport {
        stdout: &stdout,
        stderr: &stderr,
        exit_code: run.exit_code,
        stdout_truncated: run.stdout.truncated,
        stderr_truncated: run.stderr.truncated,
    }))
}

fn resolve_script(
    root: &WorkingRoot,
    policy: &ScriptPolicy,
    file_path: &str,
) -> Result<PathBuf, ActionError> {
    let script = root.resolve(file_path, "execute")?;
    if !script.exists() {
        return Err(ActionError::NotFound {
            path: file_path.to_string(),
        });
    }
    if !has_extension(&script, &policy.extension) || !script.is_file() {
        return Err(ActionError::ExtensionRejected {
            path: file_path.to_string(),
            extension: policy.extension.clone(),
        });
    }
    Ok(script)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

enum Completion {
    Exited(FinishedRun),
    TimedOut,
}

struct FinishedRun {
    /// `None` when the script was ended by a signal.
    exit_code: Option<i32>,
    stdout: Captured,
    stderr: Captured,
}

#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    /// Bytes read past the limit and dropped.
    truncated: usize,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Spawn `cmd` in its own process group and collect its output until it
/// exits and both pipes close, or until `timeout` elapses.
///
/// Pipes are drained on background threads so a chatty child never blocks
/// on a full pipe. The threads report over a channel, which lets the wait
/// for them share the deadline with the wait for the child.
fn execute(mut cmd: Command, timeout: Duration, output_limit_bytes: usize) -> io::Result<Completion> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

    let deadline = Instant::now() + timeout;
    let mut child = cmd.spawn()?;
    debug!(pid = child.id(), "script started");

    let (tx, rx) = mpsc::channel();
    let stdout = child.stdout.take().ok_or_else(|| io::Error::other("stdout was not piped"))?;
    let stderr = child.stderr.take().ok_or_else(|| io::Error::other("stderr was not piped"))?;
    spawn_capture(Stream::Stdout, stdout, output_limit_bytes, tx.clone());
    spawn_capture(Stream::Stderr, stderr, output_limit_bytes, tx);

    let Some(status) = child.wait_timeout(timeout)? else {
        warn!(timeout_secs = timeout.as_secs(), "script timed out, killing its process group");
        terminate(&mut child)?;
        return Ok(Completion::TimedOut);
    };

    let mut stdout = Captured::default();
    let mut stderr = Captured::default();
    for _ in 0..2 {
        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok((Stream::Stdout, captured)) => stdout = captured?,
            Ok((Stream::Stderr, captured)) => stderr = captured?,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "script exited but its children kept the output open past the deadline"
                );
                kill_process_group(&child);
                return Ok(Completion::TimedOut);
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::other("output capture thread stopped unexpectedly"));
            }
        }
    }

    if stdout.truncated > 0 || stderr.truncated > 0 {
        warn!(
            stdout_truncated = stdout.truncated,
            stderr_truncated = stderr.truncated,
            "script output truncated"
        );
    }
    debug!(exit_code = ?status.code(), "script finished");
    Ok(Completion::Exited(FinishedRun {
        exit_code: status.code(),
        stdout,
        stderr,
    }))
}

fn spawn_capture<R: Read + Send + 'static>(
    stream: Stream,
    reader: R,
    limit: usize,
    tx: Sender<(Stream, io::Result<Captured>)>,
) {
    thread::spawn(move || {
        // The receiver is gone once the run has timed out; nothing to report then.
        let _ = tx.send((stream, capture(reader, limit)));
    });
}

/// Keep the first `limit` bytes and count the rest while draining the pipe.
fn capture<R: Read>(mut reader: R, limit: usize) -> io::Result<Captured> {
    let mut bytes = Vec::new();
    (&mut reader)
        .take(u64::try_from(limit).unwrap_or(u64::MAX))
        .read_to_end(&mut bytes)?;
    let dropped = io::copy(&mut reader, &mut io::sink())?;
    Ok(Captured {
        bytes,
        truncated: usize::try_from(dropped).unwrap_or(usize::MAX),
    })
}

fn terminate(child: &mut Child) -> io::Result<()> {
    kill_process_group(child);
    if let Err(err) = child.kill() {
        debug!(error = %err, "direct kill after group kill failed");
    }
    child.wait()?;
    Ok(())
}

/// SIGKILL every process in the child's group, grandchildren included.
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        warn!(pid = child.id(), "pid out of range, cannot kill process group");
        return;
    };
    // SAFETY: kill(2) takes no pointers. The negative id addresses the group
    // created by `process_group(0)`, whose id equals the child's pid.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %io::Error::last_os_error(), "process group kill failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}
