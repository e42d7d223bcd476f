//! Run generator commands under a wall-clock deadline.
//!
//! Each command runs through the shell in its own process group. When the deadline
//! passes the whole group is SIGKILLed, so children spawned by the command die too,
//! and whatever output was captured is discarded. The deadline also bounds collecting
//! output, so a descendant that left the group cannot hold the build open.

use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use metrics::counter;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("spawning `{command}`: {source}")]
    Spawn { command: String, source: std::io::Error },
    #[error("waiting on `{command}`: {source}")]
    Wait { command: String, source: std::io::Error },
    #[error("`{command}` killed after exceeding timeout of {}s", .timeout.as_secs())]
    Killed { command: String, timeout: Duration },
    #[error("`{command}` failed ({status}): {stderr}")]
    Failed { command: String, status: String, stderr: String },
}

fn shell() -> (String, &'static str) {
    #[cfg(unix)]
    let default = ("sh", "-c");
    #[cfg(not(unix))]
    let default = ("cmd", "/C");
    let sh = std::env::var("KILT_SHELL").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| default.0.to_string());
    (sh, default.1)
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run `command` with no stdin and return its stdout.
///
/// `dir` is used as the working directory when it exists on disk. A `timeout` of `None`
/// waits indefinitely.
pub fn run(command: &str, dir: &Path, timeout: Option<Duration>) -> Result<Vec<u8>, ExecError> {
    let (sh, flag) = shell();
    let mut cmd = Command::new(sh);
    cmd.arg(flag).arg(command).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    if dir.is_dir() { cmd.current_dir(dir); }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    counter!("generator_commands_total", 1u64);
    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn { command: command.to_string(), source })?;
    let (tx, rx) = mpsc::channel();
    spawn_reader(child.stdout.take(), Stream::Stdout, tx.clone());
    spawn_reader(child.stderr.take(), Stream::Stderr, tx);
    debug!(pid = child.id(), command, ?timeout, "command started");

    let started = Instant::now();
    let deadline = timeout.map(|limit| started + limit);
    loop {
        match leader_exited(&mut child) {
            Ok(true) => break,
            Ok(false) => {
                if deadline.map_or(false, |d| Instant::now() >= d) {
                    kill_group(&mut child);
                    let _ = child.wait();
                    return Err(timed_out(command, timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                kill_group(&mut child);
                let _ = child.wait();
                return Err(ExecError::Wait { command: command.to_string(), source });
            }
        }
    }

    // Leftover group members would hold the pipes open. Only signal while the
    // unreaped leader still pins the group id.
    if LEADER_PINS_GROUP {
        let _ = signal_group(&child);
    }
    let status = child.wait().map_err(|source| ExecError::Wait { command: command.to_string(), source })?;

    let (mut out, mut err) = (None, None);
    while out.is_none() || err.is_none() {
        let msg = match deadline {
            Some(d) => rx.recv_timeout(d.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match msg {
            Ok((Stream::Stdout, buf)) => out = Some(buf),
            Ok((Stream::Stderr, buf)) => err = Some(buf),
            Err(RecvTimeoutError::Timeout) => {
                warn!(command, "output still open at deadline; a descendant outlived the command");
                return Err(timed_out(command, timeout));
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let (out, err) = (out.unwrap_or_default(), err.unwrap_or_default());
    if !status.success() {
        return Err(ExecError::Failed {
            command: command.to_string(),
            status: describe(status),
            stderr: String::from_utf8_lossy(&err).trim().to_string(),
        });
    }
    debug!(command, bytes = out.len(), elapsed_ms = started.elapsed().as_millis() as u64, "command finished");
    Ok(out)
}

fn timed_out(command: &str, timeout: Option<Duration>) -> ExecError {
    let timeout = timeout.unwrap_or_default();
    counter!("generator_command_timeouts_total", 1u64);
    warn!(command, timeout_secs = timeout.as_secs(), "command timed out; process group killed");
    ExecError::Killed { command: command.to_string(), timeout }
}

trait Pipe: Read + Send + 'static {}
impl Pipe for ChildStdout {}
impl Pipe for ChildStderr {}

/// Read `pipe` to EOF on its own thread and send the buffer. A reader held open
/// past the deadline is abandoned.
fn spawn_reader<R: Pipe>(pipe: Option<R>, stream: Stream, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe { let _ = p.read_to_end(&mut buf); }
        let _ = tx.send((stream, buf));
    });
}

#[cfg(target_os = "linux")]
const LEADER_PINS_GROUP: bool = true;
#[cfg(not(target_os = "linux"))]
const LEADER_PINS_GROUP: bool = false;

/// Whether the leader has exited. On Linux the leader is left unreaped so its pid
/// keeps naming the process group.
#[cfg(target_os = "linux")]
fn leader_exited(child: &mut Child) -> std::io::Result<bool> {
    use nix::sys::wait::{waitid, Id, WaitPidFlag, WaitStatus};
    use nix::unistd::Pid;

    let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;
    match waitid(Id::Pid(Pid::from_raw(child.id() as i32)), flags)? {
        WaitStatus::StillAlive => Ok(false),
        _ => Ok(true),
    }
}

#[cfg(not(target_os = "linux"))]
fn leader_exited(child: &mut Child) -> std::io::Result<bool> {
    Ok(child.try_wait()?.is_some())
}

fn kill_group(child: &mut Child) {
    if let Err(e) = signal_group(child) {
        warn!(error = %e, pid = child.id(), "process group kill failed; killing child only");
        let _ = child.kill();
    }
}

#[cfg(unix)]
fn signal_group(child: &Child) -> std::io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    Ok(killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL)?)
}

#[cfg(not(unix))]
fn signal_group(_child: &Child) -> std::io::Result<()> {
    Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "process groups unsupported on this platform"))
}

fn describe(status: ExitStatus) -> String {
    if let Some(code) = status.code() { return format!("exit status {}", code); }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() { return format!("terminated by signal {}", sig); }
    }
    "terminated".to_string()
}
