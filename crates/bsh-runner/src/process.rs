// SPDX-License-Identifier: MIT OR Apache-2.0
//! Child process spawning, output teeing and exit classification.

use crate::identity::{gid_of, resolve, uid_of};
use crate::result::{ExecResult, SpawnError};
use crate::signal::{Signal, send_signal, signal_name};
use bsh_config::Options;
use std::collections::BTreeMap;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Shell used when none is configured.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// How long a reader may go without receiving bytes after the child exited.
///
/// A grandchild that inherited the pipes can hold them open indefinitely;
/// once a reader has been idle this long it is stopped and whatever was
/// captured so far is returned.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

const CHUNK: usize = 8 * 1024;

// ---------------------------------------------------------------------------
// ShellProgram
// ---------------------------------------------------------------------------

/// Program that interprets the command string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShellProgram {
    /// `/bin/sh -c <command>`.
    #[default]
    Default,
    /// `<program> -c <command>`.
    Program(String),
    /// Execute the command string directly as a program path, without a
    /// shell. Spawn failures such as a missing file surface as
    /// [`ExecResult::error`] instead of a shell exit status of 127.
    None,
}

impl ShellProgram {
    /// Shell program from an optional configured path.
    pub fn from_config(shell: Option<&str>) -> Self {
        match shell {
            Some(path) => Self::Program(path.to_string()),
            None => Self::Default,
        }
    }

    fn command(&self, command: &str) -> Command {
        match self {
            Self::Default => {
                let mut cmd = Command::new(DEFAULT_SHELL);
                cmd.arg("-c").arg(command);
                cmd
            }
            Self::Program(program) => {
                let mut cmd = Command::new(program);
                cmd.arg("-c").arg(command);
                cmd
            }
            Self::None => Command::new(command),
        }
    }
}

// ---------------------------------------------------------------------------
// SpawnSpec
// ---------------------------------------------------------------------------

/// Fully resolved parameters for one spawn.
#[derive(Debug, Clone, Default)]
pub struct SpawnSpec {
    /// Interpreter for the command string.
    pub shell: ShellProgram,
    /// Working directory.
    pub cwd: Option<PathBuf>,
    /// Environment overlay on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Numeric user id to run as.
    pub uid: Option<u32>,
    /// Numeric group id to run as.
    pub gid: Option<u32>,
    /// Detach the child.
    pub background: bool,
    /// Forward captured stdout to the host stdout.
    pub echo_stdout: bool,
    /// Forward captured stderr to the host stderr.
    pub echo_stderr: bool,
    /// Print the command string before spawning.
    pub echo_command: bool,
    /// Send SIGTERM after this long.
    pub timeout: Option<Duration>,
}

impl SpawnSpec {
    /// Build a spec from merged options, looking up user and group names.
    pub fn from_options(options: &Options, shell: ShellProgram) -> Result<Self, SpawnError> {
        let resolved = options.resolve();
        let uid = resolve(resolved.uid, resolved.user.as_deref(), uid_of)?;
        let gid = resolve(resolved.gid, resolved.group.as_deref(), gid_of)?;
        Ok(Self {
            shell,
            cwd: resolved.cd,
            env: resolved.env,
            uid,
            gid,
            background: resolved.bg,
            echo_stdout: !resolved.quiet,
            echo_stderr: !resolved.silent,
            echo_command: resolved.echo,
            timeout: resolved.timeout,
        })
    }
}

// ---------------------------------------------------------------------------
// RunningCommand
// ---------------------------------------------------------------------------

type Capture = Arc<Mutex<Vec<u8>>>;

enum Launch {
    Failed(SpawnError),
    Detached,
    Attached {
        child: Child,
        stdout: Reader,
        stderr: Reader,
        deadline: Option<Instant>,
    },
}

struct Reader {
    buf: Capture,
    task: JoinHandle<()>,
    echo: Option<JoinHandle<()>>,
}

/// A started command whose result has not been collected yet.
pub struct RunningCommand {
    command: String,
    pid: Option<u32>,
    launch: Launch,
}

impl std::fmt::Debug for RunningCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningCommand")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl RunningCommand {
    /// Pid of the child, available as soon as it was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The command string being run.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wait for the child to finish and classify its exit.
    ///
    /// Never fails: spawn errors are reported through [`ExecResult::error`].
    pub async fn wait(self) -> ExecResult {
        let pid = self.pid;
        match self.launch {
            Launch::Failed(err) => ExecResult {
                error: Some(err),
                ..Default::default()
            },
            Launch::Detached => ExecResult {
                pid,
                detached: true,
                ..Default::default()
            },
            Launch::Attached {
                mut child,
                stdout,
                stderr,
                deadline,
            } => {
                let exit = wait_with_deadline(&mut child, pid, deadline).await;
                let stdout = collect(stdout).await;
                let stderr = collect(stderr).await;
                let mut result = ExecResult {
                    pid,
                    stdout,
                    stderr,
                    ..Default::default()
                };
                match exit {
                    Ok(status) => classify(status, &mut result),
                    Err(err) => result.error = Some(SpawnError::new(err)),
                }
                debug!(
                    target: "bsh.runner",
                    ?pid,
                    status = ?result.status,
                    signal = ?result.signal,
                    "command finished"
                );
                result
            }
        }
    }
}

/// Spawn `command` according to `spec`.
///
/// Never fails: a spawn error is carried into the eventual result. The
/// timeout clock starts here.
pub async fn start(command: &str, spec: &SpawnSpec) -> RunningCommand {
    if spec.echo_command {
        let mut out = tokio::io::stdout();
        let line = format!("{command}\n");
        let _ = out.write_all(line.as_bytes()).await;
        let _ = out.flush().await;
    }

    let mut cmd = spec.shell.command(command);
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    cmd.envs(&spec.env);
    if let Some(gid) = spec.gid {
        cmd.gid(gid);
    }
    if let Some(uid) = spec.uid {
        cmd.uid(uid);
    }

    if spec.background {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0);
    } else {
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(target: "bsh.runner", command, error = %err, "spawn failed");
            return RunningCommand {
                command: command.to_string(),
                pid: None,
                launch: Launch::Failed(SpawnError::new(err)),
            };
        }
    };
    let pid = child.id();
    debug!(target: "bsh.runner", command, ?pid, background = spec.background, "spawned");

    if spec.background {
        match spec.timeout {
            Some(timeout) => {
                tokio::spawn(expire_detached(child, pid, Instant::now() + timeout));
            }
            // The runtime reaps the child once it exits.
            None => drop(child),
        }
        return RunningCommand {
            command: command.to_string(),
            pid,
            launch: Launch::Detached,
        };
    }

    let stdout = match child.stdout.take() {
        Some(pipe) => tee(pipe, spec.echo_stdout.then(tokio::io::stdout)),
        None => Reader::empty(),
    };
    let stderr = match child.stderr.take() {
        Some(pipe) => tee(pipe, spec.echo_stderr.then(tokio::io::stderr)),
        None => Reader::empty(),
    };

    RunningCommand {
        command: command.to_string(),
        pid,
        launch: Launch::Attached {
            child,
            stdout,
            stderr,
            deadline: spec.timeout.map(|t| Instant::now() + t),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl Reader {
    fn empty() -> Self {
        Self {
            buf: Capture::default(),
            task: tokio::spawn(async {}),
            echo: None,
        }
    }
}

/// Copy `pipe` into a capture buffer and, when `echo` is set, forward every
/// chunk to `echo` from a separate task.
///
/// Capture never waits on the echo target. A failing echo target is dropped;
/// capture continues.
fn tee<R, W>(mut pipe: R, echo: Option<W>) -> Reader
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (mut forward, echo) = match echo {
        Some(out) => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(tokio::spawn(forward_chunks(rx, out))))
        }
        None => (None, None),
    };
    let buf = Capture::default();
    let sink = Arc::clone(&buf);
    let task = tokio::spawn(async move {
        let mut chunk = vec![0u8; CHUNK];
        loop {
            let n = match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    debug!(target: "bsh.runner", error = %err, "pipe read failed");
                    break;
                }
            };
            sink.lock()
                .expect("capture lock poisoned")
                .extend_from_slice(&chunk[..n]);
            if let Some(tx) = &forward
                && tx.send(chunk[..n].to_vec()).is_err()
            {
                forward = None;
            }
        }
    });
    Reader { buf, task, echo }
}

async fn forward_chunks<W>(mut rx: mpsc::UnboundedReceiver<Vec<u8>>, mut out: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = rx.recv().await {
        let forwarded = match out.write_all(&bytes).await {
            Ok(()) => out.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = forwarded {
            debug!(target: "bsh.runner", error = %err, "echo target failed; echo stopped");
            break;
        }
    }
}

/// Join a reader and decode its capture.
///
/// The reader is stopped once it has received nothing for [`DRAIN_GRACE`].
/// Echo of everything captured finishes before this returns.
async fn collect(reader: Reader) -> String {
    let Reader {
        buf,
        mut task,
        echo,
    } = reader;
    loop {
        let before = captured_len(&buf);
        if tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_ok() {
            break;
        }
        if captured_len(&buf) == before {
            debug!(target: "bsh.runner", "pipe idle after exit; detaching reader");
            task.abort();
            break;
        }
    }
    if let Some(echo) = echo {
        let _ = echo.await;
    }
    let bytes = buf.lock().expect("capture lock poisoned");
    let text = String::from_utf8_lossy(&bytes).into_owned();
    text
}

fn captured_len(buf: &Capture) -> usize {
    buf.lock().expect("capture lock poisoned").len()
}

/// Deliver SIGTERM to a detached child still running at `deadline`.
async fn expire_detached(mut child: Child, pid: Option<u32>, deadline: Instant) {
    tokio::select! {
        _ = child.wait() => return,
        () = tokio::time::sleep_until(deadline) => {}
    }
    warn!(target: "bsh.runner", ?pid, "timeout expired for detached command, sending SIGTERM");
    if let Some(pid) = pid
        && let Err(errno) = send_signal(pid, Signal::SIGTERM)
    {
        debug!(target: "bsh.runner", pid, %errno, "SIGTERM delivery failed");
    }
    let _ = child.wait().await;
}

async fn wait_with_deadline(
    child: &mut Child,
    pid: Option<u32>,
    deadline: Option<Instant>,
) -> io::Result<ExitStatus> {
    let Some(deadline) = deadline else {
        return child.wait().await;
    };
    tokio::select! {
        status = child.wait() => return status,
        () = tokio::time::sleep_until(deadline) => {}
    }
    warn!(target: "bsh.runner", ?pid, "timeout expired, sending SIGTERM");
    if let Some(pid) = pid
        && let Err(errno) = send_signal(pid, Signal::SIGTERM)
    {
        debug!(target: "bsh.runner", pid, %errno, "SIGTERM delivery failed");
    }
    child.wait().await
}

fn classify(status: ExitStatus, result: &mut ExecResult) {
    if let Some(code) = status.code() {
        result.status = Some(code);
    } else if let Some(signo) = status.signal() {
        result.signal = Some(signal_name(signo));
    }
}
