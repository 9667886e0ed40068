//! Child process execution behind the [`CommandRunner`] trait.
//!
//! Steps describe what to run with a [`CommandSpec`]; [`SystemRunner`] spawns
//! it. Tests substitute a scripted runner that records specs without spawning.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::CommandStatus;

/// Where the child's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Child writes straight to the deployer's own streams.
    Inherit,
    /// stdout and stderr are captured separately.
    Capture,
}

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub output: OutputMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            output: OutputMode::Inherit,
        }
    }

    /// Build from an argv array (`["yarn", "install", ...]`).
    pub fn from_argv(argv: &[String], cwd: impl Into<PathBuf>) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("command must not be empty"))?;
        Ok(Self::new(program.clone(), cwd).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn captured(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }

    /// True when this is `<program> <first_arg> ...`.
    pub fn is(&self, program: &str, first_arg: &str) -> bool {
        self.program == program && self.args.first().is_some_and(|arg| arg == first_arg)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.cwd);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured bytes kept per stream unless configured otherwise.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// How long reader threads may keep draining pipes after a timed-out child is
/// killed. Grandchildren can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Finished command: how it ended plus any captured output.
///
/// Output buffers stay empty for [`OutputMode::Inherit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes of stdout discarded beyond the output limit.
    pub stdout_truncated: usize,
    /// Bytes of stderr discarded beyond the output limit.
    pub stderr_truncated: usize,
}

impl CommandResult {
    pub fn from_status(status: CommandStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn stdout_truncated_notice(&self, label: &str) -> String {
        if self.stdout_truncated > 0 {
            format!(
                "\n[{label} stdout truncated {} bytes]\n",
                self.stdout_truncated
            )
        } else {
            String::new()
        }
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }
}

/// Abstraction over spawning external commands.
pub trait CommandRunner {
    /// Run `spec` to completion.
    ///
    /// A child that cannot be spawned is reported through
    /// [`CommandStatus::spawn_error`], not as `Err`. `Err` is reserved for the
    /// runner itself failing (waiting on or reading from a live child).
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult>;
}

/// Runner that spawns real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Option<Duration>,
    output_limit_bytes: usize,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    /// Bound the captured bytes kept per stream; the rest is drained and counted.
    pub fn with_output_limit(mut self, output_limit_bytes: usize) -> Self {
        self.output_limit_bytes = output_limit_bytes;
        self
    }
}

impl CommandRunner for SystemRunner {
    #[instrument(skip_all, fields(program = %spec.program, cwd = %spec.cwd.display()))]
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult> {
        match spec.output {
            OutputMode::Inherit => run_inherited(spec, self.timeout),
            OutputMode::Capture => run_captured(spec, self.timeout, self.output_limit_bytes),
        }
    }
}

fn run_inherited(spec: &CommandSpec, timeout: Option<Duration>) -> Result<CommandResult> {
    let mut cmd = spec.to_command();
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    debug!(command = %spec, "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Ok(CommandResult::from_status(CommandStatus::spawn_failed(
                e.to_string(),
            )));
        }
    };

    let (status, timed_out) = wait_child(&mut child, timeout)?;
    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandResult::from_status(CommandStatus {
        code: status.code(),
        timed_out,
        spawn_error: None,
    }))
}

/// Run a command capturing stdout/stderr without risking pipe deadlocks.
///
/// Both streams are drained concurrently while the child runs. After a timeout
/// kill, draining is bounded by [`DRAIN_GRACE`] and whatever was read so far is
/// returned.
fn run_captured(
    spec: &CommandSpec,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CommandResult> {
    let mut cmd = spec.to_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(command = %spec, "spawning child process (captured)");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Ok(CommandResult::from_status(CommandStatus::spawn_failed(
                e.to_string(),
            )));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_reader = StreamReader::spawn(stdout, output_limit_bytes);
    let stderr_reader = StreamReader::spawn(stderr, output_limit_bytes);

    let (status, timed_out) = wait_child(&mut child, timeout)?;

    let drain_deadline = timed_out.then(|| Instant::now() + DRAIN_GRACE);
    let (stdout, stdout_truncated) = stdout_reader.finish(drain_deadline).context("join stdout")?;
    let (stderr, stderr_truncated) = stderr_reader.finish(drain_deadline).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandResult {
        status: CommandStatus {
            code: status.code(),
            timed_out,
            spawn_error: None,
        },
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

/// Bytes kept so far plus the count discarded beyond the limit.
#[derive(Debug, Default)]
struct Captured {
    buf: Vec<u8>,
    truncated: usize,
}

/// Background reader for one child pipe.
///
/// Output accumulates in a shared buffer so it can be collected even when the
/// reader is still blocked on a pipe held open by a grandchild.
struct StreamReader {
    captured: Arc<Mutex<Captured>>,
    done: mpsc::Receiver<Result<()>>,
}

impl StreamReader {
    fn spawn<R: Read + Send + 'static>(reader: R, limit: usize) -> Self {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let (tx, done) = mpsc::channel();
        let shared = Arc::clone(&captured);
        thread::spawn(move || {
            // Receiver gone means the result is no longer wanted.
            let _ = tx.send(read_stream_limited(reader, limit, &shared));
        });
        Self { captured, done }
    }

    /// Wait for the reader to hit EOF, or until `deadline` when one is given.
    fn finish(self, deadline: Option<Instant>) -> Result<(Vec<u8>, usize)> {
        let finished = match deadline {
            None => Some(self.done.recv()),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match self.done.recv_timeout(remaining) {
                    Ok(result) => Some(Ok(result)),
                    Err(mpsc::RecvTimeoutError::Timeout) => None,
                    Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(mpsc::RecvError)),
                }
            }
        };
        match finished {
            Some(Ok(result)) => result?,
            Some(Err(_)) => return Err(anyhow!("output reader thread panicked")),
            None => warn!("pipe still held open after kill, returning partial output"),
        }
        let mut captured = self
            .captured
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?;
        Ok((std::mem::take(&mut captured.buf), captured.truncated))
    }
}

/// Wait for `child`, killing it once `timeout` elapses.
fn wait_child(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        return Ok((child.wait().context("wait for command")?, false));
    };
    match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => Ok((status, false)),
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            child.kill().context("kill command")?;
            let status = child.wait().context("wait command after kill")?;
            Ok((status, true))
        }
    }
}

fn read_stream_limited<R: Read>(
    mut reader: R,
    limit: usize,
    captured: &Mutex<Captured>,
) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let mut captured = captured
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?;
        let remaining = limit.saturating_sub(captured.buf.len());
        let keep = n.min(remaining);
        captured.buf.extend_from_slice(&chunk[..keep]);
        captured.truncated += n - keep;
    }

    Ok(())
}
