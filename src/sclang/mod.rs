//! sclang child processes.
//!
//! Two shapes: a one-shot `sclang -e <code>` run whose stdout is the
//! answer (help lookup), and a long-running interpreter launched to host
//! the language server.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);
pub const INIT_DELAY: Duration = Duration::from_secs(2);
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum SclangError {
    #[error("failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("sclang timeout after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("sclang io error: {0}")]
    Io(#[from] io::Error),
}

/// Run `sclang -e <code>` and return its stdout.
///
/// A run counts as successful if it exits with status 0 or prints anything
/// to stdout; sclang often exits non-zero after printing a valid answer.
///
/// # Errors
/// Returns [`SclangError::Spawn`] if sclang cannot be started,
/// [`SclangError::Timeout`] if it runs longer than `timeout` (the child is
/// killed), and [`SclangError::Failed`] with stderr otherwise.
pub fn run_script(sclang: &Path, code: &str, timeout: Duration) -> Result<String, SclangError> {
    let mut child = Command::new(sclang)
        .arg("-e")
        .arg(code)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SclangError::Spawn {
            path: sclang.to_path_buf(),
            source,
        })?;

    let stdout = child.stdout.take().map(collect);
    let stderr = child.stderr.take().map(collect);
    let status = wait_with_timeout(&mut child, timeout)?;
    let stdout = join_output(stdout);
    let stderr = join_output(stderr);
    tracing::debug!(?status, stdout_len = stdout.len(), "sclang script finished");

    if status.success() || !stdout.is_empty() {
        return Ok(stdout);
    }
    let stderr = stderr.trim();
    Err(SclangError::Failed(if stderr.is_empty() {
        "sclang failed".to_string()
    } else {
        stderr.to_string()
    }))
}

/// Wait for `child`, killing it once `timeout` elapses.
///
/// # Errors
/// Returns [`SclangError::Timeout`] after killing a child that overran.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, SclangError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(pid = child.id(), ?timeout, "killed sclang after timeout");
            return Err(SclangError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn collect<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = reader.read_to_end(&mut bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// The line sclang needs to start the language server on `port`.
pub fn language_server_init(port: u16) -> String {
    format!("LanguageServer.start({port});")
}

/// A long-running interpreter with piped stdio.
///
/// Output is forwarded to the log line by line. The child is killed on drop
/// if it is still running.
#[derive(Debug)]
pub struct SclangProcess {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl SclangProcess {
    /// Launch `sclang -i scvim` and ask it to start the language server.
    ///
    /// Blocks for `init_delay` to let the class library compile before the
    /// init line is written.
    ///
    /// # Errors
    /// Returns an error if sclang cannot be started or its stdin is closed.
    pub fn launch(sclang: &Path, lsp_port: u16, init_delay: Duration) -> Result<Self, SclangError> {
        let mut command = Command::new(sclang);
        command.args(["-i", "scvim"]);
        let mut process = Self::spawn(command).map_err(|err| match err {
            SclangError::Io(source) => SclangError::Spawn {
                path: sclang.to_path_buf(),
                source,
            },
            other => other,
        })?;
        thread::sleep(init_delay);
        process.send_line(&language_server_init(lsp_port))?;
        tracing::info!(pid = process.id(), port = lsp_port, "started sclang with language server");
        Ok(process)
    }

    /// Spawn an arbitrary interpreter command with piped stdio.
    ///
    /// # Errors
    /// Returns an error if the command cannot be started.
    pub fn spawn(mut command: Command) -> Result<Self, SclangError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, pid, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, pid, true);
        }
        let stdin = child.stdin.take();
        Ok(Self { child, stdin })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Write one line of code to the interpreter's stdin.
    ///
    /// # Errors
    /// Returns an error if stdin has been closed.
    pub fn send_line(&mut self, code: &str) -> Result<(), SclangError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe))?;
        stdin.write_all(code.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    /// The exit status, if the interpreter has exited.
    ///
    /// # Errors
    /// Returns an error if the status cannot be queried.
    pub fn try_exited(&mut self) -> Result<Option<ExitStatus>, SclangError> {
        let status = self.child.try_wait()?;
        if let Some(status) = status {
            tracing::info!(pid = self.child.id(), ?status, "sclang exited");
        }
        Ok(status)
    }

    /// Ask the interpreter to exit, then kill it if it has not within `grace`.
    ///
    /// # Errors
    /// Returns an error if the process cannot be killed or reaped.
    pub fn shutdown(&mut self, grace: Duration) -> Result<ExitStatus, SclangError> {
        if self.child.try_wait()?.is_none() {
            if let Err(err) = self.send_line("0.exit;") {
                tracing::debug!(%err, "could not send exit to sclang");
            }
        }
        // Closing stdin lets interpreters that read to EOF exit too.
        self.stdin = None;
        match wait_with_timeout(&mut self.child, grace) {
            Ok(status) => Ok(status),
            Err(SclangError::Timeout(_)) => Ok(self.child.wait()?),
            Err(err) => Err(err),
        }
    }
}

impl Drop for SclangProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn forward_lines<R: Read + Send + 'static>(reader: R, pid: u32, is_stderr: bool) {
    thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            let Ok(line) = line else { break };
            if is_stderr {
                tracing::warn!(target: "sclang", pid, "{line}");
            } else {
                tracing::info!(target: "sclang", pid, "{line}");
            }
        }
        tracing::debug!(pid, is_stderr, "sclang output closed");
    });
}
