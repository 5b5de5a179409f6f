use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Prefix of the notice appended to the output of a process that was killed
/// at its deadline.
pub const TIMEOUT_NOTICE: &str = "Timeout: No response in";

/// How long to keep draining pipes after the process is gone. A grandchild
/// that inherited the pipes can hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How a bounded process run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// The process exited on its own with this code.
    Exited(i32),
    /// The process was terminated by a signal it did not receive from us.
    Signaled,
    /// The deadline passed and the process was killed.
    TimedOut(Duration),
}

impl ExitState {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<ExitStatus> for ExitState {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Self::Exited(code),
            None => Self::Signaled,
        }
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit status {code}"),
            Self::Signaled => write!(f, "terminated by signal"),
            Self::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs_f64()),
        }
    }
}

/// Everything a bounded run captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: ExitState,
    pub stdout: Vec<u8>,
    /// Standard error, followed by the timeout notice when the run was killed.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Standard output followed by standard error.
    pub fn combined(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.stdout.len() + self.stderr.len());
        out.extend_from_slice(&self.stdout);
        out.extend_from_slice(&self.stderr);
        out
    }

    pub fn combined_lossy(&self) -> String {
        String::from_utf8_lossy(&self.combined()).into_owned()
    }
}

/// Runs `command` to completion or kills it once `timeout` has elapsed.
///
/// Output produced before the deadline is kept; a killed run reports
/// [`ExitState::TimedOut`] and gets a [`TIMEOUT_NOTICE`] line appended to its
/// stderr. Failing to start the process is returned as [`Error::Command`],
/// never as an exit state.
pub async fn run_bounded(
    command: &mut Command,
    input: Option<&[u8]>,
    timeout: Duration,
) -> Result<ProcessOutput> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or(Error::PipeCaptureFailed("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(Error::PipeCaptureFailed("stderr"))?;

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let readers = [
        tokio::spawn(drain(stdout, Arc::clone(&stdout_buf))),
        tokio::spawn(drain(stderr, Arc::clone(&stderr_buf))),
    ];

    let writer = match (input, child.stdin.take()) {
        (Some(data), Some(mut stdin)) => {
            let data = data.to_vec();
            Some(tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&data).await {
                    debug!(%err, "child stopped reading stdin");
                }
                // stdin is dropped here, closing the pipe
            }))
        }
        _ => None,
    };

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => ExitState::from(status?),
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "process exceeded deadline, killing it");
            child.kill().await?;
            ExitState::TimedOut(timeout)
        }
    };

    if let Some(writer) = writer {
        writer.abort();
    }
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            debug!("pipe still open after process exit, keeping buffered output");
            abort.abort();
        }
    }

    let stdout = std::mem::take(&mut *stdout_buf.lock().await);
    let mut stderr = std::mem::take(&mut *stderr_buf.lock().await);
    if let ExitState::TimedOut(after) = status {
        stderr.extend_from_slice(
            format!("\n{TIMEOUT_NOTICE} {} seconds\n", after.as_secs_f64()).as_bytes(),
        );
    }

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

async fn drain<R>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
            Err(err) => {
                debug!(%err, "pipe read failed");
                break;
            }
        }
    }
}
