//! Child-process helpers for the stdio transport.
//!
//! MCP servers are often launched through `npx`/`uvx`, which can print
//! non-UTF8 bytes and noisy banners on stderr. Lines are read byte-wise with
//! lossy decoding so the reader never dies on bad input.

use std::collections::VecDeque;
use std::io;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
#[cfg(unix)]
use tokio::time::timeout;
use tracing::debug;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

const STDERR_TAIL_LINES: usize = 20;

/// Last few stderr lines of a server, kept for error messages.
#[derive(Debug, Default)]
pub(crate) struct StderrTail {
    lines: Mutex<VecDeque<String>>,
}

impl StderrTail {
    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == STDERR_TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub(crate) fn snapshot(&self) -> Option<String> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.is_empty() {
            None
        } else {
            Some(lines.iter().cloned().collect::<Vec<_>>().join("\n"))
        }
    }
}

/// Read a line-oriented stream until EOF, handing each line to `on_line`.
///
/// Trailing `\n`/`\r\n` is stripped; invalid UTF-8 is replaced.
pub(crate) async fn read_lines_lossy<R, F>(stream: R, mut on_line: F) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(String) -> bool,
{
    let mut reader = BufReader::new(stream);
    let mut buf: Vec<u8> = Vec::with_capacity(1024);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        if !on_line(String::from_utf8_lossy(&buf).into_owned()) {
            return Ok(());
        }
    }
}

/// Forward a server's stderr to tracing and keep a bounded tail.
///
/// The returned handle completes when stderr reaches EOF.
pub(crate) fn spawn_stderr_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    server: String,
    tail: Arc<StderrTail>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = read_lines_lossy(stream, |line| {
            if !line.trim().is_empty() {
                debug!(server = %server, "stderr: {}", line);
                tail.push(line);
            }
            true
        })
        .await;

        if let Err(e) = result {
            debug!(server = %server, error = %e, "stderr reader exiting due to read error");
        }
        debug!(server = %server, "stderr reader task exiting");
    })
}

/// Shut down a child with SIGTERM, escalating to SIGKILL after `grace`.
///
/// On non-Unix platforms the child is killed immediately.
pub(crate) async fn shutdown_child(mut child: Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        let Some(pid) = child.id() else {
            // Already reaped
            return child.wait().await;
        };
        let pid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
            if e == nix::errno::Errno::ESRCH {
                return child.wait().await;
            }
            return Err(io::Error::other(e));
        }

        if let Ok(result) = timeout(grace, child.wait()).await {
            return result;
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_lines_lossy_strips_line_endings() {
        let input: &[u8] = b"first\r\nsecond\n\xffbad\nlast";
        let mut lines = Vec::new();
        read_lines_lossy(input, |line| {
            lines.push(line);
            true
        })
        .await
        .unwrap();

        assert_eq!(lines[0], "first");
        assert_eq!(lines[1], "second");
        assert!(lines[2].ends_with("bad"));
        assert_eq!(lines[3], "last");
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let tail = StderrTail::default();
        assert!(tail.snapshot().is_none());
        for i in 0..(STDERR_TAIL_LINES + 5) {
            tail.push(format!("line {i}"));
        }
        let snapshot = tail.snapshot().unwrap();
        assert_eq!(snapshot.lines().count(), STDERR_TAIL_LINES);
        assert!(snapshot.starts_with("line 5"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_shutdown_responds_to_sigterm() {
        let child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");

        let status = shutdown_child(child, Duration::from_secs(5)).await.unwrap();
        assert!(!status.success());
    }
}
