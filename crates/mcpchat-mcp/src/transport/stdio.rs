//! Local-process transport: newline-delimited JSON over stdin/stdout.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcpchat_core::McpServerConfig;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use super::process::{StderrTail, read_lines_lossy, shutdown_child, spawn_stderr_reader};
use super::{Transport, TransportError, TransportHandle};
use crate::protocol::JsonRpcMessage;

/// Time a server gets to exit on SIGTERM before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long stdout EOF waits for the stderr reader to drain.
const STDERR_DRAIN: Duration = Duration::from_millis(500);

/// Transport for servers launched as child processes.
pub struct StdioTransport {
    server: String,
    stdin: Mutex<Option<BufWriter<ChildStdin>>>,
    child: Mutex<Option<Child>>,
    stderr_tail: Arc<StderrTail>,
}

impl StdioTransport {
    /// Spawn `command args` with the inherited environment plus `env` overrides.
    pub fn spawn(config: &McpServerConfig) -> Result<TransportHandle, TransportError> {
        let command = config
            .command
            .as_deref()
            .ok_or(mcpchat_core::ConfigError::MissingCommand)?;
        let args = config.args.as_deref().unwrap_or_default();

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(env) = &config.env {
            cmd.envs(env);
        }

        let mut child = cmd.spawn().map_err(|source| TransportError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let server = config.display_name().to_string();
        let pid = child.id();
        tracing::info!(server = %server, pid = ?pid, command = %command, "Spawned MCP server process");

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("child stdin was not captured"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("child stdout was not captured"))
        })?;

        let stderr_tail = Arc::new(StderrTail::default());
        let stderr_reader = child
            .stderr
            .take()
            .map(|stderr| spawn_stderr_reader(stderr, server.clone(), Arc::clone(&stderr_tail)));

        let (tx, incoming) = mpsc::unbounded_channel();
        let reader_server = server.clone();
        tokio::spawn(async move {
            let result = read_lines_lossy(stdout, |line| {
                let line = line.trim();
                if line.is_empty() {
                    return true;
                }
                match JsonRpcMessage::parse_frame(line) {
                    Ok(messages) => messages.into_iter().all(|m| tx.send(m).is_ok()),
                    Err(_) => {
                        // npx and friends sometimes print banners on stdout
                        debug!(server = %reader_server, "Skipping non-JSON stdout line: {}", line);
                        true
                    }
                }
            })
            .await;

            if let Err(e) = result {
                debug!(server = %reader_server, error = %e, "stdout reader exiting due to read error");
            }
            debug!(server = %reader_server, "MCP server stdout closed");

            // Closing `incoming` ends the session, so let the last stderr
            // lines reach the tail first for the failure message
            if let Some(stderr_reader) = stderr_reader {
                let _ = tokio::time::timeout(STDERR_DRAIN, stderr_reader).await;
            }
            drop(tx);
        });

        let transport = Self {
            server,
            stdin: Mutex::new(Some(BufWriter::new(stdin))),
            child: Mutex::new(Some(child)),
            stderr_tail,
        };

        Ok(TransportHandle {
            transport: Arc::new(transport),
            incoming,
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(message)
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        line.push(b'\n');

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(&line).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping stdin signals EOF, which well-behaved servers treat as shutdown
        drop(self.stdin.lock().await.take());

        let Some(child) = self.child.lock().await.take() else {
            return Ok(());
        };

        match shutdown_child(child, SHUTDOWN_GRACE).await {
            Ok(status) => {
                debug!(server = %self.server, %status, "MCP server process exited");
                Ok(())
            }
            Err(e) => {
                warn!(server = %self.server, error = %e, "Failed to stop MCP server process");
                Err(e.into())
            }
        }
    }

    fn diagnostics(&self) -> Option<String> {
        self.stderr_tail.snapshot()
    }
}
