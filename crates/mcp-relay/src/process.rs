//! MCP server subprocess lifecycle.
//!
//! [`ServerProcess`] is one spawned child with framed stdio; [`ServerHandle`]
//! is the STOPPED/RUNNING slot the bridge drives. Stop is SIGTERM, a bounded
//! wait, then SIGKILL.

use std::process::Stdio;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::bridge::codec::{JsonLineCodec, JsonLineError};
use crate::bridge::protocol::{RpcRequest, RpcResponse};

/// Grace period between requesting termination and forcing it.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// Program and arguments used to launch the MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a whitespace-separated command line. No shell quoting rules;
    /// arguments with embedded spaces cannot be expressed.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl std::fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{stream} not captured")]
    StreamMissing { stream: &'static str },
}

/// A running MCP server child with its framed standard streams.
///
/// The streams are owned here exclusively; nothing else reads or writes the
/// pipes. stderr is drained by a background task into the log stream.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    writer: FramedWrite<ChildStdin, JsonLineCodec<RpcRequest>>,
    reader: FramedRead<ChildStdout, JsonLineCodec<RpcResponse>>,
}

impl ServerProcess {
    pub fn spawn(command: &ServerCommand) -> Result<Self, SpawnError> {
        tracing::info!(command = %command, "Starting MCP server process");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpawnError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or(SpawnError::StreamMissing { stream: "stdin" })?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SpawnError::StreamMissing { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SpawnError::StreamMissing { stream: "stderr" })?;

        forward_stderr(stderr);

        tracing::debug!(pid = child.id(), "MCP server process started");

        Ok(Self {
            child,
            writer: FramedWrite::new(stdin, JsonLineCodec::new()),
            reader: FramedRead::new(stdout, JsonLineCodec::new()),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Writes one request line and flushes it through to the pipe.
    pub async fn send(&mut self, request: RpcRequest) -> Result<(), JsonLineError> {
        self.writer.send(request).await
    }

    /// Reads the next response line. `None` means the server closed stdout.
    pub async fn recv(&mut self) -> Option<Result<RpcResponse, JsonLineError>> {
        self.reader.next().await
    }

    /// Liveness without blocking.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Terminates the child: close stdin, SIGTERM, wait up to `grace`, then
    /// SIGKILL. Failures along the way are logged, never returned.
    pub async fn shutdown(self, grace: Duration) {
        let Self {
            mut child,
            writer,
            reader,
        } = self;

        // Closing stdin is the polite stop signal for a stdio server.
        drop(writer);
        drop(reader);

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::debug!(error = %e, "SIGTERM failed (process may have already exited)");
            }
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => tracing::info!(%status, "MCP server process exited"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to reap MCP server process"),
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs_f64(),
                    "MCP server did not exit within grace period, killing"
                );
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill MCP server process");
                }
            }
        }
    }
}

/// Relays the child's stderr lines into our logs. Ends at EOF.
fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.is_empty() {
                tracing::info!(target: "mcp_relay::server", "{}", line);
            }
        }
    });
}

/// The STOPPED/RUNNING slot for the server process.
///
/// `None` is STOPPED, `Some` is RUNNING. All transitions go through
/// [`start`](Self::start), [`stop`](Self::stop) and
/// [`restart`](Self::restart).
pub struct ServerHandle {
    command: ServerCommand,
    process: Option<ServerProcess>,
}

impl ServerHandle {
    pub fn new(command: ServerCommand) -> Self {
        Self {
            command,
            process: None,
        }
    }

    pub fn command(&self) -> &ServerCommand {
        &self.command
    }

    /// Spawns the server if no process is held and returns the running
    /// process. No-op when one is already held; a process that exited on its
    /// own is discovered as a fault by the next exchange, not here.
    pub fn start(&mut self) -> Result<&mut ServerProcess, SpawnError> {
        let process = match self.process.take() {
            Some(process) => process,
            None => ServerProcess::spawn(&self.command)?,
        };
        Ok(self.process.insert(process))
    }

    /// Stops the held process with [`STOP_GRACE`]. Idempotent; the slot is
    /// always cleared, even if termination signaling fails.
    pub async fn stop(&mut self) {
        if let Some(process) = self.process.take() {
            process.shutdown(STOP_GRACE).await;
        }
    }

    /// Stop, then best-effort start. A failed start leaves the handle
    /// STOPPED and the next call retries.
    pub async fn restart(&mut self) {
        self.stop().await;
        if let Err(error) = self.start() {
            tracing::warn!(error = %error, "Failed to restart MCP server");
        }
    }

    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => process.is_alive(),
            None => false,
        }
    }
}
