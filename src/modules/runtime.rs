//! Container Runtime
//!
//! Starts module containers and exposes their standard output as a byte
//! stream. The stream reaches EOF when the container exits, so reading to
//! completion doubles as waiting for the container. Start failures surface
//! from `run` itself; read failures surface from the returned reader. The two
//! are classified differently by the stage executors.

use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};

/// Streaming handle to a running container's stdout.
pub type ContainerOutput = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Starts a container from `image` with the given environment and argv,
    /// returning a reader over its stdout. Dropping the reader releases the
    /// container handle.
    async fn run(
        &self,
        image: &str,
        env: &[(String, String)],
        argv: &[String],
    ) -> Result<ContainerOutput>;
}

/// Production runtime shelling out to the local docker daemon.
pub struct DockerRuntime {
    docker_bin: String,
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self {
            docker_bin: "docker".to_string(),
        }
    }

    pub fn with_binary(docker_bin: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
        }
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn run(
        &self,
        image: &str,
        env: &[(String, String)],
        argv: &[String],
    ) -> Result<ContainerOutput> {
        let mut command = Command::new(&self.docker_bin);
        command.arg("run").arg("--rm");
        for (key, value) in env {
            command.arg("--env").arg(format!("{}={}", key, value));
        }
        command.arg(image).args(argv);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start container from image {}", image))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("container stdout was not captured"))?;

        Ok(Box::new(ContainerStdout {
            _child: child,
            stdout,
        }))
    }
}

/// Keeps the child handle alive for as long as its stdout is being read, so
/// the container is reaped (and, via kill-on-drop, stopped) when the reader
/// is dropped.
struct ContainerStdout {
    _child: Child,
    stdout: ChildStdout,
}

impl AsyncRead for ContainerStdout {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}
