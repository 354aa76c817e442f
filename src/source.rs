//! Running the external control-plane client.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

/// A readable byte stream from a spawned process.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Captured result of a query run to completion.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl QueryOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr, lossily decoded and trimmed.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));

        text.trim_end().to_string()
    }
}

/// A started long-running process.
pub struct Spawned {
    /// Stdout.
    pub primary: ByteStream,
    /// Stderr.
    pub diagnostic: ByteStream,
    /// The underlying child, when there is one to reap.
    pub child: Option<Child>,
}

impl Spawned {
    /// Wraps a pair of streams that are not backed by a child process.
    pub fn from_streams<P, D>(primary: P, diagnostic: D) -> Self
    where
        P: AsyncRead + Send + 'static,
        D: AsyncRead + Send + 'static,
    {
        Spawned {
            primary: Box::pin(primary),
            diagnostic: Box::pin(diagnostic),
            child: None,
        }
    }
}

impl fmt::Debug for Spawned {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("Spawned")
            .field("primary", &"<elided>")
            .field("diagnostic", &"<elided>")
            .field("child", &self.child)
            .finish()
    }
}

/// Capability to run the control-plane client.
///
/// The fleet only ever talks to the outside world through this trait, so
/// tests can substitute scripted output for a real cluster.
#[async_trait]
pub trait ProcessSource: Send + Sync {
    /// Name of the program being run, for error reporting.
    fn program(&self) -> &str;

    /// Runs the client with `args` to completion.
    async fn query(&self, args: &[&str]) -> io::Result<QueryOutput>;

    /// Starts the client with `args`, returning its two output streams
    /// without waiting for it to exit.
    fn start(&self, args: &[&str]) -> io::Result<Spawned>;
}

/// [`ProcessSource`] backed by a `kubectl` executable.
#[derive(Clone, Debug)]
pub struct Kubectl {
    program: String,
}

impl Kubectl {
    pub fn new(program: impl Into<String>) -> Self {
        Kubectl {
            program: program.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

        cmd
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl ProcessSource for Kubectl {
    fn program(&self) -> &str {
        &self.program
    }

    async fn query(&self, args: &[&str]) -> io::Result<QueryOutput> {
        let output = self.command(args).output().await?;

        Ok(QueryOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn start(&self, args: &[&str]) -> io::Result<Spawned> {
        let mut child = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stderr was not captured"))?;

        tracing::trace!(program = %self.program, ?args, pid = ?child.id(), "started");

        Ok(Spawned {
            primary: Box::pin(stdout),
            diagnostic: Box::pin(stderr),
            child: Some(child),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_output_combined() {
        let output = QueryOutput {
            code: Some(1),
            stdout: b"partial\n".to_vec(),
            stderr: b"error: forbidden\n".to_vec(),
        };

        assert!(!output.success());
        assert_eq!(output.combined(), "partial\nerror: forbidden");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let source = Kubectl::new("./definitely-not-a-kubectl-binary");

        assert!(source.query(&["get", "pods"]).await.is_err());
        assert!(source.start(&["logs", "api-1"]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_query_captures_output() {
        let source = Kubectl::new("sh");

        let output = source
            .query(&["-c", "echo out; echo err >&2; exit 3"])
            .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_pipes_both_streams() {
        use tokio::io::AsyncReadExt;

        let source = Kubectl::new("sh");
        let mut spawned = source
            .start(&["-c", "echo out; echo err >&2"])
            .unwrap();

        let mut stdout = String::new();
        spawned.primary.read_to_string(&mut stdout).await.unwrap();
        let mut stderr = String::new();
        spawned.diagnostic.read_to_string(&mut stderr).await.unwrap();

        assert_eq!(stdout, "out\n");
        assert_eq!(stderr, "err\n");

        let status = spawned.child.unwrap().wait().await.unwrap();
        assert!(status.success());
    }
}
