#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task;

use async_trait::async_trait;
use podmux::{ProcessSource, QueryOutput, Spawned};
use tokio::io::{AsyncReadExt, AsyncWrite, DuplexStream};

/// What a pod's log process does when started.
#[derive(Clone, Debug)]
pub enum Script {
    /// Writes the given output, then exits.
    Output { stdout: Vec<u8>, stderr: Vec<u8> },
    /// Writes the given stdout, then keeps both streams open forever.
    Hang { stdout: Vec<u8> },
    /// Cannot be started.
    FailStart,
}

impl Script {
    pub fn output(stdout: &str, stderr: &str) -> Self {
        Script::Output {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    pub fn hang(stdout: &str) -> Self {
        Script::Hang {
            stdout: stdout.as_bytes().to_vec(),
        }
    }
}

/// Fake control plane replaying scripted pod listings and log output.
pub struct ScriptedSource {
    listing: Result<QueryOutput, io::ErrorKind>,
    scripts: HashMap<String, Script>,
    started: Mutex<Vec<Vec<String>>>,
    // Keeps the write halves of hanging streams open.
    held: Mutex<Vec<DuplexStream>>,
}

impl ScriptedSource {
    pub fn new(listing: &str) -> Self {
        ScriptedSource {
            listing: Ok(QueryOutput {
                code: Some(0),
                stdout: listing.as_bytes().to_vec(),
                stderr: Vec::new(),
            }),
            scripts: HashMap::new(),
            started: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_listing(code: i32, stderr: &str) -> Self {
        let mut source = Self::new("");
        source.listing = Ok(QueryOutput {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        });
        source
    }

    pub fn unreachable() -> Self {
        let mut source = Self::new("");
        source.listing = Err(io::ErrorKind::NotFound);
        source
    }

    pub fn with_pod(mut self, pod: &str, script: Script) -> Self {
        self.scripts.insert(pod.to_string(), script);
        self
    }

    /// Argument lists of every start attempt, in order.
    pub fn started(&self) -> Vec<Vec<String>> {
        self.started.lock().unwrap().clone()
    }

    fn hanging_stream(&self) -> DuplexStream {
        let (reader, writer) = tokio::io::duplex(64);
        self.held.lock().unwrap().push(writer);
        reader
    }
}

#[async_trait]
impl ProcessSource for ScriptedSource {
    fn program(&self) -> &str {
        "fake-kubectl"
    }

    async fn query(&self, args: &[&str]) -> io::Result<QueryOutput> {
        assert_eq!(args, podmux::LIST_PODS_ARGS);

        match &self.listing {
            Ok(output) => Ok(output.clone()),
            Err(kind) => Err(io::Error::new(*kind, "no such program")),
        }
    }

    fn start(&self, args: &[&str]) -> io::Result<Spawned> {
        self.started
            .lock()
            .unwrap()
            .push(args.iter().map(|arg| arg.to_string()).collect());

        let pod = args.get(1).copied().unwrap_or_default();
        match self.scripts.get(pod) {
            Some(Script::Output { stdout, stderr }) => Ok(Spawned::from_streams(
                Cursor::new(stdout.clone()),
                Cursor::new(stderr.clone()),
            )),
            Some(Script::Hang { stdout }) => Ok(Spawned::from_streams(
                Cursor::new(stdout.clone()).chain(self.hanging_stream()),
                self.hanging_stream(),
            )),
            Some(Script::FailStart) | None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("pod {} not found", pod),
            )),
        }
    }
}

/// Writer whose contents stay readable after it has been moved into a task.
#[derive(Clone, Debug, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
        buf: &[u8],
    ) -> task::Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> task::Poll<io::Result<()>> {
        task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> task::Poll<io::Result<()>> {
        task::Poll::Ready(Ok(()))
    }
}

/// Writer whose every write fails, like a terminal pipe whose reader exited.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClosedPipe;

impl AsyncWrite for ClosedPipe {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
        _buf: &[u8],
    ) -> task::Poll<io::Result<usize>> {
        task::Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> task::Poll<io::Result<()>> {
        task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> task::Poll<io::Result<()>> {
        task::Poll::Ready(Ok(()))
    }
}
