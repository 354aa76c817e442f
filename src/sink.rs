//! The shared line sink and the task that drains it to the terminal.

use std::io;
use std::pin::Pin;
use std::task;

use futures_util::stream::{Stream as FuturesStream, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Line;

/// Creates a bounded line sink with room for `capacity` buffered lines.
///
/// Senders wait while the sink is full, so a slow consumer slows producers
/// down rather than losing lines. A `capacity` of zero is treated as one.
pub fn channel(capacity: usize) -> (LineSender, LineReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    (LineSender { tx }, LineReceiver { rx })
}

/// Returned by [`LineSender::send`] when the receiving end has gone away,
/// handing back the line that could not be delivered.
#[derive(Debug, Error)]
#[error("line sink closed")]
pub struct SinkClosed(pub Line);

/// Write end of the shared sink. Cloned once per output stream.
#[derive(Clone, Debug)]
pub struct LineSender {
    tx: mpsc::Sender<Line>,
}

impl LineSender {
    /// Delivers `line`, waiting for buffer space if needed.
    pub async fn send(&self, line: Line) -> Result<(), SinkClosed> {
        self.tx.send(line).await.map_err(|e| SinkClosed(e.0))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Completes once the receiving end has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Read end of the shared sink.
///
/// Yields lines in arrival order and ends once every [`LineSender`] has been
/// dropped.
#[derive(Debug)]
pub struct LineReceiver {
    rx: mpsc::Receiver<Line>,
}

impl LineReceiver {
    pub async fn recv(&mut self) -> Option<Line> {
        self.rx.recv().await
    }
}

impl FuturesStream for LineReceiver {
    type Item = Line;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// How the drain renders each line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LineFormat {
    /// The line exactly as the pod wrote it.
    #[default]
    Bare,
    /// The line prefixed with `[<pod> <stream>] `.
    Tagged,
}

impl LineFormat {
    fn render(&self, line: &Line, buf: &mut Vec<u8>) {
        if let LineFormat::Tagged = self {
            buf.push(b'[');
            buf.extend_from_slice(line.source().to_string().as_bytes());
            buf.extend_from_slice(b"] ");
        }
        buf.extend_from_slice(line.line().as_bytes());
        buf.push(b'\n');
    }
}

/// The single consumer of the shared sink.
///
/// [`Drain::spawn`] starts a task that writes every line it receives to the
/// writer, flushing after each one. The task stops by itself once all
/// senders are gone and the sink is empty, or on the first write error
/// (which closes the sink, so producers see it as closed). [`Drain::finish`]
/// waits for that and hands the writer back. Dropping a `Drain` leaves the
/// task running detached until the sink ends.
#[derive(Debug)]
pub struct Drain<W> {
    handle: JoinHandle<io::Result<(W, u64)>>,
}

impl<W> Drain<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn spawn(lines: LineReceiver, writer: W, format: LineFormat) -> Self {
        let handle = tokio::spawn(drain(lines, writer, format));

        Drain { handle }
    }

    /// Waits for the sink to end. Returns the writer and the number of lines
    /// written.
    pub async fn finish(self) -> io::Result<(W, u64)> {
        match self.handle.await {
            Ok(res) => res,
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }

    /// Stops the drain without waiting for the sink to end.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn drain<W>(mut lines: LineReceiver, mut writer: W, format: LineFormat) -> io::Result<(W, u64)>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut count = 0;

    while let Some(line) = lines.next().await {
        buf.clear();
        format.render(&line, &mut buf);

        if let Err(e) = write_line(&mut writer, &buf).await {
            tracing::warn!(error = %e, "failed to write line, closing sink");
            return Err(e);
        }
        count += 1;
    }

    writer.flush().await?;
    tracing::debug!(lines = count, "line sink drained");

    Ok((writer, count))
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, buf: &[u8]) -> io::Result<()> {
    writer.write_all(buf).await?;
    writer.flush().await
}
