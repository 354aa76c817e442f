//! Everything related to framing a pod's output streams into lines.

use std::fmt;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task;

use futures_util::pin_mut;
use futures_util::ready;
use futures_util::stream::{Stream as FuturesStream, StreamExt};
use pin_project_lite::pin_project;
use tokio::io::{AsyncBufRead, AsyncRead, BufReader};

use crate::sink::LineSender;
use crate::PodName;

/// Which of a log process's two output streams a line was read from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StreamKind {
    /// The process's stdout.
    Primary,
    /// The process's stderr.
    Diagnostic,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Primary => "stdout",
            StreamKind::Diagnostic => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a captured line: the pod and the stream it was read from.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LineSource {
    pod: PodName,
    stream: StreamKind,
}

impl LineSource {
    pub fn new(pod: PodName, stream: StreamKind) -> Self {
        LineSource { pod, stream }
    }

    pub fn pod(&self) -> &PodName {
        &self.pod
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }
}

impl fmt::Display for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.pod, self.stream)
    }
}

/// A single line captured for a given pod and stream.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Line {
    /// Where the line was read from.
    source: LineSource,
    /// The line contents, without its terminator.
    line: String,
}

impl Line {
    pub fn new(source: LineSource, line: impl Into<String>) -> Self {
        Line {
            source,
            line: line.into(),
        }
    }

    /// Returns the pod and stream from where the line was read.
    pub fn source(&self) -> &LineSource {
        &self.source
    }

    /// Returns the line contents.
    pub fn line(&self) -> &str {
        self.line.as_str()
    }

    /// Returns the internal components that make up a `Line`. Hidden as the
    /// return signature may change.
    #[doc(hidden)]
    pub fn into_inner(self) -> (LineSource, String) {
        let Line { source, line } = self;

        (source, line)
    }
}

pin_project! {
/// Frames an [`AsyncBufRead`] into `\n`-terminated lines.
///
/// Each yielded line has its `\n` stripped; any other bytes, including a
/// preceding `\r`, are kept. Consecutive terminators yield empty lines. Bytes
/// left over without a terminator when the reader hits end-of-stream are not
/// a line and are dropped. Invalid UTF-8 is replaced lossily.
///
/// [`AsyncBufRead`]: https://docs.rs/tokio/1/tokio/io/trait.AsyncBufRead.html
#[derive(Debug)]
pub struct TerminatedLines<R> {
    #[pin]
    reader: R,
    buf: Vec<u8>,
}
}

impl<R: AsyncBufRead> TerminatedLines<R> {
    pub fn new(reader: R) -> Self {
        TerminatedLines {
            reader,
            buf: Vec::new(),
        }
    }
}

fn into_line(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

impl<R: AsyncBufRead> FuturesStream for TerminatedLines<R> {
    type Item = io::Result<String>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let available = match ready!(this.reader.as_mut().poll_fill_buf(cx)) {
                Ok(available) => available,
                Err(e) => return task::Poll::Ready(Some(Err(e))),
            };

            if available.is_empty() {
                // Unterminated remainder at end-of-stream
                this.buf.clear();
                return task::Poll::Ready(None);
            }

            if let Some(idx) = available.iter().position(|b| *b == b'\n') {
                this.buf.extend_from_slice(&available[..idx]);
                this.reader.as_mut().consume(idx + 1);

                let line = into_line(mem::take(this.buf));
                return task::Poll::Ready(Some(Ok(line)));
            }

            let len = available.len();
            this.buf.extend_from_slice(available);
            this.reader.as_mut().consume(len);
        }
    }
}

fn sink_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "line sink closed")
}

/// Reads every complete line from `source` into `sink`, tagged with `origin`.
///
/// Suspends while waiting for bytes. Returns the number of lines forwarded
/// once `source` reaches end-of-stream, or the I/O error that ended it. If
/// the sink loses its consumer the result is a `BrokenPipe` error, even
/// while `source` is idle.
pub async fn read_lines<R>(source: R, origin: LineSource, sink: &LineSender) -> io::Result<u64>
where
    R: AsyncRead,
{
    let lines = TerminatedLines::new(BufReader::new(source));
    pin_mut!(lines);

    let mut count = 0;
    loop {
        let next = tokio::select! {
            next = lines.next() => next,
            _ = sink.closed() => return Err(sink_closed()),
        };
        let line = match next {
            Some(line) => Line::new(origin.clone(), line?),
            None => break,
        };

        sink.send(line).await.map_err(|_closed| sink_closed())?;
        count += 1;
    }

    tracing::trace!(source = %origin, lines = count, "end of stream");

    Ok(count)
}
