//! Following a single pod's logs.

use std::fmt;

use crate::error::SessionError;
use crate::reader::{read_lines, LineSource, StreamKind};
use crate::sink::LineSender;
use crate::source::{ProcessSource, Spawned};
use crate::PodName;

/// Lifecycle of a session. Once `Ended` a session is never revived.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Starting,
    Streaming,
    Ended,
}

fn enter(pod: &PodName, state: SessionState) {
    tracing::debug!(pod = %pod, ?state, "session");
}

/// Arguments of the query following `pod`'s logs for the `container`.
pub fn follow_args<'a>(pod: &'a PodName, container: &'a str) -> [&'a str; 4] {
    ["logs", pod.as_str(), container, "-f"]
}

/// Follows `pod`'s logs until its log process closes stdout.
///
/// Stdout is read on the calling task and stderr on a task of its own; both
/// feed `sink`. The result is that of the stdout reader: a clean
/// end-of-stream is `Ok`. After a clean end the session waits for stderr to
/// close as well; after a failure the stderr reader is stopped and the log
/// process is killed when the session returns.
pub async fn run_session<S>(
    source: &S,
    pod: PodName,
    container: &str,
    sink: LineSender,
) -> Result<(), SessionError>
where
    S: ProcessSource + ?Sized,
{
    enter(&pod, SessionState::Starting);

    let Spawned {
        primary,
        diagnostic,
        mut child,
    } = match source.start(&follow_args(&pod, container)) {
        Ok(spawned) => spawned,
        Err(e) => {
            enter(&pod, SessionState::Ended);
            return Err(SessionError::Start { pod, source: e });
        }
    };

    enter(&pod, SessionState::Streaming);

    let diagnostic_origin = LineSource::new(pod.clone(), StreamKind::Diagnostic);
    let diagnostic_sink = sink.clone();
    let diagnostic = tokio::spawn(async move {
        read_lines(diagnostic, diagnostic_origin, &diagnostic_sink).await
    });

    let primary_res = read_lines(
        primary,
        LineSource::new(pod.clone(), StreamKind::Primary),
        &sink,
    )
    .await;
    drop(sink);

    // A failed stdout ends the session even if stderr stays open
    if primary_res.is_err() {
        diagnostic.abort();
    }

    match diagnostic.await {
        Ok(Ok(lines)) => tracing::debug!(pod = %pod, lines, "stderr ended"),
        Ok(Err(e)) => tracing::warn!("error streaming stderr for {}: {}", pod, e),
        Err(e) if e.is_cancelled() => tracing::debug!(pod = %pod, "stderr reader stopped"),
        Err(e) => tracing::warn!(pod = %pod, error = %e, "stderr reader did not complete"),
    }

    if let Some(child) = child.as_mut() {
        match child.try_wait() {
            Ok(Some(status)) => tracing::debug!(pod = %pod, %status, "log process exited"),
            Ok(None) => tracing::debug!(pod = %pod, "log process still running after its output closed"),
            Err(e) => tracing::debug!(pod = %pod, error = %e, "failed to poll log process"),
        }
    }

    enter(&pod, SessionState::Ended);

    match primary_res {
        Ok(lines) => {
            tracing::debug!(pod = %pod, lines, "stdout ended");
            Ok(())
        }
        Err(e) => Err(SessionError::Stream {
            pod,
            stream: StreamKind::Primary,
            source: e,
        }),
    }
}

/// The final result of one session.
#[derive(Debug)]
pub struct SessionOutcome {
    pod: PodName,
    result: Result<(), SessionError>,
}

impl SessionOutcome {
    pub fn new(pod: PodName, result: Result<(), SessionError>) -> Self {
        SessionOutcome { pod, result }
    }

    pub fn pod(&self) -> &PodName {
        &self.pod
    }

    pub fn result(&self) -> &Result<(), SessionError> {
        &self.result
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<(), SessionError> {
        self.result
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.result {
            Ok(()) => write!(f, "{}: ended", self.pod),
            Err(e) => write!(f, "{}: {}", self.pod, e),
        }
    }
}
