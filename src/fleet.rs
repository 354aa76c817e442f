//! Following every pod that matches a name at once.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::task::JoinSet;

use crate::error::DiscoveryError;
use crate::resolver::resolve;
use crate::session::{run_session, SessionOutcome};
use crate::sink::{self, Drain, LineFormat, LineReceiver};
use crate::source::ProcessSource;
use crate::PodName;

/// Buffered lines between all sessions and the drain.
pub const DEFAULT_SINK_CAPACITY: usize = 1;

/// Tally of a finished run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FleetReport {
    /// Pods that were followed, in listing order.
    pub pods: Vec<PodName>,
    /// Sessions whose stdout ended cleanly.
    pub ended_ok: usize,
    /// Sessions that failed to start or whose stdout failed.
    pub ended_err: usize,
    /// Lines written by the drain. Zero when the lines were consumed
    /// elsewhere.
    pub lines_written: u64,
}

/// Follows the logs of every pod named `<fragment>-...`.
///
/// The fragment doubles as the container name passed to each log query.
#[derive(Debug)]
pub struct Fleet<S> {
    source: Arc<S>,
    fragment: String,
    capacity: usize,
    format: LineFormat,
}

impl<S> Fleet<S>
where
    S: ProcessSource + 'static,
{
    pub fn new(source: S, fragment: impl Into<String>) -> Self {
        Fleet {
            source: Arc::new(source),
            fragment: fragment.into(),
            capacity: DEFAULT_SINK_CAPACITY,
            format: LineFormat::default(),
        }
    }

    /// Sets how many lines may be buffered before sessions wait on the drain.
    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Sets how [`Fleet::run`] renders lines.
    pub fn line_format(mut self, format: LineFormat) -> Self {
        self.format = format;
        self
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolves the pods and starts one session per pod.
    ///
    /// Nothing is started if resolution fails. The sessions run concurrently
    /// and share one sink, read through [`RunningFleet::take_lines`].
    pub async fn launch(&self) -> Result<RunningFleet, DiscoveryError> {
        let pods = resolve(self.source.as_ref(), &self.fragment).await?;

        tracing::info!("found {} pods with the name {}", pods.len(), self.fragment);

        let (tx, rx) = sink::channel(self.capacity);
        let mut sessions = JoinSet::new();

        for pod in &pods {
            let source = Arc::clone(&self.source);
            let fragment = self.fragment.clone();
            let pod = pod.clone();
            let tx = tx.clone();

            sessions.spawn(async move {
                let result = run_session(source.as_ref(), pod.clone(), &fragment, tx).await;
                SessionOutcome::new(pod, result)
            });
        }

        Ok(RunningFleet {
            pods,
            sessions,
            lines: Some(rx),
        })
    }

    /// Runs the whole fleet, draining every line into `out`.
    ///
    /// Returns once every session has ended and the drain has written out
    /// everything they produced. Only a failure to resolve the pods is an
    /// error; session failures are logged and counted in the report.
    pub async fn run<W>(&self, out: W) -> Result<FleetReport, DiscoveryError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut fleet = self.launch().await?;

        let drain = fleet
            .take_lines()
            .map(|lines| Drain::spawn(lines, out, self.format));

        let mut report = fleet.wait().await;

        if let Some(drain) = drain {
            match drain.finish().await {
                Ok((_, lines)) => report.lines_written = lines,
                Err(e) => tracing::warn!(error = %e, "output ended early"),
            }
        }

        Ok(report)
    }
}

/// Sessions started by [`Fleet::launch`].
///
/// Dropping it aborts every session that is still running.
#[derive(Debug)]
pub struct RunningFleet {
    pods: Vec<PodName>,
    sessions: JoinSet<SessionOutcome>,
    lines: Option<LineReceiver>,
}

impl RunningFleet {
    pub fn pods(&self) -> &[PodName] {
        &self.pods
    }

    /// Takes the read end of the shared sink. Returns `None` once taken.
    ///
    /// The sink stays open until every session has ended.
    pub fn take_lines(&mut self) -> Option<LineReceiver> {
        self.lines.take()
    }

    /// Number of sessions that have not been collected yet.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Waits for the next session to end and reports it.
    ///
    /// Returns `None` once every session has been collected.
    pub async fn next_outcome(&mut self) -> Option<SessionOutcome> {
        loop {
            match self.sessions.join_next().await? {
                Ok(outcome) => {
                    match outcome.result() {
                        Ok(()) => tracing::info!(pod = %outcome.pod(), "log stream ended"),
                        Err(e) => {
                            tracing::warn!("error streaming logs for {}: {}", outcome.pod(), e)
                        }
                    }
                    return Some(outcome);
                }
                Err(e) => {
                    tracing::error!(error = %e, "session task did not complete");
                    continue;
                }
            }
        }
    }

    /// Waits for every session to end.
    ///
    /// If the lines were never taken they are discarded, so sessions are not
    /// held up by a sink nobody reads.
    pub async fn wait(mut self) -> FleetReport {
        drop(self.lines.take());

        let mut report = FleetReport {
            pods: self.pods.clone(),
            ..FleetReport::default()
        };

        let launched = self.sessions.len();
        while let Some(outcome) = self.next_outcome().await {
            if outcome.is_ok() {
                report.ended_ok += 1;
            } else {
                report.ended_err += 1;
            }
        }

        // Sessions whose task panicked or was cancelled
        report.ended_err += launched - report.ended_ok - report.ended_err;

        report
    }
}
