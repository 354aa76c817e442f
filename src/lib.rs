//! A library providing asynchronous, multiplexed tailing of log output across
//! every pod whose name starts with a given prefix.
//!
//! Pods are discovered through `kubectl` (or any other [`ProcessSource`]),
//! one follow session is started per pod, and the stdout and stderr lines of
//! every session are merged into one shared sink. Lines keep their order
//! within a single stream; there is no ordering across streams or pods.
//!
//! ## Example
//!
//! ```no_run
//! use podmux::{Fleet, Kubectl};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fleet = Fleet::new(Kubectl::default(), "api");
//!
//!     // Follow every `api-...` pod until all of their log streams end.
//!     let report = fleet.run(tokio::io::stdout()).await?;
//!     println!("followed {} pods", report.pods.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Caveats
//!
//! Sessions are never retried. A pod that goes away mid-stream simply stops
//! producing lines, and the run ends once every session has ended.

mod config;
mod error;
mod fleet;
mod reader;
mod resolver;
mod session;
mod sink;
mod source;

pub use config::{Config, KUBECTL_VAR, SINK_CAPACITY_VAR, TAG_VAR};
pub use error::{ConfigError, DiscoveryError, SessionError};
pub use fleet::{Fleet, FleetReport, RunningFleet, DEFAULT_SINK_CAPACITY};
pub use reader::{read_lines, Line, LineSource, StreamKind, TerminatedLines};
pub use resolver::{resolve, PodName, PodPattern, LIST_PODS_ARGS};
pub use session::{follow_args, run_session, SessionOutcome, SessionState};
pub use sink::{channel, Drain, LineFormat, LineReceiver, LineSender, SinkClosed};
pub use source::{ByteStream, Kubectl, ProcessSource, QueryOutput, Spawned};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
