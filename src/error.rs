//! Error taxonomy for discovery, sessions and configuration.

use std::io;

use thiserror::Error;

use crate::reader::StreamKind;
use crate::PodName;

/// Listing pods failed. Fatal to the whole run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` exited with {}: {output}", display_code(.code))]
    Status {
        program: String,
        code: Option<i32>,
        /// Combined stdout and stderr of the failed query.
        output: String,
    },
    #[error("Invalid pod name fragment: {0}")]
    Pattern(#[from] regex::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// A single session ended abnormally. Never fatal to the fleet.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to start log stream for {pod}: {source}")]
    Start {
        pod: PodName,
        #[source]
        source: io::Error,
    },
    #[error("{stream} stream for {pod} failed: {source}")]
    Stream {
        pod: PodName,
        stream: StreamKind,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub fn pod(&self) -> &PodName {
        match self {
            SessionError::Start { pod, .. } | SessionError::Stream { pod, .. } => pod,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}
