//! Resolving a name fragment into the pods to follow.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::DiscoveryError;
use crate::source::ProcessSource;

/// Arguments of the query listing every pod, one `pod/<name>` per line.
pub const LIST_PODS_ARGS: [&str; 4] = ["get", "pods", "-o", "name"];

const POD_MARKER: &str = "pod/";

/// Name of a running pod, e.g. `api-7f9c6d5b8-x2kq4`.
///
/// Cheap to clone so every captured line can carry it.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PodName(Arc<str>);

impl PodName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PodName {
    fn from(name: &str) -> Self {
        PodName(Arc::from(name))
    }
}

impl From<String> for PodName {
    fn from(name: String) -> Self {
        PodName(Arc::from(name))
    }
}

impl AsRef<str> for PodName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for PodName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Matches `pod/<fragment>-<anything>` list tokens.
///
/// The fragment is taken literally, never as a pattern of its own.
#[derive(Clone, Debug)]
pub struct PodPattern {
    regex: Regex,
}

impl PodPattern {
    pub fn new(fragment: &str) -> Result<Self, regex::Error> {
        let pattern = format!(
            "^{}({}-.+)$",
            regex::escape(POD_MARKER),
            regex::escape(fragment)
        );

        Ok(PodPattern {
            regex: Regex::new(&pattern)?,
        })
    }

    /// Returns the pod name in `token` if it matches, marker stripped.
    pub fn match_token(&self, token: &str) -> Option<PodName> {
        self.regex
            .captures(token)
            .and_then(|caps| caps.get(1))
            .map(|name| PodName::from(name.as_str()))
    }

    /// Filters a whitespace-separated pod listing, keeping listing order.
    pub fn filter(&self, listing: &str) -> Vec<PodName> {
        listing
            .split_whitespace()
            .filter_map(|token| self.match_token(token))
            .collect()
    }
}

/// Lists every pod through `source` and keeps those named `<fragment>-...`.
///
/// No match is an empty list, not an error.
pub async fn resolve<S>(source: &S, fragment: &str) -> Result<Vec<PodName>, DiscoveryError>
where
    S: ProcessSource + ?Sized,
{
    let pattern = PodPattern::new(fragment)?;

    let output = source
        .query(&LIST_PODS_ARGS)
        .await
        .map_err(|e| DiscoveryError::Spawn {
            program: source.program().to_string(),
            source: e,
        })?;

    if !output.success() {
        return Err(DiscoveryError::Status {
            program: source.program().to_string(),
            code: output.code,
            output: output.combined(),
        });
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    let pods = pattern.filter(&listing);

    tracing::debug!(
        fragment,
        listed = listing.split_whitespace().count(),
        matched = pods.len(),
        "resolved pods"
    );

    Ok(pods)
}
