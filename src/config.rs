//! Run settings: the pod name fragment plus environment overrides.

use std::env;

use crate::error::ConfigError;
use crate::fleet::DEFAULT_SINK_CAPACITY;
use crate::sink::LineFormat;

/// Program used to talk to the cluster.
pub const KUBECTL_VAR: &str = "PODMUX_KUBECTL";
/// Lines buffered between the pods and the terminal.
pub const SINK_CAPACITY_VAR: &str = "PODMUX_SINK_CAPACITY";
/// Prefix each line with its pod and stream when truthy.
pub const TAG_VAR: &str = "PODMUX_TAG";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub fragment: String,
    pub kubectl: String,
    pub sink_capacity: usize,
    pub format: LineFormat,
}

impl Config {
    pub fn new(fragment: impl Into<String>) -> Self {
        Config {
            fragment: fragment.into(),
            kubectl: "kubectl".to_string(),
            sink_capacity: DEFAULT_SINK_CAPACITY,
            format: LineFormat::Bare,
        }
    }

    /// Reads overrides from the process environment.
    pub fn from_env(fragment: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(fragment, |var| env::var(var).ok())
    }

    /// Reads overrides through `lookup`, which maps a variable name to its
    /// value if set.
    pub fn from_lookup<F>(fragment: impl Into<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::new(fragment);

        if let Some(kubectl) = lookup(KUBECTL_VAR) {
            if kubectl.trim().is_empty() {
                return Err(invalid(KUBECTL_VAR, kubectl, "must not be empty"));
            }
            config.kubectl = kubectl;
        }

        if let Some(capacity) = lookup(SINK_CAPACITY_VAR) {
            config.sink_capacity = match capacity.trim().parse::<usize>() {
                Ok(0) => return Err(invalid(SINK_CAPACITY_VAR, capacity, "must be at least 1")),
                Ok(n) => n,
                Err(_) => return Err(invalid(SINK_CAPACITY_VAR, capacity, "not a number")),
            };
        }

        if let Some(tag) = lookup(TAG_VAR) {
            config.format = if parse_flag(TAG_VAR, tag)? {
                LineFormat::Tagged
            } else {
                LineFormat::Bare
            };
        }

        Ok(config)
    }
}

fn invalid(var: &'static str, value: String, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { var, value, reason }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, value, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup("api", |var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]).unwrap();

        assert_eq!(config, Config::new("api"));
        assert_eq!(config.kubectl, "kubectl");
        assert_eq!(config.sink_capacity, 1);
        assert_eq!(config.format, LineFormat::Bare);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            (KUBECTL_VAR, "/opt/bin/kubectl"),
            (SINK_CAPACITY_VAR, " 64 "),
            (TAG_VAR, "Yes"),
        ])
        .unwrap();

        assert_eq!(config.fragment, "api");
        assert_eq!(config.kubectl, "/opt/bin/kubectl");
        assert_eq!(config.sink_capacity, 64);
        assert_eq!(config.format, LineFormat::Tagged);
    }

    #[test]
    fn test_tag_can_be_disabled() {
        let config = config_with(&[(TAG_VAR, "0")]).unwrap();
        assert_eq!(config.format, LineFormat::Bare);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(config_with(&[(SINK_CAPACITY_VAR, "0")]).is_err());
        assert!(config_with(&[(SINK_CAPACITY_VAR, "lots")]).is_err());
        assert!(config_with(&[(TAG_VAR, "maybe")]).is_err());
        assert!(config_with(&[(KUBECTL_VAR, " ")]).is_err());

        let err = config_with(&[(SINK_CAPACITY_VAR, "-1")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for PODMUX_SINK_CAPACITY: \"-1\" (not a number)"
        );
    }
}
