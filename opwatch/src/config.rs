//! This module controls configuration parsing for the monitor. Configuration
//! is YAML, every field optional.
//!
//! ```yaml
//! max_metrics: 100
//! slow_query_threshold_ms: 1000
//! verbose: true
//! ```

use std::{
    fs,
    io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

use crate::{buffer::MAX_METRICS, stats::SLOW_QUERY_THRESHOLD_MS};

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
}

fn default_max_metrics() -> NonZeroUsize {
    NonZeroUsize::new(MAX_METRICS).unwrap_or(NonZeroUsize::MIN)
}

fn default_slow_query_threshold_ms() -> u64 {
    SLOW_QUERY_THRESHOLD_MS
}

/// Configuration of the performance monitor.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Number of most recent metrics retained
    #[serde(default = "default_max_metrics")]
    pub max_metrics: NonZeroUsize,
    /// Operations longer than this many milliseconds are reported as slow
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,
    /// Log every operation as it completes, the development mode of the
    /// monitor. Metrics are collected either way.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_metrics: default_max_metrics(),
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// Function will error if the file cannot be read or is not a valid
    /// configuration.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        contents.parse()
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // An empty document deserializes as unit, not as an empty mapping.
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = Config::default();
        assert_eq!(config.max_metrics.get(), 100);
        assert_eq!(config.slow_query_threshold_ms, 1_000);
        assert!(!config.verbose);
    }

    #[test]
    fn empty_and_partial_documents_fill_defaults() {
        assert_eq!("".parse::<Config>().unwrap(), Config::default());
        assert_eq!("{}".parse::<Config>().unwrap(), Config::default());

        let config: Config = "verbose: true\nslow_query_threshold_ms: 250\n".parse().unwrap();
        assert!(config.verbose);
        assert_eq!(config.slow_query_threshold_ms, 250);
        assert_eq!(config.max_metrics.get(), 100);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = "max_metrics: 0".parse::<Config>().unwrap_err();
        assert!(matches!(err, Error::SerdeYaml(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = "max_metric: 10".parse::<Config>().unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_metrics: 5").unwrap();
        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.max_metrics.get(), 5);
    }

    #[test]
    fn from_path_reports_missing_file() {
        let path = Path::new("/nonexistent/opwatch/config.yaml");
        match Config::from_path(path) {
            Err(Error::ReadFile { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
