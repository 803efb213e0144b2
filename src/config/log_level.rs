use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// Verbosity of the forwarder's own logs, read from `LOG_LEVEL`. Unknown values fall back
/// to `Info` rather than failing config loading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl LogLevel {
    #[must_use]
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "unknown log level '{s}', expected one of error, warn, info, debug, trace",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = match Value::deserialize(deserializer)? {
            Value::String(s) => s.parse::<LogLevel>().inspect_err(|e| error!("{}", e)).ok(),
            other => {
                error!("Expected a string for log level, got {:?}", other);
                None
            }
        };
        Ok(level.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitive_levels() {
        assert_eq!(LogLevel::from_str("DEBUG"), Ok(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("Warning"), Ok(LogLevel::Warn));
        assert!(LogLevel::from_str("verbose").is_err());
    }

    #[test]
    fn invalid_level_falls_back_to_default() {
        let level: LogLevel =
            serde_json::from_str("\"loud\"").expect("log level should always deserialize");
        assert_eq!(level, LogLevel::Info);
        let level: LogLevel = serde_json::from_str("3").expect("log level should always deserialize");
        assert_eq!(level, LogLevel::Info);
    }

    #[test]
    fn level_filter_matches_level() {
        assert_eq!(LogLevel::Trace.as_level_filter(), LevelFilter::TRACE);
        assert_eq!(LogLevel::Error.as_ref(), "error");
    }
}
