use std::fmt;

/// Configuration-class errors: malformed or inconsistent config, detected
/// before a run starts (§7). Maps to CLI exit code 1.
#[derive(Debug, Clone)]
pub enum ConfigError {
    Invalid(String),
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
            ConfigError::Io(msg) => write!(f, "config io error: {msg}"),
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Data-class errors: malformed input bars or an instrument with no data
/// for the requested range (§7). Maps to CLI exit code 2.
#[derive(Debug, Clone)]
pub enum DataError {
    MalformedBar {
        instrument: String,
        index: usize,
        reason: String,
    },
    NonMonotonicTimestamp {
        instrument: String,
        index: usize,
    },
    NoData {
        instrument: String,
    },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::MalformedBar {
                instrument,
                index,
                reason,
            } => write!(f, "{instrument}: malformed bar at index {index}: {reason}"),
            DataError::NonMonotonicTimestamp { instrument, index } => write!(
                f,
                "{instrument}: non-monotonic timestamp at index {index}"
            ),
            DataError::NoData { instrument } => write!(f, "{instrument}: no data for requested range"),
        }
    }
}

impl std::error::Error for DataError {}
