use std::fmt;

use orb_types::DataError;

/// Top-level error returned by [`crate::Orchestrator::run`] (§7). Config
/// errors never reach here: they're surfaced by `orb-config`/`orb-cli`
/// before an orchestrator is ever constructed.
#[derive(Debug, Clone)]
pub enum BacktestError {
    Data(DataError),
    /// Ledger or equity-series write failure, surfaced from `orb-audit`'s
    /// `anyhow::Result` at the point the orchestrator flattens it.
    Audit(String),
}

impl fmt::Display for BacktestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestError::Data(e) => write!(f, "{e}"),
            BacktestError::Audit(msg) => write!(f, "audit write error: {msg}"),
        }
    }
}

impl std::error::Error for BacktestError {}

impl From<DataError> for BacktestError {
    fn from(e: DataError) -> Self {
        BacktestError::Data(e)
    }
}
