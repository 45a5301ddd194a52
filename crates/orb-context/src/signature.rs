use serde::{Deserialize, Serialize};

/// Minutes-from-OR-end bucket used in the context signature (§4.5, grounded
/// in `states/context_exclusion.py::ContextSignature`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BreakoutDelayBucket {
    Early,    // 0-10
    Mid,      // 10-25
    Late,     // 25-40
    VeryLate, // >40
}

impl BreakoutDelayBucket {
    pub fn from_minutes(minutes: f64) -> Self {
        if minutes <= 10.0 {
            BreakoutDelayBucket::Early
        } else if minutes <= 25.0 {
            BreakoutDelayBucket::Mid
        } else if minutes <= 40.0 {
            BreakoutDelayBucket::Late
        } else {
            BreakoutDelayBucket::VeryLate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BreakoutDelayBucket::Early => "0-10",
            BreakoutDelayBucket::Mid => "10-25",
            BreakoutDelayBucket::Late => "25-40",
            BreakoutDelayBucket::VeryLate => ">40",
        }
    }
}

/// Five-dimensional key grouping trades into a context-performance cell.
/// Hashable/orderable so it can key a `BTreeMap`, matching the Python
/// source's use as a `dict` key via `__hash__`/`__eq__` on the same tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextSignature {
    pub or_width_quartile: u8,
    pub breakout_delay_bucket: BreakoutDelayBucket,
    pub volume_quality_tercile: u8,
    pub auction_state: String,
    pub gap_type: String,
}
