use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gap classification relative to the prior session's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapType {
    FullUp,
    FullDown,
    PartialUp,
    PartialDown,
    Inside,
    NoGap,
}

impl GapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapType::FullUp => "FULL_UP",
            GapType::FullDown => "FULL_DOWN",
            GapType::PartialUp => "PARTIAL_UP",
            GapType::PartialDown => "PARTIAL_DOWN",
            GapType::Inside => "INSIDE",
            GapType::NoGap => "NO_GAP",
        }
    }
}

/// Auction metrics computed once per session after the primary-OR
/// finalizes (§3.4 / §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionMetrics {
    pub drive_energy: f64,
    pub rotations: u32,

    pub volume_z: f64,
    pub volume_ratio: f64,

    pub gap_type: GapType,
    pub gap_size_norm: f64,
    pub open_vs_prior_mid: f64,

    pub overnight_range_pct: f64,
    pub overnight_inventory_bias: f64,

    pub bar_count: u32,
    pub avg_body_pct: f64,
    pub max_wick_ratio: f64,

    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
}
