use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Auction-state enumeration (§3.5 / §4.4). Closed set, exhaustively
/// matched everywhere it's consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuctionState {
    Initiative,
    Balanced,
    Compression,
    GapReversion,
    InventoryFix,
    Mixed,
}

impl AuctionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionState::Initiative => "INITIATIVE",
            AuctionState::Balanced => "BALANCED",
            AuctionState::Compression => "COMPRESSION",
            AuctionState::GapReversion => "GAP_REV",
            AuctionState::InventoryFix => "INVENTORY_FIX",
            AuctionState::Mixed => "MIXED",
        }
    }
}

/// Result of classifying the session's opening range into an
/// [`AuctionState`], with the full score vector retained for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateClassification {
    pub state: AuctionState,
    pub confidence: f64,
    /// Keyed by [`AuctionState::as_str`] rather than the enum itself so the
    /// map serializes as a plain JSON object.
    pub state_scores: BTreeMap<String, f64>,
    pub reason: String,
}
