use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signal::{Direction, ExitModeDescriptor, SignalMetadata};

/// One rung of a partial-exit ladder (§4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub target_r: f64,
    pub size_fraction: f64,
    pub price: f64,
    pub hit: bool,
    pub hit_timestamp: Option<DateTime<Utc>>,
    pub hit_price: Option<f64>,
}

/// Why a trade closed. Closed set matching §3.10; the orchestrator picks
/// exactly one per trade, even when several exit checks would have fired on
/// the same bar (mixed-bar rule: stop wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Stop,
    BreakevenStop,
    Target1,
    Target2,
    Runner,
    TrailingStop,
    TimeStop,
    Salvage,
    EndOfDay,
    GovernanceHalt,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Stop => "STOP",
            ExitReason::BreakevenStop => "BREAKEVEN_STOP",
            ExitReason::Target1 => "TARGET_1",
            ExitReason::Target2 => "TARGET_2",
            ExitReason::Runner => "RUNNER",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::TimeStop => "TIME_STOP",
            ExitReason::Salvage => "SALVAGE",
            ExitReason::EndOfDay => "END_OF_DAY",
            ExitReason::GovernanceHalt => "GOVERNANCE_HALT",
        }
    }
}

/// A trade currently open in the book, owned by the orchestrator and
/// mutated in place by `orb-risk`'s stop/salvage/trailing/partial-exit
/// managers each bar (§3.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTrade {
    pub trade_id: Uuid,
    pub instrument: String,
    pub playbook_name: String,
    pub direction: Direction,
    pub entry_timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub initial_stop: f64,
    pub current_stop: f64,
    pub initial_risk: f64,
    pub size: f64,
    pub remaining_size: f64,
    pub exit_mode: ExitModeDescriptor,
    pub targets: Vec<Target>,
    pub metadata: SignalMetadata,

    pub bars_in_trade: u32,
    pub mfe_r: f64,
    pub mae_r: f64,
    pub mfe_history: Vec<f64>,
    pub mfe_timestamp: Option<DateTime<Utc>>,
    pub mae_timestamp: Option<DateTime<Utc>>,
    pub current_r: f64,

    pub breakeven_applied: bool,
    pub phase: u8,
    pub salvage_armed: bool,
    pub salvage_peak_mfe_r: f64,
    pub salvage_bars_since_peak: u32,
    pub salvage_confirmation_count: u32,
}

impl ActiveTrade {
    /// Unrealized R on the remaining size at `price`, independent of the
    /// running `current_r`/`mfe_r` bookkeeping (which tracks the high-water
    /// mark rather than the instantaneous value).
    pub fn r_multiple_at(&self, price: f64) -> f64 {
        if self.initial_risk <= 0.0 {
            return 0.0;
        }
        (price - self.entry_price) * self.direction.sign() / self.initial_risk
    }
}

/// A closed trade, the unit of record in the output ledger (§3.10 / §6.2).
/// A frozen snapshot: identification, OR/auction context as it stood at
/// entry, the final state of the risk stack, and realized outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTrade {
    pub trade_id: Uuid,
    pub instrument: String,
    pub playbook_name: String,
    pub direction: Direction,
    pub entry_timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_timestamp: DateTime<Utc>,
    pub exit_price: f64,
    pub initial_stop: f64,
    pub final_stop: f64,
    pub initial_risk: f64,

    // Auction/breakout context at entry (§3.6 SignalMetadata snapshot).
    pub auction_state: String,
    pub auction_state_confidence: f64,
    pub or_width_norm: f64,
    pub breakout_delay_minutes: f64,
    pub drive_energy: f64,
    pub rotations: i32,
    pub gap_type: String,
    pub p_extension: Option<f64>,

    // Risk stack at close.
    pub stop_phase: u8,
    pub salvage_triggered: bool,
    pub final_targets: Vec<Target>,

    pub exit_reason: ExitReason,
    pub exit_sub_reason: Option<String>,
    pub realized_r: f64,
    pub realized_pnl: f64,
    pub bars_held: u32,
    pub mfe_r: f64,
    pub mae_r: f64,
    pub mfe_timestamp: Option<DateTime<Utc>>,
    pub mae_timestamp: Option<DateTime<Utc>>,
}
