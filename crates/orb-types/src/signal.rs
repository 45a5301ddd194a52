use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction. Distinct from `Bar::direction`'s `i8` since signals and
/// trades carry it as a first-class, exhaustively-matched field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

/// Exit-plan descriptor attached to a signal, consumed by `orb-risk` once the
/// trade is live (§3.7). Each playbook picks a fixed variant via
/// `Playbook::preferred_exit_mode`, but the gate or governance layer may
/// substitute a different one before entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExitModeDescriptor {
    TrailVol {
        atr_mult: f64,
    },
    TrailPivot {
        lookback: u32,
    },
    HybridVolPivot {
        atr_mult: f64,
        lookback: u32,
    },
    SingleTarget {
        time_limit_minutes: i64,
    },
    PartialThenTrail {
        partial_frac: f64,
        partial_r: f64,
        trail_factor: f64,
    },
    TimeDecayForce {
        max_bars: u32,
        slope_window: u32,
        slope_min: f64,
    },
}

/// Context snapshot a playbook attaches to a signal, consumed by the
/// probability gate and the context-exclusion matrix (§3.6, grounded in
/// `playbooks/base.py::SignalMetadata`). None of these fields participate
/// in the entry decision itself; they are read-only context for what comes
/// after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub auction_state: String,
    pub auction_state_confidence: f64,
    pub or_width_norm: f64,
    pub breakout_delay_minutes: f64,
    pub volume_quality_score: f64,
    pub normalized_vol: f64,
    pub drive_energy: f64,
    pub rotations: i32,
    pub gap_type: String,
    pub p_extension: Option<f64>,
}

/// A playbook's proposed trade, before governance and the probability gate
/// have had a chance to accept, resize, or reject it (§3.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSignal {
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub playbook_name: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub initial_stop: f64,
    /// Phase-1 (statistical) stop distance in price units, handed to
    /// `orb-risk`'s two-phase stop manager as-is.
    pub phase1_stop_distance: f64,
    /// Structural price level used by Phase 2 and by `TrailPivot`/
    /// `HybridVolPivot` exits. Absent for playbooks with no natural anchor.
    pub structural_anchor: Option<f64>,
    pub priority: f64,
    pub exit_mode: ExitModeDescriptor,
    pub metadata: SignalMetadata,
}

impl CandidateSignal {
    /// Initial per-unit risk in price terms. Always positive for a
    /// well-formed signal.
    pub fn initial_risk(&self) -> f64 {
        (self.entry_price - self.initial_stop).abs()
    }
}
