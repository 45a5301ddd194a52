use chrono::{DateTime, Utc};
use orb_types::Bar;

/// Market context handed to a playbook on every bar (§4.6, grounded in
/// the `context: Dict` passed to `Playbook.is_eligible`/`generate_signals`
/// in `playbooks/base.py`). Assembled by the orchestrator from the
/// session's OR/auction state, indicators, and context-exclusion lookup.
#[derive(Debug, Clone)]
pub struct PlaybookContext {
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub current_bar: Bar,
    pub current_price: f64,

    pub or_primary_high: f64,
    pub or_primary_low: f64,
    pub or_primary_finalized: bool,
    pub or_primary_valid: bool,
    pub or_primary_width_norm: f64,

    pub atr_14: f64,
    pub recent_return_std: f64,
    pub volume_ratio: f64,

    pub auction_state: String,
    pub auction_state_confidence: f64,
    pub breakout_delay_minutes: f64,
    pub volume_quality_score: f64,
    pub normalized_vol: f64,
    pub drive_energy: f64,
    pub rotations: i32,
    pub gap_type: String,
    pub p_extension: Option<f64>,

    pub context_excluded: bool,
    /// Override for `phase1_stop_distance`; when absent, PB1 falls back to
    /// `0.8 * |entry - stop|`.
    pub phase1_stop_distance_override: Option<f64>,
}
