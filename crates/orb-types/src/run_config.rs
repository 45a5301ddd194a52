use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prop-firm account rules enforced by governance (§4.13).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropAccountRules {
    pub account_size: f64,
    pub profit_target: f64,
    pub trailing_drawdown_max: f64,
    pub daily_loss_limit: f64,
    pub max_contracts: u32,
    pub max_concurrent_trades: u32,
    /// `None` disables the per-instrument consecutive-loss lockout
    /// entirely. No default is assumed (see DESIGN.md Open Questions).
    pub consecutive_loss_lockout: Option<u32>,
    pub max_daily_trades_per_instrument: u32,
}

impl PropAccountRules {
    pub fn validate(&self) -> Result<(), String> {
        if self.profit_target <= 0.0 {
            return Err("profit_target must be > 0".into());
        }
        if self.trailing_drawdown_max <= 0.0 {
            return Err("trailing_drawdown_max must be > 0".into());
        }
        if self.daily_loss_limit <= 0.0 {
            return Err("daily_loss_limit must be > 0".into());
        }
        if self.daily_loss_limit > self.trailing_drawdown_max {
            return Err("daily_loss_limit must be <= trailing_drawdown_max".into());
        }
        Ok(())
    }
}

/// One capital-pacing bracket (§4.13). Brackets are keyed by the fraction
/// of `profit_target` realized so far and are re-selected on every entry
/// decision, never cached across bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingPhase {
    pub name: String,
    pub profit_pct_min: f64,
    pub profit_pct_max: f64,
    pub size_multiplier: f64,
    pub daily_loss_pct: f64,
}

pub fn default_pacing_phases() -> Vec<PacingPhase> {
    vec![
        PacingPhase {
            name: "Conservative".into(),
            profit_pct_min: 0.0,
            profit_pct_max: 0.40,
            size_multiplier: 1.0,
            daily_loss_pct: 1.0,
        },
        PacingPhase {
            name: "Growth".into(),
            profit_pct_min: 0.40,
            profit_pct_max: 0.70,
            size_multiplier: 1.5,
            daily_loss_pct: 1.0,
        },
        PacingPhase {
            name: "Protection".into(),
            profit_pct_min: 0.70,
            profit_pct_max: 1.0,
            size_multiplier: 1.0,
            daily_loss_pct: 0.6,
        },
    ]
}

/// Probability-gate thresholds (§4.7). Optional; when `RunConfig`'s
/// `use_probability_gating` is false, the gate is bypassed entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityGateConfig {
    pub p_min_floor: f64,
    pub p_soft_floor: f64,
    pub p_runner_threshold: f64,
    pub reduced_size_factor: f64,
    pub adjust_targets_by_prob: bool,
    pub high_prob_target_mult: f64,
    pub low_prob_target_mult: f64,
}

impl Default for ProbabilityGateConfig {
    fn default() -> Self {
        Self {
            p_min_floor: 0.35,
            p_soft_floor: 0.45,
            p_runner_threshold: 0.55,
            reduced_size_factor: 0.5,
            adjust_targets_by_prob: true,
            high_prob_target_mult: 1.3,
            low_prob_target_mult: 0.8,
        }
    }
}

/// Time-of-day filters (§9 time filters expansion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeFilters {
    pub avoid_first_minutes_after_or: i64,
    pub lunch_start: chrono::NaiveTime,
    pub lunch_end: chrono::NaiveTime,
}

/// Run-level configuration: date range, instruments, prop-account
/// parameters, and the feature toggles for optional subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub run_id: Uuid,
    pub instruments: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_dir: String,
    pub output_dir: String,

    pub rules: PropAccountRules,

    pub enable_pb1: bool,
    pub enable_pb2: bool,
    pub enable_pb3: bool,

    pub use_two_phase_stops: bool,
    pub use_salvage: bool,
    pub use_partial_exits: bool,
    pub stop_multiplier: f64,
    pub breakeven_trigger_r: f64,
    pub phase2_trigger_r: f64,
    pub runner_trigger_r: f64,

    pub use_probability_gating: bool,
    pub probability_gate: ProbabilityGateConfig,

    pub use_context_exclusion: bool,
    pub min_trades_per_cell: u32,

    pub use_time_filters: bool,
    pub time_filters: TimeFilters,

    pub atr_period: usize,
    pub adr_period: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> PropAccountRules {
        PropAccountRules {
            account_size: 50_000.0,
            profit_target: 3_000.0,
            trailing_drawdown_max: 2_000.0,
            daily_loss_limit: 1_000.0,
            max_contracts: 3,
            max_concurrent_trades: 1,
            consecutive_loss_lockout: None,
            max_daily_trades_per_instrument: 3,
        }
    }

    #[test]
    fn valid_rules_pass() {
        assert!(rules().validate().is_ok());
    }

    #[test]
    fn daily_loss_limit_above_trailing_dd_is_rejected() {
        let mut r = rules();
        r.daily_loss_limit = 5_000.0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn non_positive_profit_target_is_rejected() {
        let mut r = rules();
        r.profit_target = 0.0;
        assert!(r.validate().is_err());
    }
}
