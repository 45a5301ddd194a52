use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Per-symbol parameters. Immutable after load.
///
/// Field grouping mirrors the instrument definition files this was
/// distilled from: contract specs, session window, OR sizing, buffer/stop
/// sizing, target ladder, time stop, volume filters, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub display_name: String,

    pub tick_size: f64,
    pub tick_value: f64,
    pub tick_value_micro: f64,

    pub session_start: NaiveTime,
    pub session_end: NaiveTime,
    /// Fixed UTC offset (seconds) for the exchange-local session window.
    pub session_utc_offset_secs: i32,

    pub micro_minutes: i64,
    pub or_base_minutes: i64,
    pub or_min_minutes: i64,
    pub or_max_minutes: i64,
    pub or_low_vol_threshold: f64,
    pub or_high_vol_threshold: f64,

    pub validity_min_width_norm: f64,
    pub validity_max_width_norm: f64,
    pub validity_min_width_points: f64,
    pub validity_max_width_points: f64,

    pub buffer_base: f64,
    pub buffer_volatility_scalar: f64,
    pub buffer_rotation_penalty: f64,
    pub buffer_min: f64,
    pub buffer_max: f64,

    pub stop_min_points: f64,
    pub stop_max_risk_r: f64,
    pub stop_atr_cap_mult: f64,

    pub target_t1_r: f64,
    pub target_t1_fraction: f64,
    pub target_t2_r: f64,
    pub target_t2_fraction: f64,
    pub target_runner_r: f64,
    pub target_runner_trail_mode: String,

    pub time_stop_enabled: bool,
    pub time_stop_minutes: i64,
    pub time_stop_min_progress_r: f64,

    pub volume_cum_ratio_min: f64,
    pub volume_cum_ratio_max: f64,
    pub volume_spike_threshold_mult: f64,
    pub volume_min_drive_energy: f64,

    pub typical_adr: f64,
    pub correlation_instruments: Vec<String>,
    pub correlation_weight: f64,

    pub preferred_contract: String,
    pub scale_to_mini_at_r: f64,
}

impl InstrumentConfig {
    /// Structural validation performed once at load time (§7 configuration
    /// error class). Returns the first violated constraint found.
    pub fn validate(&self) -> Result<(), String> {
        if self.or_min_minutes > self.or_max_minutes {
            return Err(format!(
                "{}: or_min_minutes ({}) > or_max_minutes ({})",
                self.symbol, self.or_min_minutes, self.or_max_minutes
            ));
        }
        if self.or_base_minutes < self.or_min_minutes || self.or_base_minutes > self.or_max_minutes
        {
            return Err(format!(
                "{}: or_base_minutes ({}) outside [{}, {}]",
                self.symbol, self.or_base_minutes, self.or_min_minutes, self.or_max_minutes
            ));
        }
        if self.or_low_vol_threshold >= self.or_high_vol_threshold {
            return Err(format!(
                "{}: or_low_vol_threshold >= or_high_vol_threshold",
                self.symbol
            ));
        }
        if self.buffer_min > self.buffer_max {
            return Err(format!("{}: buffer_min > buffer_max", self.symbol));
        }
        if self.tick_size <= 0.0 {
            return Err(format!("{}: tick_size must be > 0", self.symbol));
        }
        if !(0.0..=1.0).contains(&self.target_t1_fraction)
            || !(0.0..=1.0).contains(&self.target_t2_fraction)
        {
            return Err(format!(
                "{}: target size fractions must be in [0, 1]",
                self.symbol
            ));
        }
        if self.target_t1_fraction + self.target_t2_fraction > 1.0 + 1e-9 {
            return Err(format!(
                "{}: target_t1_fraction + target_t2_fraction exceeds 1.0",
                self.symbol
            ));
        }
        Ok(())
    }
}
