use chrono::{DateTime, Duration, Utc};
use orb_types::{Bar, DualOrState, InstrumentConfig, OrSide};

/// Picks the adaptive primary-OR duration from the ratio of short-term to
/// long-term ATR, frozen for the rest of the session once chosen (§4.2).
pub fn adaptive_primary_minutes(
    config: &InstrumentConfig,
    atr_14: Option<f64>,
    atr_60: Option<f64>,
) -> i64 {
    let nv = match (atr_14, atr_60) {
        (Some(a14), Some(a60)) if a60 > 0.0 => a14 / a60,
        _ => return config.or_base_minutes,
    };
    if nv < config.or_low_vol_threshold {
        config.or_min_minutes
    } else if nv > config.or_high_vol_threshold {
        config.or_max_minutes
    } else {
        config.or_base_minutes
    }
}

/// Builds the dual opening range for one session. Owns no indicator state
/// of its own; the caller supplies `atr_14`/`atr_60` at construction and
/// the already-computed session-finalization ATR when finalizing.
pub struct DualOrBuilder {
    state: DualOrState,
}

impl DualOrBuilder {
    pub fn new(
        session_start: DateTime<Utc>,
        config: &InstrumentConfig,
        atr_14_at_start: Option<f64>,
        atr_60_at_start: Option<f64>,
    ) -> Self {
        let micro_end = session_start + Duration::minutes(config.micro_minutes);
        let primary_minutes = adaptive_primary_minutes(config, atr_14_at_start, atr_60_at_start);
        let primary_end = session_start + Duration::minutes(primary_minutes);

        Self {
            state: DualOrState {
                micro: OrSide::new(session_start, micro_end, config.micro_minutes),
                primary: OrSide::new(session_start, primary_end, primary_minutes),
            },
        }
    }

    pub fn state(&self) -> &DualOrState {
        &self.state
    }

    /// Feed one bar. Extends whichever side(s) the bar's timestamp falls
    /// inside `[start, end)`, and finalizes a side the instant a bar arrives
    /// at or past its `end` (that crossing bar does not itself contribute).
    pub fn update(&mut self, bar: &Bar, atr_14: f64, config: &InstrumentConfig) {
        Self::update_side(&mut self.state.micro, bar, atr_14, config);
        Self::update_side(&mut self.state.primary, bar, atr_14, config);
    }

    fn update_side(side: &mut OrSide, bar: &Bar, atr_14: f64, config: &InstrumentConfig) {
        if side.finalized {
            return;
        }
        if bar.timestamp >= side.end {
            side.finalize(
                atr_14,
                config.validity_min_width_points,
                config.validity_max_width_points,
                config.validity_min_width_norm,
                config.validity_max_width_norm,
            );
            return;
        }
        if bar.timestamp >= side.start {
            side.extend(bar.high, bar.low);
        }
    }

    pub fn both_finalized(&self) -> bool {
        self.state.micro.finalized && self.state.primary.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orb_types::instrument::InstrumentConfig as Cfg;

    fn test_config() -> Cfg {
        Cfg {
            symbol: "ES".into(),
            display_name: "E-mini S&P".into(),
            tick_size: 0.25,
            tick_value: 12.5,
            tick_value_micro: 1.25,
            session_start: chrono::NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            session_end: chrono::NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            session_utc_offset_secs: -5 * 3600,
            micro_minutes: 5,
            or_base_minutes: 15,
            or_min_minutes: 10,
            or_max_minutes: 20,
            or_low_vol_threshold: 0.35,
            or_high_vol_threshold: 0.85,
            validity_min_width_norm: 0.1,
            validity_max_width_norm: 5.0,
            validity_min_width_points: 0.5,
            validity_max_width_points: 500.0,
            buffer_base: 0.75,
            buffer_volatility_scalar: 0.35,
            buffer_rotation_penalty: 0.10,
            buffer_min: 0.50,
            buffer_max: 2.00,
            stop_min_points: 1.0,
            stop_max_risk_r: 1.5,
            stop_atr_cap_mult: 2.0,
            target_t1_r: 1.0,
            target_t1_fraction: 0.5,
            target_t2_r: 2.0,
            target_t2_fraction: 0.25,
            target_runner_r: 3.0,
            target_runner_trail_mode: "TRAIL_VOL".into(),
            time_stop_enabled: true,
            time_stop_minutes: 120,
            time_stop_min_progress_r: 0.3,
            volume_cum_ratio_min: 0.5,
            volume_cum_ratio_max: 3.0,
            volume_spike_threshold_mult: 1.5,
            volume_min_drive_energy: 0.2,
            typical_adr: 50.0,
            correlation_instruments: vec![],
            correlation_weight: 0.0,
            preferred_contract: "ES".into(),
            scale_to_mini_at_r: 1.0,
        }
    }

    #[test]
    fn adaptive_duration_picks_min_under_low_vol() {
        let cfg = test_config();
        let minutes = adaptive_primary_minutes(&cfg, Some(0.2), Some(1.0));
        assert_eq!(minutes, cfg.or_min_minutes);
    }

    #[test]
    fn adaptive_duration_picks_max_over_high_vol() {
        let cfg = test_config();
        let minutes = adaptive_primary_minutes(&cfg, Some(2.0), Some(1.0));
        assert_eq!(minutes, cfg.or_max_minutes);
    }

    #[test]
    fn adaptive_duration_falls_back_to_base_when_missing() {
        let cfg = test_config();
        assert_eq!(adaptive_primary_minutes(&cfg, None, Some(1.0)), cfg.or_base_minutes);
        assert_eq!(adaptive_primary_minutes(&cfg, Some(1.0), None), cfg.or_base_minutes);
    }

    #[test]
    fn micro_or_finalizes_without_contribution_from_crossing_bar() {
        let cfg = test_config();
        let start = Utc::now();
        let mut builder = DualOrBuilder::new(start, &cfg, Some(1.0), Some(1.0));

        let in_window = Bar::new(start, 100.0, 101.0, 99.0, 100.5, 10.0);
        builder.update(&in_window, 1.0, &cfg);
        assert!(!builder.state().micro.finalized);

        let crossing = Bar::new(
            start + Duration::minutes(cfg.micro_minutes),
            200.0,
            300.0,
            150.0,
            250.0,
            10.0,
        );
        builder.update(&crossing, 1.0, &cfg);
        assert!(builder.state().micro.finalized);
        // the crossing bar's extreme range must not leak into the OR
        assert_eq!(builder.state().micro.high, Some(101.0));
        assert_eq!(builder.state().micro.low, Some(99.0));
    }
}
