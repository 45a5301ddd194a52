use orb_types::{CandidateSignal, Direction, ExitModeDescriptor};

use crate::context::PlaybookContext;
use crate::playbook::{metadata_from_context, Playbook};

/// OR failure fade: a single session-scoped counter-trend trade on a
/// wick-only break of the opening range that fails to hold and fades on
/// low volume (§4.6, grounded in
/// `playbooks/pb2_failure_fade.py::FailureFadePlaybook`).
#[derive(Debug, Clone)]
pub struct Pb2FailureFade {
    name: String,
    enabled: bool,
    wick_ratio_min: f64,
    volume_fade_threshold: f64,
    reenter_mid: bool,
    time_stop_minutes: i64,

    failure_detected: bool,
}

impl Default for Pb2FailureFade {
    fn default() -> Self {
        Self {
            name: "PB2_Failure_Fade".to_string(),
            enabled: true,
            wick_ratio_min: 0.55,
            volume_fade_threshold: 0.8,
            reenter_mid: true,
            time_stop_minutes: 30,
            failure_detected: false,
        }
    }
}

impl Pb2FailureFade {
    pub fn new(
        enabled: bool,
        wick_ratio_min: f64,
        volume_fade_threshold: f64,
        reenter_mid: bool,
        time_stop_minutes: i64,
    ) -> Self {
        Self {
            name: "PB2_Failure_Fade".to_string(),
            enabled,
            wick_ratio_min,
            volume_fade_threshold,
            reenter_mid,
            time_stop_minutes,
            failure_detected: false,
        }
    }

    fn create_fade_signal(
        &self,
        direction: Direction,
        entry_price: f64,
        failure_extreme: f64,
        ctx: &PlaybookContext,
    ) -> CandidateSignal {
        let buffer = ctx.atr_14 * 0.1;
        let initial_stop = match direction {
            Direction::Long => failure_extreme - buffer,
            Direction::Short => failure_extreme + buffer,
        };
        let phase1_stop_distance = (entry_price - initial_stop).abs();

        CandidateSignal {
            timestamp: ctx.timestamp,
            instrument: ctx.instrument.clone(),
            playbook_name: self.name.clone(),
            direction,
            entry_price,
            initial_stop,
            phase1_stop_distance,
            structural_anchor: Some(failure_extreme),
            priority: 1.2,
            exit_mode: ExitModeDescriptor::SingleTarget {
                time_limit_minutes: self.time_stop_minutes,
            },
            metadata: metadata_from_context(ctx),
        }
    }
}

impl Playbook for Pb2FailureFade {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_eligible(&self, ctx: &PlaybookContext) -> bool {
        self.enabled && ctx.or_primary_finalized && !self.failure_detected
    }

    fn generate_signals(&mut self, ctx: &PlaybookContext) -> Vec<CandidateSignal> {
        let mut signals = Vec::new();

        let or_high = ctx.or_primary_high;
        let or_low = ctx.or_primary_low;
        let or_mid = (or_high + or_low) / 2.0;

        let bar = &ctx.current_bar;

        if bar.high > or_high && bar.close < or_high {
            let body_size = (bar.close - bar.open).abs();
            let upper_wick = bar.high - bar.close.max(bar.open);
            let wick_ratio = if body_size > 0.0 {
                upper_wick / body_size
            } else {
                1.0
            };

            if wick_ratio >= self.wick_ratio_min && ctx.volume_ratio < self.volume_fade_threshold {
                self.failure_detected = true;
                let entry_price = if self.reenter_mid { or_mid } else { or_high };

                if (bar.close - entry_price).abs() / entry_price < 0.002 {
                    signals.push(self.create_fade_signal(Direction::Short, entry_price, bar.high, ctx));
                }
            }
        } else if bar.low < or_low && bar.close > or_low {
            let body_size = (bar.close - bar.open).abs();
            let lower_wick = bar.close.min(bar.open) - bar.low;
            let wick_ratio = if body_size > 0.0 {
                lower_wick / body_size
            } else {
                1.0
            };

            if wick_ratio >= self.wick_ratio_min && ctx.volume_ratio < self.volume_fade_threshold {
                self.failure_detected = true;
                let entry_price = if self.reenter_mid { or_mid } else { or_low };

                if (bar.close - entry_price).abs() / entry_price < 0.002 {
                    signals.push(self.create_fade_signal(Direction::Long, entry_price, bar.low, ctx));
                }
            }
        }

        signals
    }

    fn preferred_exit_mode(&self, _ctx: &PlaybookContext) -> ExitModeDescriptor {
        ExitModeDescriptor::SingleTarget {
            time_limit_minutes: self.time_stop_minutes,
        }
    }

    fn reset_session(&mut self) {
        self.failure_detected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orb_types::Bar;

    fn base_ctx(bar: Bar, volume_ratio: f64) -> PlaybookContext {
        PlaybookContext {
            timestamp: bar.timestamp,
            instrument: "ES".to_string(),
            current_bar: bar,
            current_price: bar.close,
            or_primary_high: 100.0,
            or_primary_low: 95.0,
            or_primary_finalized: true,
            or_primary_valid: true,
            or_primary_width_norm: 1.0,
            atr_14: 1.0,
            recent_return_std: 0.0,
            volume_ratio,
            auction_state: "GAP_REV".to_string(),
            auction_state_confidence: 0.8,
            breakout_delay_minutes: 5.0,
            volume_quality_score: 0.6,
            normalized_vol: 1.0,
            drive_energy: 0.4,
            rotations: 1,
            gap_type: "FULL_UP".to_string(),
            p_extension: None,
            context_excluded: false,
            phase1_stop_distance_override: None,
        }
    }

    #[test]
    fn upside_wick_failure_with_volume_fade_fires_short_at_mid() {
        let now = Utc::now();
        // OR high=100, OR low=95, mid=97.5. Bar wicks to 101 but closes back
        // at 97.5 (within 0.2% of the entry price) on low relative volume.
        let bar = Bar::new(now, 97.5, 101.0, 97.4, 97.5, 50.0);
        let mut pb = Pb2FailureFade::default();
        let ctx = base_ctx(bar, 0.5);
        assert!(pb.is_eligible(&ctx));
        let signals = pb.generate_signals(&ctx);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].direction, Direction::Short);
        assert!(pb.failure_detected);
    }

    #[test]
    fn fires_at_most_once_per_session() {
        let now = Utc::now();
        let bar = Bar::new(now, 97.5, 101.0, 97.4, 97.5, 50.0);
        let mut pb = Pb2FailureFade::default();
        let ctx = base_ctx(bar, 0.5);
        let _ = pb.generate_signals(&ctx);
        assert!(!pb.is_eligible(&ctx));
        pb.reset_session();
        assert!(pb.is_eligible(&ctx));
    }
}
