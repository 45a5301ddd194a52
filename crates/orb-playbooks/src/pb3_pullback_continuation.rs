use orb_types::{CandidateSignal, Direction, ExitModeDescriptor};

use crate::context::PlaybookContext;
use crate::playbook::{metadata_from_context, Playbook};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImpulseDirection {
    Long,
    Short,
}

/// Post-impulse flag continuation: waits for a strong directional move off
/// the opening range, tracks the following consolidation (flag), and
/// signals on a continuation breakout of the flag extreme (§4.6, grounded
/// in `playbooks/pb3_pullback_continuation.py::PullbackContinuationPlaybook`).
#[derive(Debug, Clone)]
pub struct Pb3PullbackContinuation {
    name: String,
    enabled: bool,
    impulse_threshold_r: f64,
    impulse_time_bars: i64,
    flag_min_bars: u32,
    flag_max_bars: u32,
    flag_retrace_min: f64,
    flag_retrace_max: f64,

    impulse_detected: bool,
    impulse_direction: Option<ImpulseDirection>,
    impulse_high: Option<f64>,
    impulse_low: Option<f64>,
    flag_bar_count: u32,
    flag_high: Option<f64>,
    flag_low: Option<f64>,
}

impl Default for Pb3PullbackContinuation {
    fn default() -> Self {
        Self {
            name: "PB3_Pullback_Continuation".to_string(),
            enabled: true,
            impulse_threshold_r: 0.8,
            impulse_time_bars: 15,
            flag_min_bars: 3,
            flag_max_bars: 20,
            flag_retrace_min: 0.25,
            flag_retrace_max: 0.62,
            impulse_detected: false,
            impulse_direction: None,
            impulse_high: None,
            impulse_low: None,
            flag_bar_count: 0,
            flag_high: None,
            flag_low: None,
        }
    }
}

impl Pb3PullbackContinuation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        enabled: bool,
        impulse_threshold_r: f64,
        impulse_time_bars: i64,
        flag_min_bars: u32,
        flag_max_bars: u32,
        flag_retrace_min: f64,
        flag_retrace_max: f64,
    ) -> Self {
        Self {
            name: "PB3_Pullback_Continuation".to_string(),
            enabled,
            impulse_threshold_r,
            impulse_time_bars,
            flag_min_bars,
            flag_max_bars,
            flag_retrace_min,
            flag_retrace_max,
            impulse_detected: false,
            impulse_direction: None,
            impulse_high: None,
            impulse_low: None,
            flag_bar_count: 0,
            flag_high: None,
            flag_low: None,
        }
    }

    fn check_for_impulse(&mut self, ctx: &PlaybookContext) {
        let bars_since_or = ctx.breakout_delay_minutes as i64;
        if bars_since_or > self.impulse_time_bars {
            return;
        }

        let or_high = ctx.or_primary_high;
        let or_low = ctx.or_primary_low;
        let atr_14 = ctx.atr_14;
        let current_price = ctx.current_bar.close;

        if current_price > or_high {
            let move_r = if atr_14 > 0.0 {
                (current_price - or_high) / atr_14
            } else {
                0.0
            };
            if move_r >= self.impulse_threshold_r {
                self.impulse_detected = true;
                self.impulse_direction = Some(ImpulseDirection::Long);
                self.impulse_high = Some(ctx.current_bar.high);
            }
        } else if current_price < or_low {
            let move_r = if atr_14 > 0.0 {
                (or_low - current_price) / atr_14
            } else {
                0.0
            };
            if move_r >= self.impulse_threshold_r {
                self.impulse_detected = true;
                self.impulse_direction = Some(ImpulseDirection::Short);
                self.impulse_low = Some(ctx.current_bar.low);
            }
        }
    }

    fn create_continuation_signal(
        &self,
        direction: Direction,
        entry_price: f64,
        flag_high: f64,
        flag_low: f64,
        ctx: &PlaybookContext,
    ) -> CandidateSignal {
        let buffer = ctx.atr_14 * 0.15;
        let (initial_stop, structural_anchor) = match direction {
            Direction::Long => (flag_low - buffer, flag_low),
            Direction::Short => (flag_high + buffer, flag_high),
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
            structural_anchor: Some(structural_anchor),
            priority: 1.1,
            exit_mode: ExitModeDescriptor::TrailPivot { lookback: 3 },
            metadata: metadata_from_context(ctx),
        }
    }

    fn reset_state(&mut self) {
        self.impulse_detected = false;
        self.impulse_direction = None;
        self.impulse_high = None;
        self.impulse_low = None;
        self.flag_bar_count = 0;
        self.flag_high = None;
        self.flag_low = None;
    }
}

impl Playbook for Pb3PullbackContinuation {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_eligible(&self, ctx: &PlaybookContext) -> bool {
        self.enabled && ctx.or_primary_finalized
    }

    fn generate_signals(&mut self, ctx: &PlaybookContext) -> Vec<CandidateSignal> {
        let mut signals = Vec::new();

        if !self.impulse_detected {
            self.check_for_impulse(ctx);
            return signals;
        }

        self.flag_bar_count += 1;
        let bar = &ctx.current_bar;
        match self.flag_high {
            None => {
                self.flag_high = Some(bar.high);
                self.flag_low = Some(bar.low);
            }
            Some(h) => {
                self.flag_high = Some(h.max(bar.high));
                self.flag_low = Some(self.flag_low.expect("set alongside flag_high").min(bar.low));
            }
        }

        if self.flag_bar_count > self.flag_max_bars {
            self.reset_state();
            return signals;
        }

        if self.flag_bar_count < self.flag_min_bars {
            return signals;
        }

        let current_price = bar.close;
        let flag_high = self.flag_high.expect("set above");
        let flag_low = self.flag_low.expect("set above");

        match self.impulse_direction {
            Some(ImpulseDirection::Long) => {
                if current_price > flag_high {
                    let impulse_high = self.impulse_high.expect("set on detection");
                    let impulse_range = impulse_high - ctx.or_primary_high;
                    let flag_retrace = impulse_high - flag_low;
                    let retrace_pct = if impulse_range > 0.0 {
                        flag_retrace / impulse_range
                    } else {
                        0.0
                    };

                    if (self.flag_retrace_min..=self.flag_retrace_max).contains(&retrace_pct) {
                        signals.push(self.create_continuation_signal(
                            Direction::Long,
                            current_price,
                            flag_high,
                            flag_low,
                            ctx,
                        ));
                        self.reset_state();
                    }
                }
            }
            Some(ImpulseDirection::Short) => {
                if current_price < flag_low {
                    let impulse_low = self.impulse_low.expect("set on detection");
                    let impulse_range = ctx.or_primary_low - impulse_low;
                    let flag_retrace = flag_high - impulse_low;
                    let retrace_pct = if impulse_range > 0.0 {
                        flag_retrace / impulse_range
                    } else {
                        0.0
                    };

                    if (self.flag_retrace_min..=self.flag_retrace_max).contains(&retrace_pct) {
                        signals.push(self.create_continuation_signal(
                            Direction::Short,
                            current_price,
                            flag_high,
                            flag_low,
                            ctx,
                        ));
                        self.reset_state();
                    }
                }
            }
            None => {}
        }

        signals
    }

    fn preferred_exit_mode(&self, _ctx: &PlaybookContext) -> ExitModeDescriptor {
        ExitModeDescriptor::TrailPivot { lookback: 3 }
    }

    fn reset_session(&mut self) {
        self.reset_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use orb_types::Bar;

    fn ctx_at(now: chrono::DateTime<Utc>, bar: Bar, breakout_delay_minutes: f64) -> PlaybookContext {
        PlaybookContext {
            timestamp: now,
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
            volume_ratio: 1.0,
            auction_state: "INITIATIVE".to_string(),
            auction_state_confidence: 0.8,
            breakout_delay_minutes,
            volume_quality_score: 0.6,
            normalized_vol: 1.0,
            drive_energy: 0.7,
            rotations: 1,
            gap_type: "NO_GAP".to_string(),
            p_extension: None,
            context_excluded: false,
            phase1_stop_distance_override: None,
        }
    }

    #[test]
    fn impulse_then_flag_then_breakout_fires_long_continuation() {
        let mut pb = Pb3PullbackContinuation::default();
        let now = Utc::now();

        // Impulse: close 101.0 is 1.0R above OR high (100.0) with atr=1.0.
        let impulse_bar = Bar::new(now, 100.5, 101.2, 100.4, 101.0, 100.0);
        let ctx = ctx_at(now, impulse_bar, 5.0);
        assert!(pb.generate_signals(&ctx).is_empty());
        assert!(pb.impulse_detected);

        // Flag bars: pull back and consolidate for flag_min_bars.
        for i in 0..3u32 {
            let t = now + Duration::minutes(i as i64 + 1);
            let flag_bar = Bar::new(t, 100.6, 100.8, 100.3, 100.5, 80.0);
            let c = ctx_at(t, flag_bar, 5.0 + i as f64);
            let signals = pb.generate_signals(&c);
            assert!(signals.is_empty());
        }

        // Breakout above flag high with retrace within bounds.
        let t = now + Duration::minutes(10);
        let breakout_bar = Bar::new(t, 100.8, 101.5, 100.7, 101.3, 120.0);
        let c = ctx_at(t, breakout_bar, 9.0);
        let signals = pb.generate_signals(&c);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].direction, Direction::Long);
        assert!(!pb.impulse_detected);
    }

    #[test]
    fn flag_exceeding_max_bars_resets_state() {
        let mut pb = Pb3PullbackContinuation::default();
        let now = Utc::now();

        let impulse_bar = Bar::new(now, 100.5, 101.2, 100.4, 101.0, 100.0);
        let ctx = ctx_at(now, impulse_bar, 5.0);
        pb.generate_signals(&ctx);
        assert!(pb.impulse_detected);

        for i in 0..25u32 {
            let t = now + Duration::minutes(i as i64 + 1);
            let flag_bar = Bar::new(t, 100.6, 100.8, 100.3, 100.5, 80.0);
            let c = ctx_at(t, flag_bar, 5.0);
            pb.generate_signals(&c);
        }

        assert!(!pb.impulse_detected);
    }
}
