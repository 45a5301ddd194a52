use orb_types::{CandidateSignal, Direction, ExitModeDescriptor};

use crate::context::PlaybookContext;
use crate::playbook::{metadata_from_context, Playbook};

/// Refined opening-range breakout: state-aware dynamic buffer, exit mode
/// selected by auction state (§4.6, grounded in
/// `playbooks/pb1_orb_refined.py::ORBRefinedPlaybook`). Stateless across
/// bars; `reset_session` is a no-op.
#[derive(Debug, Clone)]
pub struct Pb1OrbRefined {
    name: String,
    enabled: bool,
    base_buffer: f64,
    vol_alpha: f64,
    rotation_penalty: f64,
    min_buffer: f64,
    max_buffer: f64,
}

impl Default for Pb1OrbRefined {
    fn default() -> Self {
        Self {
            name: "PB1_ORB_Refined".to_string(),
            enabled: true,
            base_buffer: 0.75,
            vol_alpha: 0.35,
            rotation_penalty: 0.10,
            min_buffer: 0.50,
            max_buffer: 2.00,
        }
    }
}

impl Pb1OrbRefined {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        enabled: bool,
        base_buffer: f64,
        vol_alpha: f64,
        rotation_penalty: f64,
        min_buffer: f64,
        max_buffer: f64,
    ) -> Self {
        Self {
            name: "PB1_ORB_Refined".to_string(),
            enabled,
            base_buffer,
            vol_alpha,
            rotation_penalty,
            min_buffer,
            max_buffer,
        }
    }

    fn dynamic_buffer(&self, ctx: &PlaybookContext) -> f64 {
        let buffer = self.base_buffer
            + self.vol_alpha * ctx.recent_return_std
            + self.rotation_penalty * ctx.rotations as f64;
        buffer.clamp(self.min_buffer, self.max_buffer)
    }

    fn create_signal(
        &self,
        direction: Direction,
        entry_price: f64,
        buffer_used: f64,
        ctx: &PlaybookContext,
    ) -> CandidateSignal {
        let initial_stop = match direction {
            Direction::Long => ctx.or_primary_low,
            Direction::Short => ctx.or_primary_high,
        };
        let phase1_stop_distance = ctx
            .phase1_stop_distance_override
            .unwrap_or_else(|| 0.8 * (entry_price - initial_stop).abs());

        let _ = buffer_used;
        CandidateSignal {
            timestamp: ctx.timestamp,
            instrument: ctx.instrument.clone(),
            playbook_name: self.name.clone(),
            direction,
            entry_price,
            initial_stop,
            phase1_stop_distance,
            structural_anchor: Some(initial_stop),
            priority: 1.0,
            exit_mode: self.preferred_exit_mode(ctx),
            metadata: metadata_from_context(ctx),
        }
    }
}

impl Playbook for Pb1OrbRefined {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_eligible(&self, ctx: &PlaybookContext) -> bool {
        if !self.enabled {
            return false;
        }
        let eligible_state = matches!(
            ctx.auction_state.as_str(),
            "INITIATIVE" | "COMPRESSION" | "BALANCED"
        );
        eligible_state && ctx.or_primary_finalized && ctx.or_primary_valid && !ctx.context_excluded
    }

    fn generate_signals(&mut self, ctx: &PlaybookContext) -> Vec<CandidateSignal> {
        let mut signals = Vec::new();

        let buffer_atr = self.dynamic_buffer(ctx);
        let buffer_price = buffer_atr * ctx.atr_14;
        let long_trigger = ctx.or_primary_high + buffer_price;
        let short_trigger = ctx.or_primary_low - buffer_price;

        if ctx.current_price >= long_trigger {
            signals.push(self.create_signal(Direction::Long, ctx.current_price, buffer_atr, ctx));
        }
        if ctx.current_price <= short_trigger {
            signals.push(self.create_signal(Direction::Short, ctx.current_price, buffer_atr, ctx));
        }

        signals
    }

    fn preferred_exit_mode(&self, ctx: &PlaybookContext) -> ExitModeDescriptor {
        match ctx.auction_state.as_str() {
            "INITIATIVE" => ExitModeDescriptor::PartialThenTrail {
                partial_frac: 0.2,
                partial_r: 1.2,
                trail_factor: 2.0,
            },
            "COMPRESSION" => ExitModeDescriptor::PartialThenTrail {
                partial_frac: 0.4,
                partial_r: 1.5,
                trail_factor: 1.5,
            },
            "BALANCED" => ExitModeDescriptor::HybridVolPivot {
                atr_mult: 1.8,
                lookback: 3,
            },
            _ => ExitModeDescriptor::TrailVol { atr_mult: 2.0 },
        }
    }

    fn reset_session(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orb_types::Bar;

    fn ctx(auction_state: &str, current_price: f64) -> PlaybookContext {
        let now = Utc::now();
        PlaybookContext {
            timestamp: now,
            instrument: "ES".to_string(),
            current_bar: Bar::new(now, current_price, current_price, current_price, current_price, 100.0),
            current_price,
            or_primary_high: 100.0,
            or_primary_low: 95.0,
            or_primary_finalized: true,
            or_primary_valid: true,
            or_primary_width_norm: 1.0,
            atr_14: 2.0,
            recent_return_std: 0.0,
            volume_ratio: 1.0,
            auction_state: auction_state.to_string(),
            auction_state_confidence: 0.8,
            breakout_delay_minutes: 5.0,
            volume_quality_score: 0.6,
            normalized_vol: 1.0,
            drive_energy: 0.6,
            rotations: 1,
            gap_type: "NO_GAP".to_string(),
            p_extension: None,
            context_excluded: false,
            phase1_stop_distance_override: None,
        }
    }

    #[test]
    fn long_breakout_above_buffered_trigger_fires() {
        let mut pb = Pb1OrbRefined::default();
        let c = ctx("INITIATIVE", 102.5);
        assert!(pb.is_eligible(&c));
        let signals = pb.generate_signals(&c);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].direction, Direction::Long);
        assert_eq!(signals[0].initial_stop, 95.0);
    }

    #[test]
    fn gap_reversion_state_is_not_eligible() {
        let pb = Pb1OrbRefined::default();
        let c = ctx("GAP_REV", 102.5);
        assert!(!pb.is_eligible(&c));
    }

    #[test]
    fn context_excluded_blocks_eligibility() {
        let pb = Pb1OrbRefined::default();
        let mut c = ctx("INITIATIVE", 102.5);
        c.context_excluded = true;
        assert!(!pb.is_eligible(&c));
    }
}
