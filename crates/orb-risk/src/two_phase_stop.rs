use chrono::{DateTime, Utc};
use orb_types::Direction;

/// Stop-management phase for a live trade (§3.8 / §4.8, grounded in
/// `risk/two_phase_stop.py::StopPhase`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPhase {
    Phase1Statistical,
    Phase2Expansion,
    Phase3Runner,
}

impl StopPhase {
    pub fn as_u8(&self) -> u8 {
        match self {
            StopPhase::Phase1Statistical => 1,
            StopPhase::Phase2Expansion => 2,
            StopPhase::Phase3Runner => 3,
        }
    }
}

/// Record of a stop move or phase transition, kept for the per-trade
/// audit trail (§4.8, grounded in `two_phase_stop.py::StopUpdate`).
#[derive(Debug, Clone)]
pub struct StopUpdate {
    pub timestamp: DateTime<Utc>,
    pub old_stop: f64,
    pub new_stop: f64,
    pub old_phase: StopPhase,
    pub new_phase: StopPhase,
    pub reason: String,
    pub current_mfe_r: f64,
}

/// Evolves a trade's stop through Phase 1 (statistical) -> Phase 2
/// (structural expansion) -> Phase 3 (runner, delegated to the trailing
/// manager), moving only in the favorable direction (§4.8, grounded in
/// `risk/two_phase_stop.py::TwoPhaseStopManager`).
#[derive(Debug, Clone)]
pub struct TwoPhaseStopManager {
    direction: Direction,
    entry_price: f64,
    initial_risk: f64,
    phase1_distance: f64,
    phase2_trigger: f64,
    runner_trigger: f64,
    structural_anchor: Option<f64>,
    structural_buffer: f64,
    breakeven_trigger: f64,

    current_phase: StopPhase,
    current_stop: f64,
    highest_mfe_r: f64,
    breakeven_applied: bool,
}

impl TwoPhaseStopManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        direction: Direction,
        entry_price: f64,
        initial_risk: f64,
        phase1_stop_distance: f64,
        stop_multiplier: f64,
        phase2_trigger_r: f64,
        runner_trigger_r: f64,
        structural_anchor: Option<f64>,
        structural_buffer: f64,
        breakeven_trigger_r: f64,
    ) -> Self {
        let phase1_distance = phase1_stop_distance * stop_multiplier;
        let current_stop = match direction {
            Direction::Long => entry_price - phase1_distance,
            Direction::Short => entry_price + phase1_distance,
        };
        Self {
            direction,
            entry_price,
            initial_risk,
            phase1_distance,
            phase2_trigger: phase2_trigger_r,
            runner_trigger: runner_trigger_r,
            structural_anchor,
            structural_buffer,
            breakeven_trigger: breakeven_trigger_r,
            current_phase: StopPhase::Phase1Statistical,
            current_stop,
            highest_mfe_r: 0.0,
            breakeven_applied: false,
        }
    }

    fn favorable_max(&self, a: f64, b: f64) -> f64 {
        match self.direction {
            Direction::Long => a.max(b),
            Direction::Short => a.min(b),
        }
    }

    fn phase2_stop(&self) -> f64 {
        match self.structural_anchor {
            None => match self.direction {
                Direction::Long => self.entry_price - self.initial_risk * 0.5,
                Direction::Short => self.entry_price + self.initial_risk * 0.5,
            },
            Some(anchor) => match self.direction {
                Direction::Long => anchor - self.structural_buffer,
                Direction::Short => anchor + self.structural_buffer,
            },
        }
    }

    /// Advance the stop for one bar (§4.8 update rule, steps 1-3). `p_extension`
    /// and its threshold gate the Phase 2 -> Phase 3 transition; pass `None`
    /// when the probability gate is disabled to allow the transition
    /// unconditionally.
    pub fn update(
        &mut self,
        current_mfe_r: f64,
        timestamp: DateTime<Utc>,
        new_structural_anchor: Option<f64>,
        p_extension: Option<f64>,
        p_extension_threshold: f64,
    ) -> Option<StopUpdate> {
        if current_mfe_r > self.highest_mfe_r {
            self.highest_mfe_r = current_mfe_r;
        }
        if let Some(anchor) = new_structural_anchor {
            self.structural_anchor = Some(anchor);
        }

        let old_stop = self.current_stop;
        let old_phase = self.current_phase;
        let mut new_stop = old_stop;
        let mut new_phase = old_phase;
        let mut reason = String::new();

        match self.current_phase {
            StopPhase::Phase1Statistical => {
                if !self.breakeven_applied && current_mfe_r >= self.breakeven_trigger {
                    let candidate = self.favorable_max(self.entry_price, old_stop);
                    if candidate != old_stop {
                        new_stop = candidate;
                        self.breakeven_applied = true;
                        reason = format!("breakeven move at {current_mfe_r:.2}R MFE");
                    }
                } else if current_mfe_r >= self.phase2_trigger {
                    new_phase = StopPhase::Phase2Expansion;
                    new_stop = self.favorable_max(self.phase2_stop(), old_stop);
                    reason = format!("phase 2 transition at {current_mfe_r:.2}R MFE");
                }
            }
            StopPhase::Phase2Expansion => {
                if current_mfe_r >= self.runner_trigger
                    && p_extension.map_or(true, |p| p >= p_extension_threshold)
                {
                    new_phase = StopPhase::Phase3Runner;
                    reason = format!(
                        "runner enabled at {current_mfe_r:.2}R (p={:?})",
                        p_extension
                    );
                }
                let potential = self.phase2_stop();
                let improved = match self.direction {
                    Direction::Long => potential > old_stop,
                    Direction::Short => potential < old_stop,
                };
                if improved {
                    new_stop = potential;
                    if reason.is_empty() {
                        reason = "updated structural anchor".to_string();
                    }
                }
            }
            StopPhase::Phase3Runner => {
                // Trailing is delegated to orb-risk's trailing manager.
            }
        }

        if new_stop != old_stop || new_phase != old_phase {
            self.current_stop = new_stop;
            self.current_phase = new_phase;
            Some(StopUpdate {
                timestamp,
                old_stop,
                new_stop,
                old_phase,
                new_phase,
                reason,
                current_mfe_r,
            })
        } else {
            None
        }
    }

    /// Stop-hit check per §4.8: `bar_low <= stop` for longs, `bar_high >=
    /// stop` for shorts.
    pub fn check_stop_hit(&self, bar_high: f64, bar_low: f64) -> bool {
        match self.direction {
            Direction::Long => bar_low <= self.current_stop,
            Direction::Short => bar_high >= self.current_stop,
        }
    }

    /// Allow an external trailing manager (Phase 3) to improve the stop.
    /// The move is rejected if it would loosen the stop.
    pub fn accept_external_stop(&mut self, candidate: f64) -> bool {
        let improved = match self.direction {
            Direction::Long => candidate > self.current_stop,
            Direction::Short => candidate < self.current_stop,
        };
        if improved {
            self.current_stop = candidate;
        }
        improved
    }

    pub fn stop_price(&self) -> f64 {
        self.current_stop
    }

    pub fn phase(&self) -> StopPhase {
        self.current_phase
    }

    pub fn is_in_runner_phase(&self) -> bool {
        matches!(self.current_phase, StopPhase::Phase3Runner)
    }

    pub fn breakeven_applied(&self) -> bool {
        self.breakeven_applied
    }
}
