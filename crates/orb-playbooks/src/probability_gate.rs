use orb_types::{CandidateSignal, ProbabilityGateConfig};

/// Result of running a candidate signal through the probability gate
/// (§4.7, grounded in
/// `signals/probability_gate.py::SignalWithProbability`).
#[derive(Debug, Clone)]
pub struct GatedSignal {
    pub signal: CandidateSignal,
    pub p_extension: f64,
    pub passed_gate: bool,
    pub rejection_reason: Option<String>,
    pub size_adjustment: f64,
    pub runner_enabled: bool,
    pub target_adjustment: f64,
}

/// Bands a signal's extension probability into an accept/reject decision
/// plus size and target-scaling adjustments (§4.7, grounded in
/// `signals/probability_gate.py::ProbabilityGate`).
#[derive(Debug, Clone)]
pub struct ProbabilityGate {
    config: ProbabilityGateConfig,
}

impl ProbabilityGate {
    pub fn new(config: ProbabilityGateConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, signal: CandidateSignal, p_extension: f64) -> GatedSignal {
        let c = &self.config;

        if p_extension < c.p_min_floor {
            return GatedSignal {
                signal,
                p_extension,
                passed_gate: false,
                rejection_reason: Some(format!(
                    "p_extension {:.2} < min_floor {:.2}",
                    p_extension, c.p_min_floor
                )),
                size_adjustment: 1.0,
                runner_enabled: false,
                target_adjustment: 1.0,
            };
        }

        let size_adjustment = if p_extension < c.p_soft_floor {
            c.reduced_size_factor
        } else {
            1.0
        };

        let runner_enabled = p_extension >= c.p_runner_threshold;

        let target_adjustment = if !c.adjust_targets_by_prob {
            1.0
        } else if p_extension >= c.p_runner_threshold {
            c.high_prob_target_mult
        } else if p_extension < c.p_soft_floor {
            c.low_prob_target_mult
        } else {
            1.0
        };

        GatedSignal {
            signal,
            p_extension,
            passed_gate: true,
            rejection_reason: None,
            size_adjustment,
            runner_enabled,
            target_adjustment,
        }
    }

    pub fn filter_passing(results: Vec<GatedSignal>) -> Vec<GatedSignal> {
        results.into_iter().filter(|r| r.passed_gate).collect()
    }
}

/// Gate for enabling the Phase-3 runner once a trade's MFE and the
/// signal's extension probability both clear their thresholds (§4.7,
/// grounded in
/// `signals/probability_gate.py::RunnerActivationManager`). One instance
/// per open trade; `runner_activated` latches once tripped.
#[derive(Debug, Clone)]
pub struct RunnerActivationGate {
    p_threshold: f64,
    min_mfe_r: f64,
    max_mfe_r: f64,
    runner_activated: bool,
}

impl RunnerActivationGate {
    pub fn new(p_threshold: f64, min_mfe_r: f64, max_mfe_r: f64) -> Self {
        Self {
            p_threshold,
            min_mfe_r,
            max_mfe_r,
            runner_activated: false,
        }
    }

    pub fn should_activate(&mut self, current_mfe_r: f64, p_extension: f64) -> bool {
        if self.runner_activated {
            return false;
        }
        if p_extension < self.p_threshold {
            return false;
        }
        if current_mfe_r < self.min_mfe_r || current_mfe_r > self.max_mfe_r {
            return false;
        }
        self.runner_activated = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orb_types::{Direction, ExitModeDescriptor, SignalMetadata};

    fn signal() -> CandidateSignal {
        CandidateSignal {
            timestamp: Utc::now(),
            instrument: "ES".to_string(),
            playbook_name: "PB1_ORB_Refined".to_string(),
            direction: Direction::Long,
            entry_price: 100.0,
            initial_stop: 98.0,
            phase1_stop_distance: 1.6,
            structural_anchor: Some(98.0),
            priority: 1.0,
            exit_mode: ExitModeDescriptor::TrailVol { atr_mult: 2.0 },
            metadata: SignalMetadata {
                auction_state: "INITIATIVE".to_string(),
                auction_state_confidence: 0.8,
                or_width_norm: 1.0,
                breakout_delay_minutes: 5.0,
                volume_quality_score: 0.6,
                normalized_vol: 1.0,
                drive_energy: 0.6,
                rotations: 1,
                gap_type: "NO_GAP".to_string(),
                p_extension: None,
            },
        }
    }

    #[test]
    fn below_min_floor_is_rejected() {
        let gate = ProbabilityGate::new(ProbabilityGateConfig::default());
        let result = gate.evaluate(signal(), 0.2);
        assert!(!result.passed_gate);
        assert!(result.rejection_reason.is_some());
    }

    #[test]
    fn soft_floor_band_reduces_size_and_lowers_targets() {
        let gate = ProbabilityGate::new(ProbabilityGateConfig::default());
        let result = gate.evaluate(signal(), 0.40);
        assert!(result.passed_gate);
        assert_eq!(result.size_adjustment, 0.5);
        assert!(!result.runner_enabled);
        assert_eq!(result.target_adjustment, 0.8);
    }

    #[test]
    fn runner_threshold_enables_runner_and_raises_targets() {
        let gate = ProbabilityGate::new(ProbabilityGateConfig::default());
        let result = gate.evaluate(signal(), 0.60);
        assert!(result.passed_gate);
        assert_eq!(result.size_adjustment, 1.0);
        assert!(result.runner_enabled);
        assert_eq!(result.target_adjustment, 1.3);
    }

    #[test]
    fn runner_gate_latches_after_first_activation() {
        let mut gate = RunnerActivationGate::new(0.55, 1.5, 3.0);
        assert!(gate.should_activate(2.0, 0.6));
        assert!(!gate.should_activate(2.5, 0.6));
    }
}
