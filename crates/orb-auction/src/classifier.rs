use std::collections::BTreeMap;

use orb_types::{AuctionMetrics, AuctionState, DualOrState, GapType, StateClassification};

/// Threshold configuration for [`AuctionStateClassifier`], grounded in
/// `states/auction_state.py::AuctionStateClassifier.__init__`.
#[derive(Debug, Clone, Copy)]
pub struct AuctionStateThresholds {
    pub drive_energy_threshold: f64,
    pub rotations_initiative_max: u32,
    pub volume_z_initiative: f64,
    pub gap_size_threshold: f64,
    pub balanced_rotations_min: u32,
    pub inventory_bias_threshold: f64,
}

impl Default for AuctionStateThresholds {
    fn default() -> Self {
        Self {
            drive_energy_threshold: 0.55,
            rotations_initiative_max: 2,
            volume_z_initiative: 1.0,
            gap_size_threshold: 0.5,
            balanced_rotations_min: 3,
            inventory_bias_threshold: 0.6,
        }
    }
}

/// Rule-based classifier over the five named auction states plus `Mixed`
/// (§4.4, grounded in `states/auction_state.py::AuctionStateClassifier`).
#[derive(Debug, Clone, Copy)]
pub struct AuctionStateClassifier {
    thresholds: AuctionStateThresholds,
}

impl AuctionStateClassifier {
    pub fn new(thresholds: AuctionStateThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(
        &self,
        metrics: &AuctionMetrics,
        dual_or: &DualOrState,
    ) -> StateClassification {
        let mut scores: BTreeMap<AuctionState, f64> = BTreeMap::new();
        scores.insert(AuctionState::Initiative, self.score_initiative(metrics));
        scores.insert(
            AuctionState::Compression,
            self.score_compression(metrics, dual_or),
        );
        scores.insert(AuctionState::GapReversion, self.score_gap_reversion(metrics));
        scores.insert(AuctionState::Balanced, self.score_balanced(metrics));
        scores.insert(
            AuctionState::InventoryFix,
            self.score_inventory_fix(metrics),
        );

        let (&max_state, &max_score) = scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).expect("scores are finite"))
            .expect("five states always scored");

        let (state, confidence, reason) = if max_score < 0.5 {
            (
                AuctionState::Mixed,
                1.0 - max_score,
                "no clear state pattern".to_string(),
            )
        } else {
            let confidence = softmax_confidence(&scores, max_state);
            let reason = self.reason_for(max_state, metrics, dual_or);
            (max_state, confidence, reason)
        };

        StateClassification {
            state,
            confidence,
            state_scores: scores
                .into_iter()
                .map(|(s, v)| (s.as_str().to_string(), v))
                .collect(),
            reason,
        }
    }

    fn score_initiative(&self, m: &AuctionMetrics) -> f64 {
        let t = &self.thresholds;
        let mut score = 0.0;

        if m.drive_energy >= t.drive_energy_threshold {
            score += 0.4;
        } else {
            score += m.drive_energy / t.drive_energy_threshold * 0.4;
        }

        if m.rotations <= t.rotations_initiative_max {
            score += 0.3;
        } else {
            let penalty = (m.rotations - t.rotations_initiative_max) as f64 * 0.1;
            score += (0.3 - penalty).max(0.0);
        }

        if m.volume_z >= t.volume_z_initiative {
            score += 0.3;
        } else if m.volume_z > 0.0 {
            score += m.volume_z / t.volume_z_initiative * 0.3;
        }

        score.min(1.0)
    }

    fn score_compression(&self, m: &AuctionMetrics, dual_or: &DualOrState) -> f64 {
        let mut score = 0.0;

        if let Some(width_norm) = dual_or.primary.width_norm {
            let compression_target = 0.5;
            if width_norm <= compression_target {
                score += 0.5;
            } else {
                score += (0.5 * (1.0 - (width_norm - compression_target))).max(0.0);
            }
        }

        if m.drive_energy <= 0.3 {
            score += 0.3;
        } else {
            score += (0.3 * (1.0 - m.drive_energy)).max(0.0);
        }

        if m.volume_z < 0.0 {
            score += 0.2;
        }

        score.min(1.0)
    }

    fn score_gap_reversion(&self, m: &AuctionMetrics) -> f64 {
        let t = &self.thresholds;

        if !matches!(m.gap_type, GapType::FullUp | GapType::FullDown) {
            return 0.0;
        }
        if m.gap_size_norm < t.gap_size_threshold {
            return 0.0;
        }

        let mut score = 0.0;
        if m.gap_size_norm >= t.gap_size_threshold {
            score += 0.5;
        }
        if m.max_wick_ratio > 1.0 {
            score += 0.3;
        }
        if m.drive_energy < 0.4 {
            score += 0.2;
        }

        score.min(1.0)
    }

    fn score_balanced(&self, m: &AuctionMetrics) -> f64 {
        let t = &self.thresholds;
        let mut score = 0.0;

        if m.rotations >= t.balanced_rotations_min {
            score += 0.5;
        } else {
            score += m.rotations as f64 / t.balanced_rotations_min as f64 * 0.5;
        }

        if (0.8..=1.3).contains(&m.volume_ratio) {
            score += 0.3;
        }

        if (0.3..=0.6).contains(&m.drive_energy) {
            score += 0.2;
        }

        score.min(1.0)
    }

    fn score_inventory_fix(&self, m: &AuctionMetrics) -> f64 {
        let t = &self.thresholds;
        let mut score = 0.0;

        if m.overnight_inventory_bias.abs() >= t.inventory_bias_threshold {
            score += 0.5;
        }

        if m.open_vs_prior_mid.abs() > 0.3
            && m.open_vs_prior_mid * m.overnight_inventory_bias < 0.0
        {
            score += 0.3;
        }

        if (0.3..=0.7).contains(&m.drive_energy) {
            score += 0.2;
        }

        score.min(1.0)
    }

    fn reason_for(
        &self,
        state: AuctionState,
        m: &AuctionMetrics,
        dual_or: &DualOrState,
    ) -> String {
        match state {
            AuctionState::Initiative => format!(
                "strong drive_energy={:.2}, low rotations={}, vol_z={:.2}",
                m.drive_energy, m.rotations, m.volume_z
            ),
            AuctionState::Compression => format!(
                "narrow width_norm={:.2}, low drive={:.2}",
                dual_or.primary.width_norm.unwrap_or(0.0),
                m.drive_energy
            ),
            AuctionState::GapReversion => format!(
                "gap {} size={:.2}ATR, failing to extend",
                m.gap_type.as_str(),
                m.gap_size_norm
            ),
            AuctionState::Balanced => format!(
                "high rotations={}, balanced volume_ratio={:.2}",
                m.rotations, m.volume_ratio
            ),
            AuctionState::InventoryFix => format!(
                "overnight bias={:.2}, correcting at open",
                m.overnight_inventory_bias
            ),
            AuctionState::Mixed => "no clear state pattern".to_string(),
        }
    }
}

/// Softmax over all five scores with temperature 2.0, returning the
/// selected state's normalized weight.
fn softmax_confidence(scores: &BTreeMap<AuctionState, f64>, selected: AuctionState) -> f64 {
    const TEMPERATURE: f64 = 2.0;
    let exp_scores: BTreeMap<AuctionState, f64> = scores
        .iter()
        .map(|(&s, &v)| (s, (v / TEMPERATURE).exp()))
        .collect();
    let total: f64 = exp_scores.values().sum();
    if total > 0.0 {
        exp_scores[&selected] / total
    } else {
        0.5
    }
}
