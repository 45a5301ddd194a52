use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::signature::{BreakoutDelayBucket, ContextSignature};

const Z_SCORE_95: f64 = 1.96;

/// One historical trade's context features and outcome, fed to
/// [`ContextExclusionMatrix::fit`].
#[derive(Debug, Clone)]
pub struct ContextTradeSample {
    pub or_width_norm: f64,
    pub breakout_delay_minutes: f64,
    pub volume_quality_score: f64,
    pub auction_state: String,
    pub gap_type: String,
    pub realized_r: f64,
    pub p_extension: Option<f64>,
}

/// Performance statistics for one context cell (§4.5, grounded in
/// `states/context_exclusion.py::ContextCell`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCell {
    pub signature: ContextSignature,
    pub n_trades: usize,
    pub n_winners: usize,
    pub n_losers: usize,
    pub expectancy: f64,
    pub win_rate: f64,
    pub avg_winner: f64,
    pub avg_loser: f64,
    pub p_extension_mean: Option<f64>,
    pub expectancy_stderr: f64,
    pub expectancy_ci_lower: f64,
    pub expectancy_ci_upper: f64,
    pub is_excluded: bool,
    pub exclusion_reason: Option<String>,
}

/// Context-based trade filter: buckets historical trades into a
/// multi-dimensional signature space and excludes low-expectancy cells
/// (§4.5, grounded in `states/context_exclusion.py::ContextExclusionMatrix`).
#[derive(Debug, Clone)]
pub struct ContextExclusionMatrix {
    min_trades_per_cell: usize,
    expectancy_threshold: f64,
    p_extension_threshold: Option<f64>,

    cells: BTreeMap<ContextSignature, ContextCell>,
    global_expectancy: f64,
    global_p_extension: Option<f64>,
    width_quartiles: Option<[f64; 3]>,
    volume_terciles: Option<[f64; 2]>,
}

impl ContextExclusionMatrix {
    pub fn new(
        min_trades_per_cell: usize,
        expectancy_threshold: f64,
        p_extension_threshold: Option<f64>,
    ) -> Self {
        Self {
            min_trades_per_cell,
            expectancy_threshold,
            p_extension_threshold,
            cells: BTreeMap::new(),
            global_expectancy: 0.0,
            global_p_extension: None,
            width_quartiles: None,
            volume_terciles: None,
        }
    }

    /// Fit quantile thresholds and per-cell statistics from a training
    /// sample, then apply the exclusion rules.
    pub fn fit(&mut self, trades: &[ContextTradeSample]) {
        if trades.is_empty() {
            return;
        }

        self.global_expectancy = mean(&trades.iter().map(|t| t.realized_r).collect::<Vec<_>>());

        let p_ext_values: Vec<f64> = trades.iter().filter_map(|t| t.p_extension).collect();
        self.global_p_extension = if p_ext_values.is_empty() {
            None
        } else {
            Some(mean(&p_ext_values))
        };

        let mut widths: Vec<f64> = trades.iter().map(|t| t.or_width_norm).collect();
        widths.sort_by(|a, b| a.partial_cmp(b).expect("widths are finite"));
        self.width_quartiles = Some([
            quantile_sorted(&widths, 0.25),
            quantile_sorted(&widths, 0.5),
            quantile_sorted(&widths, 0.75),
        ]);

        let mut vols: Vec<f64> = trades.iter().map(|t| t.volume_quality_score).collect();
        vols.sort_by(|a, b| a.partial_cmp(b).expect("volumes are finite"));
        self.volume_terciles = Some([
            quantile_sorted(&vols, 0.33),
            quantile_sorted(&vols, 0.67),
        ]);

        let mut grouped: BTreeMap<ContextSignature, Vec<&ContextTradeSample>> = BTreeMap::new();
        for t in trades {
            let sig = self.create_signature(
                t.or_width_norm,
                t.breakout_delay_minutes,
                t.volume_quality_score,
                &t.auction_state,
                &t.gap_type,
            );
            grouped.entry(sig).or_default().push(t);
        }

        self.cells = grouped
            .into_iter()
            .map(|(sig, group)| {
                let cell = compute_cell_metrics(sig.clone(), &group);
                (sig, cell)
            })
            .collect();

        self.apply_exclusion_rules();
    }

    pub fn create_signature(
        &self,
        or_width_norm: f64,
        breakout_delay_minutes: f64,
        volume_quality: f64,
        auction_state: &str,
        gap_type: &str,
    ) -> ContextSignature {
        let or_width_quartile = match self.width_quartiles {
            None => 2,
            Some([q1, q2, q3]) => {
                if or_width_norm <= q1 {
                    1
                } else if or_width_norm <= q2 {
                    2
                } else if or_width_norm <= q3 {
                    3
                } else {
                    4
                }
            }
        };

        let volume_quality_tercile = match self.volume_terciles {
            None => 2,
            Some([t1, t2]) => {
                if volume_quality <= t1 {
                    1
                } else if volume_quality <= t2 {
                    2
                } else {
                    3
                }
            }
        };

        ContextSignature {
            or_width_quartile,
            breakout_delay_bucket: BreakoutDelayBucket::from_minutes(breakout_delay_minutes),
            volume_quality_tercile,
            auction_state: auction_state.to_string(),
            gap_type: gap_type.to_string(),
        }
    }

    /// `false` for unknown signatures, matching the source's default-open
    /// behavior when a live signature never appeared in the training fit.
    pub fn is_excluded(&self, signature: &ContextSignature) -> bool {
        self.cells
            .get(signature)
            .map(|c| c.is_excluded)
            .unwrap_or(false)
    }

    pub fn get_cell(&self, signature: &ContextSignature) -> Option<&ContextCell> {
        self.cells.get(signature)
    }

    pub fn get_exclusion_reason(&self, signature: &ContextSignature) -> Option<&str> {
        self.get_cell(signature)
            .filter(|c| c.is_excluded)
            .and_then(|c| c.exclusion_reason.as_deref())
    }

    fn apply_exclusion_rules(&mut self) {
        for cell in self.cells.values_mut() {
            if cell.n_trades < self.min_trades_per_cell {
                continue;
            }

            let expectancy_delta = cell.expectancy - self.global_expectancy;
            if expectancy_delta < self.expectancy_threshold {
                cell.is_excluded = true;
                cell.exclusion_reason = Some(format!(
                    "expectancy {:.3}R is {:.3}R below global {:.3}R",
                    cell.expectancy, expectancy_delta, self.global_expectancy
                ));
                continue;
            }

            if let (Some(p_threshold), Some(global_p), Some(cell_p)) = (
                self.p_extension_threshold,
                self.global_p_extension,
                cell.p_extension_mean,
            ) {
                let p_delta = cell_p - global_p;
                if p_delta < -p_threshold {
                    cell.is_excluded = true;
                    cell.exclusion_reason = Some(format!(
                        "p(ext) {:.3} is {:.3} below global {:.3}",
                        cell_p, -p_delta, global_p
                    ));
                }
            }
        }
    }
}

fn compute_cell_metrics(
    signature: ContextSignature,
    group: &[&ContextTradeSample],
) -> ContextCell {
    let r_values: Vec<f64> = group.iter().map(|t| t.realized_r).collect();
    let n_trades = r_values.len();
    let n_winners = r_values.iter().filter(|&&r| r > 0.0).count();
    let n_losers = r_values.iter().filter(|&&r| r < 0.0).count();

    let expectancy = mean(&r_values);
    let win_rate = if n_trades > 0 {
        n_winners as f64 / n_trades as f64
    } else {
        0.0
    };

    let winners: Vec<f64> = r_values.iter().cloned().filter(|&r| r > 0.0).collect();
    let losers: Vec<f64> = r_values.iter().cloned().filter(|&r| r < 0.0).collect();
    let avg_winner = if !winners.is_empty() { mean(&winners) } else { 0.0 };
    let avg_loser = if !losers.is_empty() { mean(&losers) } else { 0.0 };

    let stderr = if n_trades > 1 {
        sample_std(&r_values, expectancy) / (n_trades as f64).sqrt()
    } else {
        0.0
    };
    let ci_lower = expectancy - Z_SCORE_95 * stderr;
    let ci_upper = expectancy + Z_SCORE_95 * stderr;

    let p_ext_values: Vec<f64> = group.iter().filter_map(|t| t.p_extension).collect();
    let p_extension_mean = if p_ext_values.is_empty() {
        None
    } else {
        Some(mean(&p_ext_values))
    };

    ContextCell {
        signature,
        n_trades,
        n_winners,
        n_losers,
        expectancy,
        win_rate,
        avg_winner,
        avg_loser,
        p_extension_mean,
        expectancy_stderr: stderr,
        expectancy_ci_lower: ci_lower,
        expectancy_ci_upper: ci_upper,
        is_excluded: false,
        exclusion_reason: None,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (`ddof=1`), matching `numpy.std(ddof=1)`.
fn sample_std(values: &[f64], mean_value: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| (v - mean_value).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Linear-interpolation quantile over an already-sorted slice, matching
/// `pandas.Series.quantile`'s default `interpolation="linear"`.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let idx = q * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = idx - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}
