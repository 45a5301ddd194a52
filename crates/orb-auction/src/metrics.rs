use chrono::{DateTime, Utc};
use orb_types::{AuctionMetrics, Bar, GapType};

/// Accumulates bars over the opening range and produces one [`AuctionMetrics`]
/// snapshot per session (§3.4 / §4.3).
pub struct AuctionMetricsBuilder {
    start_ts: DateTime<Utc>,
    end_ts: DateTime<Utc>,
    atr_14: f64,
    adr_20: f64,

    prior_high: Option<f64>,
    prior_low: Option<f64>,
    prior_close: Option<f64>,
    overnight_high: Option<f64>,
    overnight_low: Option<f64>,

    open_price: Option<f64>,
    bar_count: u32,
    highs: Vec<f64>,
    lows: Vec<f64>,
    bodies: Vec<f64>,
    volumes: Vec<f64>,
    expected_volumes: Vec<f64>,
    directions: Vec<i8>,
    body_ratios: Vec<f64>,
    wick_ratios: Vec<f64>,
}

impl AuctionMetricsBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start_ts: DateTime<Utc>,
        atr_14: f64,
        adr_20: f64,
        prior_high: Option<f64>,
        prior_low: Option<f64>,
        prior_close: Option<f64>,
        overnight_high: Option<f64>,
        overnight_low: Option<f64>,
    ) -> Self {
        Self {
            start_ts,
            end_ts: start_ts,
            atr_14,
            adr_20,
            prior_high,
            prior_low,
            prior_close,
            overnight_high,
            overnight_low,
            open_price: None,
            bar_count: 0,
            highs: Vec::new(),
            lows: Vec::new(),
            bodies: Vec::new(),
            volumes: Vec::new(),
            expected_volumes: Vec::new(),
            directions: Vec::new(),
            body_ratios: Vec::new(),
            wick_ratios: Vec::new(),
        }
    }

    /// Accumulate one bar. `expected_volume` feeds the volume Z-score; pass
    /// `None` when no time-of-day baseline is available, which leaves
    /// `volume_z`/`volume_ratio` at their neutral defaults.
    pub fn add_bar(&mut self, bar: &Bar, expected_volume: Option<f64>) {
        self.end_ts = bar.timestamp;
        if self.open_price.is_none() {
            self.open_price = Some(bar.open);
        }
        self.bar_count += 1;
        self.highs.push(bar.high);
        self.lows.push(bar.low);

        let body = bar.body();
        self.bodies.push(body);
        self.volumes.push(bar.volume);
        if let Some(ev) = expected_volume {
            self.expected_volumes.push(ev);
        }

        let range = bar.range();
        if range > 0.0 {
            let body_ratio = body.abs() / range;
            self.body_ratios.push(body_ratio);

            let (upper_wick, lower_wick) = if body > 0.0 {
                (bar.high - bar.close, bar.open - bar.low)
            } else {
                (bar.high - bar.open, bar.close - bar.low)
            };
            let max_wick = upper_wick.max(lower_wick);
            let wick_ratio = if body.abs() > 0.0 {
                max_wick / body.abs()
            } else {
                0.0
            };
            self.wick_ratios.push(wick_ratio);
        } else {
            self.body_ratios.push(0.0);
            self.wick_ratios.push(0.0);
        }

        self.directions.push(bar.direction());
    }

    pub fn compute(&self) -> AuctionMetrics {
        let (volume_z, volume_ratio) = self.volume_metrics();
        let (gap_type, gap_size_norm) = self.gap_metrics();
        let (overnight_range_pct, overnight_inventory_bias) = self.overnight_metrics();

        AuctionMetrics {
            drive_energy: self.drive_energy(),
            rotations: self.rotations(),
            volume_z,
            volume_ratio,
            gap_type,
            gap_size_norm,
            open_vs_prior_mid: self.open_vs_prior_mid(),
            overnight_range_pct,
            overnight_inventory_bias,
            bar_count: self.bar_count,
            avg_body_pct: mean(&self.body_ratios),
            max_wick_ratio: self.wick_ratios.iter().cloned().fold(0.0, f64::max),
            start_ts: self.start_ts,
            end_ts: self.end_ts,
        }
    }

    fn drive_energy(&self) -> f64 {
        if self.highs.is_empty() {
            return 0.0;
        }
        let or_high = self.highs.iter().cloned().fold(f64::MIN, f64::max);
        let or_low = self.lows.iter().cloned().fold(f64::MAX, f64::min);
        let or_width = or_high - or_low;
        if or_width <= 0.0 {
            return 0.0;
        }
        let weighted_sum: f64 = self
            .bodies
            .iter()
            .zip(self.body_ratios.iter())
            .map(|(body, ratio)| body * ratio)
            .sum();
        (weighted_sum.abs() / or_width).min(1.0)
    }

    fn rotations(&self) -> u32 {
        if self.directions.len() < 2 {
            return 0;
        }
        let mut rotations = 0u32;
        let mut prev_dir = self.directions[0];
        for &current_dir in &self.directions[1..] {
            if current_dir != 0 && prev_dir != 0 && current_dir != prev_dir {
                rotations += 1;
            }
            if current_dir != 0 {
                prev_dir = current_dir;
            }
        }
        rotations
    }

    fn volume_metrics(&self) -> (f64, f64) {
        if self.volumes.is_empty() || self.expected_volumes.is_empty() {
            return (0.0, 1.0);
        }
        let total_volume: f64 = self.volumes.iter().sum();
        let total_expected: f64 = self.expected_volumes.iter().sum();
        if total_expected <= 0.0 {
            return (0.0, 1.0);
        }
        let volume_ratio = total_volume / total_expected;
        let std_estimate = 0.3 * total_expected;
        let volume_z = if std_estimate > 0.0 {
            (total_volume - total_expected) / std_estimate
        } else {
            0.0
        };
        (volume_z, volume_ratio)
    }

    fn gap_metrics(&self) -> (GapType, f64) {
        let (open, prior_high, prior_low) = match (self.open_price, self.prior_high, self.prior_low)
        {
            (Some(o), Some(ph), Some(pl)) => (o, ph, pl),
            _ => return (GapType::NoGap, 0.0),
        };

        let (gap_type, gap_size) = if open > prior_high {
            (GapType::FullUp, open - prior_high)
        } else if open < prior_low {
            (GapType::FullDown, prior_low - open)
        } else {
            let prior_mid = (prior_high + prior_low) / 2.0;
            let gt = if open > prior_mid {
                GapType::PartialUp
            } else if open < prior_mid {
                GapType::PartialDown
            } else {
                GapType::Inside
            };
            (gt, 0.0)
        };

        let gap_size_norm = if self.atr_14 > 0.0 {
            gap_size / self.atr_14
        } else {
            0.0
        };
        (gap_type, gap_size_norm)
    }

    fn open_vs_prior_mid(&self) -> f64 {
        let (open, prior_high, prior_low) = match (self.open_price, self.prior_high, self.prior_low)
        {
            (Some(o), Some(ph), Some(pl)) if self.atr_14 > 0.0 => (o, ph, pl),
            _ => return 0.0,
        };
        let prior_mid = (prior_high + prior_low) / 2.0;
        (open - prior_mid) / self.atr_14
    }

    fn overnight_metrics(&self) -> (f64, f64) {
        let overnight_range_pct = match (self.overnight_high, self.overnight_low) {
            (Some(oh), Some(ol)) if self.adr_20 > 0.0 => (oh - ol) / self.adr_20,
            _ => 0.0,
        };

        let overnight_bias = match (
            self.overnight_high,
            self.overnight_low,
            self.prior_close,
            self.open_price,
        ) {
            (Some(oh), Some(ol), Some(pc), Some(_)) => {
                let overnight_range = oh - ol;
                if overnight_range > 0.0 {
                    let on_mid = (oh + ol) / 2.0;
                    ((on_mid - pc) / overnight_range).clamp(-1.0, 1.0)
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        (overnight_range_pct, overnight_bias)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
