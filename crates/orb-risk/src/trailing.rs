use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use orb_types::Direction;

/// A stop move emitted by a trailing strategy (§4.10, grounded in
/// `risk/trailing_modes.py::TrailUpdate`).
#[derive(Debug, Clone)]
pub struct TrailUpdate {
    pub timestamp: DateTime<Utc>,
    pub old_stop: f64,
    pub new_stop: f64,
    pub reason: String,
    pub current_mfe_r: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PivotKind {
    SwingLow,
    SwingHigh,
}

#[derive(Debug, Clone, Copy)]
struct PivotLevel {
    price: f64,
    kind: PivotKind,
}

#[derive(Debug, Clone, Copy)]
struct BarHl {
    high: f64,
    low: f64,
}

/// One trailing-stop strategy. All variants only move the stop in the
/// favorable direction (§4.10, grounded in
/// `risk/trailing_modes.py::{VolatilityTrailingStop, PivotTrailingStop,
/// HybridTrailingStop}`).
#[derive(Debug, Clone)]
enum Strategy {
    Vol { atr_mult: f64 },
    Pivot { lookback: usize, buffer_atr_mult: f64 },
    Hybrid { atr_mult: f64, lookback: usize, buffer_atr_mult: f64 },
}

/// Routes to the configured trailing strategy and tracks the shared pivot
/// window / highest-favorable-excursion state each needs (§4.10, grounded
/// in `risk/trailing_modes.py::TrailingStopManager`).
#[derive(Debug, Clone)]
pub struct TrailingStopManager {
    direction: Direction,
    entry_price: f64,
    initial_risk: f64,
    current_stop: f64,
    highest_favorable: f64,
    strategy: Strategy,

    recent_bars: VecDeque<BarHl>,
    confirmed_pivots: VecDeque<PivotLevel>,
}

impl TrailingStopManager {
    pub fn vol(direction: Direction, entry_price: f64, initial_stop: f64, initial_risk: f64, atr_mult: f64) -> Self {
        Self::new(direction, entry_price, initial_stop, initial_risk, Strategy::Vol { atr_mult })
    }

    pub fn pivot(
        direction: Direction,
        entry_price: f64,
        initial_stop: f64,
        initial_risk: f64,
        lookback: u32,
        buffer_atr_mult: f64,
    ) -> Self {
        Self::new(
            direction,
            entry_price,
            initial_stop,
            initial_risk,
            Strategy::Pivot {
                lookback: lookback as usize,
                buffer_atr_mult,
            },
        )
    }

    pub fn hybrid(
        direction: Direction,
        entry_price: f64,
        initial_stop: f64,
        initial_risk: f64,
        atr_mult: f64,
        lookback: u32,
        buffer_atr_mult: f64,
    ) -> Self {
        Self::new(
            direction,
            entry_price,
            initial_stop,
            initial_risk,
            Strategy::Hybrid {
                atr_mult,
                lookback: lookback as usize,
                buffer_atr_mult,
            },
        )
    }

    fn new(
        direction: Direction,
        entry_price: f64,
        initial_stop: f64,
        initial_risk: f64,
        strategy: Strategy,
    ) -> Self {
        Self {
            direction,
            entry_price,
            initial_risk,
            current_stop: initial_stop,
            highest_favorable: entry_price,
            strategy,
            recent_bars: VecDeque::new(),
            confirmed_pivots: VecDeque::new(),
        }
    }

    fn mfe_r(&self) -> f64 {
        if self.initial_risk <= 0.0 {
            return 0.0;
        }
        match self.direction {
            Direction::Long => (self.highest_favorable - self.entry_price) / self.initial_risk,
            Direction::Short => (self.entry_price - self.highest_favorable) / self.initial_risk,
        }
    }

    fn bump_highest_favorable(&mut self, bar_high: f64, bar_low: f64) {
        match self.direction {
            Direction::Long => {
                if bar_high > self.highest_favorable {
                    self.highest_favorable = bar_high;
                }
            }
            Direction::Short => {
                if bar_low < self.highest_favorable {
                    self.highest_favorable = bar_low;
                }
            }
        }
    }

    fn apply(&mut self, new_stop: f64, reason: String, timestamp: DateTime<Utc>) -> Option<TrailUpdate> {
        let old_stop = self.current_stop;
        let improved = match self.direction {
            Direction::Long => new_stop > old_stop,
            Direction::Short => new_stop < old_stop,
        };
        if !improved {
            return None;
        }
        self.current_stop = new_stop;
        Some(TrailUpdate {
            timestamp,
            old_stop,
            new_stop,
            reason,
            current_mfe_r: self.mfe_r(),
        })
    }

    fn vol_stop(&self, atr: f64, atr_mult: f64) -> f64 {
        match self.direction {
            Direction::Long => self.highest_favorable - atr_mult * atr,
            Direction::Short => self.highest_favorable + atr_mult * atr,
        }
    }

    /// Record a bar into the pivot window and detect a newly confirmed
    /// swing at its center once the window is full (§4.10: a bar is a
    /// confirmed swing low/high iff strictly beyond every other bar in the
    /// `2*lookback+1` window).
    fn detect_pivot(&mut self, lookback: usize) {
        if self.recent_bars.len() < lookback * 2 + 1 {
            return;
        }
        while self.recent_bars.len() > lookback * 2 + 10 {
            self.recent_bars.pop_front();
        }

        let bars: Vec<BarHl> = self.recent_bars.iter().copied().collect();
        let mid_idx = bars.len() - lookback - 1;
        let mid = bars[mid_idx];

        match self.direction {
            Direction::Long => {
                let is_swing_low = (mid_idx.saturating_sub(lookback)..=mid_idx + lookback)
                    .filter(|&i| i != mid_idx)
                    .all(|i| i < bars.len() && bars[i].low > mid.low);
                if is_swing_low
                    && !self
                        .confirmed_pivots
                        .iter()
                        .any(|p| p.kind == PivotKind::SwingLow && p.price == mid.low)
                {
                    self.confirmed_pivots.push_back(PivotLevel {
                        price: mid.low,
                        kind: PivotKind::SwingLow,
                    });
                }
            }
            Direction::Short => {
                let is_swing_high = (mid_idx.saturating_sub(lookback)..=mid_idx + lookback)
                    .filter(|&i| i != mid_idx)
                    .all(|i| i < bars.len() && bars[i].high < mid.high);
                if is_swing_high
                    && !self
                        .confirmed_pivots
                        .iter()
                        .any(|p| p.kind == PivotKind::SwingHigh && p.price == mid.high)
                {
                    self.confirmed_pivots.push_back(PivotLevel {
                        price: mid.high,
                        kind: PivotKind::SwingHigh,
                    });
                }
            }
        }

        while self.confirmed_pivots.len() > 5 {
            self.confirmed_pivots.pop_front();
        }
    }

    fn best_pivot(&self) -> Option<PivotLevel> {
        match self.direction {
            Direction::Long => self
                .confirmed_pivots
                .iter()
                .filter(|p| p.kind == PivotKind::SwingLow && p.price < self.highest_favorable)
                .max_by(|a, b| a.price.partial_cmp(&b.price).unwrap())
                .copied(),
            Direction::Short => self
                .confirmed_pivots
                .iter()
                .filter(|p| p.kind == PivotKind::SwingHigh && p.price > self.highest_favorable)
                .min_by(|a, b| a.price.partial_cmp(&b.price).unwrap())
                .copied(),
        }
    }

    fn pivot_stop(&self, buffer_atr_mult: f64, atr: f64) -> Option<f64> {
        let pivot = self.best_pivot()?;
        let buffer = buffer_atr_mult * atr;
        Some(match self.direction {
            Direction::Long => pivot.price - buffer,
            Direction::Short => pivot.price + buffer,
        })
    }

    /// Feed one bar. `atr` is the instrument's current ATR, used by the vol
    /// leg and the pivot buffer.
    pub fn update(&mut self, bar_high: f64, bar_low: f64, atr: f64, timestamp: DateTime<Utc>) -> Option<TrailUpdate> {
        self.bump_highest_favorable(bar_high, bar_low);
        self.recent_bars.push_back(BarHl { high: bar_high, low: bar_low });

        match self.strategy {
            Strategy::Vol { atr_mult } => {
                let new_stop = self.vol_stop(atr, atr_mult);
                self.apply(new_stop, format!("ATR trail {atr_mult}x{atr:.4}"), timestamp)
            }
            Strategy::Pivot {
                lookback,
                buffer_atr_mult,
            } => {
                self.detect_pivot(lookback);
                match self.pivot_stop(buffer_atr_mult, atr) {
                    Some(new_stop) => self.apply(new_stop, "pivot trail".to_string(), timestamp),
                    None => None,
                }
            }
            Strategy::Hybrid {
                atr_mult,
                lookback,
                buffer_atr_mult,
            } => {
                self.detect_pivot(lookback);
                let vol_stop = self.vol_stop(atr, atr_mult);
                let pivot_stop = self.pivot_stop(buffer_atr_mult, atr);
                let (best, reason) = match (pivot_stop, self.direction) {
                    (Some(p), Direction::Long) if p > vol_stop => (p, "pivot"),
                    (Some(p), Direction::Short) if p < vol_stop => (p, "pivot"),
                    _ => (vol_stop, "ATR fallback"),
                };
                self.apply(best, format!("hybrid trail: {reason}"), timestamp)
            }
        }
    }

    pub fn check_stop_hit(&self, bar_high: f64, bar_low: f64) -> bool {
        match self.direction {
            Direction::Long => bar_low <= self.current_stop,
            Direction::Short => bar_high >= self.current_stop,
        }
    }

    pub fn current_stop(&self) -> f64 {
        self.current_stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn vol_trail_follows_highest_favorable_minus_atr_mult() {
        let mut m = TrailingStopManager::vol(Direction::Long, 100.0, 95.0, 5.0, 2.0);
        let u = m.update(105.0, 104.0, 1.0, Utc::now()).unwrap();
        assert_eq!(u.new_stop, 103.0);
        // A lower bar should not loosen the stop.
        assert!(m.update(102.0, 101.0, 1.0, Utc::now()).is_none());
        assert_eq!(m.current_stop(), 103.0);
    }

    #[test]
    fn pivot_trail_needs_a_full_window_before_confirming() {
        let mut m = TrailingStopManager::pivot(Direction::Long, 100.0, 95.0, 5.0, 1, 0.0);
        let now = Utc::now();
        // lookback=1 needs a 3-bar window; middle bar's low must be the
        // strict minimum of the window to confirm a swing low.
        assert!(m.update(101.0, 99.0, 1.0, now).is_none());
        assert!(m.update(102.0, 98.0, 1.0, now).is_none());
        let u = m.update(103.0, 99.5, 1.0, now);
        assert!(u.is_some());
        assert_eq!(u.unwrap().new_stop, 98.0);
    }
}
