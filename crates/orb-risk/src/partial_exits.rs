use chrono::{DateTime, Utc};
use orb_types::{Direction, Target};

/// One target rung hit during a bar (§4.11, grounded in
/// `risk/partial_exits.py`-equivalent ladder logic folded into the
/// two-phase stop/trailing modules in the source; the spec gives it its
/// own component (L8 share) so it is split out here).
#[derive(Debug, Clone)]
pub struct TargetFill {
    pub target_r: f64,
    pub size_fraction: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Manages a sorted ladder of R-multiple targets against a fixed initial
/// risk `r0`. Targets are checked in ascending R order every bar; a bar
/// that reaches multiple targets at once fills them in that same order
/// (§8 testable property: "multiple targets hit in the same bar are
/// processed in ascending R order").
#[derive(Debug, Clone)]
pub struct PartialExitManager {
    direction: Direction,
    entry_price: f64,
    r0: f64,
    targets: Vec<Target>,
    remaining_size: f64,
}

impl PartialExitManager {
    /// `rungs` is `(r_multiple, size_fraction)` pairs; sorted ascending by
    /// R-multiple regardless of input order.
    pub fn new(direction: Direction, entry_price: f64, r0: f64, rungs: &[(f64, f64)]) -> Self {
        let mut targets: Vec<Target> = rungs
            .iter()
            .map(|&(r, frac)| Target {
                target_r: r,
                size_fraction: frac,
                price: match direction {
                    Direction::Long => entry_price + r * r0,
                    Direction::Short => entry_price - r * r0,
                },
                hit: false,
                hit_timestamp: None,
                hit_price: None,
            })
            .collect();
        targets.sort_by(|a, b| a.target_r.partial_cmp(&b.target_r).unwrap());

        Self {
            direction,
            entry_price,
            r0,
            targets,
            remaining_size: 1.0,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn remaining_size(&self) -> f64 {
        self.remaining_size
    }

    pub fn is_fully_closed(&self) -> bool {
        self.remaining_size <= 1e-9
    }

    /// Check the ladder against one bar's high/low. Returns fills in
    /// ascending R order; exhausts the ladder at most once per target.
    pub fn update(&mut self, bar_high: f64, bar_low: f64, timestamp: DateTime<Utc>) -> Vec<TargetFill> {
        let mut fills = Vec::new();
        for target in self.targets.iter_mut() {
            if target.hit {
                continue;
            }
            let hit = match self.direction {
                Direction::Long => bar_high >= target.price,
                Direction::Short => bar_low <= target.price,
            };
            if !hit {
                continue;
            }
            target.hit = true;
            target.hit_timestamp = Some(timestamp);
            target.hit_price = Some(target.price);
            self.remaining_size = (self.remaining_size - target.size_fraction).max(0.0);
            fills.push(TargetFill {
                target_r: target.target_r,
                size_fraction: target.size_fraction,
                price: target.price,
                timestamp,
            });
        }
        fills
    }

    /// Weighted-average realized R across all hit targets, weighted by
    /// each rung's size fraction of the *original* position (not the
    /// remaining size), per §4.11's "full exit via weighted average
    /// realized R".
    pub fn weighted_realized_r(&self) -> f64 {
        let hit_fraction: f64 = self.targets.iter().filter(|t| t.hit).map(|t| t.size_fraction).sum();
        if hit_fraction <= 0.0 {
            return 0.0;
        }
        self.targets
            .iter()
            .filter(|t| t.hit)
            .map(|t| t.target_r * t.size_fraction)
            .sum::<f64>()
            / hit_fraction
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn r0(&self) -> f64 {
        self.r0
    }
}
