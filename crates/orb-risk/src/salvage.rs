use chrono::{DateTime, Utc};

/// Salvage trigger thresholds (§4.9, grounded in
/// `risk/salvage.py::SalvageConditions`).
#[derive(Debug, Clone, Copy)]
pub struct SalvageConditions {
    pub trigger_mfe_r: f64,
    pub retrace_threshold: f64,
    pub confirmation_bars: u32,
    pub recovery_threshold: f64,
    pub max_bars_from_peak: Option<u32>,
}

impl Default for SalvageConditions {
    fn default() -> Self {
        Self {
            trigger_mfe_r: 0.4,
            retrace_threshold: 0.65,
            confirmation_bars: 6,
            recovery_threshold: 0.5,
            max_bars_from_peak: None,
        }
    }
}

/// A confirmed salvage exit (§4.9, grounded in
/// `risk/salvage.py::SalvageEvent`).
#[derive(Debug, Clone)]
pub struct SalvageEvent {
    pub timestamp: DateTime<Utc>,
    pub mfe_r: f64,
    pub current_r: f64,
    pub retrace_ratio: f64,
    pub bars_since_peak: u32,
    pub exit_price: f64,
    pub salvage_benefit_r: f64,
}

/// Detects give-back of an achieved MFE and signals an early exit before
/// the full stop is hit (§4.9, grounded in
/// `risk/salvage.py::SalvageManager`).
#[derive(Debug, Clone)]
pub struct SalvageManager {
    conditions: SalvageConditions,

    peak_mfe_r: f64,
    bars_since_peak: u32,
    armed: bool,
    triggered: bool,
    retrace_confirmation_bars: u32,
    false_salvage_count: u32,
}

impl SalvageManager {
    pub fn new(conditions: SalvageConditions) -> Self {
        Self {
            conditions,
            peak_mfe_r: 0.0,
            bars_since_peak: 0,
            armed: false,
            triggered: false,
            retrace_confirmation_bars: 0,
            false_salvage_count: 0,
        }
    }

    /// Evaluate salvage conditions for the current bar (§4.9 step order:
    /// arm on new peak, reset confirmation on recovery, else accumulate
    /// confirmation bars on sustained retrace).
    pub fn evaluate(
        &mut self,
        current_price: f64,
        current_mfe_r: f64,
        current_r: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<SalvageEvent> {
        if self.triggered {
            return None;
        }

        if current_mfe_r > self.peak_mfe_r {
            self.peak_mfe_r = current_mfe_r;
            self.bars_since_peak = 0;
            self.retrace_confirmation_bars = 0;
            if current_mfe_r >= self.conditions.trigger_mfe_r {
                self.armed = true;
            }
        } else {
            self.bars_since_peak += 1;
        }

        if !self.armed {
            return None;
        }

        let retrace_ratio = if self.peak_mfe_r > 0.0 {
            (self.peak_mfe_r - current_r) / self.peak_mfe_r
        } else {
            0.0
        };

        let recovery_r = if self.peak_mfe_r > 0.0 {
            current_r / self.peak_mfe_r
        } else {
            0.0
        };
        if recovery_r >= self.conditions.recovery_threshold {
            if self.retrace_confirmation_bars > 0 {
                self.false_salvage_count += 1;
            }
            self.retrace_confirmation_bars = 0;
            return None;
        }

        if retrace_ratio >= self.conditions.retrace_threshold {
            self.retrace_confirmation_bars += 1;
        } else {
            self.retrace_confirmation_bars = 0;
            return None;
        }

        if self.retrace_confirmation_bars < self.conditions.confirmation_bars {
            return None;
        }

        if let Some(max_bars) = self.conditions.max_bars_from_peak {
            if self.bars_since_peak > max_bars {
                return None;
            }
        }

        self.triggered = true;
        let salvage_benefit_r = current_r - (-1.0);
        Some(SalvageEvent {
            timestamp,
            mfe_r: self.peak_mfe_r,
            current_r,
            retrace_ratio,
            bars_since_peak: self.bars_since_peak,
            exit_price: current_price,
            salvage_benefit_r,
        })
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn false_salvage_count(&self) -> u32 {
        self.false_salvage_count
    }
}
