use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One side of the dual opening range (either the fixed micro-OR or the
/// adaptive primary-OR). Lifecycle: created at session start, extended on
/// every in-window bar, finalized once a bar's timestamp reaches `end`,
/// read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrSide {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub finalized: bool,
    pub is_valid: bool,
    pub invalid_reason: Option<String>,
    /// Only meaningful for the primary side: the adaptive duration chosen
    /// at session start, frozen for the rest of the session.
    pub duration_minutes: i64,
    /// `width / atr_14`, populated on finalization.
    pub width_norm: Option<f64>,
    bars_seen: u32,
}

impl OrSide {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, duration_minutes: i64) -> Self {
        Self {
            start,
            end,
            high: None,
            low: None,
            finalized: false,
            is_valid: false,
            invalid_reason: None,
            duration_minutes,
            width_norm: None,
            bars_seen: 0,
        }
    }

    pub fn width(&self) -> Option<f64> {
        match (self.high, self.low) {
            (Some(h), Some(l)) => Some(h - l),
            _ => None,
        }
    }

    /// Extend the range with a bar known to lie in `[start, end)`.
    pub fn extend(&mut self, high: f64, low: f64) {
        self.high = Some(self.high.map_or(high, |h| h.max(high)));
        self.low = Some(self.low.map_or(low, |l| l.min(low)));
        self.bars_seen += 1;
    }

    /// Mark finalized. `atr_14` is used to compute `width_norm`; bounds are
    /// the instrument's configured validity window.
    pub fn finalize(
        &mut self,
        atr_14: f64,
        min_width_points: f64,
        max_width_points: f64,
        min_width_norm: f64,
        max_width_norm: f64,
    ) {
        self.finalized = true;

        if self.bars_seen == 0 {
            self.is_valid = false;
            self.invalid_reason = Some("no bars in OR window".to_string());
            return;
        }

        let width = self.width().unwrap_or(0.0);
        let width_norm = if atr_14 > 0.0 { width / atr_14 } else { 0.0 };
        self.width_norm = Some(width_norm);

        if width < min_width_points {
            self.is_valid = false;
            self.invalid_reason = Some(format!("width_too_low({width}<{min_width_points})"));
        } else if width > max_width_points {
            self.is_valid = false;
            self.invalid_reason = Some(format!("width_too_high({width}>{max_width_points})"));
        } else if width_norm < min_width_norm {
            self.is_valid = false;
            self.invalid_reason =
                Some(format!("width_norm_too_low({width_norm}<{min_width_norm})"));
        } else if width_norm > max_width_norm {
            self.is_valid = false;
            self.invalid_reason = Some(format!(
                "width_norm_too_high({width_norm}>{max_width_norm})"
            ));
        } else {
            self.is_valid = true;
        }
    }
}

/// Dual opening-range state: a fixed micro-OR plus an adaptive primary-OR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualOrState {
    pub micro: OrSide,
    pub primary: OrSide,
}

impl DualOrState {
    /// `primary.width / micro.width`, only once both sides are finalized
    /// and valid. An expansion indicator: values well above 1 mean the
    /// market kept extending past the micro-OR.
    pub fn width_ratio(&self) -> Option<f64> {
        if !(self.micro.finalized && self.micro.is_valid)
            || !(self.primary.finalized && self.primary.is_valid)
        {
            return None;
        }
        let micro_w = self.micro.width()?;
        let primary_w = self.primary.width()?;
        if micro_w <= 0.0 {
            None
        } else {
            Some(primary_w / micro_w)
        }
    }
}
