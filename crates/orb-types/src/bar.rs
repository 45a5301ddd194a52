use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar. Immutable once constructed.
///
/// Invariant: `low <= min(open, close) <= max(open, close) <= high` and
/// `volume >= 0`. Bars are typically 1-minute spaced but the core tolerates
/// gaps; a missing bar simply advances the timestamp clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// `close - open`, signed.
    pub fn body(&self) -> f64 {
        self.close - self.open
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Direction of the body: +1 bullish, -1 bearish, 0 doji.
    pub fn direction(&self) -> i8 {
        let body = self.body();
        if body > 0.0 {
            1
        } else if body < 0.0 {
            -1
        } else {
            0
        }
    }

    /// `true` when the OHLC ordering and non-negative volume invariants hold.
    pub fn is_well_formed(&self) -> bool {
        let lo = self.open.min(self.close);
        let hi = self.open.max(self.close);
        self.low <= lo
            && lo <= hi
            && hi <= self.high
            && self.volume >= 0.0
            && self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 14, 30, 0).unwrap()
    }

    #[test]
    fn well_formed_bar_passes() {
        let bar = Bar::new(ts(), 100.0, 101.0, 99.0, 100.5, 10.0);
        assert!(bar.is_well_formed());
    }

    #[test]
    fn high_below_body_is_rejected() {
        let bar = Bar::new(ts(), 100.0, 100.2, 99.0, 100.5, 10.0);
        assert!(!bar.is_well_formed());
    }

    #[test]
    fn negative_volume_is_rejected() {
        let bar = Bar::new(ts(), 100.0, 101.0, 99.0, 100.5, -1.0);
        assert!(!bar.is_well_formed());
    }

    #[test]
    fn non_finite_field_is_rejected() {
        let bar = Bar::new(ts(), 100.0, f64::NAN, 99.0, 100.5, 10.0);
        assert!(!bar.is_well_formed());
    }

    #[test]
    fn direction_matches_body_sign() {
        assert_eq!(Bar::new(ts(), 100.0, 101.0, 99.0, 101.0, 10.0).direction(), 1);
        assert_eq!(Bar::new(ts(), 100.0, 101.0, 99.0, 99.0, 10.0).direction(), -1);
        assert_eq!(Bar::new(ts(), 100.0, 101.0, 99.0, 100.0, 10.0).direction(), 0);
    }
}
