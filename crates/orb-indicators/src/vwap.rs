/// Session-scoped VWAP. Resets at session start (§4.1).
#[derive(Debug, Clone, Default)]
pub struct SessionVwap {
    min_bars: u32,
    cum_pv: f64,
    cum_vol: f64,
    bar_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct VwapReading {
    pub vwap: f64,
    pub usable: bool,
    pub above: bool,
    pub below: bool,
}

impl SessionVwap {
    pub fn new(min_bars: u32) -> Self {
        Self {
            min_bars,
            cum_pv: 0.0,
            cum_vol: 0.0,
            bar_count: 0,
        }
    }

    pub fn update(&mut self, price: f64, volume: f64) -> VwapReading {
        self.cum_pv += price * volume;
        self.cum_vol += volume;
        self.bar_count += 1;

        let usable = self.bar_count >= self.min_bars && self.cum_vol > 0.0;
        if !usable {
            return VwapReading {
                vwap: f64::NAN,
                usable: false,
                above: false,
                below: false,
            };
        }

        let vwap = self.cum_pv / self.cum_vol;
        VwapReading {
            vwap,
            usable: true,
            above: price > vwap,
            below: price < vwap,
        }
    }

    pub fn reset(&mut self) {
        self.cum_pv = 0.0;
        self.cum_vol = 0.0;
        self.bar_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_before_min_bars() {
        let mut vwap = SessionVwap::new(5);
        for _ in 0..4 {
            let r = vwap.update(100.0, 10.0);
            assert!(!r.usable);
            assert!(r.vwap.is_nan());
        }
    }

    #[test]
    fn usable_after_min_bars_with_volume() {
        let mut vwap = SessionVwap::new(2);
        vwap.update(100.0, 10.0);
        let r = vwap.update(102.0, 10.0);
        assert!(r.usable);
        assert_eq!(r.vwap, 101.0);
    }

    #[test]
    fn zero_cumulative_volume_stays_unusable() {
        let mut vwap = SessionVwap::new(1);
        let r = vwap.update(100.0, 0.0);
        assert!(!r.usable);
    }

    #[test]
    fn above_below_flags_relative_to_price() {
        let mut vwap = SessionVwap::new(1);
        vwap.update(100.0, 10.0);
        let r = vwap.update(90.0, 10.0);
        assert!(r.below);
        assert!(!r.above);
    }

    #[test]
    fn reset_clears_accumulators() {
        let mut vwap = SessionVwap::new(1);
        vwap.update(100.0, 10.0);
        vwap.reset();
        let r = vwap.update(50.0, 5.0);
        assert!(r.usable);
        assert_eq!(r.vwap, 50.0);
    }
}
