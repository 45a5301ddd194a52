/// Average Directional Index. Wilder-smoothed +DM/-DM/TR, seeded by a
/// simple average of the first `period` values (§4.1).
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    threshold: f64,

    prev_high: Option<f64>,
    prev_low: Option<f64>,
    prev_close: Option<f64>,

    seed_trs: Vec<f64>,
    seed_plus_dms: Vec<f64>,
    seed_minus_dms: Vec<f64>,

    smoothed_tr: Option<f64>,
    smoothed_plus_dm: Option<f64>,
    smoothed_minus_dm: Option<f64>,
    smoothed_dx: Option<f64>,

    bar_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct AdxReading {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub trend_strong: bool,
    pub usable: bool,
}

impl Adx {
    pub fn new(period: usize, threshold: f64) -> Self {
        Self {
            period,
            threshold,
            prev_high: None,
            prev_low: None,
            prev_close: None,
            seed_trs: Vec::with_capacity(period),
            seed_plus_dms: Vec::with_capacity(period),
            seed_minus_dms: Vec::with_capacity(period),
            smoothed_tr: None,
            smoothed_plus_dm: None,
            smoothed_minus_dm: None,
            smoothed_dx: None,
            bar_count: 0,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> AdxReading {
        self.bar_count += 1;

        let (tr, plus_dm, minus_dm) = match (self.prev_high, self.prev_low, self.prev_close) {
            (Some(ph), Some(pl), Some(pc)) => {
                let tr = (high - low).max((high - pc).abs()).max((low - pc).abs());
                let high_diff = high - ph;
                let low_diff = pl - low;
                let plus_dm = if high_diff > low_diff && high_diff > 0.0 {
                    high_diff
                } else {
                    0.0
                };
                let minus_dm = if low_diff > high_diff && low_diff > 0.0 {
                    low_diff
                } else {
                    0.0
                };
                (tr, plus_dm, minus_dm)
            }
            _ => (high - low, 0.0, 0.0),
        };

        self.prev_high = Some(high);
        self.prev_low = Some(low);
        self.prev_close = Some(close);

        // First bar (no predecessor) never enters the seed window, matching
        // the reference: the seed average is taken over the `period` TRs
        // computed from bars 2..period+1.
        if self.bar_count >= 2 && self.smoothed_tr.is_none() {
            self.seed_trs.push(tr);
            self.seed_plus_dms.push(plus_dm);
            self.seed_minus_dms.push(minus_dm);
            if self.seed_trs.len() > self.period {
                self.seed_trs.remove(0);
                self.seed_plus_dms.remove(0);
                self.seed_minus_dms.remove(0);
            }
        }

        if self.bar_count < self.period + 1 {
            return AdxReading {
                adx: f64::NAN,
                plus_di: f64::NAN,
                minus_di: f64::NAN,
                trend_strong: false,
                usable: false,
            };
        }

        if self.smoothed_tr.is_none() {
            let n = self.seed_trs.len() as f64;
            self.smoothed_tr = Some(self.seed_trs.iter().sum::<f64>() / n);
            self.smoothed_plus_dm = Some(self.seed_plus_dms.iter().sum::<f64>() / n);
            self.smoothed_minus_dm = Some(self.seed_minus_dms.iter().sum::<f64>() / n);
        } else {
            let p = self.period as f64;
            self.smoothed_tr = Some((self.smoothed_tr.unwrap() * (p - 1.0) + tr) / p);
            self.smoothed_plus_dm =
                Some((self.smoothed_plus_dm.unwrap() * (p - 1.0) + plus_dm) / p);
            self.smoothed_minus_dm =
                Some((self.smoothed_minus_dm.unwrap() * (p - 1.0) + minus_dm) / p);
        }

        let s_tr = self.smoothed_tr.unwrap();
        let (plus_di, minus_di) = if s_tr > 0.0 {
            (
                100.0 * self.smoothed_plus_dm.unwrap() / s_tr,
                100.0 * self.smoothed_minus_dm.unwrap() / s_tr,
            )
        } else {
            (0.0, 0.0)
        };

        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };

        let adx = match self.smoothed_dx {
            None => dx,
            Some(prev) => {
                let p = self.period as f64;
                (prev * (p - 1.0) + dx) / p
            }
        };
        self.smoothed_dx = Some(adx);

        AdxReading {
            adx,
            plus_di,
            minus_di,
            trend_strong: adx >= self.threshold,
            usable: true,
        }
    }

    pub fn reset(&mut self) {
        self.prev_high = None;
        self.prev_low = None;
        self.prev_close = None;
        self.seed_trs.clear();
        self.seed_plus_dms.clear();
        self.seed_minus_dms.clear();
        self.smoothed_tr = None;
        self.smoothed_plus_dm = None;
        self.smoothed_minus_dm = None;
        self.smoothed_dx = None;
        self.bar_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_until_period_plus_one_bars() {
        let mut adx = Adx::new(3, 18.0);
        for i in 0..3 {
            let base = 100.0 + i as f64;
            let r = adx.update(base + 1.0, base - 1.0, base);
            assert!(!r.usable, "bar {i} should still be unusable");
        }
    }

    #[test]
    fn usable_once_enough_bars_collected() {
        let mut adx = Adx::new(3, 18.0);
        let mut r = adx.update(101.0, 99.0, 100.0);
        for i in 1..5 {
            let base = 100.0 + i as f64 * 2.0;
            r = adx.update(base + 1.0, base - 1.0, base);
        }
        assert!(r.usable);
        assert!(r.adx.is_finite());
    }

    #[test]
    fn trend_strong_flag_follows_threshold() {
        let mut adx = Adx::new(2, 15.0);
        let mut last = adx.update(100.0, 99.0, 99.5);
        // a strongly trending run of higher highs / higher lows
        for i in 1..8 {
            let base = 100.0 + i as f64 * 3.0;
            last = adx.update(base + 1.0, base - 1.0, base + 0.5);
        }
        assert!(last.usable);
        assert!(last.trend_strong == (last.adx >= 15.0));
    }

    #[test]
    fn reset_returns_to_unusable() {
        let mut adx = Adx::new(2, 18.0);
        for i in 0..5 {
            let base = 100.0 + i as f64;
            adx.update(base + 1.0, base - 1.0, base);
        }
        adx.reset();
        let r = adx.update(101.0, 99.0, 100.0);
        assert!(!r.usable);
    }
}
