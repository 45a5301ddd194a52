use std::collections::VecDeque;

/// Average True Range, streaming. Plain moving average of true ranges by
/// default; Wilder smoothing is a constructor flag (§4.1).
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    wilder: bool,
    true_ranges: VecDeque<f64>,
    prev_close: Option<f64>,
    wilder_value: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self::with_mode(period, false)
    }

    pub fn with_mode(period: usize, wilder: bool) -> Self {
        Self {
            period,
            wilder,
            true_ranges: VecDeque::with_capacity(period + 1),
            prev_close: None,
            wilder_value: None,
        }
    }

    /// Feed one bar, return the current ATR (0.0 before two bars seen).
    pub fn update(&mut self, high: f64, low: f64, close: f64) -> f64 {
        let tr = match self.prev_close {
            None => high - low,
            Some(prev_close) => (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs()),
        };
        self.prev_close = Some(close);

        self.true_ranges.push_back(tr);
        if self.true_ranges.len() > self.period {
            self.true_ranges.pop_front();
        }

        if self.true_ranges.len() < 2 {
            return 0.0;
        }

        if !self.wilder {
            return self.true_ranges.iter().sum::<f64>() / self.true_ranges.len() as f64;
        }

        match self.wilder_value {
            None => {
                let seed = self.true_ranges.iter().sum::<f64>() / self.true_ranges.len() as f64;
                self.wilder_value = Some(seed);
                seed
            }
            Some(prev) => {
                let p = self.period as f64;
                let next = (prev * (p - 1.0) + tr) / p;
                self.wilder_value = Some(next);
                next
            }
        }
    }

    pub fn reset(&mut self) {
        self.true_ranges.clear();
        self.prev_close = None;
        self.wilder_value = None;
    }
}
