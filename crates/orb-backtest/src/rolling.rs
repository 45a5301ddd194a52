use std::collections::VecDeque;

/// Rolling sample standard deviation of bar-over-bar simple returns, fed to
/// PB1's dynamic buffer as `recent_return_std` (§4.6). Reset alongside the
/// rest of the indicator stack on every session boundary.
#[derive(Debug, Clone)]
pub struct ReturnStdTracker {
    capacity: usize,
    prev_close: Option<f64>,
    returns: VecDeque<f64>,
}

impl ReturnStdTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            prev_close: None,
            returns: VecDeque::with_capacity(capacity),
        }
    }

    pub fn update(&mut self, close: f64) -> f64 {
        if let Some(prev) = self.prev_close {
            if prev != 0.0 {
                self.returns.push_back((close - prev) / prev);
                if self.returns.len() > self.capacity {
                    self.returns.pop_front();
                }
            }
        }
        self.prev_close = Some(close);

        let n = self.returns.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.returns.iter().sum::<f64>() / n as f64;
        let variance = self.returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    }

    pub fn reset(&mut self) {
        self.prev_close = None;
        self.returns.clear();
    }
}

/// Rolling average daily range, seeded by `InstrumentConfig::typical_adr`
/// until enough sessions have been observed to replace it (§3.2b
/// `adr_period`).
#[derive(Debug, Clone)]
pub struct AdrTracker {
    capacity: usize,
    fallback: f64,
    ranges: VecDeque<f64>,
}

impl AdrTracker {
    pub fn new(capacity: usize, fallback: f64) -> Self {
        Self {
            capacity,
            fallback,
            ranges: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push_session_range(&mut self, range: f64) {
        if range > 0.0 {
            self.ranges.push_back(range);
            if self.ranges.len() > self.capacity {
                self.ranges.pop_front();
            }
        }
    }

    pub fn current(&self) -> f64 {
        if self.ranges.is_empty() {
            return self.fallback;
        }
        self.ranges.iter().sum::<f64>() / self.ranges.len() as f64
    }
}
