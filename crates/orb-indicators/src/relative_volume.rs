use std::collections::VecDeque;

/// Relative volume with spike detection. The average excludes the current
/// bar, so a fresh spike is measured against what preceded it, not itself
/// (§4.1).
#[derive(Debug, Clone)]
pub struct RelativeVolume {
    lookback: usize,
    spike_mult: f64,
    volumes: VecDeque<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct RelativeVolumeReading {
    pub rel_vol: f64,
    pub spike: bool,
    pub usable: bool,
}

impl RelativeVolume {
    pub fn new(lookback: usize, spike_mult: f64) -> Self {
        Self {
            lookback,
            spike_mult,
            volumes: VecDeque::with_capacity(lookback + 1),
        }
    }

    pub fn update(&mut self, volume: f64) -> RelativeVolumeReading {
        self.volumes.push_back(volume);
        if self.volumes.len() > self.lookback {
            self.volumes.pop_front();
        }

        if self.volumes.len() < self.lookback {
            return RelativeVolumeReading {
                rel_vol: f64::NAN,
                spike: false,
                usable: false,
            };
        }

        let prior_count = self.volumes.len() - 1;
        let avg_volume = if prior_count > 0 {
            self.volumes.iter().take(prior_count).sum::<f64>() / prior_count as f64
        } else {
            self.volumes[0]
        };

        if avg_volume <= 0.0 {
            return RelativeVolumeReading {
                rel_vol: f64::NAN,
                spike: false,
                usable: false,
            };
        }

        let rel_vol = volume / avg_volume;
        RelativeVolumeReading {
            rel_vol,
            spike: rel_vol >= self.spike_mult,
            usable: true,
        }
    }

    pub fn reset(&mut self) {
        self.volumes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_until_ring_full() {
        let mut rv = RelativeVolume::new(3, 1.5);
        for _ in 0..2 {
            let r = rv.update(1000.0);
            assert!(!r.usable);
            assert!(r.rel_vol.is_nan());
        }
    }

    #[test]
    fn rel_vol_excludes_current_bar_from_average() {
        let mut rv = RelativeVolume::new(2, 1.5);
        rv.update(1000.0);
        let r = rv.update(2000.0);
        assert!(r.usable);
        // ring is [1000, 2000], prior_count=1, avg of prior = 1000
        assert_eq!(r.rel_vol, 2.0);
    }

    #[test]
    fn spike_flag_follows_multiplier() {
        let mut rv = RelativeVolume::new(2, 1.5);
        rv.update(1000.0);
        let below = rv.update(1100.0);
        assert!(!below.spike);
        let mut rv2 = RelativeVolume::new(2, 1.5);
        rv2.update(1000.0);
        let above = rv2.update(2000.0);
        assert!(above.spike);
    }

    #[test]
    fn reset_clears_ring() {
        let mut rv = RelativeVolume::new(2, 1.5);
        rv.update(1000.0);
        rv.update(1000.0);
        rv.reset();
        let r = rv.update(1000.0);
        assert!(!r.usable);
    }
}
