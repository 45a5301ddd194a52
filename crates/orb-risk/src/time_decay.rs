/// Time decay / no-progress force-exit configuration (§4.12, grounded in
/// `risk/time_decay.py`-equivalent logic described alongside the trailing
/// modes in the source).
#[derive(Debug, Clone, Copy)]
pub struct TimeDecayConfig {
    pub max_bars: u32,
    pub slope_window: u32,
    pub slope_min: f64,
    pub no_progress_bars: Option<u32>,
    pub no_progress_threshold_r: Option<f64>,
}

/// `true` if any of the three independent time-decay conditions holds
/// (§4.12): the trade has run past its hard bar cap, the recent MFE
/// trend has gone flat or negative, or the trade has made too little
/// progress over a longer no-progress window. `mfe_history` is the
/// trade's MFE sample sequence in bar order (oldest first).
pub fn should_force_exit(config: &TimeDecayConfig, bars_in_trade: u32, mfe_history: &[f64]) -> bool {
    if bars_in_trade >= config.max_bars {
        return true;
    }

    if let Some(slope) = recent_slope(mfe_history, config.slope_window as usize) {
        if slope < config.slope_min {
            return true;
        }
    }

    if let (Some(no_progress_bars), Some(threshold)) =
        (config.no_progress_bars, config.no_progress_threshold_r)
    {
        if bars_in_trade >= no_progress_bars {
            let window = no_progress_bars as usize;
            if mfe_history.len() >= window {
                let start = mfe_history[mfe_history.len() - window];
                let end = *mfe_history.last().unwrap();
                if (end - start) < threshold {
                    return true;
                }
            }
        }
    }

    false
}

/// Ordinary-least-squares slope of the last `window` MFE samples against
/// their bar index. `None` when fewer than two samples are available.
fn recent_slope(mfe_history: &[f64], window: usize) -> Option<f64> {
    if window < 2 || mfe_history.len() < window {
        return None;
    }
    let samples = &mfe_history[mfe_history.len() - window..];
    let n = samples.len() as f64;
    let xs: Vec<f64> = (0..samples.len()).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = samples.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(samples.iter()) {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean) * (x - x_mean);
    }
    if den == 0.0 {
        return Some(0.0);
    }
    Some(num / den)
}
