//! Assembles the §6.2 session summary from the trade records an
//! orchestrator run produces. Pure aggregation, no I/O.

use orb_audit::{EquitySample, SessionSummary};
use orb_backtest::TradeRecord;
use uuid::Uuid;

/// Fold one instrument's `TradeRecord`s into running equity samples plus
/// the end-of-run summary. `trade_seq` continues from `starting_seq` so a
/// multi-instrument run can share one equity series with a monotonic
/// sequence number across instruments.
pub fn build_equity_samples(records: &[TradeRecord], starting_seq: u64) -> Vec<EquitySample> {
    let mut cumulative_r = 0.0;
    let mut cumulative_dollars = 0.0;
    records
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            cumulative_r += rec.trade.realized_r;
            cumulative_dollars += rec.trade.realized_pnl;
            EquitySample {
                trade_seq: starting_seq + i as u64,
                timestamp: rec.trade.exit_timestamp,
                cumulative_r,
                cumulative_dollars,
                balance: rec.balance_after,
                peak_balance: rec.peak_balance_after,
            }
        })
        .collect()
}

pub fn build_summary(run_id: Uuid, config_hash: String, records: &[TradeRecord]) -> SessionSummary {
    let total_trades = records.len() as u64;
    let wins = records.iter().filter(|r| r.trade.realized_pnl > 0.0).count() as u64;
    let losses = total_trades - wins;
    let total_r: f64 = records.iter().map(|r| r.trade.realized_r).sum();
    let total_dollars: f64 = records.iter().map(|r| r.trade.realized_pnl).sum();
    let final_balance = records.last().map(|r| r.balance_after).unwrap_or(0.0);
    let max_drawdown = records
        .iter()
        .map(|r| r.peak_balance_after - r.balance_after)
        .fold(0.0_f64, f64::max);

    SessionSummary {
        run_id,
        config_hash,
        total_trades,
        wins,
        losses,
        total_r,
        total_dollars,
        final_balance,
        max_drawdown,
    }
}
