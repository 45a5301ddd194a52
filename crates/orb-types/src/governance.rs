use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-instrument counters the governance engine keeps to evaluate
/// lockouts and daily caps (§4.13).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentGovernanceState {
    pub daily_trade_count: u32,
    pub consecutive_losses: u32,
    pub consecutive_wins: u32,
    pub locked_out: bool,
}

/// Mutable governance state carried across the whole run, owned by the
/// orchestrator and advanced once per trading day (§3.9).
///
/// Invariants: `peak_balance >= current_balance` is not required in
/// general (drawdown is expected) but `peak_balance` never decreases, and
/// `0 <= active_trade_count <= rules.max_concurrent_trades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceState {
    pub starting_balance: f64,
    pub current_balance: f64,
    pub peak_balance: f64,
    pub daily_pnl: f64,
    pub daily_trade_count: u32,
    pub active_trade_count: u32,
    pub daily_halt: bool,
    pub trailing_dd_halt: bool,
    pub current_day: Option<NaiveDate>,
    pub per_instrument: HashMap<String, InstrumentGovernanceState>,
}

impl GovernanceState {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            starting_balance,
            current_balance: starting_balance,
            peak_balance: starting_balance,
            daily_pnl: 0.0,
            daily_trade_count: 0,
            active_trade_count: 0,
            daily_halt: false,
            trailing_dd_halt: false,
            current_day: None,
            per_instrument: HashMap::new(),
        }
    }

    pub fn total_profit(&self) -> f64 {
        self.current_balance - self.starting_balance
    }

    /// Reset the counters that are scoped to a single trading day. Called
    /// by the orchestrator on every session-boundary transition.
    pub fn roll_day(&mut self, new_day: NaiveDate) {
        self.current_day = Some(new_day);
        self.daily_pnl = 0.0;
        self.daily_trade_count = 0;
        self.daily_halt = false;
        for state in self.per_instrument.values_mut() {
            state.daily_trade_count = 0;
        }
    }

    pub fn instrument_mut(&mut self, symbol: &str) -> &mut InstrumentGovernanceState {
        self.per_instrument.entry(symbol.to_string()).or_default()
    }

    pub fn current_drawdown(&self) -> f64 {
        (self.peak_balance - self.current_balance).max(0.0)
    }
}
