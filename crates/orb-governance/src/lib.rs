//! Prop-firm governance gate (§4.13, grounded in
//! `strategy/prop_governance.py::PropGovernanceEngine`; the
//! ordered-rejection-reason shape follows `mqk-risk/src/engine.rs`'s
//! `evaluate` function rather than a boolean-with-string-message return).

use chrono::NaiveDate;
use orb_types::{default_pacing_phases, GovernanceState, PacingPhase, PropAccountRules};

/// Why a trade was rejected, in the fixed check order of §4.13. Mirrors
/// `mqk-risk`'s `ReasonCode` as a closed enum rather than the source's
/// free-text tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    InstrumentDailyCapReached,
    InstrumentLockedOut,
    DailyHalt,
    TrailingDrawdownHalt,
    MaxConcurrentTrades,
    ExceedsDailyBudget,
    ExceedsTrailingDrawdownBudget,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::InstrumentDailyCapReached => "instrument_daily_cap_reached",
            RejectionReason::InstrumentLockedOut => "instrument_locked_out",
            RejectionReason::DailyHalt => "daily_loss_limit_reached",
            RejectionReason::TrailingDrawdownHalt => "trailing_drawdown_limit_reached",
            RejectionReason::MaxConcurrentTrades => "max_concurrent_trades",
            RejectionReason::ExceedsDailyBudget => "would_exceed_daily_budget",
            RejectionReason::ExceedsTrailingDrawdownBudget => "would_exceed_trailing_dd_budget",
        }
    }
}

/// Outcome of a pre-signal governance check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GovernanceDecision {
    Allow { size_multiplier: f64 },
    Reject(RejectionReason),
}

/// Enforces daily loss, trailing drawdown, per-instrument caps, lockouts,
/// and concurrency limits, and runs the capital-pacing phase selection
/// (§4.13, grounded in `PropGovernanceEngine`).
#[derive(Debug, Clone)]
pub struct GovernanceEngine {
    rules: PropAccountRules,
    phases: Vec<PacingPhase>,
    max_daily_trades_per_instrument: u32,
    /// `None` disables the optional trailing-DD risk-budget check
    /// (§4.13's "optional" 0.5x remaining-trailing-DD-budget rule).
    enforce_trailing_dd_budget: bool,
    state: GovernanceState,
}

impl GovernanceEngine {
    pub fn new(rules: PropAccountRules, max_daily_trades_per_instrument: u32, starting_balance: f64) -> Self {
        Self {
            rules,
            phases: default_pacing_phases(),
            max_daily_trades_per_instrument,
            enforce_trailing_dd_budget: false,
            state: GovernanceState::new(starting_balance),
        }
    }

    pub fn with_trailing_dd_budget_enforced(mut self, enforce: bool) -> Self {
        self.enforce_trailing_dd_budget = enforce;
        self
    }

    pub fn state(&self) -> &GovernanceState {
        &self.state
    }

    /// Reset the daily-scoped counters. A no-op if `day` is already the
    /// current day (idempotent across repeated calls within one session).
    pub fn roll_day(&mut self, day: NaiveDate) {
        if self.state.current_day != Some(day) {
            self.state.roll_day(day);
        }
    }

    /// Capital-pacing phase for the current profit level, re-selected on
    /// every call per §4.13 ("reselected every entry call").
    pub fn current_phase(&self) -> &PacingPhase {
        let profit_pct = if self.rules.profit_target > 0.0 {
            self.state.total_profit() / self.rules.profit_target
        } else {
            0.0
        };
        self.phases
            .iter()
            .find(|p| profit_pct >= p.profit_pct_min && profit_pct < p.profit_pct_max)
            .unwrap_or_else(|| self.phases.last().expect("at least one pacing phase configured"))
    }

    pub fn size_multiplier(&self) -> f64 {
        self.current_phase().size_multiplier
    }

    pub fn max_contracts(&self) -> u32 {
        self.rules.max_contracts
    }

    /// §4.13 `can_take_trade`, evaluated in the spec's fixed rejection
    /// order.
    pub fn can_take_trade(&self, risk_dollars: f64, instrument: &str) -> GovernanceDecision {
        if let Some(inst_state) = self.state.per_instrument.get(instrument) {
            if inst_state.daily_trade_count >= self.max_daily_trades_per_instrument {
                return GovernanceDecision::Reject(RejectionReason::InstrumentDailyCapReached);
            }
            if inst_state.locked_out {
                return GovernanceDecision::Reject(RejectionReason::InstrumentLockedOut);
            }
        }

        if self.state.daily_halt {
            return GovernanceDecision::Reject(RejectionReason::DailyHalt);
        }
        if self.state.trailing_dd_halt {
            return GovernanceDecision::Reject(RejectionReason::TrailingDrawdownHalt);
        }
        if self.state.active_trade_count >= self.rules.max_concurrent_trades {
            return GovernanceDecision::Reject(RejectionReason::MaxConcurrentTrades);
        }

        let phase = self.current_phase();
        let daily_budget_remaining = self.rules.daily_loss_limit * phase.daily_loss_pct + self.state.daily_pnl;
        if risk_dollars > daily_budget_remaining {
            return GovernanceDecision::Reject(RejectionReason::ExceedsDailyBudget);
        }

        if self.enforce_trailing_dd_budget {
            let dd_remaining = self.rules.trailing_drawdown_max - self.state.current_drawdown();
            if risk_dollars > 0.5 * dd_remaining {
                return GovernanceDecision::Reject(RejectionReason::ExceedsTrailingDrawdownBudget);
            }
        }

        GovernanceDecision::Allow {
            size_multiplier: phase.size_multiplier,
        }
    }

    /// Record a trade entry's effect on the shared counters (§4.13 "on
    /// trade entry").
    pub fn register_entry(&mut self, instrument: &str) {
        self.state.active_trade_count += 1;
        self.state.daily_trade_count += 1;
        self.state.instrument_mut(instrument).daily_trade_count += 1;
    }

    /// Record a trade exit's effect: balance, peak, daily P&L,
    /// consecutive win/loss streaks, lockout state, and halt flags
    /// (§4.13 "on trade exit"). `consecutive_loss_lockout` of `None`
    /// disables the per-instrument lockout entirely (DESIGN.md Open
    /// Question #2).
    pub fn register_exit(&mut self, instrument: &str, pnl_dollars: f64) {
        self.state.current_balance += pnl_dollars;
        self.state.daily_pnl += pnl_dollars;
        if self.state.current_balance > self.state.peak_balance {
            self.state.peak_balance = self.state.current_balance;
        }
        self.state.active_trade_count = self.state.active_trade_count.saturating_sub(1);

        let lockout_threshold = self.rules.consecutive_loss_lockout;
        let inst = self.state.instrument_mut(instrument);
        if pnl_dollars > 0.0 {
            inst.consecutive_wins += 1;
            inst.consecutive_losses = 0;
            inst.locked_out = false;
        } else {
            inst.consecutive_losses += 1;
            inst.consecutive_wins = 0;
            if let Some(threshold) = lockout_threshold {
                if inst.consecutive_losses >= threshold {
                    inst.locked_out = true;
                }
            }
        }

        if self.state.daily_pnl <= -self.rules.daily_loss_limit {
            self.state.daily_halt = true;
        }
        if self.state.current_drawdown() >= self.rules.trailing_drawdown_max {
            self.state.trailing_dd_halt = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> PropAccountRules {
        PropAccountRules {
            account_size: 50_000.0,
            profit_target: 3_000.0,
            trailing_drawdown_max: 2_000.0,
            daily_loss_limit: 1_000.0,
            max_contracts: 3,
            max_concurrent_trades: 2,
            consecutive_loss_lockout: Some(3),
            max_daily_trades_per_instrument: 5,
        }
    }

    #[test]
    fn scenario_c_lockdown_by_daily_loss() {
        // Spec §8 Scenario C: $200 daily loss limit, ~$80 losses per trade.
        let mut r = rules();
        r.daily_loss_limit = 200.0;
        r.trailing_drawdown_max = 2_000.0;
        r.consecutive_loss_lockout = None; // isolate the daily-loss halt from the lockout check
        let mut gov = GovernanceEngine::new(r, 5, 50_000.0);
        gov.roll_day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        for _ in 0..3 {
            gov.register_entry("ES");
            gov.register_exit("ES", -80.0);
        }
        assert!(gov.state().daily_halt);
        assert_eq!(
            gov.can_take_trade(10.0, "ES"),
            GovernanceDecision::Reject(RejectionReason::DailyHalt)
        );
    }

    #[test]
    fn daily_loss_limit_breach_halts_trading() {
        let mut gov = GovernanceEngine::new(rules(), 5, 50_000.0);
        gov.roll_day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        gov.register_entry("ES");
        gov.register_exit("ES", -1000.0);
        assert!(gov.state().daily_halt);
        assert_eq!(
            gov.can_take_trade(10.0, "ES"),
            GovernanceDecision::Reject(RejectionReason::DailyHalt)
        );
    }

    #[test]
    fn instrument_lockout_after_consecutive_losses() {
        let mut gov = GovernanceEngine::new(rules(), 5, 50_000.0);
        gov.roll_day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        for _ in 0..3 {
            gov.register_entry("ES");
            gov.register_exit("ES", -10.0);
        }
        assert!(gov.state().per_instrument.get("ES").unwrap().locked_out);
        assert_eq!(
            gov.can_take_trade(10.0, "ES"),
            GovernanceDecision::Reject(RejectionReason::InstrumentLockedOut)
        );
    }

    #[test]
    fn win_clears_lockout_and_resets_streak() {
        let mut gov = GovernanceEngine::new(rules(), 5, 50_000.0);
        gov.roll_day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        gov.register_entry("ES");
        gov.register_exit("ES", -10.0);
        gov.register_entry("ES");
        gov.register_exit("ES", 50.0);
        let inst = gov.state().per_instrument.get("ES").unwrap();
        assert_eq!(inst.consecutive_losses, 0);
        assert!(!inst.locked_out);
    }

    #[test]
    fn concurrency_limit_rejects_third_trade() {
        let mut gov = GovernanceEngine::new(rules(), 5, 50_000.0);
        gov.roll_day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        gov.register_entry("ES");
        gov.register_entry("NQ");
        assert_eq!(
            gov.can_take_trade(10.0, "CL"),
            GovernanceDecision::Reject(RejectionReason::MaxConcurrentTrades)
        );
    }

    #[test]
    fn pacing_phase_tracks_profit_progress() {
        let mut gov = GovernanceEngine::new(rules(), 5, 50_000.0);
        assert_eq!(gov.current_phase().name, "Conservative");
        gov.register_entry("ES");
        gov.register_exit("ES", 1_500.0); // 50% of 3000 target
        assert_eq!(gov.current_phase().name, "Growth");
    }

    #[test]
    fn lockout_disabled_when_threshold_is_none() {
        let mut r = rules();
        r.consecutive_loss_lockout = None;
        let mut gov = GovernanceEngine::new(r, 5, 50_000.0);
        gov.roll_day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        for _ in 0..10 {
            gov.register_entry("ES");
            gov.register_exit("ES", -10.0);
        }
        assert!(!gov.state().per_instrument.get("ES").unwrap().locked_out);
    }
}
