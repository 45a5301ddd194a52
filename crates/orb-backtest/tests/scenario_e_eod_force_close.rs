//! End-to-end scenario: a trade opens late in the session and is still in
//! Phase 1 (no breakeven move, no runner, no partial fills) when the last
//! bar of the series arrives. `close_session` must force it closed with
//! `ExitReason::EndOfDay` regardless of the risk managers' internal state.

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use orb_backtest::Orchestrator;
use orb_governance::GovernanceEngine;
use orb_types::{
    Bar, Direction, ExitReason, InstrumentConfig, ProbabilityGateConfig, PropAccountRules,
    RunConfig, TimeFilters,
};

fn instrument() -> InstrumentConfig {
    InstrumentConfig {
        symbol: "ES".into(),
        display_name: "E-mini S&P".into(),
        tick_size: 0.25,
        tick_value: 12.5,
        tick_value_micro: 1.25,
        session_start: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        session_end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        session_utc_offset_secs: 0,
        micro_minutes: 5,
        or_base_minutes: 15,
        or_min_minutes: 10,
        or_max_minutes: 20,
        or_low_vol_threshold: 0.35,
        or_high_vol_threshold: 0.85,
        validity_min_width_norm: 0.1,
        validity_max_width_norm: 5.0,
        validity_min_width_points: 0.1,
        validity_max_width_points: 500.0,
        buffer_base: 0.75,
        buffer_volatility_scalar: 0.35,
        buffer_rotation_penalty: 0.10,
        buffer_min: 0.50,
        buffer_max: 2.00,
        stop_min_points: 1.0,
        stop_max_risk_r: 1.5,
        stop_atr_cap_mult: 2.0,
        target_t1_r: 1.0,
        target_t1_fraction: 0.5,
        target_t2_r: 2.0,
        target_t2_fraction: 0.25,
        target_runner_r: 3.0,
        target_runner_trail_mode: "TRAIL_VOL".into(),
        time_stop_enabled: false,
        time_stop_minutes: 120,
        time_stop_min_progress_r: 0.3,
        volume_cum_ratio_min: 0.5,
        volume_cum_ratio_max: 3.0,
        volume_spike_threshold_mult: 1.5,
        volume_min_drive_energy: 0.2,
        typical_adr: 50.0,
        correlation_instruments: vec![],
        correlation_weight: 0.0,
        preferred_contract: "ES".into(),
        scale_to_mini_at_r: 1.0,
    }
}

fn run_config() -> RunConfig {
    RunConfig {
        run_id: Uuid::nil(),
        instruments: vec!["ES".into()],
        start_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        data_dir: String::new(),
        output_dir: String::new(),
        rules: PropAccountRules {
            account_size: 50_000.0,
            profit_target: 3_000.0,
            trailing_drawdown_max: 2_000.0,
            daily_loss_limit: 1_000.0,
            max_contracts: 3,
            max_concurrent_trades: 1,
            consecutive_loss_lockout: None,
            max_daily_trades_per_instrument: 5,
        },
        enable_pb1: true,
        enable_pb2: false,
        enable_pb3: false,
        // Two-phase transitions beyond breakeven, salvage, and partials are
        // all switched off so the only way this trade can close is via a
        // stop hit or the unconditional end-of-session force close.
        use_two_phase_stops: false,
        use_salvage: false,
        use_partial_exits: false,
        stop_multiplier: 1.0,
        breakeven_trigger_r: 0.3,
        phase2_trigger_r: 0.6,
        runner_trigger_r: 1.5,
        use_probability_gating: false,
        probability_gate: ProbabilityGateConfig::default(),
        use_context_exclusion: false,
        min_trades_per_cell: 1,
        use_time_filters: false,
        time_filters: TimeFilters {
            avoid_first_minutes_after_or: 0,
            lunch_start: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            lunch_end: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        },
        atr_period: 14,
        adr_period: 20,
    }
}

fn minute(base: NaiveDate, hour: u32, min: u32) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&base.and_time(NaiveTime::from_hms_opt(hour, min, 0).unwrap()))
}

fn bar(ts: chrono::DateTime<Utc>, o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
    Bar::new(ts, o, h, l, c, v)
}

#[test]
fn trade_still_open_on_the_last_bar_is_force_closed_at_eod() {
    let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let mut bars = Vec::new();

    for i in 0..15 {
        let ts = minute(day, 9, 30 + i) + Duration::seconds(0);
        bars.push(bar(ts, 100.0, 100.7, 99.9, 100.5, 500.0));
    }
    bars.push(bar(minute(day, 9, 45), 100.5, 103.7, 100.4, 103.5, 500.0));

    // Last bar of the whole array: a small favorable drift that stays well
    // under the 0.3R breakeven trigger (mfe = (104.0-103.5)/3.6 = 0.139).
    bars.push(bar(minute(day, 9, 46), 103.5, 104.0, 103.3, 103.8, 500.0));

    let rules = run_config().rules.clone();
    let governance = GovernanceEngine::new(rules.clone(), rules.max_daily_trades_per_instrument, rules.account_size);
    let mut orchestrator = Orchestrator::new(instrument(), run_config(), governance, None, None);

    let records = orchestrator.run(&bars).expect("orchestrator run should not error");

    assert_eq!(records.len(), 1);
    let trade = &records[0].trade;

    assert_eq!(trade.direction, Direction::Long);
    assert_eq!(trade.exit_reason, ExitReason::EndOfDay);
    assert_eq!(trade.exit_price, 103.8);
    assert_eq!(trade.bars_held, 1);
    assert_eq!(trade.stop_phase, 1, "breakeven trigger was never reached");
    // The breakeven move never fired (mfe stayed under 0.3R), so the final
    // stop is still the original phase-1 distance below entry, not at
    // entry itself.
    assert!((trade.final_stop - trade.entry_price).abs() > 1e-6);
}
