use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use orb_auction::{AuctionMetricsBuilder, AuctionStateClassifier, AuctionStateThresholds};
use orb_context::ContextExclusionMatrix;
use orb_governance::GovernanceEngine;
use orb_indicators::{Adx, AdxReading, Atr, RelativeVolume, RelativeVolumeReading, SessionVwap};
use orb_or::DualOrBuilder;
use orb_playbooks::{
    Pb1OrbRefined, Pb2FailureFade, Pb3PullbackContinuation, Playbook, PlaybookContext,
    ProbabilityGate,
};
use orb_risk::{SalvageConditions, TimeDecayConfig};
use orb_types::{
    ActiveTrade, AuctionMetrics, Bar, CandidateSignal, CompletedTrade, InstrumentConfig,
    RunConfig, StateClassification,
};

use crate::error::BacktestError;
use crate::rolling::{AdrTracker, ReturnStdTracker};
use crate::trade_state::{ManagedTrade, TradeClose};

/// A probability-extension model plugged into the orchestrator: given a
/// candidate signal and the context it fired in, return `p_extension` in
/// `[0, 1]` (§4.7). `None` falls back to the gate's neutral default.
pub type ProbabilityProvider = Box<dyn Fn(&CandidateSignal, &PlaybookContext) -> f64 + Send + Sync>;

/// One closed trade plus the account state immediately after it settled,
/// the unit `Orchestrator::run` returns (§3.10 / §6.2).
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub trade: CompletedTrade,
    pub balance_after: f64,
    pub peak_balance_after: f64,
}

/// Drives one instrument's bars through the full per-bar pipeline (§4.14):
/// indicators, dual opening range, auction classification, at most one
/// active trade at a time, playbook polling, the probability gate, and
/// prop-firm governance. Owns no I/O; the CLI layer feeds it bars and
/// persists what comes back.
pub struct Orchestrator {
    instrument: InstrumentConfig,
    run_config: RunConfig,
    governance: GovernanceEngine,
    context_matrix: Option<ContextExclusionMatrix>,
    probability_provider: Option<ProbabilityProvider>,
    probability_gate: Option<ProbabilityGate>,
    playbooks: Vec<Box<dyn Playbook>>,
    auction_classifier: AuctionStateClassifier,

    atr_14: Atr,
    atr_60: Atr,
    adr: AdrTracker,
    return_std: ReturnStdTracker,
    vwap: SessionVwap,
    adx: Adx,
    rel_vol: RelativeVolume,

    current_session_date: Option<NaiveDate>,
    or_builder: Option<DualOrBuilder>,
    auction_metrics_builder: Option<AuctionMetricsBuilder>,
    auction_metrics: Option<AuctionMetrics>,
    auction_classification: Option<StateClassification>,

    session_high: Option<f64>,
    session_low: Option<f64>,
    session_last_close: Option<f64>,
    prior_session_high: Option<f64>,
    prior_session_low: Option<f64>,
    prior_session_close: Option<f64>,

    bars_processed: u32,
    last_atr_14: f64,
    last_atr_60: f64,

    active_trade: Option<ManagedTrade>,
}

impl Orchestrator {
    pub fn new(
        instrument: InstrumentConfig,
        run_config: RunConfig,
        governance: GovernanceEngine,
        context_matrix: Option<ContextExclusionMatrix>,
        probability_provider: Option<ProbabilityProvider>,
    ) -> Self {
        let probability_gate = if run_config.use_probability_gating {
            Some(ProbabilityGate::new(run_config.probability_gate.clone()))
        } else {
            None
        };

        let mut playbooks: Vec<Box<dyn Playbook>> = Vec::new();
        if run_config.enable_pb1 {
            playbooks.push(Box::new(Pb1OrbRefined::default()));
        }
        if run_config.enable_pb2 {
            playbooks.push(Box::new(Pb2FailureFade::default()));
        }
        if run_config.enable_pb3 {
            playbooks.push(Box::new(Pb3PullbackContinuation::default()));
        }

        let atr_period = run_config.atr_period.max(1);
        let adr_period = run_config.adr_period.max(1);

        Self {
            atr_14: Atr::new(atr_period),
            atr_60: Atr::new(60),
            adr: AdrTracker::new(adr_period, instrument.typical_adr),
            return_std: ReturnStdTracker::new(20),
            vwap: SessionVwap::new(3),
            adx: Adx::new(14, 25.0),
            rel_vol: RelativeVolume::new(atr_period, instrument.volume_spike_threshold_mult),

            instrument,
            run_config,
            governance,
            context_matrix,
            probability_provider,
            probability_gate,
            playbooks,
            auction_classifier: AuctionStateClassifier::new(AuctionStateThresholds::default()),

            current_session_date: None,
            or_builder: None,
            auction_metrics_builder: None,
            auction_metrics: None,
            auction_classification: None,

            session_high: None,
            session_low: None,
            session_last_close: None,
            prior_session_high: None,
            prior_session_low: None,
            prior_session_close: None,

            bars_processed: 0,
            last_atr_14: 0.0,
            last_atr_60: 0.0,

            active_trade: None,
        }
    }

    pub fn into_governance(self) -> GovernanceEngine {
        self.governance
    }

    /// Run the full bar series through the per-bar pipeline, in order
    /// (§4.14). Bars must already be sorted and validated by the caller
    /// (§7's data-error class is raised by the loader, not here).
    pub fn run(&mut self, bars: &[Bar]) -> Result<Vec<TradeRecord>, BacktestError> {
        let mut records = Vec::new();

        for (i, bar) in bars.iter().enumerate() {
            let local_date = self.local_date(bar.timestamp);

            if self.current_session_date != Some(local_date) {
                if self.current_session_date.is_some() {
                    if let Some(prev_bar) = bars.get(i - 1) {
                        self.close_session(prev_bar, &mut records);
                    }
                }
                self.start_session(local_date);
            }

            self.process_bar(bar, &mut records);
        }

        if let Some(last_bar) = bars.last() {
            self.close_session(last_bar, &mut records);
        }

        Ok(records)
    }

    fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        let local = ts + Duration::seconds(self.instrument.session_utc_offset_secs as i64);
        local.date_naive()
    }

    /// End-of-session bookkeeping shared by a mid-run session transition
    /// and the final bar of the whole series (§4.14).
    fn close_session(&mut self, last_bar_of_session: &Bar, records: &mut Vec<TradeRecord>) {
        if let Some(managed) = self.active_trade.take() {
            let close = managed.force_close_eod(last_bar_of_session);
            records.push(self.finalize_trade(managed, close));
        }

        if let (Some(h), Some(l)) = (self.session_high, self.session_low) {
            self.adr.push_session_range(h - l);
        }
        self.prior_session_high = self.session_high;
        self.prior_session_low = self.session_low;
        self.prior_session_close = self.session_last_close;
    }

    /// Reset everything scoped to a single trading session and open a new
    /// one (§4.14: "resets indicators, the dual-OR builder, per-session
    /// auction memoization, and calls `reset_session()` on every
    /// playbook"). ATR/ADX/relative-volume are deliberately left running:
    /// they are multi-day streaming indicators whose value at the first
    /// bar of a session (used to pick the adaptive primary-OR duration)
    /// must reflect prior sessions, not reset to empty every morning.
    fn start_session(&mut self, local_date: NaiveDate) {
        self.current_session_date = Some(local_date);
        self.governance.roll_day(local_date);

        for playbook in self.playbooks.iter_mut() {
            playbook.reset_session();
        }

        self.vwap = SessionVwap::new(3);
        self.return_std.reset();

        self.session_high = None;
        self.session_low = None;
        self.session_last_close = None;

        let session_start_naive = local_date.and_time(self.instrument.session_start)
            - Duration::seconds(self.instrument.session_utc_offset_secs as i64);
        let session_start_utc = DateTime::<Utc>::from_naive_utc_and_offset(session_start_naive, Utc);

        let atr_14_now = if self.bars_processed >= 2 { Some(self.last_atr_14) } else { None };
        let atr_60_now = if self.bars_processed >= 2 { Some(self.last_atr_60) } else { None };
        self.or_builder = Some(DualOrBuilder::new(
            session_start_utc,
            &self.instrument,
            atr_14_now,
            atr_60_now,
        ));

        // No separate overnight/pre-market feed exists in this data model;
        // the prior session's extremes stand in for the overnight range.
        self.auction_metrics_builder = Some(AuctionMetricsBuilder::new(
            session_start_utc,
            atr_14_now.unwrap_or(0.0),
            self.adr.current(),
            self.prior_session_high,
            self.prior_session_low,
            self.prior_session_close,
            self.prior_session_high,
            self.prior_session_low,
        ));
        self.auction_metrics = None;
        self.auction_classification = None;
    }

    fn process_bar(&mut self, bar: &Bar, records: &mut Vec<TradeRecord>) {
        let atr_14 = self.atr_14.update(bar.high, bar.low, bar.close);
        let atr_60 = self.atr_60.update(bar.high, bar.low, bar.close);
        self.bars_processed += 1;
        self.last_atr_14 = atr_14;
        self.last_atr_60 = atr_60;
        let return_std = self.return_std.update(bar.close);
        self.vwap.update(bar.close, bar.volume);
        let adx_reading = self.adx.update(bar.high, bar.low, bar.close);
        let rel_vol_reading = self.rel_vol.update(bar.volume);

        self.session_high = Some(self.session_high.map_or(bar.high, |h| h.max(bar.high)));
        self.session_low = Some(self.session_low.map_or(bar.low, |l| l.min(bar.low)));
        self.session_last_close = Some(bar.close);

        let was_primary_finalized = self
            .or_builder
            .as_ref()
            .map(|b| b.state().primary.finalized)
            .unwrap_or(true);

        if let Some(builder) = self.or_builder.as_mut() {
            builder.update(bar, atr_14, &self.instrument);
        }
        if !was_primary_finalized {
            if let Some(builder) = self.auction_metrics_builder.as_mut() {
                builder.add_bar(bar, None);
            }
        }

        let just_finalized = !was_primary_finalized
            && self
                .or_builder
                .as_ref()
                .map(|b| b.state().primary.finalized)
                .unwrap_or(false);
        if just_finalized {
            if let (Some(builder), Some(or_builder)) =
                (self.auction_metrics_builder.as_ref(), self.or_builder.as_ref())
            {
                let metrics = builder.compute();
                let classification = self.auction_classifier.classify(&metrics, or_builder.state());
                self.auction_metrics = Some(metrics);
                self.auction_classification = Some(classification);
            }
        }

        if let Some(mut managed) = self.active_trade.take() {
            if let Some(close) = managed.on_bar(bar, atr_14) {
                records.push(self.finalize_trade(managed, close));
            } else {
                self.active_trade = Some(managed);
            }
        }

        if self.active_trade.is_none() {
            let primary_finalized = self
                .or_builder
                .as_ref()
                .map(|b| b.state().primary.finalized)
                .unwrap_or(false);
            if primary_finalized && !self.time_filtered(bar) {
                let ctx = self.build_context(bar, atr_14, atr_60, return_std, rel_vol_reading, adx_reading);
                self.try_open_trade(atr_14, ctx);
            }
        }
    }

    fn time_filtered(&self, bar: &Bar) -> bool {
        if !self.run_config.use_time_filters {
            return false;
        }
        let local = bar.timestamp + Duration::seconds(self.instrument.session_utc_offset_secs as i64);
        let tod = local.time();
        let f = &self.run_config.time_filters;
        if tod >= f.lunch_start && tod < f.lunch_end {
            return true;
        }
        if let Some(primary_end) = self.or_builder.as_ref().map(|b| b.state().primary.end) {
            let delay = (bar.timestamp - primary_end).num_minutes();
            if delay < f.avoid_first_minutes_after_or {
                return true;
            }
        }
        false
    }

    #[allow(clippy::too_many_arguments)]
    fn build_context(
        &self,
        bar: &Bar,
        atr_14: f64,
        atr_60: f64,
        return_std: f64,
        rel_vol_reading: RelativeVolumeReading,
        adx_reading: AdxReading,
    ) -> PlaybookContext {
        let state = self.or_builder.as_ref().map(|b| b.state());
        let primary = state.map(|s| &s.primary);
        let or_primary_high = primary.and_then(|p| p.high).unwrap_or(bar.close);
        let or_primary_low = primary.and_then(|p| p.low).unwrap_or(bar.close);
        let or_primary_finalized = primary.map(|p| p.finalized).unwrap_or(false);
        let or_primary_valid = primary.map(|p| p.is_valid).unwrap_or(false);
        let or_primary_width_norm = primary.and_then(|p| p.width_norm).unwrap_or(0.0);

        let auction_state = self
            .auction_classification
            .as_ref()
            .map(|c| c.state.as_str().to_string())
            .unwrap_or_else(|| "MIXED".to_string());
        let auction_state_confidence = self
            .auction_classification
            .as_ref()
            .map(|c| c.confidence)
            .unwrap_or(0.0);
        let drive_energy = self.auction_metrics.as_ref().map(|m| m.drive_energy).unwrap_or(0.0);
        let rotations = self.auction_metrics.as_ref().map(|m| m.rotations as i32).unwrap_or(0);
        let gap_type = self
            .auction_metrics
            .as_ref()
            .map(|m| m.gap_type.as_str().to_string())
            .unwrap_or_else(|| "NO_GAP".to_string());

        let breakout_delay_minutes = primary
            .map(|p| ((bar.timestamp - p.end).num_minutes() as f64).max(0.0))
            .unwrap_or(0.0);

        let volume_ratio = if rel_vol_reading.usable { rel_vol_reading.rel_vol } else { 1.0 };
        let volume_component = if rel_vol_reading.usable {
            (rel_vol_reading.rel_vol / 2.0).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let adx_component = if adx_reading.usable {
            (adx_reading.adx / 50.0).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let volume_quality_score = 0.6 * volume_component + 0.4 * adx_component;
        let normalized_vol = if atr_60 > 0.0 { atr_14 / atr_60 } else { 1.0 };

        let context_excluded = match (&self.context_matrix, self.run_config.use_context_exclusion) {
            (Some(matrix), true) => {
                let sig = matrix.create_signature(
                    or_primary_width_norm,
                    breakout_delay_minutes,
                    volume_quality_score,
                    &auction_state,
                    &gap_type,
                );
                matrix.is_excluded(&sig)
            }
            _ => false,
        };

        PlaybookContext {
            timestamp: bar.timestamp,
            instrument: self.instrument.symbol.clone(),
            current_bar: *bar,
            current_price: bar.close,
            or_primary_high,
            or_primary_low,
            or_primary_finalized,
            or_primary_valid,
            or_primary_width_norm,
            atr_14,
            recent_return_std: return_std,
            volume_ratio,
            auction_state,
            auction_state_confidence,
            breakout_delay_minutes,
            volume_quality_score,
            normalized_vol,
            drive_energy,
            rotations,
            gap_type,
            p_extension: None,
            context_excluded,
            phase1_stop_distance_override: None,
        }
    }

    fn try_open_trade(&mut self, atr_14: f64, ctx: PlaybookContext) {
        let mut candidates: Vec<CandidateSignal> = Vec::new();
        for playbook in self.playbooks.iter_mut() {
            if playbook.is_eligible(&ctx) {
                candidates.extend(playbook.generate_signals(&ctx));
            }
        }
        if candidates.is_empty() {
            return;
        }
        let winner_idx = candidates
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.priority.partial_cmp(&b.priority).unwrap())
            .map(|(i, _)| i)
            .expect("candidates is non-empty");
        let candidate = candidates.swap_remove(winner_idx);

        let p_extension_for_trade;
        let size_adjustment;
        let target_adjustment;
        let candidate: CandidateSignal = if self.run_config.use_probability_gating {
            let p = self
                .probability_provider
                .as_ref()
                .map(|f| f(&candidate, &ctx))
                .unwrap_or(0.5);
            let gate = self
                .probability_gate
                .as_ref()
                .expect("probability_gate is Some whenever use_probability_gating is true");
            let gated = gate.evaluate(candidate, p);
            if !gated.passed_gate {
                return;
            }
            p_extension_for_trade = Some(gated.p_extension);
            size_adjustment = gated.size_adjustment;
            target_adjustment = gated.target_adjustment;
            gated.signal
        } else {
            p_extension_for_trade = None;
            size_adjustment = 1.0;
            target_adjustment = 1.0;
            candidate
        };

        self.open_from_candidate(atr_14, candidate, p_extension_for_trade, size_adjustment, target_adjustment);
    }

    /// §4.13's governance check plus §3.2's position-sizing formula, both
    /// bug-for-bug faithful to `multi_instrument_orchestrator.py::_create_trade`:
    /// base size is 1 contract, a pacing-phase multiplier above 1.0 is
    /// truncated (not rounded) to an integer, and the probability gate's
    /// `size_adjustment` is folded in before truncation rather than after.
    fn open_from_candidate(
        &mut self,
        atr_14: f64,
        candidate: CandidateSignal,
        p_extension: Option<f64>,
        size_adjustment: f64,
        target_adjustment: f64,
    ) {
        let phase_mult = self.governance.size_multiplier();
        let raw_size = phase_mult.max(1.0) * size_adjustment;
        let position_size = if raw_size > 1.0 { raw_size.trunc() as u32 } else { 1 };
        let position_size = position_size.clamp(1, self.governance.max_contracts().max(1));

        let initial_risk = candidate.initial_risk();
        let risk_dollars = initial_risk * self.instrument.tick_value_micro * position_size as f64;

        let decision = self.governance.can_take_trade(risk_dollars, &self.instrument.symbol);
        let orb_governance::GovernanceDecision::Allow { .. } = decision else {
            return;
        };

        self.governance.register_entry(&self.instrument.symbol);

        let mut metadata = candidate.metadata.clone();
        metadata.p_extension = p_extension;

        let trade = ActiveTrade {
            trade_id: Uuid::new_v4(),
            instrument: self.instrument.symbol.clone(),
            playbook_name: candidate.playbook_name.clone(),
            direction: candidate.direction,
            entry_timestamp: candidate.timestamp,
            entry_price: candidate.entry_price,
            initial_stop: candidate.initial_stop,
            current_stop: candidate.initial_stop,
            initial_risk,
            size: position_size as f64,
            remaining_size: 1.0,
            exit_mode: candidate.exit_mode,
            targets: Vec::new(),
            metadata,
            bars_in_trade: 0,
            mfe_r: 0.0,
            mae_r: 0.0,
            mfe_history: Vec::new(),
            mfe_timestamp: None,
            mae_timestamp: None,
            current_r: 0.0,
            breakeven_applied: false,
            phase: 1,
            salvage_armed: false,
            salvage_peak_mfe_r: 0.0,
            salvage_bars_since_peak: 0,
            salvage_confirmation_count: 0,
        };

        let phase1_stop_distance = candidate.phase1_stop_distance;
        let structural_buffer = 0.1 * atr_14;

        let (phase2_trigger_r, runner_trigger_r) = if self.run_config.use_two_phase_stops {
            (self.run_config.phase2_trigger_r, self.run_config.runner_trigger_r)
        } else {
            (f64::INFINITY, f64::INFINITY)
        };

        let partial_rungs: Option<Vec<(f64, f64)>> = if self.run_config.use_partial_exits {
            Some(vec![
                (self.instrument.target_t1_r * target_adjustment, self.instrument.target_t1_fraction),
                (self.instrument.target_t2_r * target_adjustment, self.instrument.target_t2_fraction),
            ])
        } else {
            None
        };

        let time_decay = if self.instrument.time_stop_enabled {
            let max_bars = self.instrument.time_stop_minutes.max(1) as u32;
            Some(TimeDecayConfig {
                max_bars,
                slope_window: 10,
                slope_min: -0.01,
                no_progress_bars: Some((max_bars / 2).max(1)),
                no_progress_threshold_r: Some(self.instrument.time_stop_min_progress_r),
            })
        } else {
            None
        };

        let managed = ManagedTrade::new(
            trade,
            phase1_stop_distance,
            self.run_config.stop_multiplier,
            phase2_trigger_r,
            runner_trigger_r,
            self.run_config.breakeven_trigger_r,
            candidate.structural_anchor,
            structural_buffer,
            self.run_config.use_salvage,
            SalvageConditions::default(),
            partial_rungs.as_deref(),
            time_decay,
            p_extension,
            self.run_config.probability_gate.p_runner_threshold,
        );
        self.active_trade = Some(managed);
    }

    fn finalize_trade(&mut self, managed: ManagedTrade, close: TradeClose) -> TradeRecord {
        let final_stop = managed.current_stop();
        let trade = managed.trade;
        let pnl = close.realized_r * trade.initial_risk * self.instrument.tick_value_micro * trade.size;
        self.governance.register_exit(&self.instrument.symbol, pnl);

        let completed = CompletedTrade {
            trade_id: trade.trade_id,
            instrument: trade.instrument,
            playbook_name: trade.playbook_name,
            direction: trade.direction,
            entry_timestamp: trade.entry_timestamp,
            entry_price: trade.entry_price,
            exit_timestamp: close.exit_timestamp,
            exit_price: close.exit_price,
            initial_stop: trade.initial_stop,
            final_stop,
            initial_risk: trade.initial_risk,
            auction_state: trade.metadata.auction_state,
            auction_state_confidence: trade.metadata.auction_state_confidence,
            or_width_norm: trade.metadata.or_width_norm,
            breakout_delay_minutes: trade.metadata.breakout_delay_minutes,
            drive_energy: trade.metadata.drive_energy,
            rotations: trade.metadata.rotations,
            gap_type: trade.metadata.gap_type,
            p_extension: trade.metadata.p_extension,
            stop_phase: trade.phase,
            salvage_triggered: matches!(close.reason, orb_types::ExitReason::Salvage),
            final_targets: trade.targets,
            exit_reason: close.reason,
            exit_sub_reason: close.sub_reason,
            realized_r: close.realized_r,
            realized_pnl: pnl,
            bars_held: trade.bars_in_trade,
            mfe_r: trade.mfe_r,
            mae_r: trade.mae_r,
            mfe_timestamp: trade.mfe_timestamp,
            mae_timestamp: trade.mae_timestamp,
        };

        TradeRecord {
            trade: completed,
            balance_after: self.governance.state().current_balance,
            peak_balance_after: self.governance.state().peak_balance,
        }
    }
}
