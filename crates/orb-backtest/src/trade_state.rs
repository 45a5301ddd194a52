use chrono::{DateTime, Duration, Utc};

use orb_types::{ActiveTrade, Bar, Direction, ExitModeDescriptor, ExitReason};
use orb_risk::{
    should_force_exit, PartialExitManager, SalvageConditions, SalvageManager, TimeDecayConfig,
    TrailingStopManager, TwoPhaseStopManager,
};

/// Outcome of one bar's risk-management pass on a live trade: `None` while
/// the trade stays open, `Some` the bar it closes (§4.8-§4.12, §3.10's
/// mixed-bar tie-break — stop wins over a same-bar target or time exit).
pub struct TradeClose {
    pub reason: ExitReason,
    pub sub_reason: Option<String>,
    pub exit_price: f64,
    pub exit_timestamp: DateTime<Utc>,
    pub realized_r: f64,
}

/// One open trade plus the independent risk managers driving its stop,
/// salvage, trailing, and partial-exit ladder. Owned by the orchestrator,
/// advanced one bar at a time (§3.8).
pub struct ManagedTrade {
    pub trade: ActiveTrade,
    two_phase: TwoPhaseStopManager,
    salvage: Option<SalvageManager>,
    partials: Option<PartialExitManager>,
    trailing: TrailingStopManager,
    time_decay: Option<TimeDecayConfig>,
    single_target_deadline: Option<DateTime<Utc>>,
    p_extension: Option<f64>,
    p_extension_threshold: f64,
}

impl ManagedTrade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trade: ActiveTrade,
        phase1_stop_distance: f64,
        stop_multiplier: f64,
        phase2_trigger_r: f64,
        runner_trigger_r: f64,
        breakeven_trigger_r: f64,
        structural_anchor: Option<f64>,
        structural_buffer: f64,
        use_salvage: bool,
        salvage_conditions: SalvageConditions,
        partial_rungs: Option<&[(f64, f64)]>,
        time_decay: Option<TimeDecayConfig>,
        p_extension: Option<f64>,
        p_extension_threshold: f64,
    ) -> Self {
        let two_phase = TwoPhaseStopManager::new(
            trade.direction,
            trade.entry_price,
            trade.initial_risk,
            phase1_stop_distance,
            stop_multiplier,
            phase2_trigger_r,
            runner_trigger_r,
            structural_anchor,
            structural_buffer,
            breakeven_trigger_r,
        );

        let trailing = build_trailing(&trade);

        let partials = partial_rungs
            .filter(|rungs| !rungs.is_empty())
            .map(|rungs| {
                PartialExitManager::new(trade.direction, trade.entry_price, trade.initial_risk, rungs)
            });

        let single_target_deadline = match trade.exit_mode {
            ExitModeDescriptor::SingleTarget { time_limit_minutes } => {
                Some(trade.entry_timestamp + Duration::minutes(time_limit_minutes))
            }
            _ => None,
        };

        let salvage = if use_salvage {
            Some(SalvageManager::new(salvage_conditions))
        } else {
            None
        };

        Self {
            trade,
            two_phase,
            salvage,
            partials,
            trailing,
            time_decay,
            single_target_deadline,
            p_extension,
            p_extension_threshold,
        }
    }

    pub fn current_stop(&self) -> f64 {
        self.two_phase.stop_price()
    }

    /// Advance risk state by one bar and decide whether the trade closes
    /// (§4.14 per-trade dispatch: MFE/MAE, salvage, two-phase stop + stop
    /// hit, partial exits, time decay / single-target deadline, in that
    /// fixed order).
    pub fn on_bar(&mut self, bar: &Bar, atr_14: f64) -> Option<TradeClose> {
        self.trade.bars_in_trade += 1;

        let favorable_price = match self.trade.direction {
            Direction::Long => bar.high,
            Direction::Short => bar.low,
        };
        let adverse_price = match self.trade.direction {
            Direction::Long => bar.low,
            Direction::Short => bar.high,
        };
        let mfe_candidate = self.trade.r_multiple_at(favorable_price);
        let mae_candidate = self.trade.r_multiple_at(adverse_price);
        if mfe_candidate > self.trade.mfe_r {
            self.trade.mfe_r = mfe_candidate;
            self.trade.mfe_timestamp = Some(bar.timestamp);
        }
        if mae_candidate < self.trade.mae_r {
            self.trade.mae_r = mae_candidate;
            self.trade.mae_timestamp = Some(bar.timestamp);
        }
        self.trade.current_r = self.trade.r_multiple_at(bar.close);
        self.trade.mfe_history.push(self.trade.mfe_r);

        if let Some(salvage) = self.salvage.as_mut() {
            if let Some(event) = salvage.evaluate(bar.close, self.trade.mfe_r, self.trade.current_r, bar.timestamp)
            {
                return Some(TradeClose {
                    reason: ExitReason::Salvage,
                    sub_reason: Some(format!(
                        "retrace_ratio={:.3} bars_since_peak={}",
                        event.retrace_ratio, event.bars_since_peak
                    )),
                    exit_price: event.exit_price,
                    exit_timestamp: event.timestamp,
                    realized_r: self.trade.current_r,
                });
            }
        }

        self.two_phase.update(
            self.trade.mfe_r,
            bar.timestamp,
            None,
            self.p_extension,
            self.p_extension_threshold,
        );
        let entered_runner = self.two_phase.is_in_runner_phase();
        if entered_runner {
            if let Some(update) = self.trailing.update(bar.high, bar.low, atr_14, bar.timestamp) {
                self.two_phase.accept_external_stop(update.new_stop);
            }
        }
        self.trade.current_stop = self.two_phase.stop_price();
        self.trade.phase = self.two_phase.phase().as_u8();
        self.trade.breakeven_applied = self.two_phase.breakeven_applied();

        if self.two_phase.check_stop_hit(bar.high, bar.low) {
            let any_partial_hit = self.partials.as_ref().is_some_and(|p| p.targets().iter().any(|t| t.hit));
            let reason = if self.two_phase.breakeven_applied() && self.two_phase.stop_price() == self.trade.entry_price
            {
                ExitReason::BreakevenStop
            } else if entered_runner && any_partial_hit {
                ExitReason::Runner
            } else if entered_runner {
                ExitReason::TrailingStop
            } else {
                ExitReason::Stop
            };
            return Some(TradeClose {
                reason,
                sub_reason: None,
                exit_price: self.two_phase.stop_price(),
                exit_timestamp: bar.timestamp,
                realized_r: self.trade.r_multiple_at(self.two_phase.stop_price()),
            });
        }

        if let Some(partials) = self.partials.as_mut() {
            let fills = partials.update(bar.high, bar.low, bar.timestamp);
            if !fills.is_empty() {
                self.trade.remaining_size = partials.remaining_size();
                self.trade.targets = partials
                    .targets()
                    .iter()
                    .map(|t| orb_types::Target {
                        target_r: t.target_r,
                        size_fraction: t.size_fraction,
                        price: t.price,
                        hit: t.hit,
                        hit_timestamp: t.hit_timestamp,
                        hit_price: t.hit_price,
                    })
                    .collect();
            }
            if partials.is_fully_closed() {
                let hit_count = partials.targets().iter().filter(|t| t.hit).count();
                let reason = if hit_count >= 2 {
                    ExitReason::Target2
                } else {
                    ExitReason::Target1
                };
                let last_fill = fills.last().or_else(|| partials.targets().iter().filter(|t| t.hit).last());
                let exit_price = last_fill.map(|t| t.price).unwrap_or(bar.close);
                return Some(TradeClose {
                    reason,
                    sub_reason: None,
                    exit_price,
                    exit_timestamp: bar.timestamp,
                    realized_r: partials.weighted_realized_r(),
                });
            }
        }

        if let Some(deadline) = self.single_target_deadline {
            if bar.timestamp >= deadline {
                return Some(TradeClose {
                    reason: ExitReason::TimeStop,
                    sub_reason: Some("single_target_time_limit".to_string()),
                    exit_price: bar.close,
                    exit_timestamp: bar.timestamp,
                    realized_r: self.trade.current_r,
                });
            }
        }

        if let Some(config) = &self.time_decay {
            if should_force_exit(config, self.trade.bars_in_trade, &self.trade.mfe_history) {
                return Some(TradeClose {
                    reason: ExitReason::TimeStop,
                    sub_reason: Some("time_decay".to_string()),
                    exit_price: bar.close,
                    exit_timestamp: bar.timestamp,
                    realized_r: self.trade.current_r,
                });
            }
        }

        None
    }

    /// Force-close at the session's final bar, regardless of risk-manager
    /// state (§4.14 end-of-session step).
    pub fn force_close_eod(&self, bar: &Bar) -> TradeClose {
        TradeClose {
            reason: ExitReason::EndOfDay,
            sub_reason: None,
            exit_price: bar.close,
            exit_timestamp: bar.timestamp,
            realized_r: self.trade.r_multiple_at(bar.close),
        }
    }
}

fn build_trailing(trade: &ActiveTrade) -> TrailingStopManager {
    let r0 = trade.initial_risk;
    match trade.exit_mode {
        ExitModeDescriptor::TrailVol { atr_mult } => {
            TrailingStopManager::vol(trade.direction, trade.entry_price, trade.initial_stop, r0, atr_mult)
        }
        ExitModeDescriptor::TrailPivot { lookback } => TrailingStopManager::pivot(
            trade.direction,
            trade.entry_price,
            trade.initial_stop,
            r0,
            lookback,
            0.1,
        ),
        ExitModeDescriptor::HybridVolPivot { atr_mult, lookback } => TrailingStopManager::hybrid(
            trade.direction,
            trade.entry_price,
            trade.initial_stop,
            r0,
            atr_mult,
            lookback,
            0.1,
        ),
        ExitModeDescriptor::PartialThenTrail { trail_factor, .. } => {
            TrailingStopManager::vol(trade.direction, trade.entry_price, trade.initial_stop, r0, trail_factor)
        }
        ExitModeDescriptor::SingleTarget { .. } | ExitModeDescriptor::TimeDecayForce { .. } => {
            TrailingStopManager::vol(trade.direction, trade.entry_price, trade.initial_stop, r0, 2.0)
        }
    }
}
