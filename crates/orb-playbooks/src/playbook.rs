use orb_types::{CandidateSignal, ExitModeDescriptor};

use crate::context::PlaybookContext;

/// Capability a strategy module implements to participate in signal
/// generation (§4.6, grounded in `playbooks/base.py::Playbook`).
///
/// Each playbook is a session-scoped stateful object: the orchestrator
/// calls `reset_session` once at the start of every trading day, matching
/// the source's instance-level fields (`failed_breakout_high`,
/// `impulse_detected`, ...) that must not leak across sessions.
pub trait Playbook: Send {
    fn name(&self) -> &str;

    fn is_eligible(&self, ctx: &PlaybookContext) -> bool;

    fn generate_signals(&mut self, ctx: &PlaybookContext) -> Vec<CandidateSignal>;

    fn preferred_exit_mode(&self, ctx: &PlaybookContext) -> ExitModeDescriptor;

    fn reset_session(&mut self);
}

pub(crate) fn metadata_from_context(ctx: &PlaybookContext) -> orb_types::SignalMetadata {
    orb_types::SignalMetadata {
        auction_state: ctx.auction_state.clone(),
        auction_state_confidence: ctx.auction_state_confidence,
        or_width_norm: ctx.or_primary_width_norm,
        breakout_delay_minutes: ctx.breakout_delay_minutes,
        volume_quality_score: ctx.volume_quality_score,
        normalized_vol: ctx.normalized_vol,
        drive_energy: ctx.drive_energy,
        rotations: ctx.rotations,
        gap_type: ctx.gap_type.clone(),
        p_extension: ctx.p_extension,
    }
}
