//! Per-trade risk management: two-phase stop, salvage abort, trailing
//! stops, partial-exit ladder, and time-decay force exit (§4.8-§4.12).
//!
//! Every manager here owns exactly one trade's risk state and is driven by
//! the orchestrator one bar at a time; none of them perform I/O or hold a
//! clock of their own.

pub mod partial_exits;
pub mod salvage;
pub mod time_decay;
pub mod trailing;
pub mod two_phase_stop;

pub use partial_exits::{PartialExitManager, TargetFill};
pub use salvage::{SalvageConditions, SalvageEvent, SalvageManager};
pub use time_decay::{should_force_exit, TimeDecayConfig};
pub use trailing::{TrailUpdate, TrailingStopManager};
pub use two_phase_stop::{StopPhase, StopUpdate, TwoPhaseStopManager};
