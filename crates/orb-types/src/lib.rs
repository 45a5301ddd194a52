pub mod auction;
pub mod bar;
pub mod classification;
pub mod error;
pub mod governance;
pub mod instrument;
pub mod or_state;
pub mod run_config;
pub mod signal;
pub mod trade;

pub use auction::{AuctionMetrics, GapType};
pub use bar::Bar;
pub use classification::{AuctionState, StateClassification};
pub use error::{ConfigError, DataError};
pub use governance::{GovernanceState, InstrumentGovernanceState};
pub use instrument::InstrumentConfig;
pub use or_state::{DualOrState, OrSide};
pub use run_config::{
    default_pacing_phases, PacingPhase, ProbabilityGateConfig, PropAccountRules, RunConfig,
    TimeFilters,
};
pub use signal::{CandidateSignal, Direction, ExitModeDescriptor, SignalMetadata};
pub use trade::{ActiveTrade, CompletedTrade, ExitReason, Target};
