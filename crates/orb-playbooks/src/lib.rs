mod context;
mod pb1_orb_refined;
mod pb2_failure_fade;
mod pb3_pullback_continuation;
mod playbook;
mod probability_gate;

pub use context::PlaybookContext;
pub use pb1_orb_refined::Pb1OrbRefined;
pub use pb2_failure_fade::Pb2FailureFade;
pub use pb3_pullback_continuation::Pb3PullbackContinuation;
pub use playbook::Playbook;
pub use probability_gate::{GatedSignal, ProbabilityGate, RunnerActivationGate};
