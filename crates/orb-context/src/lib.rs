mod matrix;
mod signature;

pub use matrix::{ContextCell, ContextExclusionMatrix, ContextTradeSample};
pub use signature::{BreakoutDelayBucket, ContextSignature};
