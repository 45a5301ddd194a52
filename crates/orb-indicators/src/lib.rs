pub mod adx;
pub mod atr;
pub mod relative_volume;
pub mod vwap;

pub use adx::{Adx, AdxReading};
pub use atr::Atr;
pub use relative_volume::{RelativeVolume, RelativeVolumeReading};
pub use vwap::{SessionVwap, VwapReading};
