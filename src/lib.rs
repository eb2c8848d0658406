//! Color temperature engine and wake/bed schedule for screen gamma control.

pub mod color;
pub mod config;
pub mod controller;
pub mod error;
pub mod gamma;
pub mod scheduling;

pub use color::{RgbGain, gains_for, kelvin_to_rgb};
pub use config::{ClockTime, ScheduleConfig, TimeZoneSpec};
pub use controller::{Control, Decision, Mode, Settings, Target};
pub use error::ConfigError;
pub use gamma::{TransferTable, build};
pub use scheduling::{PhaseBoundaries, PhaseOffsets, PhasePresets, SchedulePhase};
