//! Maps the current mode and schedule to what the display should show.
//!
//! Stateless: every tick builds a fresh [`Decision`] from [`Settings`] and
//! the current time.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::color::{REFERENCE_KELVIN, clamp_kelvin, gains_for};
use crate::config::{ClockTime, ScheduleConfig};
use crate::gamma::{self, DEFAULT_TABLE_SIZE, TransferTable, needs_reset};
use crate::scheduling::{self, PhaseOffsets, PhasePresets, SchedulePhase};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    /// Follow the wake/bed schedule.
    Auto,
    Daylight,
    Evening,
    Night,
    /// Fixed temperature picked by the user.
    Manual(f64),
    /// Leave the display unmodified.
    Off,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "daylight" | "day" => Ok(Mode::Daylight),
            "evening" => Ok(Mode::Evening),
            "night" => Ok(Mode::Night),
            "off" => Ok(Mode::Off),
            other => Err(format!("unknown mode {other:?}")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Auto => f.write_str("auto"),
            Mode::Daylight => f.write_str("daylight"),
            Mode::Evening => f.write_str("evening"),
            Mode::Night => f.write_str("night"),
            Mode::Manual(k) => write!(f, "manual ({k:.0}K)"),
            Mode::Off => f.write_str("off"),
        }
    }
}

/// Changes requested by the front-end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Control {
    SetMode(Mode),
    SetSchedule { wake: ClockTime, bed: ClockTime },
    SetEnabled(bool),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    pub mode: Mode,
    pub schedule: ScheduleConfig,
    pub presets: PhasePresets,
    pub offsets: PhaseOffsets,
    pub table_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            schedule: ScheduleConfig::default(),
            presets: PhasePresets::default(),
            offsets: PhaseOffsets::default(),
            table_size: DEFAULT_TABLE_SIZE,
        }
    }
}

impl Settings {
    pub fn apply(&mut self, control: Control) {
        match control {
            Control::SetMode(mode) => self.mode = mode,
            Control::SetSchedule { wake, bed } => {
                self.schedule.wake = wake;
                self.schedule.bed = bed;
            }
            Control::SetEnabled(enabled) => self.schedule.enabled = enabled,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// Restore the display's own transfer function.
    Reset,
    Apply(TransferTable),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// Phase the schedule selects, `None` when the schedule is disabled.
    pub automatic_phase: Option<SchedulePhase>,
    /// Phase actually shown, `None` for manual and off.
    pub phase: Option<SchedulePhase>,
    pub kelvin: f64,
    pub target: Target,
}

pub fn resolve(settings: &Settings, now: DateTime<Utc>) -> Decision {
    let minute = settings.schedule.timezone.minute_of_day(now);
    resolve_at_minute(settings, minute)
}

pub fn resolve_at_minute(settings: &Settings, minute: u16) -> Decision {
    let schedule = &settings.schedule;
    let automatic_phase = schedule.enabled.then(|| {
        scheduling::compute_phase(
            minute,
            schedule.wake.minute_of_day(),
            schedule.bed.minute_of_day(),
            settings.offsets,
        )
    });

    let phase_kelvin = |phase: SchedulePhase| (Some(phase), phase.kelvin(&settings.presets));
    let (phase, kelvin) = match settings.mode {
        Mode::Off => (None, REFERENCE_KELVIN),
        Mode::Manual(kelvin) => (None, clamp_kelvin(kelvin)),
        Mode::Auto => phase_kelvin(automatic_phase.unwrap_or(SchedulePhase::Daylight)),
        Mode::Daylight => phase_kelvin(SchedulePhase::Daylight),
        Mode::Evening => phase_kelvin(SchedulePhase::Evening),
        Mode::Night => phase_kelvin(SchedulePhase::Night),
    };

    let target = if needs_reset(kelvin) {
        Target::Reset
    } else {
        Target::Apply(gamma::build(gains_for(kelvin), settings.table_size))
    };

    Decision {
        automatic_phase,
        phase,
        kelvin,
        target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn auto_follows_schedule() {
        let s = settings();
        let day = resolve_at_minute(&s, 12 * 60);
        assert_eq!(day.phase, Some(SchedulePhase::Daylight));
        assert_eq!(day.target, Target::Reset);

        let evening = resolve_at_minute(&s, 20 * 60 + 50);
        assert_eq!(evening.phase, Some(SchedulePhase::Evening));
        assert_eq!(evening.kelvin, s.presets.evening);
        assert!(matches!(evening.target, Target::Apply(ref t) if t.len() == DEFAULT_TABLE_SIZE));

        let night = resolve_at_minute(&s, 2 * 60);
        assert_eq!(night.phase, Some(SchedulePhase::Night));
        assert_eq!(night.kelvin, 2700.0);
    }

    #[test]
    fn disabled_schedule_stays_at_daylight() {
        let mut s = settings();
        s.apply(Control::SetEnabled(false));
        let d = resolve_at_minute(&s, 2 * 60);
        assert_eq!(d.automatic_phase, None);
        assert_eq!(d.phase, Some(SchedulePhase::Daylight));
        assert_eq!(d.target, Target::Reset);
    }

    #[test]
    fn fixed_mode_overrides_schedule() {
        let mut s = settings();
        s.apply(Control::SetMode(Mode::Night));
        let d = resolve_at_minute(&s, 12 * 60);
        assert_eq!(d.automatic_phase, Some(SchedulePhase::Daylight));
        assert_eq!(d.phase, Some(SchedulePhase::Night));
        assert_eq!(d.kelvin, s.presets.night);
    }

    #[test]
    fn each_fixed_mode_shows_its_phase() {
        let s = settings();
        for (mode, phase) in [
            (Mode::Daylight, SchedulePhase::Daylight),
            (Mode::Evening, SchedulePhase::Evening),
            (Mode::Night, SchedulePhase::Night),
        ] {
            let s = Settings { mode, ..s };
            for minute in [0, 12 * 60, 21 * 60] {
                let d = resolve_at_minute(&s, minute);
                assert_eq!(d.phase, Some(phase), "{mode} at {minute}");
                assert_eq!(d.kelvin, phase.kelvin(&s.presets));
            }
        }
    }

    #[test]
    fn deep_night_preset() {
        let s = Settings {
            mode: Mode::Night,
            presets: PhasePresets::DEEP_NIGHT,
            ..settings()
        };
        assert_eq!(resolve_at_minute(&s, 0).kelvin, 1900.0);
    }

    #[test]
    fn manual_is_clamped() {
        let mut s = settings();
        s.apply(Control::SetMode(Mode::Manual(200.0)));
        let d = resolve_at_minute(&s, 0);
        assert_eq!(d.kelvin, 1000.0);
        assert_eq!(d.phase, None);

        s.apply(Control::SetMode(Mode::Manual(6460.0)));
        assert_eq!(resolve_at_minute(&s, 0).target, Target::Reset);
    }

    #[test]
    fn off_resets() {
        let mut s = settings();
        s.apply(Control::SetMode(Mode::Off));
        assert_eq!(resolve_at_minute(&s, 23 * 60 + 30).target, Target::Reset);
    }

    #[test]
    fn schedule_change_moves_boundaries() {
        let mut s = settings();
        s.apply(Control::SetSchedule {
            wake: "09:00".parse().unwrap(),
            bed: "01:00".parse().unwrap(),
        });
        assert_eq!(
            resolve_at_minute(&s, 21 * 60).phase,
            Some(SchedulePhase::Daylight)
        );
        assert_eq!(
            resolve_at_minute(&s, 23 * 60).phase,
            Some(SchedulePhase::Evening)
        );
    }

    #[test]
    fn parses_modes() {
        assert_eq!("Auto".parse::<Mode>(), Ok(Mode::Auto));
        assert_eq!("day".parse::<Mode>(), Ok(Mode::Daylight));
        assert!("sunset".parse::<Mode>().is_err());
        assert_eq!(Mode::Manual(3000.0).to_string(), "manual (3000K)");
    }
}
