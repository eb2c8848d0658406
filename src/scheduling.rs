//! Wake/bed schedule phases.
//!
//! All times are minutes of day in `[0, 1440)`. The awake window starts at
//! wake time and may wrap past midnight; evening and night start a fixed
//! number of minutes before bed.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MINUTES_PER_DAY: u16 = 1440;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePhase {
    Daylight,
    Evening,
    Night,
}

impl SchedulePhase {
    pub fn kelvin(self, presets: &PhasePresets) -> f64 {
        match self {
            SchedulePhase::Daylight => presets.daylight,
            SchedulePhase::Evening => presets.evening,
            SchedulePhase::Night => presets.night,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SchedulePhase::Daylight => "daylight",
            SchedulePhase::Evening => "evening",
            SchedulePhase::Night => "night",
        }
    }
}

/// Reference temperature of each phase in Kelvin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhasePresets {
    pub daylight: f64,
    pub evening: f64,
    pub night: f64,
}

impl PhasePresets {
    pub const WARM_NIGHT: Self = Self {
        daylight: 6500.0,
        evening: 3400.0,
        night: 2700.0,
    };

    pub const DEEP_NIGHT: Self = Self {
        daylight: 6500.0,
        evening: 3400.0,
        night: 1900.0,
    };
}

impl Default for PhasePresets {
    fn default() -> Self {
        Self::WARM_NIGHT
    }
}

/// How long before bed the evening and night phases begin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseOffsets {
    pub evening_before_bed: u16,
    pub night_before_bed: u16,
}

impl PhaseOffsets {
    pub const LONG_EVENING: Self = Self {
        evening_before_bed: 180,
        night_before_bed: 60,
    };

    pub const SHORT_EVENING: Self = Self {
        evening_before_bed: 120,
        night_before_bed: 60,
    };

    pub fn new(evening_before_bed: u16, night_before_bed: u16) -> Result<Self, ConfigError> {
        for offset in [evening_before_bed, night_before_bed] {
            if offset > MINUTES_PER_DAY {
                return Err(ConfigError::OffsetRange(offset));
            }
        }
        if evening_before_bed <= night_before_bed {
            return Err(ConfigError::Offsets {
                evening: evening_before_bed,
                night: night_before_bed,
            });
        }
        Ok(Self {
            evening_before_bed,
            night_before_bed,
        })
    }
}

impl Default for PhaseOffsets {
    fn default() -> Self {
        Self::LONG_EVENING
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseBoundaries {
    /// Length of the awake window, 1440 when wake == bed.
    pub awake: u16,
    /// Minutes after wake at which evening starts.
    pub evening_at: u16,
    /// Minutes after wake at which night starts.
    pub night_at: u16,
    pub evening_minute: u16,
    pub night_minute: u16,
}

fn wrap(minute: u16) -> u16 {
    minute % MINUTES_PER_DAY
}

pub fn minutes_since_wake(now: u16, wake: u16) -> u16 {
    let (now, wake) = (wrap(now), wrap(wake));
    if now >= wake {
        now - wake
    } else {
        (MINUTES_PER_DAY - wake) + now
    }
}

pub fn awake_duration(wake: u16, bed: u16) -> u16 {
    let (wake, bed) = (wrap(wake), wrap(bed));
    if bed > wake {
        bed - wake
    } else if bed < wake {
        (MINUTES_PER_DAY - wake) + bed
    } else {
        MINUTES_PER_DAY
    }
}

pub fn phase_boundaries(wake: u16, bed: u16, offsets: PhaseOffsets) -> PhaseBoundaries {
    let awake = awake_duration(wake, bed);
    let evening_at = awake.saturating_sub(offsets.evening_before_bed);
    let night_at = awake.saturating_sub(offsets.night_before_bed);
    PhaseBoundaries {
        awake,
        evening_at,
        night_at,
        evening_minute: wrap(wrap(wake) + evening_at),
        night_minute: wrap(wrap(wake) + night_at),
    }
}

pub fn compute_phase(now: u16, wake: u16, bed: u16, offsets: PhaseOffsets) -> SchedulePhase {
    let since_wake = minutes_since_wake(now, wake);
    let bounds = phase_boundaries(wake, bed, offsets);
    if since_wake < bounds.evening_at {
        SchedulePhase::Daylight
    } else if since_wake < bounds.night_at {
        SchedulePhase::Evening
    } else {
        SchedulePhase::Night
    }
}

/// `3c² - 2c³` with `c` clamped to [0, 1].
pub fn smoothstep(c: f64) -> f64 {
    let c = c.clamp(0.0, 1.0);
    c * c * (3.0 - 2.0 * c)
}

/// Parameters of the visualization curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveOptions {
    pub presets: PhasePresets,
    /// Half-width of each transition window in minutes.
    pub half_width: u16,
    /// Distance between samples in minutes.
    pub step: u16,
}

impl Default for CurveOptions {
    fn default() -> Self {
        Self {
            presets: PhasePresets::default(),
            half_width: 20,
            step: 1,
        }
    }
}

// Signed distance from `b` to `m` on the 24h circle, in [-720, 720).
fn circular_offset(m: u16, b: u16) -> i32 {
    let day = MINUTES_PER_DAY as i32;
    (m as i32 - b as i32 + day / 2).rem_euclid(day) - day / 2
}

/// Smoothed temperature at `minute`.
///
/// Starts from the hard phase preset and, for every boundary (wake, evening
/// start, night start, bed) whose window covers `minute`, swaps that
/// boundary's step for a smoothstep ramp. Overlapping windows add up, so the
/// curve stays continuous however close the boundaries are.
pub fn temperature_at(
    minute: u16,
    wake: u16,
    bed: u16,
    offsets: PhaseOffsets,
    options: &CurveOptions,
) -> f64 {
    let minute = wrap(minute);
    let kelvin_at = |m: u16| compute_phase(m, wake, bed, offsets).kelvin(&options.presets);
    let step_value = kelvin_at(minute);
    if options.half_width == 0 {
        return step_value;
    }

    let bounds = phase_boundaries(wake, bed, offsets);
    let width = (options.half_width as i32).min(MINUTES_PER_DAY as i32 / 2);
    let mut boundaries = [wrap(wake), bounds.evening_minute, bounds.night_minute, wrap(bed)];
    boundaries.sort_unstable();

    let mut kelvin = step_value;
    let mut previous = None;
    for boundary in boundaries {
        // Coinciding boundaries share one step.
        if previous == Some(boundary) {
            continue;
        }
        previous = Some(boundary);

        let offset = circular_offset(minute, boundary);
        if offset.abs() > width {
            continue;
        }
        let jump = kelvin_at(boundary) - kelvin_at(wrap(boundary + MINUTES_PER_DAY - 1));
        if jump == 0.0 {
            continue;
        }
        let c = (offset + width) as f64 / (2 * width) as f64;
        let stepped = if offset >= 0 { 1.0 } else { 0.0 };
        kelvin += jump * (smoothstep(c) - stepped);
    }
    kelvin
}

/// Lazy `(minute, kelvin)` samples over one day. Clone it to restart.
#[derive(Clone, Debug)]
pub struct TemperatureCurve {
    wake: u16,
    bed: u16,
    offsets: PhaseOffsets,
    options: CurveOptions,
    next: u16,
}

pub fn temperature_curve(
    wake: u16,
    bed: u16,
    offsets: PhaseOffsets,
    options: CurveOptions,
) -> TemperatureCurve {
    TemperatureCurve {
        wake,
        bed,
        offsets,
        options: CurveOptions {
            step: options.step.max(1),
            ..options
        },
        next: 0,
    }
}

impl TemperatureCurve {
    fn remaining(&self) -> usize {
        if self.next >= MINUTES_PER_DAY {
            return 0;
        }
        let step = self.options.step as usize;
        ((MINUTES_PER_DAY - self.next) as usize).div_ceil(step)
    }
}

impl Iterator for TemperatureCurve {
    type Item = (u16, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= MINUTES_PER_DAY {
            return None;
        }
        let minute = self.next;
        self.next = self.next.saturating_add(self.options.step);
        let kelvin = temperature_at(minute, self.wake, self.bed, self.offsets, &self.options);
        Some((minute, kelvin))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for TemperatureCurve {}
