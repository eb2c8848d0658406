//! Color temperature to RGB conversion.
//!
//! Uses Tanner Helland's curve fit of the blackbody locus. The fit is only
//! meaningful between 1000K and 40000K, so every entry point clamps to that
//! range before touching `ln`/`powf`.

use std::sync::LazyLock;

pub const MIN_KELVIN: f64 = 1000.0;
pub const MAX_KELVIN: f64 = 40000.0;

/// Daylight anchor all gains are relative to.
pub const REFERENCE_KELVIN: f64 = 6500.0;

static REFERENCE_RGB: LazyLock<Rgb> = LazyLock::new(|| kelvin_to_rgb(REFERENCE_KELVIN));

/// Normalized color, each channel in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Per-channel multipliers that move the reference white to a target temperature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RgbGain {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl RgbGain {
    pub const IDENTITY: Self = Self {
        red: 1.0,
        green: 1.0,
        blue: 1.0,
    };
}

pub fn clamp_kelvin(kelvin: f64) -> f64 {
    if kelvin.is_nan() {
        return REFERENCE_KELVIN;
    }
    kelvin.clamp(MIN_KELVIN, MAX_KELVIN)
}

pub fn kelvin_to_rgb(kelvin: f64) -> Rgb {
    let t = clamp_kelvin(kelvin) / 100.0;

    let red = if t <= 66.0 {
        255.0
    } else {
        329.698727446 * (t - 60.0).powf(-0.1332047592)
    };

    let green = if t <= 66.0 {
        99.4708025861 * t.ln() - 161.1195681661
    } else {
        288.1221695283 * (t - 60.0).powf(-0.0755148492)
    };

    let blue = if t >= 66.0 {
        255.0
    } else if t <= 19.0 {
        0.0
    } else {
        138.5177312231 * (t - 10.0).ln() - 305.0447927307
    };

    Rgb {
        r: normalize(red),
        g: normalize(green),
        b: normalize(blue),
    }
}

fn normalize(channel: f64) -> f64 {
    (channel / 255.0).clamp(0.0, 1.0)
}

/// Reference white (6500K), computed once.
pub fn reference_rgb() -> Rgb {
    *REFERENCE_RGB
}

pub fn gains_for(kelvin: f64) -> RgbGain {
    let target = kelvin_to_rgb(kelvin);
    let reference = reference_rgb();
    RgbGain {
        red: ratio(target.r, reference.r),
        green: ratio(target.g, reference.g),
        blue: ratio(target.b, reference.b),
    }
}

// Reference channels are all > 0.9, the guard only matters if the anchor moves.
fn ratio(channel: f64, reference: f64) -> f64 {
    if reference <= f64::EPSILON {
        return 1.0;
    }
    channel / reference
}
