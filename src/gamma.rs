//! Gamma transfer tables built from per-channel gains.

use crate::color::{REFERENCE_KELVIN, RgbGain};

pub const DEFAULT_TABLE_SIZE: usize = 256;

/// Targets at or above this are treated as "unmodified" and the display is
/// reset instead of receiving a near-identity table.
pub const RESET_THRESHOLD_KELVIN: f64 = REFERENCE_KELVIN - 50.0;

pub fn needs_reset(kelvin: f64) -> bool {
    kelvin >= RESET_THRESHOLD_KELVIN
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

/// Three piecewise-linear curves mapping input level to output level.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferTable {
    pub red: Vec<f64>,
    pub green: Vec<f64>,
    pub blue: Vec<f64>,
}

/// Builds a table of `size` entries per channel. `size` must be at least 1;
/// a zero size is bumped to 1.
pub fn build(gains: RgbGain, size: usize) -> TransferTable {
    let size = size.max(1);
    let curve = |gain: f64| -> Vec<f64> {
        let gain = gain.max(0.0);
        (0..size)
            .map(|i| (base_level(i, size) * gain).min(1.0))
            .collect()
    };
    TransferTable {
        red: curve(gains.red),
        green: curve(gains.green),
        blue: curve(gains.blue),
    }
}

fn base_level(i: usize, size: usize) -> f64 {
    if size <= 1 {
        return 0.0;
    }
    i as f64 / (size - 1) as f64
}

impl TransferTable {
    pub fn identity(size: usize) -> Self {
        build(RgbGain::IDENTITY, size)
    }

    pub fn len(&self) -> usize {
        self.red.len()
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_empty()
    }

    pub fn curve(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::Red => &self.red,
            Channel::Green => &self.green,
            Channel::Blue => &self.blue,
        }
    }

    /// Linear interpolation between the two entries surrounding `x` in [0, 1].
    pub fn sample(&self, channel: Channel, x: f64) -> f64 {
        let curve = self.curve(channel);
        match curve.len() {
            0 => 0.0,
            1 => curve[0],
            n => {
                let pos = x.clamp(0.0, 1.0) * (n - 1) as f64;
                let lo = pos.floor() as usize;
                let hi = (lo + 1).min(n - 1);
                let frac = pos - lo as f64;
                curve[lo] + (curve[hi] - curve[lo]) * frac
            }
        }
    }

    /// Encodes into the channel-planar 16-bit layout used by gamma ramps
    /// (`R..R G..G B..B`), resampling to `ramp_size` entries per channel.
    pub fn write_ramp(&self, buf: &mut [u16], ramp_size: usize) {
        // An empty table would blank the display.
        if self.is_empty() {
            log::warn!("refusing to write an empty gamma table");
            return;
        }
        if ramp_size == 0 || buf.len() < ramp_size * 3 {
            log::warn!(
                "gamma ramp buffer too small: {} entries for ramp size {}",
                buf.len(),
                ramp_size
            );
            return;
        }
        for (offset, channel) in [Channel::Red, Channel::Green, Channel::Blue]
            .into_iter()
            .enumerate()
        {
            for i in 0..ramp_size {
                let value = self.sample(channel, base_level(i, ramp_size));
                buf[i + offset * ramp_size] =
                    (value.clamp(0.0, 1.0) * u16::MAX as f64).round() as u16;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::gains_for;

    #[test]
    fn table_starts_at_zero_and_never_exceeds_one() {
        let gains = [
            RgbGain::IDENTITY,
            gains_for(1900.0),
            gains_for(6600.0),
            RgbGain {
                red: 3.5,
                green: 0.0,
                blue: 1.2,
            },
        ];
        for gain in gains {
            for size in [1, 2, 3, 17, 256, 1024] {
                let table = build(gain, size);
                assert_eq!(table.len(), size);
                assert_eq!(table.red[0], 0.0);
                for curve in [&table.red, &table.green, &table.blue] {
                    assert!(curve.iter().all(|v| (0.0..=1.0).contains(v)));
                }
            }
        }
    }

    #[test]
    fn large_gain_saturates() {
        let table = build(
            RgbGain {
                red: 2.0,
                green: 1.0,
                blue: 0.5,
            },
            256,
        );
        assert_eq!(table.red[255], 1.0);
        assert_eq!(table.red[200], 1.0);
        assert_eq!(table.green[255], 1.0);
        assert!((table.blue[255] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn negative_gain_is_treated_as_zero() {
        let table = build(
            RgbGain {
                red: -1.0,
                green: 1.0,
                blue: 1.0,
            },
            8,
        );
        assert!(table.red.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn zero_size_is_bumped() {
        assert_eq!(build(RgbGain::IDENTITY, 0).len(), 1);
    }

    #[test]
    fn reference_table_is_identity() {
        let table = build(gains_for(REFERENCE_KELVIN), DEFAULT_TABLE_SIZE);
        let identity = TransferTable::identity(DEFAULT_TABLE_SIZE);
        for (a, b) in table.blue.iter().zip(&identity.blue) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn reset_threshold() {
        assert!(needs_reset(6500.0));
        assert!(needs_reset(6450.0));
        assert!(!needs_reset(6449.0));
        assert!(!needs_reset(2700.0));
    }

    #[test]
    fn sample_interpolates_between_entries() {
        let table = TransferTable::identity(3);
        assert_eq!(table.sample(Channel::Green, 0.25), 0.25);
        assert_eq!(table.sample(Channel::Green, 1.0), 1.0);
        assert_eq!(table.sample(Channel::Green, 7.0), 1.0);
        assert_eq!(table.sample(Channel::Green, -1.0), 0.0);
    }

    #[test]
    fn ramp_resamples_to_hardware_size() {
        let table = build(
            RgbGain {
                red: 1.0,
                green: 1.0,
                blue: 0.5,
            },
            DEFAULT_TABLE_SIZE,
        );
        let ramp = 1024;
        let mut buf = vec![0u16; ramp * 3];
        table.write_ramp(&mut buf, ramp);
        assert_eq!(buf[0], 0);
        assert_eq!(buf[ramp - 1], u16::MAX);
        assert_eq!(buf[2 * ramp - 1], u16::MAX);
        assert_eq!(buf[3 * ramp - 1], (0.5 * u16::MAX as f64).round() as u16);
        assert!(buf[..ramp].windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn ramp_ignores_empty_table() {
        let table = TransferTable {
            red: Vec::new(),
            green: Vec::new(),
            blue: Vec::new(),
        };
        assert!(table.is_empty());
        assert!(!TransferTable::identity(1).is_empty());
        let mut buf = vec![7u16; 12];
        table.write_ramp(&mut buf, 4);
        assert!(buf.iter().all(|v| *v == 7));
    }

    #[test]
    fn ramp_ignores_short_buffer() {
        let table = TransferTable::identity(4);
        let mut buf = vec![7u16; 5];
        table.write_ramp(&mut buf, 4);
        assert!(buf.iter().all(|v| *v == 7));
    }
}
