use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use blueshift::{ClockTime, Mode, TimeZoneSpec};

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum ModeArg {
    Auto,
    Daylight,
    Evening,
    Night,
    Off,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Auto => Mode::Auto,
            ModeArg::Daylight => Mode::Daylight,
            ModeArg::Evening => Mode::Evening,
            ModeArg::Night => Mode::Night,
            ModeArg::Off => Mode::Off,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "blueshift",
    version,
    about = "Screen color temperature following a wake/bed schedule"
)]
pub struct Opts {
    /// Name/description of outputs to target (can repeat). If omitted, all.
    #[arg(short = 'o', long = "output", action = ArgAction::Append)]
    pub outputs: Vec<String>,

    /// Wake time HH:MM
    #[arg(short = 'w', long = "wake", default_value = "07:00")]
    pub wake: ClockTime,

    /// Bed time HH:MM
    #[arg(short = 'b', long = "bed", default_value = "23:00")]
    pub bed: ClockTime,

    /// Start with the schedule disabled
    #[arg(long = "no-schedule")]
    pub no_schedule: bool,

    /// IANA time zone for the schedule, or "local"
    #[arg(short = 'z', long = "timezone", default_value = "local")]
    pub timezone: TimeZoneSpec,

    /// Daylight color temperature (K)
    #[arg(short = 'D', long = "daylight", default_value_t = 6500.0)]
    pub daylight_temp: f64,

    /// Evening color temperature (K)
    #[arg(short = 'E', long = "evening", default_value_t = 3400.0)]
    pub evening_temp: f64,

    /// Night color temperature (K)
    #[arg(short = 'N', long = "night", default_value_t = 2700.0)]
    pub night_temp: f64,

    /// Minutes before bed the evening phase starts
    #[arg(long = "evening-offset", default_value_t = 180)]
    pub evening_offset: u16,

    /// Minutes before bed the night phase starts
    #[arg(long = "night-offset", default_value_t = 60)]
    pub night_offset: u16,

    /// Fixed temperature (K), overrides --mode
    #[arg(short = 't', long = "temperature")]
    pub temperature: Option<f64>,

    /// Operating mode
    #[arg(long = "mode", value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Seconds between schedule evaluations
    #[arg(long = "interval", default_value_t = 30)]
    pub interval: u64,

    /// Entries per channel in the generated transfer table
    #[arg(long = "table-size", default_value_t = 256)]
    pub table_size: usize,

    /// Print the day's temperature curve as CSV (minute,kelvin) and exit
    #[arg(long = "print-curve")]
    pub print_curve: bool,

    /// Minutes between samples for --print-curve
    #[arg(long = "curve-step", default_value_t = 15)]
    pub curve_step: u16,

    /// Half-width in minutes of the transitions in --print-curve
    #[arg(long = "curve-transition", default_value_t = 20)]
    pub curve_transition: u16,

    /// Enable IPC socket server for external control (specify socket path)
    #[arg(long = "socket")]
    pub socket: Option<PathBuf>,

    /// Also accept IPC commands on stdin
    #[arg(long = "stdin")]
    pub stdin: bool,
}

impl Opts {
    pub fn mode(&self) -> Mode {
        match self.temperature {
            Some(kelvin) => Mode::Manual(kelvin),
            None => self.mode.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Opts::parse_from(["blueshift"]);
        assert_eq!(opts.wake.minute_of_day(), 420);
        assert_eq!(opts.bed.minute_of_day(), 1380);
        assert_eq!(opts.timezone, TimeZoneSpec::Local);
        assert_eq!(opts.mode(), Mode::Auto);
        assert_eq!(opts.interval, 30);
    }

    #[test]
    fn temperature_overrides_mode() {
        let opts = Opts::parse_from(["blueshift", "--mode", "night", "-t", "3000"]);
        assert_eq!(opts.mode(), Mode::Manual(3000.0));
    }

    #[test]
    fn rejects_bad_wake_time() {
        assert!(Opts::try_parse_from(["blueshift", "--wake", "25:00"]).is_err());
        assert!(Opts::try_parse_from(["blueshift", "-z", "Nowhere/Else"]).is_err());
    }
}
