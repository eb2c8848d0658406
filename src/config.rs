//! Schedule configuration supplied by the front-end.

use chrono::{DateTime, Local, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::scheduling::{self, PhaseBoundaries, PhaseOffsets, SchedulePhase};

/// Wall clock time without a date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ConfigError> {
        if hour > 23 {
            return Err(ConfigError::Hour(hour));
        }
        if minute > 59 {
            return Err(ConfigError::Minute(minute));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    pub fn minute_of_day(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl FromStr for ClockTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::TimeFormat(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
        let h: u32 = h.parse().map_err(|_| bad())?;
        let m: u32 = m.parse().map_err(|_| bad())?;
        Self::new(h, m)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        t.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Zone the schedule is evaluated in: the system zone or an IANA name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeZoneSpec {
    #[default]
    Local,
    Named(Tz),
}

impl TimeZoneSpec {
    pub fn minute_of_day(&self, now: DateTime<Utc>) -> u16 {
        let (hour, minute) = match self {
            TimeZoneSpec::Local => {
                let t = now.with_timezone(&Local);
                (t.hour(), t.minute())
            }
            TimeZoneSpec::Named(tz) => {
                let t = now.with_timezone(tz);
                (t.hour(), t.minute())
            }
        };
        (hour * 60 + minute) as u16
    }
}

impl FromStr for TimeZoneSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(TimeZoneSpec::Local);
        }
        s.parse::<Tz>()
            .map(TimeZoneSpec::Named)
            .map_err(|_| ConfigError::TimeZone(s.to_string()))
    }
}

impl TryFrom<String> for TimeZoneSpec {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeZoneSpec> for String {
    fn from(tz: TimeZoneSpec) -> Self {
        tz.to_string()
    }
}

impl fmt::Display for TimeZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeZoneSpec::Local => f.write_str("local"),
            TimeZoneSpec::Named(tz) => f.write_str(tz.name()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub wake: ClockTime,
    pub bed: ClockTime,
    pub enabled: bool,
    #[serde(default)]
    pub timezone: TimeZoneSpec,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            wake: ClockTime { hour: 7, minute: 0 },
            bed: ClockTime {
                hour: 23,
                minute: 0,
            },
            enabled: true,
            timezone: TimeZoneSpec::Local,
        }
    }
}

impl ScheduleConfig {
    pub fn boundaries(&self, offsets: PhaseOffsets) -> PhaseBoundaries {
        scheduling::phase_boundaries(
            self.wake.minute_of_day(),
            self.bed.minute_of_day(),
            offsets,
        )
    }

    pub fn phase_at(&self, now: DateTime<Utc>, offsets: PhaseOffsets) -> SchedulePhase {
        scheduling::compute_phase(
            self.timezone.minute_of_day(now),
            self.wake.minute_of_day(),
            self.bed.minute_of_day(),
            offsets,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_clock_times() {
        assert_eq!("07:30".parse::<ClockTime>().unwrap().minute_of_day(), 450);
        assert_eq!("7:05".parse::<ClockTime>().unwrap().to_string(), "07:05");
        assert_eq!(" 23:59 ".parse::<ClockTime>().unwrap().minute_of_day(), 1439);
        assert_eq!("0:00".parse::<ClockTime>().unwrap().minute_of_day(), 0);
    }

    #[test]
    fn rejects_bad_clock_times() {
        assert_eq!("24:00".parse::<ClockTime>(), Err(ConfigError::Hour(24)));
        assert_eq!("12:60".parse::<ClockTime>(), Err(ConfigError::Minute(60)));
        assert_eq!(
            "1200".parse::<ClockTime>(),
            Err(ConfigError::TimeFormat("1200".into()))
        );
        assert_eq!(
            "ab:cd".parse::<ClockTime>(),
            Err(ConfigError::TimeFormat("ab:cd".into()))
        );
    }

    #[test]
    fn resolves_named_zones() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let berlin: TimeZoneSpec = "Europe/Berlin".parse().unwrap();
        assert_eq!(berlin.minute_of_day(now), 13 * 60);
        let kolkata: TimeZoneSpec = "Asia/Kolkata".parse().unwrap();
        assert_eq!(kolkata.minute_of_day(now), 17 * 60 + 30);
        assert_eq!(berlin.to_string(), "Europe/Berlin");
    }

    #[test]
    fn rejects_unknown_zone() {
        assert_eq!(
            "Mars/Olympus".parse::<TimeZoneSpec>(),
            Err(ConfigError::TimeZone("Mars/Olympus".into()))
        );
        assert_eq!("LOCAL".parse::<TimeZoneSpec>(), Ok(TimeZoneSpec::Local));
    }

    #[test]
    fn schedule_from_json() {
        let cfg: ScheduleConfig = serde_json::from_str(
            r#"{"wake":"06:45","bed":"00:30","enabled":true,"timezone":"America/New_York"}"#,
        )
        .unwrap();
        assert_eq!(cfg.wake.minute_of_day(), 405);
        assert_eq!(cfg.bed.minute_of_day(), 30);

        // 03:00 UTC is 22:00 in New York in January.
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap();
        assert_eq!(
            cfg.phase_at(now, PhaseOffsets::LONG_EVENING),
            SchedulePhase::Evening
        );

        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains(r#""bed":"00:30""#));
        assert!(json.contains("America/New_York"));
    }

    #[test]
    fn schedule_json_rejects_bad_time() {
        let err = serde_json::from_str::<ScheduleConfig>(
            r#"{"wake":"25:00","bed":"23:00","enabled":true}"#,
        );
        assert!(err.is_err());
    }
}
