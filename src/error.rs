use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid time format {0:?}, expected HH:MM")]
    TimeFormat(String),
    #[error("hour {0} out of range 0-23")]
    Hour(u32),
    #[error("minute {0} out of range 0-59")]
    Minute(u32),
    #[error("unknown time zone {0:?}")]
    TimeZone(String),
    #[error("evening offset ({evening} min) must be larger than night offset ({night} min)")]
    Offsets { evening: u16, night: u16 },
    #[error("offset of {0} min before bed exceeds one day")]
    OffsetRange(u16),
}
