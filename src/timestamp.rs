//! MS-DOS date/time handling.
//!
//! ZIP headers store modification times in the MS-DOS format: a 16-bit date
//! and a 16-bit time packed into one 32-bit word (date in the high half).
//!
//! | Field | Bits | Range |
//! |-------|------|-------|
//! | year - 1980 | date 9..16 | 1980-2107 |
//! | month | date 5..9 | 1-12 |
//! | day | date 0..5 | 1-31 |
//! | hour | time 11..16 | 0-23 |
//! | minute | time 5..11 | 0-59 |
//! | second / 2 | time 0..5 | 0-29 |
//!
//! There is no time zone; values are interpreted as UTC by this crate.
//!
//! # Example
//!
//! ```rust
//! use zipkit::DosDateTime;
//!
//! let ts = DosDateTime::new(2024, 2, 29, 13, 45, 31).unwrap();
//! assert_eq!(ts.second(), 30); // two-second resolution
//! assert_eq!(DosDateTime::from_raw(ts.to_raw()), ts);
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between the Unix epoch and 1980-01-01T00:00:00Z.
const DOS_EPOCH_UNIX_SECS: i64 = 315_532_800;

/// Last representable instant: 2107-12-31T23:59:58Z.
const DOS_MAX_UNIX_SECS: i64 = 4_354_819_198;

/// A packed MS-DOS timestamp.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DosDateTime {
    date: u16,
    time: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable value.
    pub const MIN: Self = Self {
        date: (1 << 5) | 1,
        time: 0,
    };

    /// Creates a timestamp from calendar fields.
    ///
    /// Returns `None` if any field is out of range. Odd seconds are rounded
    /// down.
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        if !(1980..=2107).contains(&year)
            || !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year as i64, month as u32)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        let date = ((year - 1980) << 9) | ((month as u16) << 5) | day as u16;
        let time = ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 >> 1);
        Some(Self { date, time })
    }

    /// Unpacks the 32-bit on-disk representation (date in the high 16 bits).
    pub fn from_raw(raw: u32) -> Self {
        Self {
            date: (raw >> 16) as u16,
            time: raw as u16,
        }
    }

    /// Builds a value from the separate date and time words.
    pub fn from_parts(date: u16, time: u16) -> Self {
        Self { date, time }
    }

    /// Packs the value into its 32-bit on-disk representation.
    pub fn to_raw(self) -> u32 {
        ((self.date as u32) << 16) | self.time as u32
    }

    /// The 16-bit date word.
    pub fn date(self) -> u16 {
        self.date
    }

    /// The 16-bit time word.
    pub fn time(self) -> u16 {
        self.time
    }

    /// Converts Unix seconds, clamping to the representable range.
    pub fn from_unix_secs(secs: i64) -> Self {
        let secs = secs.clamp(DOS_EPOCH_UNIX_SECS, DOS_MAX_UNIX_SECS);
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        let hour = (rem / 3600) as u8;
        let minute = ((rem % 3600) / 60) as u8;
        let second = (rem % 60) as u8;
        // The clamp keeps every field in range.
        Self::new(year as u16, month as u8, day as u8, hour, minute, second).unwrap_or(Self::MIN)
    }

    /// Converts a system time, clamping to the representable range.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Err(_) => DOS_EPOCH_UNIX_SECS,
        };
        Self::from_unix_secs(secs)
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Seconds since the Unix epoch.
    ///
    /// Invalid packed fields (month 0, day 0) are treated as 1.
    pub fn as_unix_secs(self) -> i64 {
        let days = days_from_civil(
            self.year() as i64,
            self.month().max(1) as u32,
            self.day().max(1) as u32,
        );
        days * 86_400
            + self.hour() as i64 * 3600
            + self.minute() as i64 * 60
            + self.second() as i64
    }

    /// Calendar year.
    pub fn year(self) -> u16 {
        1980 + (self.date >> 9)
    }

    /// Month, 1-12.
    pub fn month(self) -> u8 {
        ((self.date >> 5) & 0x0f) as u8
    }

    /// Day of month, 1-31.
    pub fn day(self) -> u8 {
        (self.date & 0x1f) as u8
    }

    /// Hour, 0-23.
    pub fn hour(self) -> u8 {
        (self.time >> 11) as u8
    }

    /// Minute, 0-59.
    pub fn minute(self) -> u8 {
        ((self.time >> 5) & 0x3f) as u8
    }

    /// Second, always even.
    pub fn second(self) -> u8 {
        ((self.time & 0x1f) << 1) as u8
    }
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::MIN
    }
}

impl std::fmt::Debug for DosDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u8 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

// Howard Hinnant's days-from-civil algorithm, proleptic Gregorian calendar.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
