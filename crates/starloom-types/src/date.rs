//! Game calendar dates.
//!
//! A [`Date`] is stored packed as `day + (month << 5) + (year << 9)` so that
//! integer comparison agrees with calendar order. Two derived values are
//! expensive enough to cache beside the packed value: the number of days
//! since the epoch (used for date differences) and the formatted text (used
//! whenever the date is displayed). Both caches live in a side buffer that
//! is discarded whenever the date changes.
//!
//! # Invariants
//!
//! - A packed value of 0 is the "unset" date. Arithmetic on it is a no-op
//!   and it formats as the empty string.
//! - Leap years are Gregorian.
//! - `a < b` if and only if `a` falls earlier in the calendar than `b`.

use std::cell::{OnceCell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Day of the year on which each month starts, for a common year.
const MONTH_OFFSETS: [i32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// Abbreviated month names.
const MONTH_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Full month names, used by [`Date::long_string`].
const MONTH_LONG: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Weekday names indexed by the result of Zeller's congruence.
const WEEKDAYS: [&str; 7] = ["Sat", "Sun", "Mon", "Tue", "Wed", "Thu", "Fri"];

/// Days in a 400-year Gregorian cycle.
const DAYS_PER_400_YEARS: i32 = 146_097;

/// Days in a century that does not end on a multiple of 400.
const DAYS_PER_CENTURY: i32 = 36_524;

/// Days in a four-year cycle that includes one leap day.
const DAYS_PER_4_YEARS: i32 = 1_461;

/// Process-wide date format preference, stored as [`DateFormat::code`].
static FORMAT_IN_USE: AtomicU8 = AtomicU8::new(0);

// ---------------------------------------------------------------------------
// DateFormat
// ---------------------------------------------------------------------------

/// How dates are rendered as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    /// `Fri, 1 Jan 3013`
    #[default]
    Dmy,
    /// `Fri Jan 1, 3013`
    Mdy,
    /// `3013-01-01`
    Ymd,
}

impl DateFormat {
    /// Return the process-wide preference.
    pub fn global() -> Self {
        Self::from_code(FORMAT_IN_USE.load(AtomicOrdering::Relaxed))
    }

    /// Make this format the process-wide preference.
    pub fn set_global(self) {
        FORMAT_IN_USE.store(self.code(), AtomicOrdering::Relaxed);
    }

    const fn code(self) -> u8 {
        match self {
            Self::Dmy => 0,
            Self::Mdy => 1,
            Self::Ymd => 2,
        }
    }

    const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Mdy,
            2 => Self::Ymd,
            _ => Self::Dmy,
        }
    }
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

/// Cached derived values. Never compared, never hashed.
#[derive(Debug, Clone, Default)]
struct DateCache {
    epoch_days: OnceCell<i32>,
    text: RefCell<Option<(DateFormat, String)>>,
}

/// A calendar date with no time of day and no time zone.
#[derive(Debug, Clone, Default)]
pub struct Date {
    packed: i32,
    cache: DateCache,
}

impl Date {
    /// Create a date from its day, month (January = 1), and year.
    pub fn new(day: i32, month: i32, year: i32) -> Self {
        let packed = day
            .saturating_add(month.saturating_mul(32))
            .saturating_add(year.saturating_mul(512));
        Self {
            packed,
            cache: DateCache::default(),
        }
    }

    /// Whether this date has been set to a real calendar day.
    pub const fn is_set(&self) -> bool {
        self.packed != 0
    }

    /// Day of the month.
    pub const fn day(&self) -> i32 {
        self.packed & 31
    }

    /// Month of the year, January = 1.
    pub const fn month(&self) -> i32 {
        (self.packed >> 5) & 15
    }

    /// Calendar year.
    pub const fn year(&self) -> i32 {
        self.packed >> 9
    }

    /// Number of days since the calendar epoch. Only differences between two
    /// of these values are meaningful.
    pub fn days_since_epoch(&self) -> i32 {
        if !self.is_set() {
            return 0;
        }
        *self.cache.epoch_days.get_or_init(|| self.compute_epoch_days())
    }

    fn compute_epoch_days(&self) -> i32 {
        let month = self.month();
        let mut days = self.day().saturating_add(month_offset(month));
        if month > 2 && is_leap_year(self.year()) {
            days = days.saturating_add(1);
        }

        // Counting from year 1 puts every leap day at the end of its cycle.
        let mut year = self.year().saturating_sub(1);
        days = days.saturating_add(DAYS_PER_400_YEARS.saturating_mul(year / 400));
        year %= 400;
        days = days.saturating_add(DAYS_PER_CENTURY.saturating_mul(year / 100));
        year %= 100;
        days = days.saturating_add(DAYS_PER_4_YEARS.saturating_mul(year / 4));
        year %= 4;
        days.saturating_add(year.saturating_mul(365))
    }

    /// Day of the week by Zeller's congruence: 0 = Saturday, 6 = Friday.
    pub fn weekday_number(&self) -> i32 {
        let mut year = self.year();
        let mut month = self.month();
        if month < 3 {
            year = year.saturating_sub(1);
            month = month.saturating_add(12);
        }
        let sum = self
            .day()
            .saturating_add(month.saturating_add(1).saturating_mul(13) / 5)
            .saturating_add(year)
            .saturating_add(year / 4)
            .saturating_add((year / 100).saturating_mul(6))
            .saturating_add(year / 400);
        sum.rem_euclid(7)
    }

    /// Abbreviated weekday name.
    pub fn weekday(&self) -> &'static str {
        usize::try_from(self.weekday_number())
            .ok()
            .and_then(|i| WEEKDAYS.get(i))
            .copied()
            .unwrap_or("")
    }

    /// Render the date in the process-wide [`DateFormat`].
    pub fn to_display_string(&self) -> String {
        self.format_with(DateFormat::global())
    }

    /// Render the date in a specific format, caching the result.
    pub fn format_with(&self, format: DateFormat) -> String {
        if !self.is_set() {
            return String::new();
        }
        if let Some((cached_format, text)) = self.cache.text.borrow().as_ref() {
            if *cached_format == format {
                return text.clone();
            }
        }
        let text = self.render(format);
        *self.cache.text.borrow_mut() = Some((format, text.clone()));
        text
    }

    fn render(&self, format: DateFormat) -> String {
        let (day, month, year) = (self.day(), self.month(), self.year());
        let month_name = month_name(&MONTH_SHORT, month);
        match format {
            DateFormat::Ymd => format!("{year}-{month:02}-{day:02}"),
            DateFormat::Mdy => format!("{} {month_name} {day}, {year}", self.weekday()),
            DateFormat::Dmy => format!("{}, {day} {month_name} {year}", self.weekday()),
        }
    }

    /// The date as it would be spoken in conversation, e.g. "the 1st of
    /// January" or "January 1st".
    pub fn long_string(&self) -> String {
        if !self.is_set() {
            return String::new();
        }
        let day = self.day();
        let suffix = if day / 10 == 1 || day % 10 == 0 || day % 10 > 3 {
            "th"
        } else if day % 10 == 1 {
            "st"
        } else if day % 10 == 2 {
            "nd"
        } else {
            "rd"
        };
        let month = month_name(&MONTH_LONG, self.month());
        match DateFormat::global() {
            DateFormat::Dmy => format!("the {day}{suffix} of {month}"),
            DateFormat::Mdy | DateFormat::Ymd => format!("{month} {day}{suffix}"),
        }
    }

    /// Return the date `days` after (or before, if negative) this one.
    pub fn plus_days(&self, days: i32) -> Self {
        if !self.is_set() || days == 0 {
            return self.clone();
        }
        let mut day = self.day().saturating_add(days);
        let mut month = self.month();
        let mut year = self.year();

        while day > days_in_month(month, year) {
            day = day.saturating_sub(days_in_month(month, year));
            month = month.saturating_add(1);
            if month == 13 {
                month = 1;
                year = year.saturating_add(1);
            }
        }
        while day < 1 {
            month = month.saturating_sub(1);
            if month == 0 {
                month = 12;
                year = year.saturating_sub(1);
            }
            day = day.saturating_add(days_in_month(month, year));
        }
        Self::new(day, month, year)
    }

    /// Advance this date by one day, discarding any cached values.
    pub fn increment(&mut self) {
        *self = self.plus_days(1);
    }

    /// Number of days from `other` to `self`.
    pub fn days_after(&self, other: &Self) -> i32 {
        self.days_since_epoch()
            .saturating_sub(other.days_since_epoch())
    }

    /// Day of the year, January 1st = 1.
    pub fn days_since_year_start(&self) -> i32 {
        let month = self.month();
        let mut days = self.day().saturating_add(month_offset(month));
        if month > 2 && is_leap_year(self.year()) {
            days = days.saturating_add(1);
        }
        days
    }

    /// Days remaining until December 31st.
    pub fn days_until_year_end(&self) -> i32 {
        let length = if is_leap_year(self.year()) { 366 } else { 365 };
        length - self.days_since_year_start()
    }
}

/// Whether the given year has a February 29th.
pub const fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in the given month of the given year.
pub const fn days_in_month(month: i32, year: i32) -> i32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn month_offset(month: i32) -> i32 {
    usize::try_from(month.saturating_sub(1))
        .ok()
        .and_then(|i| MONTH_OFFSETS.get(i))
        .copied()
        .unwrap_or(0)
}

fn month_name(table: &[&'static str; 12], month: i32) -> &'static str {
    usize::try_from(month.saturating_sub(1))
        .ok()
        .and_then(|i| table.get(i))
        .copied()
        .unwrap_or("")
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl PartialEq for Date {
    fn eq(&self, other: &Self) -> bool {
        self.packed == other.packed
    }
}

impl Eq for Date {}

impl PartialOrd for Date {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Date {
    fn cmp(&self, other: &Self) -> Ordering {
        self.packed.cmp(&other.packed)
    }
}

impl Hash for Date {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.packed.hash(state);
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl Add<i32> for &Date {
    type Output = Date;

    fn add(self, days: i32) -> Date {
        self.plus_days(days)
    }
}

impl Add<i32> for Date {
    type Output = Self;

    fn add(self, days: i32) -> Self {
        self.plus_days(days)
    }
}

impl Sub for &Date {
    type Output = i32;

    fn sub(self, other: &Date) -> i32 {
        self.days_after(other)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn start() -> Date {
        Date::new(16, 11, 3013)
    }

    #[test]
    fn packing_round_trips_components() {
        let date = Date::new(31, 12, 3013);
        assert_eq!(date.day(), 31);
        assert_eq!(date.month(), 12);
        assert_eq!(date.year(), 3013);
        assert!(date.is_set());
        assert!(!Date::default().is_set());
    }

    #[test]
    fn formats_in_every_style() {
        let date = Date::new(1, 1, 3013);
        assert_eq!(date.format_with(DateFormat::Dmy), "Fri, 1 Jan 3013");
        assert_eq!(date.format_with(DateFormat::Mdy), "Fri Jan 1, 3013");
        assert_eq!(date.format_with(DateFormat::Ymd), "3013-01-01");
        assert_eq!(Date::default().format_with(DateFormat::Dmy), "");
    }

    #[test]
    fn weekday_follows_known_calendar() {
        // 1 January 2000 was a Saturday, 15 October 2026 a Thursday.
        assert_eq!(Date::new(1, 1, 2000).weekday(), "Sat");
        assert_eq!(Date::new(15, 10, 2026).weekday(), "Thu");
    }

    #[test]
    fn long_string_uses_ordinal_suffixes() {
        DateFormat::Dmy.set_global();
        assert_eq!(Date::new(1, 1, 3013).long_string(), "the 1st of January");
        assert_eq!(Date::new(2, 3, 3013).long_string(), "the 2nd of March");
        assert_eq!(Date::new(23, 5, 3013).long_string(), "the 23rd of May");
        assert_eq!(Date::new(11, 5, 3013).long_string(), "the 11th of May");
        assert_eq!(Date::new(30, 5, 3013).long_string(), "the 30th of May");
    }

    #[test]
    fn addition_crosses_month_and_year_boundaries() {
        assert_eq!(Date::new(31, 12, 3013) + 1, Date::new(1, 1, 3014));
        assert_eq!(Date::new(28, 2, 3012) + 1, Date::new(29, 2, 3012));
        assert_eq!(Date::new(28, 2, 3013) + 1, Date::new(1, 3, 3013));
        assert_eq!(Date::new(28, 2, 3000) + 1, Date::new(1, 3, 3000));
        assert_eq!(Date::new(1, 1, 3014) + -1, Date::new(31, 12, 3013));
        assert_eq!(Date::new(1, 3, 3012) + -1, Date::new(29, 2, 3012));
    }

    #[test]
    fn unset_date_ignores_arithmetic() {
        let unset = Date::default();
        assert_eq!(unset.plus_days(10), unset);
        assert_eq!(unset.days_since_epoch(), 0);
    }

    #[test]
    fn difference_matches_addition() {
        let base = start();
        for k in [0, 1, 2, 27, 28, 29, 30, 31, 59, 365, 366, 400, 1_461, 40_000] {
            let later = &base + k;
            assert_eq!(&later - &base, k);
            assert_eq!(later.days_since_epoch() - base.days_since_epoch(), k);
            assert!(base < &base + 1);
        }
    }

    #[test]
    fn increment_invalidates_cached_text() {
        let mut date = Date::new(1, 1, 3013);
        assert_eq!(date.format_with(DateFormat::Ymd), "3013-01-01");
        date.increment();
        assert_eq!(date.format_with(DateFormat::Ymd), "3013-01-02");
    }

    #[test]
    fn year_position_helpers() {
        assert_eq!(Date::new(1, 1, 3013).days_since_year_start(), 1);
        assert_eq!(Date::new(1, 3, 3012).days_since_year_start(), 61);
        assert_eq!(Date::new(31, 12, 3013).days_until_year_end(), 0);
    }

    #[test]
    fn ordering_matches_calendar() {
        assert!(Date::new(31, 1, 3013) < Date::new(1, 2, 3013));
        assert!(Date::new(31, 12, 3012) < Date::new(1, 1, 3013));
    }
}
