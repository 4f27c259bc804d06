//! Time types for the calendar panel.
//!
//! This module provides [`EventTime`] for event start times (either a specific
//! timestamp or an all-day date), [`TimeWindow`] and [`Lookahead`] for the
//! query range, and the [`TimeSource`] abstraction the daemon reads its clock
//! from.

use std::cmp::Ordering;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents the start of a calendar event.
///
/// Calendar events can have two types of times:
/// - **DateTime**: A specific point in time, keeping the offset the calendar
///   API reported so the wall-clock time can be rendered as written
/// - **AllDay**: A date without a specific time (all-day events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime with its original UTC offset.
    DateTime(DateTime<FixedOffset>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Parses an RFC 3339 timestamp such as `2024-03-01T14:30:00-08:00`.
    pub fn parse_date_time(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(Self::DateTime)
    }

    /// Parses a date-only value such as `2024-03-01`.
    pub fn parse_date(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Self::AllDay)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the datetime if this is a `DateTime` variant.
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::AllDay(_) => None,
        }
    }

    /// Returns the date if this is an `AllDay` variant.
    pub fn as_date(&self) -> Option<&NaiveDate> {
        match self {
            Self::AllDay(d) => Some(d),
            Self::DateTime(_) => None,
        }
    }

    /// Converts to a UTC datetime for comparison purposes.
    ///
    /// For all-day events, returns midnight UTC on that date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => dt.with_timezone(&Utc),
            Self::AllDay(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }

    /// Returns the date portion of this event time, as written.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::AllDay(date) => *date,
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// Error returned when a time window would be empty or inverted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time window: {min} is not before {max}")]
pub struct InvalidWindow {
    /// Requested lower bound.
    pub min: DateTime<Utc>,
    /// Requested upper bound.
    pub max: DateTime<Utc>,
}

/// How far ahead of "now" events are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookahead {
    /// A fixed span in seconds.
    Seconds(u64),
    /// Until the next local midnight in the device timezone.
    UntilMidnight,
}

impl Default for Lookahead {
    fn default() -> Self {
        // 25 hours
        Self::Seconds(90_000)
    }
}

/// A time window for querying calendar events, `[min, max]` in UTC.
///
/// `min` is always strictly before `max`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    min: DateTime<Utc>,
    max: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Self, InvalidWindow> {
        if min >= max {
            return Err(InvalidWindow { min, max });
        }
        Ok(Self { min, max })
    }

    /// Creates a time window from a start time and duration.
    pub fn from_duration(min: DateTime<Utc>, duration: Duration) -> Result<Self, InvalidWindow> {
        Self::new(min, min + duration)
    }

    /// Creates the window starting at `now` for the given lookahead.
    ///
    /// `UntilMidnight` ends at the first local midnight strictly after `now`
    /// in `tz`. When that midnight does not exist (DST gap) the earliest valid
    /// instant after it is used.
    pub fn lookahead(
        now: DateTime<Utc>,
        lookahead: Lookahead,
        tz: &Tz,
    ) -> Result<Self, InvalidWindow> {
        match lookahead {
            Lookahead::Seconds(secs) => {
                let max = i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .and_then(|span| now.checked_add_signed(span))
                    .ok_or(InvalidWindow { min: now, max: now })?;
                Self::new(now, max)
            }
            Lookahead::UntilMidnight => {
                let tomorrow = now.with_timezone(tz).date_naive().succ_opt();
                let end = tomorrow
                    .and_then(|d| next_local_midnight(d, tz))
                    .unwrap_or(now + Duration::days(1));
                Self::new(now, end)
            }
        }
    }

    /// Lower bound of the window.
    pub fn min(&self) -> DateTime<Utc> {
        self.min
    }

    /// Upper bound of the window.
    pub fn max(&self) -> DateTime<Utc> {
        self.max
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.max - self.min
    }

    /// Checks if a datetime falls within this window (both ends inclusive).
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.min <= dt && dt <= self.max
    }
}

fn next_local_midnight(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    // Walk forward in small steps to get out of a DST gap.
    (0..=4).find_map(|quarter| {
        tz.from_local_datetime(&(midnight + Duration::minutes(quarter * 15)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Supplies wall-clock and monotonic time to the daemon.
///
/// The wall clock starts out as the host clock and is corrected once at
/// startup from a network time service via [`TimeSource::set_wall_clock`].
/// The monotonic reading is used for token expiry and is never adjusted.
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time since the clock was created.
    fn monotonic(&self) -> std::time::Duration;

    /// Sets the wall clock to the given Unix timestamp.
    fn set_wall_clock(&self, unix_secs: i64);

    /// The device timezone.
    fn timezone(&self) -> Tz;

    /// Current wall-clock time in the device timezone.
    fn local_now(&self) -> DateTime<Tz> {
        self.now().with_timezone(&self.timezone())
    }
}

/// The host clock, corrected by an offset learned from network time.
#[derive(Debug)]
pub struct DeviceClock {
    origin: Instant,
    offset: RwLock<Duration>,
    timezone: Tz,
}

impl DeviceClock {
    /// Creates a clock for the given timezone with no correction applied.
    pub fn new(timezone: Tz) -> Self {
        Self {
            origin: Instant::now(),
            offset: RwLock::new(Duration::zero()),
            timezone,
        }
    }

    /// The correction currently applied on top of the host clock.
    pub fn offset(&self) -> Duration {
        *self.offset.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimeSource for DeviceClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.offset()
    }

    fn monotonic(&self) -> std::time::Duration {
        self.origin.elapsed()
    }

    fn set_wall_clock(&self, unix_secs: i64) {
        let host = Utc::now();
        let target = DateTime::from_timestamp(unix_secs, 0).unwrap_or(host);
        *self.offset.write().unwrap_or_else(PoisonError::into_inner) = target - host;
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// A hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
    timezone: Tz,
}

#[derive(Debug, Clone, Copy)]
struct ManualState {
    now: DateTime<Utc>,
    monotonic: std::time::Duration,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    pub fn new(now: DateTime<Utc>, timezone: Tz) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now,
                monotonic: std::time::Duration::ZERO,
            }),
            timezone,
        }
    }

    /// Advances both the wall and the monotonic clock.
    pub fn advance(&self, by: std::time::Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.monotonic += by;
        state.now += Duration::from_std(by).unwrap_or(Duration::MAX);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).now
    }

    fn monotonic(&self) -> std::time::Duration {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).monotonic
    }

    fn set_wall_clock(&self, unix_secs: i64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dt) = DateTime::from_timestamp(unix_secs, 0) {
            state.now = dt;
        }
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}
