//! Display formatting for calendar events.
//!
//! [`EventFormatter`] turns a [`CalendarEvent`] into a [`DisplaySlot`]:
//! - all-day events show only their date (`Mar 1`)
//! - timed events show the wall-clock time as written by the calendar API,
//!   in 12-hour (`2:30pm`) or 24-hour (`14:30`) form
//! - long names are cut with an ellipsis
//!
//! It also renders the title row date (`Friday Mar 01, 2024`).
//!
//! # Example
//!
//! ```rust
//! use calpanel_core::format::{EventFormatter, FormatOptions, TimeFormat};
//! use calpanel_core::{CalendarEvent, EventTime};
//!
//! let formatter = EventFormatter::new(FormatOptions::default().with_time_format(TimeFormat::H12));
//! let event = CalendarEvent::new(
//!     "Team Sync",
//!     EventTime::parse_date_time("2024-03-01T14:30:00Z").unwrap(),
//! );
//! let slot = formatter.format(&event);
//! assert_eq!(slot.time_text, "2:30pm");
//! assert_eq!(slot.name_text, "Team Sync");
//! ```


use std::borrow::Cow;
use std::fmt::Display;

use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::event::{CalendarEvent, DisplaySlot};
use crate::time::EventTime;

/// Default maximum event name length before truncation.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 42;

/// Marker appended to truncated names.
const ELLIPSIS: &str = "...";

/// Time format preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// 12-hour format with am/pm suffix (e.g., "2:30pm").
    #[default]
    H12,
    /// 24-hour format (e.g., "14:30").
    H24,
}

/// Configuration options for event formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Maximum length for event names (truncated with ellipsis).
    pub max_name_length: usize,
    /// Time format preference.
    pub time_format: TimeFormat,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            time_format: TimeFormat::H12,
        }
    }
}

impl FormatOptions {
    /// Builder: set the name truncation threshold.
    #[must_use]
    pub fn with_max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }

    /// Builder: set the time format.
    #[must_use]
    pub fn with_time_format(mut self, format: TimeFormat) -> Self {
        self.time_format = format;
        self
    }
}

/// Formats events into display slots.
#[derive(Debug, Clone, Default)]
pub struct EventFormatter {
    options: FormatOptions,
}

impl EventFormatter {
    /// Creates a new formatter with the given options.
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Returns the formatting options.
    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Formats a single event. Pure: the same event always yields the same slot.
    pub fn format(&self, event: &CalendarEvent) -> DisplaySlot {
        DisplaySlot {
            time_text: self.format_start(&event.start),
            name_text: self.format_name(&event.summary).into_owned(),
        }
    }

    /// Formats every event, preserving order.
    pub fn format_all(&self, events: &[CalendarEvent]) -> Vec<DisplaySlot> {
        events.iter().map(|e| self.format(e)).collect()
    }

    /// Renders the time label for an event start.
    pub fn format_start(&self, start: &EventTime) -> String {
        match start {
            EventTime::AllDay(date) => date.format("%b %-d").to_string(),
            EventTime::DateTime(dt) => {
                clock_time(dt.hour(), dt.minute(), self.options.time_format)
            }
        }
    }

    /// Truncates a name to the configured maximum length.
    pub fn format_name<'a>(&self, name: &'a str) -> Cow<'a, str> {
        ellipsis(name, self.options.max_name_length)
    }

    /// Renders the title row date, e.g. `Friday Mar 01, 2024`.
    pub fn header<Tz>(&self, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        now.format("%A %b %d, %Y").to_string()
    }
}

/// Renders an hour/minute pair.
///
/// In 12-hour form midnight is `12:xxam`, noon is `12:xxpm` and 13-23 map to
/// 1-11pm. The hour is not zero-padded.
pub fn clock_time(hour: u32, minute: u32, format: TimeFormat) -> String {
    match format {
        TimeFormat::H24 => format!("{:02}:{:02}", hour, minute),
        TimeFormat::H12 => {
            let suffix = if hour >= 12 { "pm" } else { "am" };
            let h = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("{}:{:02}{}", h, minute, suffix)
        }
    }
}

/// Truncates a string with ellipsis if it exceeds the given length.
///
/// The result is at most `max_len` characters, including the three-character
/// marker. Counting is by `char`, not by grapheme or word.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }

    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }

    let truncated: String = s.chars().take(max_len.saturating_sub(ELLIPSIS.len())).collect();
    Cow::Owned(format!("{}{}", truncated, ELLIPSIS))
}
