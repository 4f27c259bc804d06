//! Event types for the calendar panel.
//!
//! - [`CalendarEvent`]: an upcoming event as returned by the calendar API
//! - [`DisplaySlot`]: one (time, name) row of the panel

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// Title used for events that come back without a summary.
pub const UNTITLED_EVENT: &str = "(No title)";

/// An upcoming calendar event.
///
/// Events are transient: they live for the duration of one polling cycle and
/// are dropped once formatted into display slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Event title.
    pub summary: String,
    /// When the event starts.
    pub start: EventTime,
}

impl CalendarEvent {
    /// Creates a new event.
    pub fn new(summary: impl Into<String>, start: EventTime) -> Self {
        Self {
            summary: summary.into(),
            start,
        }
    }

    /// Returns true if the event has no time of day.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}

/// A display-ready row: the time label and the name label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySlot {
    /// Rendered start time (or date for all-day events).
    pub time_text: String,
    /// Rendered, possibly truncated, event name.
    pub name_text: String,
}

impl DisplaySlot {
    /// Creates a populated slot.
    pub fn new(time_text: impl Into<String>, name_text: impl Into<String>) -> Self {
        Self {
            time_text: time_text.into(),
            name_text: name_text.into(),
        }
    }

    /// Returns true if both labels are cleared.
    pub fn is_empty(&self) -> bool {
        self.time_text.is_empty() && self.name_text.is_empty()
    }

    /// Clears both labels.
    pub fn clear(&mut self) {
        self.time_text.clear();
        self.name_text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn all_day_detection() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let event = CalendarEvent::new("Holiday", EventTime::from_date(date));
        assert!(event.is_all_day());

        let timed = CalendarEvent::new(
            "Team Sync",
            EventTime::parse_date_time("2024-03-01T14:30:00Z").unwrap(),
        );
        assert!(!timed.is_all_day());
    }

    #[test]
    fn slot_clear() {
        let mut slot = DisplaySlot::new("2:30pm", "Team Sync");
        assert!(!slot.is_empty());
        slot.clear();
        assert!(slot.is_empty());
        assert_eq!(slot, DisplaySlot::default());
    }
}
