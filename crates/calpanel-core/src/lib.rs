//! Core types: time, events, formatting, tracing

pub mod event;
pub mod format;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvent, DisplaySlot, UNTITLED_EVENT};
pub use format::{ellipsis, EventFormatter, FormatOptions, TimeFormat};
pub use time::{DeviceClock, EventTime, InvalidWindow, Lookahead, ManualClock, TimeSource, TimeWindow};
pub use self::tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
