//! The display board and the surfaces that draw it.
//!
//! [`DisplayBoard`] is the in-memory model of the panel: a title row with the
//! date, a fixed number of event slots and a status indicator. The scheduler
//! replaces its slots in one step per cycle; a [`DisplaySurface`] then draws
//! the whole board.

use std::fmt::Write as _;
use std::io::{self, Write};

use calpanel_core::DisplaySlot;
use tracing::warn;

/// Status indicator color for success (green).
pub const STATUS_OK_COLOR: u32 = 0x00FF00;

/// Status indicator color for failure (red).
pub const STATUS_ERROR_COLOR: u32 = 0xFF0000;

/// Text shown after a successful cycle.
pub const SUCCESS_TEXT: &str = "Success: Get calendar";

/// Severity of the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Last cycle succeeded.
    Ok,
    /// Last cycle failed.
    Error,
}

/// The status indicator: a colored line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Severity.
    pub kind: StatusKind,
    /// Text shown next to the indicator.
    pub message: String,
}

impl Status {
    /// A success status.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Ok,
            message: message.into(),
        }
    }

    /// An error status.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }

    /// The status shown after a complete sync cycle.
    pub fn success() -> Self {
        Self::ok(SUCCESS_TEXT)
    }

    /// RGB color of the indicator.
    pub fn color(&self) -> u32 {
        match self.kind {
            StatusKind::Ok => STATUS_OK_COLOR,
            StatusKind::Error => STATUS_ERROR_COLOR,
        }
    }

    /// Returns true for an error status.
    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

/// Fixed-capacity panel model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBoard {
    header: String,
    slots: Vec<DisplaySlot>,
    status: Option<Status>,
}

impl DisplayBoard {
    /// Creates a board with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            header: String::new(),
            slots: vec![DisplaySlot::default(); capacity],
            status: None,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// All slots, populated ones first.
    pub fn slots(&self) -> &[DisplaySlot] {
        &self.slots
    }

    /// Number of non-empty slots.
    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// The title row.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Replaces the title row.
    pub fn set_header(&mut self, header: impl Into<String>) {
        self.header = header.into();
    }

    /// The current status, if any cycle has finished.
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// Replaces the status indicator.
    pub fn set_status(&mut self, status: Status) {
        self.status = Some(status);
    }

    /// Replaces every slot at once.
    ///
    /// Slot `i` gets `slots[i]`; slots past the end of `slots` are cleared.
    /// Entries beyond the board capacity are dropped. Returns the number of
    /// populated slots.
    pub fn commit(&mut self, slots: Vec<DisplaySlot>) -> usize {
        if slots.len() > self.capacity() {
            warn!(
                given = slots.len(),
                capacity = self.capacity(),
                "more events than display slots, dropping the rest"
            );
        }

        let mut incoming = slots.into_iter();
        let mut count = 0;
        for slot in &mut self.slots {
            match incoming.next() {
                Some(new) => {
                    *slot = new;
                    count += 1;
                }
                None => slot.clear(),
            }
        }
        count
    }
}

/// Something that can draw a [`DisplayBoard`].
pub trait DisplaySurface: Send {
    /// Draws the whole board.
    fn render(&mut self, board: &DisplayBoard) -> io::Result<()>;
}

/// Draws the board as text on a terminal or any writer.
#[derive(Debug)]
pub struct TerminalDisplay<W> {
    out: W,
    color: bool,
}

impl TerminalDisplay<io::Stdout> {
    /// A display on standard output.
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> TerminalDisplay<W> {
    /// A display on `out`. With `color`, the status line uses ANSI colors.
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    /// Consumes the display and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplaySurface for TerminalDisplay<W> {
    fn render(&mut self, board: &DisplayBoard) -> io::Result<()> {
        self.out.write_all(render_text(board, self.color).as_bytes())?;
        self.out.flush()
    }
}

/// Renders the board as plain lines: header, slots, status.
pub fn render_text(board: &DisplayBoard, color: bool) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", board.header());

    let width = board
        .slots()
        .iter()
        .map(|s| s.time_text.chars().count())
        .max()
        .unwrap_or(0);
    for slot in board.slots() {
        if slot.is_empty() {
            let _ = writeln!(text, "-");
        } else {
            let _ = writeln!(text, "{:<width$}  {}", slot.time_text, slot.name_text);
        }
    }

    if let Some(status) = board.status() {
        let marker = match status.kind {
            StatusKind::Ok => "[ok]",
            StatusKind::Error => "[error]",
        };
        if color {
            let (r, g, b) = rgb(status.color());
            let _ = writeln!(
                text,
                "\x1b[38;2;{};{};{}m{}\x1b[0m {}",
                r, g, b, marker, status.message
            );
        } else {
            let _ = writeln!(text, "{} {}", marker, status.message);
        }
    }

    text
}

fn rgb(color: u32) -> (u8, u8, u8) {
    let [_, r, g, b] = color.to_be_bytes();
    (r, g, b)
}
