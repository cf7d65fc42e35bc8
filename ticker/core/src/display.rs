//! Character Display Drivers
//!
//! The [`Display`] trait is the whole hardware surface the ticker needs: clear,
//! write a frame, and toggle backlight, cursor and blink. Calls are
//! synchronous and expected to return quickly.
//!
//! The display is a single shared resource. Drivers do not serialize writers
//! themselves; the controller guarantees that at most one viewer activation
//! writes at a time.
//!
//! # Drivers
//!
//! - [`ConsoleDisplay`]: draws a character LCD in the terminal
//! - [`RecordingDisplay`]: records every operation, for tests

use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::cursor::{Hide, MoveTo, SetCursorStyle, Show};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};
use parking_lot::Mutex;
use thiserror::Error;

/// Errors reported by display drivers
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Underlying device or terminal I/O failed
    #[error("Display I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Driver is not usable (disconnected, shut down)
    #[error("Display unavailable: {0}")]
    Unavailable(String),
}

/// Character display driver
pub trait Display: Send + Sync {
    /// Blank every cell and home the write position
    fn clear(&self) -> Result<(), DisplayError>;

    /// Write a frame starting at the home position; rows are `\n`-separated
    fn write(&self, text: &str) -> Result<(), DisplayError>;

    /// Turn the backlight on
    fn backlight_on(&self) -> Result<(), DisplayError>;

    /// Turn the backlight off
    fn backlight_off(&self) -> Result<(), DisplayError>;

    /// Show the cursor
    fn cursor_on(&self) -> Result<(), DisplayError>;

    /// Hide the cursor
    fn cursor_off(&self) -> Result<(), DisplayError>;

    /// Make the cursor blink
    fn blink_on(&self) -> Result<(), DisplayError>;

    /// Stop the cursor blinking
    fn blink_off(&self) -> Result<(), DisplayError>;
}

#[derive(Debug)]
struct ConsoleState {
    out: Stdout,
    backlight: bool,
}

/// Character LCD emulated in the terminal
///
/// The panel occupies the top-left `cols × rows` cells. With the backlight
/// off, text is drawn dimmed.
pub struct ConsoleDisplay {
    cols: u16,
    rows: u16,
    state: Mutex<ConsoleState>,
}

impl ConsoleDisplay {
    /// Create a console panel of the given size
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            state: Mutex::new(ConsoleState {
                out: io::stdout(),
                backlight: false,
            }),
        }
    }

    fn fit(&self, line: &str) -> String {
        let cols = usize::from(self.cols);
        let mut cell: String = line.chars().take(cols).collect();
        let used = cell.chars().count();
        cell.extend(std::iter::repeat(' ').take(cols - used));
        cell
    }
}

impl Display for ConsoleDisplay {
    fn clear(&self) -> Result<(), DisplayError> {
        let mut state = self.state.lock();
        execute!(state.out, Clear(ClearType::All), MoveTo(0, 0))?;
        Ok(())
    }

    fn write(&self, text: &str) -> Result<(), DisplayError> {
        let mut state = self.state.lock();
        let dim = !state.backlight;
        if dim {
            queue!(state.out, SetAttribute(Attribute::Dim))?;
        }
        for (row, line) in (0..self.rows).zip(text.split('\n')) {
            let cell = self.fit(line);
            queue!(state.out, MoveTo(0, row), Print(cell))?;
        }
        if dim {
            queue!(state.out, SetAttribute(Attribute::Reset))?;
        }
        state.out.flush()?;
        Ok(())
    }

    fn backlight_on(&self) -> Result<(), DisplayError> {
        self.state.lock().backlight = true;
        Ok(())
    }

    fn backlight_off(&self) -> Result<(), DisplayError> {
        self.state.lock().backlight = false;
        Ok(())
    }

    fn cursor_on(&self) -> Result<(), DisplayError> {
        let mut state = self.state.lock();
        execute!(state.out, Show)?;
        Ok(())
    }

    fn cursor_off(&self) -> Result<(), DisplayError> {
        let mut state = self.state.lock();
        execute!(state.out, Hide)?;
        Ok(())
    }

    fn blink_on(&self) -> Result<(), DisplayError> {
        let mut state = self.state.lock();
        execute!(state.out, SetCursorStyle::BlinkingBlock)?;
        Ok(())
    }

    fn blink_off(&self) -> Result<(), DisplayError> {
        let mut state = self.state.lock();
        execute!(state.out, SetCursorStyle::SteadyBlock)?;
        Ok(())
    }
}

/// One operation performed on a [`RecordingDisplay`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayOp {
    /// `clear()`
    Clear,
    /// `write(text)`
    Write(String),
    /// `backlight_on()`
    BacklightOn,
    /// `backlight_off()`
    BacklightOff,
    /// `cursor_on()`
    CursorOn,
    /// `cursor_off()`
    CursorOff,
    /// `blink_on()`
    BlinkOn,
    /// `blink_off()`
    BlinkOff,
}

/// Display that records operations instead of drawing
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    ops: Mutex<Vec<DisplayOp>>,
    fail_writes: AtomicBool,
}

impl RecordingDisplay {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `write` fail with [`DisplayError::Unavailable`] (not recorded)
    /// until turned back off
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every operation so far, in order
    #[must_use]
    pub fn ops(&self) -> Vec<DisplayOp> {
        self.ops.lock().clone()
    }

    /// Every written frame so far, in order
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                DisplayOp::Write(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `write` calls so far
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, DisplayOp::Write(_)))
            .count()
    }

    /// Most recent frame
    #[must_use]
    pub fn last_write(&self) -> Option<String> {
        self.ops.lock().iter().rev().find_map(|op| match op {
            DisplayOp::Write(text) => Some(text.clone()),
            _ => None,
        })
    }

    fn record(&self, op: DisplayOp) -> Result<(), DisplayError> {
        self.ops.lock().push(op);
        Ok(())
    }
}

impl Display for RecordingDisplay {
    fn clear(&self) -> Result<(), DisplayError> {
        self.record(DisplayOp::Clear)
    }

    fn write(&self, text: &str) -> Result<(), DisplayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DisplayError::Unavailable("writes disabled".to_string()));
        }
        self.record(DisplayOp::Write(text.to_string()))
    }

    fn backlight_on(&self) -> Result<(), DisplayError> {
        self.record(DisplayOp::BacklightOn)
    }

    fn backlight_off(&self) -> Result<(), DisplayError> {
        self.record(DisplayOp::BacklightOff)
    }

    fn cursor_on(&self) -> Result<(), DisplayError> {
        self.record(DisplayOp::CursorOn)
    }

    fn cursor_off(&self) -> Result<(), DisplayError> {
        self.record(DisplayOp::CursorOff)
    }

    fn blink_on(&self) -> Result<(), DisplayError> {
        self.record(DisplayOp::BlinkOn)
    }

    fn blink_off(&self) -> Result<(), DisplayError> {
        self.record(DisplayOp::BlinkOff)
    }
}
