//! Line Scroller
//!
//! Turns fixed display lines into an endless sequence of frames for a
//! character display. Rows that fit are padded and stay still; rows wider
//! than the display scroll left one character per frame and wrap around
//! after a short gap.

/// Blank columns between the end of a scrolling row and its restart
pub const SCROLL_GAP: usize = 4;

#[derive(Clone, Debug)]
struct Row {
    chars: Vec<char>,
    offset: usize,
}

impl Row {
    fn new(line: &str) -> Self {
        Self {
            chars: line.chars().collect(),
            offset: 0,
        }
    }

    fn render(&self, width: usize) -> String {
        if self.chars.len() <= width {
            let mut out: String = self.chars.iter().collect();
            out.extend(std::iter::repeat(' ').take(width - self.chars.len()));
            return out;
        }

        let cycle = self.chars.len() + SCROLL_GAP;
        (0..width)
            .map(|col| {
                let pos = (self.offset + col) % cycle;
                self.chars.get(pos).copied().unwrap_or(' ')
            })
            .collect()
    }

    fn advance(&mut self, width: usize) {
        if self.chars.len() > width {
            self.offset = (self.offset + 1) % (self.chars.len() + SCROLL_GAP);
        }
    }
}

/// Produces successive scroll frames for a set of display lines
///
/// Each frame has one row per input line, padded to `width` characters and
/// joined with `\n`. The sequence is unbounded; [`Scroller::restart`] rewinds
/// it to the first frame.
#[derive(Clone, Debug)]
pub struct Scroller {
    rows: Vec<Row>,
    width: usize,
}

impl Scroller {
    /// Create a scroller over `lines` for a display `width` characters wide
    pub fn new<I, S>(lines: I, width: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rows: lines.into_iter().map(|l| Row::new(l.as_ref())).collect(),
            width,
        }
    }

    /// Render the current frame and advance every scrolling row
    pub fn next_frame(&mut self) -> String {
        let frame = self.current_frame();
        for row in &mut self.rows {
            row.advance(self.width);
        }
        frame
    }

    /// Render the current frame without advancing
    #[must_use]
    pub fn current_frame(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.render(self.width))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Rewind to the first frame
    pub fn restart(&mut self) {
        for row in &mut self.rows {
            row.offset = 0;
        }
    }

    /// Whether any row is wider than the display
    #[must_use]
    pub fn scrolls(&self) -> bool {
        self.rows.iter().any(|row| row.chars.len() > self.width)
    }
}

impl Iterator for Scroller {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.next_frame())
    }
}
