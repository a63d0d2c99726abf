/// Text-mode display driver owned by the monitor.
///
/// The monitor keeps its own copy of the text driver so it works even when
/// the kernel console is wedged. Cells are 16 bits: character in the low
/// byte, attribute in the high byte. The logical cursor is mirrored to the
/// CRTC cursor registers on every move.
///
/// No bounds checks beyond debug assertions: callers pass coordinates inside
/// the screen.
use crate::config::{SCREEN_CELLS, SCREEN_HEIGHT, SCREEN_WIDTH};

/// The 16 text-mode colours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGrey = 7,
    DarkGrey = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    LightMagenta = 13,
    Yellow = 14,
    White = 15,
}

/// Packed attribute byte: foreground in bits 3:0, background in bits 7:4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct Attribute(u8);

impl Attribute {
    pub const fn new(fg: Color, bg: Color) -> Self {
        Self(fg as u8 | (bg as u8) << 4)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn foreground(self) -> u8 {
        self.0 & 0x0F
    }

    pub const fn background(self) -> u8 {
        self.0 >> 4
    }
}

/// Diagnostic and system text.
pub const COMMAND_ATTR: Attribute = Attribute::new(Color::LightCyan, Color::Black);
/// Prompt and user echo.
pub const PROMPT_ATTR: Attribute = Attribute::new(Color::Yellow, Color::Black);

/// Encode a character and attribute into one screen cell.
#[inline]
pub const fn make_cell(ch: u8, attr: Attribute) -> u16 {
    ch as u16 | (attr.0 as u16) << 8
}

/// Raw access to a text framebuffer and its hardware cursor.
///
/// The real implementation writes video memory and the CRTC; tests use
/// `mock::RamScreen`.
pub trait TextScreen {
    /// Read the cell at linear index `index` (row-major).
    fn read_cell(&self, index: usize) -> u16;

    /// Write the cell at linear index `index` (row-major).
    fn write_cell(&mut self, index: usize, cell: u16);

    /// Move the hardware caret to linear position `pos`.
    fn set_hw_cursor(&mut self, pos: u16);
}

/// Full copy of the framebuffer plus the cursor it was taken with.
#[derive(Clone)]
pub struct Snapshot {
    cells: [u16; SCREEN_CELLS],
    cursor: (usize, usize),
}

impl Snapshot {
    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }
}

/// Text display with a logical cursor and a current attribute.
pub struct Display<S: TextScreen> {
    screen: S,
    x: usize,
    y: usize,
    attr: Attribute,
}

impl<S: TextScreen> Display<S> {
    /// Wrap `screen`. The cursor starts at the origin; nothing is drawn.
    pub fn new(screen: S) -> Self {
        Self {
            screen,
            x: 0,
            y: 0,
            attr: Attribute::new(Color::LightGrey, Color::Black),
        }
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    pub fn attribute(&self) -> Attribute {
        self.attr
    }

    pub fn set_attribute(&mut self, attr: Attribute) {
        self.attr = attr;
    }

    /// Write one character at the cursor and advance.
    ///
    /// `\n` moves to column 0 of the next row. Reaching the last column wraps;
    /// running off the last row scrolls once and stays on the last row.
    pub fn write_char(&mut self, ch: u8) {
        if ch == b'\n' {
            self.x = 0;
            self.next_row();
        } else {
            self.screen
                .write_cell(self.y * SCREEN_WIDTH + self.x, make_cell(ch, self.attr));
            self.x += 1;
            if self.x == SCREEN_WIDTH {
                self.x = 0;
                self.next_row();
            }
        }
        self.sync_hw_cursor();
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_char(b);
        }
    }

    fn next_row(&mut self) {
        self.y += 1;
        if self.y == SCREEN_HEIGHT {
            self.scroll_up();
            self.y = SCREEN_HEIGHT - 1;
        }
    }

    /// Move every row but the first up by one and blank the last row with
    /// the current attribute. The cursor is left alone.
    pub fn scroll_up(&mut self) {
        for index in 0..SCREEN_CELLS - SCREEN_WIDTH {
            let cell = self.screen.read_cell(index + SCREEN_WIDTH);
            self.screen.write_cell(index, cell);
        }
        let blank = make_cell(b' ', self.attr);
        for index in SCREEN_CELLS - SCREEN_WIDTH..SCREEN_CELLS {
            self.screen.write_cell(index, blank);
        }
    }

    pub fn set_cursor(&mut self, x: usize, y: usize) {
        debug_assert!(x < SCREEN_WIDTH && y < SCREEN_HEIGHT);
        self.x = x;
        self.y = y;
        self.sync_hw_cursor();
    }

    /// Logical cursor; the CRTC registers are never read back.
    pub fn cursor(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    fn sync_hw_cursor(&mut self) {
        let pos = (self.y * SCREEN_WIDTH + self.x) as u16;
        self.screen.set_hw_cursor(pos);
    }

    /// Fill the whole screen with blanks under `fill`. The cursor does not move.
    pub fn clear(&mut self, fill: Attribute) {
        let blank = make_cell(b' ', fill);
        for index in 0..SCREEN_CELLS {
            self.screen.write_cell(index, blank);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut cells = [0u16; SCREEN_CELLS];
        for (index, cell) in cells.iter_mut().enumerate() {
            *cell = self.screen.read_cell(index);
        }
        Snapshot {
            cells,
            cursor: self.cursor(),
        }
    }

    /// Put back the framebuffer and cursor from `snapshot`. The current
    /// attribute is kept.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        for (index, &cell) in snapshot.cells.iter().enumerate() {
            self.screen.write_cell(index, cell);
        }
        let (x, y) = snapshot.cursor;
        self.set_cursor(x, y);
    }
}
