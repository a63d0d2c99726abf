/// Monitor output: the display plus a byte mirror.
///
/// Everything the monitor prints lands on the text display and is copied to
/// a `Mirror` (the debug console port on real hardware), so a session can be
/// followed from the host even when the screen is not visible.
use core::fmt;

use super::vga::{Attribute, Display, TextScreen};

/// Secondary byte sink for monitor output.
pub trait Mirror {
    fn mirror_byte(&mut self, byte: u8);
}

/// Mirror that drops everything.
pub struct NoMirror;

impl Mirror for NoMirror {
    fn mirror_byte(&mut self, _byte: u8) {}
}

/// What command handlers get to print with.
pub trait Terminal: fmt::Write {
    fn put_byte(&mut self, byte: u8);

    fn set_attribute(&mut self, attr: Attribute);

    fn print(&mut self, s: &str) {
        for b in s.bytes() {
            self.put_byte(b);
        }
    }

    fn println(&mut self, s: &str) {
        self.print(s);
        self.put_byte(b'\n');
    }
}

pub struct Console<S: TextScreen, M: Mirror> {
    display: Display<S>,
    mirror: M,
}

impl<S: TextScreen, M: Mirror> Console<S, M> {
    pub fn new(display: Display<S>, mirror: M) -> Self {
        Self { display, mirror }
    }

    pub fn display(&self) -> &Display<S> {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut Display<S> {
        &mut self.display
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }
}

impl<S: TextScreen, M: Mirror> Terminal for Console<S, M> {
    fn put_byte(&mut self, byte: u8) {
        self.display.write_char(byte);
        self.mirror.mirror_byte(byte);
    }

    fn set_attribute(&mut self, attr: Attribute) {
        self.display.set_attribute(attr);
    }
}

impl<S: TextScreen, M: Mirror> fmt::Write for Console<S, M> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s);
        Ok(())
    }
}
