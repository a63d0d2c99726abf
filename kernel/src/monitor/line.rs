/// Blocking line input from the PS/2 keyboard.
///
/// Polls the controller status register, translates each scancode and
/// echoes accepted characters. There is no timeout: a session with no
/// keyboard activity waits here forever.
///
/// Accepted input:
/// - Printable ASCII and tab, echoed as typed
/// - Enter (carriage return, with or without modifiers) submits the line
///
/// Special keys and other control characters are dropped. When the buffer
/// is full the line is submitted as-is and the key that overflowed it is lost.
use crate::config::COMMAND_CAPACITY;

use super::console::Terminal;
use super::keyboard::Translator;

/// Status register bit 0: output buffer full, a byte is waiting at the data port.
pub const STATUS_OUTPUT_FULL: u8 = 0x01;

/// Raw access to the keyboard controller.
pub trait KeyboardController {
    fn status(&mut self) -> u8;
    fn read_data(&mut self) -> u8;
}

/// Spin until the controller has a byte, then read it.
pub fn wait_for_scancode<K: KeyboardController>(kbd: &mut K) -> u8 {
    while kbd.status() & STATUS_OUTPUT_FULL == 0 {
        core::hint::spin_loop();
    }
    kbd.read_data()
}

/// Bounded command buffer, reused for every line of a session.
pub struct CommandBuffer {
    buf: [u8; COMMAND_CAPACITY],
    len: usize,
}

impl CommandBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0u8; COMMAND_CAPACITY],
            len: 0,
        }
    }

    /// Longest line the buffer accepts (one slot stays reserved for the
    /// terminator of the on-screen protocol).
    pub const fn max_len() -> usize {
        COMMAND_CAPACITY - 1
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    /// Read one line, echoing to `term`. The previous contents are discarded.
    pub fn read_line<K, T>(&mut self, kbd: &mut K, translator: &mut Translator, term: &mut T) -> &str
    where
        K: KeyboardController,
        T: Terminal + ?Sized,
    {
        self.len = 0;

        loop {
            let key = translator.translate(wait_for_scancode(kbd));
            if key.is_none() || key.is_special() {
                continue;
            }

            let ch = key.char_byte();
            if ch == b'\r' {
                break;
            }
            if !(ch == b'\t' || (0x20..=0x7E).contains(&ch)) {
                continue;
            }

            if self.len < Self::max_len() {
                self.buf[self.len] = ch;
                self.len += 1;
                term.put_byte(ch);
            } else {
                break;
            }
        }

        self.as_str()
    }
}
