/// In-memory stand-ins for the screen, keyboard, debug port and kernel
/// services, for host-side tests.
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;

use crate::config::{SCREEN_CELLS, SCREEN_WIDTH};
use crate::power::{CounterKind, PowerCounter, PowerError, COUNTER_UNAVAILABLE};

use super::bench::MemoryWindow;
use super::console::Mirror;
use super::keyboard::{lookup, Modifiers, TABLE_LEN};
use super::line::{KeyboardController, STATUS_OUTPUT_FULL};
use super::machine::Machine;
use super::vga::TextScreen;

/// RAM-backed text framebuffer.
pub struct RamScreen {
    cells: Vec<u16>,
    hw_cursor: u16,
}

impl RamScreen {
    pub fn new() -> Self {
        Self::filled(0)
    }

    pub fn filled(cell: u16) -> Self {
        Self {
            cells: vec![cell; SCREEN_CELLS],
            hw_cursor: 0,
        }
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    pub fn hw_cursor(&self) -> u16 {
        self.hw_cursor
    }

    /// Characters of row `y`, trailing blanks trimmed.
    pub fn row_text(&self, y: usize) -> String {
        let row = &self.cells[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH];
        let text: String = row.iter().map(|&c| (c as u8) as char).collect();
        String::from(text.trim_end_matches([' ', '\0']))
    }
}

impl TextScreen for RamScreen {
    fn read_cell(&self, index: usize) -> u16 {
        self.cells[index]
    }

    fn write_cell(&mut self, index: usize, cell: u16) {
        self.cells[index] = cell;
    }

    fn set_hw_cursor(&mut self, pos: u16) {
        self.hw_cursor = pos;
    }
}

/// Keyboard that replays a fixed scancode script. Polls between bytes report
/// "empty" once, so the busy-wait path is exercised. Panics when the script
/// runs dry instead of spinning forever.
pub struct ScriptedKeyboard {
    codes: Vec<u8>,
    pos: usize,
    ready: bool,
}

impl ScriptedKeyboard {
    pub fn new(codes: Vec<u8>) -> Self {
        Self { codes, pos: 0, ready: false }
    }

    pub fn remaining(&self) -> usize {
        self.codes.len() - self.pos
    }
}

impl KeyboardController for ScriptedKeyboard {
    fn status(&mut self) -> u8 {
        assert!(self.pos < self.codes.len(), "keyboard script exhausted");
        self.ready = !self.ready;
        if self.ready {
            STATUS_OUTPUT_FULL
        } else {
            0
        }
    }

    fn read_data(&mut self) -> u8 {
        let code = self.codes[self.pos];
        self.pos += 1;
        code
    }
}

const LEFT_SHIFT: u8 = 0x2A;
const ENTER: u8 = 0x1C;
const RELEASE: u8 = 0x80;

/// Press-release pair.
pub fn tap(code: u8) -> [u8; 2] {
    [code, code | RELEASE]
}

fn scancode_for(ch: u8) -> (u8, bool) {
    for shifted in [false, true] {
        let mods = if shifted { Modifiers::SHIFT } else { Modifiers::empty() };
        for code in 0..TABLE_LEN as u8 {
            if lookup(mods, code) == ch as u16 {
                return (code, shifted);
            }
        }
    }
    panic!("no scancode for {:?}", ch as char);
}

/// Scancodes that type `text` on a US layout, without pressing enter.
pub fn keys_for(text: &str) -> Vec<u8> {
    let mut codes = Vec::new();
    for ch in text.bytes() {
        let (code, shifted) = scancode_for(ch);
        if shifted {
            codes.push(LEFT_SHIFT);
        }
        codes.extend_from_slice(&tap(code));
        if shifted {
            codes.push(LEFT_SHIFT | RELEASE);
        }
    }
    codes
}

/// Scancodes that type `text` and press enter.
pub fn line_keys(text: &str) -> Vec<u8> {
    let mut codes = keys_for(text);
    codes.extend_from_slice(&tap(ENTER));
    codes
}

/// Mirror that records every byte.
#[derive(Default)]
pub struct Transcript {
    bytes: Vec<u8>,
}

impl Transcript {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl Mirror for Transcript {
    fn mirror_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }
}

/// Energy counter that advances by `step` on every read of a valid domain.
pub struct FakePower {
    valid: [bool; 4],
    value: Cell<u64>,
    step: u64,
}

impl FakePower {
    pub fn package_only(step: u64) -> Self {
        Self {
            valid: [true, false, false, false],
            value: Cell::new(0x1000),
            step,
        }
    }

    pub fn absent() -> Self {
        Self {
            valid: [false; 4],
            value: Cell::new(0),
            step: 0,
        }
    }
}

impl PowerCounter for FakePower {
    fn init(&mut self) -> Result<(), PowerError> {
        Ok(())
    }

    fn is_valid(&self, kind: CounterKind) -> bool {
        self.valid[kind as usize]
    }

    fn read(&self, kind: CounterKind) -> u64 {
        if !self.is_valid(kind) {
            return COUNTER_UNAVAILABLE;
        }
        let v = self.value.get() + self.step;
        self.value.set(v);
        v
    }

    fn energy_divisor(&self) -> u64 {
        1 << 14
    }
}

/// Window where every word holds its own index plus one.
pub struct IndexWindow;

impl MemoryWindow for IndexWindow {
    fn read_word(&self, index: usize) -> u64 {
        index as u64 + 1
    }
}

/// Records calls; the cycle counter advances by 10 on every read.
pub struct FakeMachine {
    pub paging: bool,
    pub paging_calls: u32,
    pub faults: u32,
    pub flushes: u32,
    cycle: Cell<u64>,
    pub power: FakePower,
    has_window: bool,
}

impl FakeMachine {
    pub fn new() -> Self {
        Self::with_power(FakePower::package_only(7))
    }

    pub fn with_power(power: FakePower) -> Self {
        Self {
            paging: false,
            paging_calls: 0,
            faults: 0,
            flushes: 0,
            cycle: Cell::new(0),
            power,
            has_window: true,
        }
    }

    /// A machine whose benchmark window has no RAM behind it.
    pub fn without_window() -> Self {
        Self {
            has_window: false,
            ..Self::new()
        }
    }
}

impl Machine for FakeMachine {
    fn enable_paging(&mut self) {
        self.paging = true;
        self.paging_calls += 1;
    }

    fn paging_enabled(&self) -> bool {
        self.paging
    }

    fn inject_page_fault(&mut self) {
        self.faults += 1;
    }

    fn cycles(&self) -> u64 {
        let c = self.cycle.get() + 10;
        self.cycle.set(c);
        c
    }

    fn flush_tlb(&mut self) {
        self.flushes += 1;
    }

    fn power(&self) -> &dyn PowerCounter {
        &self.power
    }

    fn window(&self) -> Option<&dyn MemoryWindow> {
        if self.has_window {
            Some(&IndexWindow)
        } else {
            None
        }
    }
}
