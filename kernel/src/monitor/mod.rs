/// Interactive debug monitor.
///
/// Takes over the text display and the PS/2 keyboard and runs a small
/// command loop for low-level diagnostics. It carries its own display
/// driver, scancode translator, line reader and tokenizer so it keeps
/// working when the rest of the kernel's console stack does not. No heap,
/// no interrupts: input is polled, output is written straight to video
/// memory.
///
/// A session goes `Idle -> Entering -> Running -> Exiting -> Idle`. Entering
/// saves the screen and cursor and resets the keyboard modifiers; exiting
/// puts the screen back exactly as it was.
///
/// The `Monitor` instance is the only copy of the display, modifier and
/// snapshot state, so the kernel keeps it behind a `spin::Mutex`: that lock
/// is the cross-core session token. `enter` needs `&mut self`, i.e. the lock
/// held. Re-entering from the core already inside a session deadlocks and is
/// the caller's problem.
pub mod bench;
pub mod commands;
pub mod console;
pub mod keyboard;
pub mod line;
pub mod machine;
pub mod vga;

#[cfg(not(test))]
pub mod hw;

#[cfg(test)]
pub mod mock;

use crate::config::{ENTRY_BANNER, PROMPT};

use commands::{dispatch, Flow};
use console::{Console, Mirror, Terminal};
use keyboard::Translator;
use line::{CommandBuffer, KeyboardController};
use machine::Machine;
use vga::{Display, TextScreen, COMMAND_ATTR, PROMPT_ATTR};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Entering,
    Running,
    Exiting,
}

/// Summary of a finished session, for the kernel log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Non-empty lines read.
    pub lines: u32,
    /// Lines whose first word matched a command.
    pub commands: u32,
}

pub struct Monitor<S: TextScreen, K: KeyboardController, M: Mirror> {
    console: Console<S, M>,
    keyboard: K,
    translator: Translator,
    line: CommandBuffer,
    phase: Phase,
}

impl<S: TextScreen, K: KeyboardController, M: Mirror> Monitor<S, K, M> {
    pub fn new(display: Display<S>, keyboard: K, mirror: M) -> Self {
        Self {
            console: Console::new(display, mirror),
            keyboard,
            translator: Translator::new(),
            line: CommandBuffer::new(),
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn console(&self) -> &Console<S, M> {
        &self.console
    }

    /// The display, for the kernel to draw on outside of sessions.
    pub fn display_mut(&mut self) -> &mut Display<S> {
        self.console.display_mut()
    }

    /// Run one full session. Blocks until a command asks to quit.
    pub fn enter(&mut self, machine: &mut dyn Machine) -> SessionReport {
        self.phase = Phase::Entering;
        let saved = self.console.display().snapshot();
        self.translator.reset();

        let display = self.console.display_mut();
        display.set_cursor(0, 0);
        display.set_attribute(PROMPT_ATTR);
        display.clear(PROMPT_ATTR);

        self.console.set_attribute(COMMAND_ATTR);
        self.console.println(ENTRY_BANNER);
        self.console.set_attribute(PROMPT_ATTR);

        self.phase = Phase::Running;
        let report = self.run(machine);

        self.phase = Phase::Exiting;
        self.console.display_mut().restore(&saved);
        self.phase = Phase::Idle;
        report
    }

    fn run(&mut self, machine: &mut dyn Machine) -> SessionReport {
        let mut report = SessionReport::default();
        loop {
            self.console.print(PROMPT);
            let line = self
                .line
                .read_line(&mut self.keyboard, &mut self.translator, &mut self.console);
            self.console.put_byte(b'\n');

            if line.trim_matches([' ', '\t']).is_empty() {
                continue;
            }
            report.lines += 1;
            if commands::Tokenizer::new(line)
                .next()
                .and_then(commands::lookup)
                .is_some()
            {
                report.commands += 1;
            }

            if dispatch(line, &mut self.console, machine) == Flow::Quit {
                return report;
            }
        }
    }
}
