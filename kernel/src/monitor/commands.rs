/// Monitor command table and dispatch.
///
/// The first word of a line names the command; the rest of the line is
/// handed to the handler untouched. Names are matched case-sensitively in
/// table order and the first match wins, exclusively.
use core::fmt::Write;

use crate::power::CounterKind;

use super::bench::{self, BenchPlan};
use super::console::Terminal;
use super::machine::Machine;
use super::vga::{COMMAND_ATTR, PROMPT_ATTR};

/// Whether the session continues after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

impl Flow {
    pub fn is_quit(self) -> bool {
        self == Flow::Quit
    }
}

/// Word splitter over one line. Words are separated by runs of spaces and
/// tabs. A tokenizer lives for exactly one line, so no position leaks from
/// one command into the next.
pub struct Tokenizer<'a> {
    rest: &'a str,
}

const DELIMITERS: [char; 2] = [' ', '\t'];

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    /// Text after the last word returned, leading delimiters stripped.
    pub fn remainder(&self) -> &'a str {
        self.rest.trim_start_matches(DELIMITERS)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let s = self.rest.trim_start_matches(DELIMITERS);
        if s.is_empty() {
            self.rest = s;
            return None;
        }
        let end = s.find(DELIMITERS).unwrap_or(s.len());
        let (word, rest) = s.split_at(end);
        self.rest = rest;
        Some(word)
    }
}

pub type Handler = fn(&mut dyn Terminal, &mut dyn Machine, &str) -> Flow;

pub struct Command {
    pub name: &'static str,
    pub summary: &'static str,
    pub run: Handler,
}

pub static COMMANDS: [Command; 6] = [
    Command { name: "quit", summary: "leave the monitor and restore the screen", run: cmd_quit },
    Command { name: "help", summary: "list commands", run: cmd_help },
    Command { name: "paging_on", summary: "map the benchmark window with 4 KiB pages", run: cmd_paging_on },
    Command { name: "pf", summary: "force a page fault (fatal unless handled)", run: cmd_page_fault },
    Command { name: "test", summary: "memory locality benchmark, cycles and energy", run: cmd_bench },
    Command { name: "pwrstats", summary: "read the energy counters", run: cmd_pwrstats },
];

/// First command named exactly `name`.
pub fn lookup(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|cmd| cmd.name == name)
}

/// Run one command line. Handler output uses the command colour; the
/// prompt colour is put back afterwards.
pub fn dispatch(line: &str, term: &mut dyn Terminal, machine: &mut dyn Machine) -> Flow {
    let mut words = Tokenizer::new(line);
    let Some(name) = words.next() else {
        return Flow::Continue;
    };

    term.set_attribute(COMMAND_ATTR);
    let flow = match lookup(name) {
        Some(cmd) => (cmd.run)(term, machine, words.remainder()),
        None => {
            term.println("command not recognized");
            Flow::Continue
        }
    };
    term.set_attribute(PROMPT_ATTR);
    flow
}

fn cmd_quit(term: &mut dyn Terminal, _machine: &mut dyn Machine, _args: &str) -> Flow {
    term.println("leaving monitor");
    Flow::Quit
}

fn cmd_help(term: &mut dyn Terminal, _machine: &mut dyn Machine, _args: &str) -> Flow {
    term.println("commands:");
    for cmd in COMMANDS.iter() {
        let _ = writeln!(term, "  {:<10} {}", cmd.name, cmd.summary);
    }
    Flow::Continue
}

fn cmd_paging_on(term: &mut dyn Terminal, machine: &mut dyn Machine, _args: &str) -> Flow {
    if machine.paging_enabled() {
        term.println("paging already on");
    } else {
        machine.enable_paging();
        term.println("paging is on now");
    }
    Flow::Continue
}

fn cmd_page_fault(term: &mut dyn Terminal, machine: &mut dyn Machine, _args: &str) -> Flow {
    term.println("injecting page fault");
    machine.inject_page_fault();
    // Only reached if the fault handler recovered.
    term.println("page fault handled, still alive");
    Flow::Continue
}

fn cmd_bench(term: &mut dyn Terminal, machine: &mut dyn Machine, _args: &str) -> Flow {
    bench::run(term, machine, &BenchPlan::DEFAULT);
    Flow::Continue
}

fn cmd_pwrstats(term: &mut dyn Terminal, machine: &mut dyn Machine, _args: &str) -> Flow {
    let power = machine.power();
    match power.reading(CounterKind::Package) {
        Some(raw) => {
            let _ = writeln!(term, "package energy status: {:016x}", raw);
        }
        None => term.println("package energy status: unavailable"),
    }
    for kind in &CounterKind::ALL[1..] {
        match (power.reading(*kind), power.energy_uj(*kind)) {
            (Some(raw), Some(uj)) => {
                let _ = writeln!(term, "  {:<10} {:#010x} ({} uJ)", kind.name(), raw, uj);
            }
            (Some(raw), None) => {
                let _ = writeln!(term, "  {:<10} {:#010x}", kind.name(), raw);
            }
            _ => {
                let _ = writeln!(term, "  {:<10} unavailable", kind.name());
            }
        }
    }
    Flow::Continue
}
