/// Memory locality benchmark.
///
/// Three access patterns of 512 loads each walk a window of 64-bit words:
///
/// | pattern | stride (words) | span (words) | pages touched |
/// |---------|----------------|--------------|---------------|
/// | high    | 1              | 512          | 1             |
/// | medium  | 0x1_0000       | 0x200_0000   | 512 (512 KiB apart) |
/// | low     | 0x8_0000       | 0x1000_0000  | 512 (4 MiB apart) |
///
/// Each sample flushes the TLB, runs `iterations` passes and records either
/// the cycle delta or the package energy delta. Results are integer averages
/// over `samples`; no outlier filtering.
use core::fmt::Write;

use crate::config::{BENCH_ITERATIONS, BENCH_SAMPLES};
use crate::power::CounterKind;

use super::console::Terminal;
use super::machine::Machine;

/// Word-addressed view of the benchmark window.
pub trait MemoryWindow {
    fn read_word(&self, index: usize) -> u64;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locality {
    High,
    Medium,
    Low,
}

impl Locality {
    pub const ALL: [Locality; 3] = [Locality::High, Locality::Medium, Locality::Low];

    pub const fn stride_words(self) -> usize {
        match self {
            Locality::High => 1,
            Locality::Medium => 0x1_0000,
            Locality::Low => 0x8_0000,
        }
    }

    pub const fn span_words(self) -> usize {
        match self {
            Locality::High => 512,
            Locality::Medium => 0x200_0000,
            Locality::Low => 0x1000_0000,
        }
    }

    pub const fn accesses(self) -> usize {
        self.span_words() / self.stride_words()
    }

    pub fn name(self) -> &'static str {
        match self {
            Locality::High => "high",
            Locality::Medium => "medium",
            Locality::Low => "low",
        }
    }

    /// Word indices one pass touches, in order.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..self.span_words()).step_by(self.stride_words())
    }
}

/// Bytes covered by the largest pattern; the window must map at least this.
pub const WINDOW_BYTES: u64 = (Locality::Low.span_words() * 8) as u64;

/// What a sample measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Cycles,
    Energy,
}

#[derive(Clone, Copy, Debug)]
pub struct BenchPlan {
    pub iterations: u64,
    pub samples: u64,
}

impl BenchPlan {
    pub const DEFAULT: BenchPlan = BenchPlan {
        iterations: BENCH_ITERATIONS,
        samples: BENCH_SAMPLES,
    };
}

/// Averaged result for one pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Measurement {
    /// Mean delta per sample, `None` if the metric had no counter.
    pub average: Option<u64>,
    /// Sum of every word loaded, kept so the loads stay observable.
    pub checksum: u64,
}

/// `iterations` passes of `pattern` over `window`.
pub fn walk(window: &dyn MemoryWindow, pattern: Locality, iterations: u64) -> u64 {
    let mut sum = 0u64;
    for _ in 0..iterations {
        for index in pattern.indices() {
            sum = sum.wrapping_add(window.read_word(index));
        }
    }
    sum
}

fn read_metric(machine: &dyn Machine, metric: Metric) -> Option<u64> {
    match metric {
        Metric::Cycles => Some(machine.cycles()),
        Metric::Energy => machine.power().reading(CounterKind::Package),
    }
}

fn delta(metric: Metric, before: u64, after: u64) -> u64 {
    match metric {
        Metric::Cycles => after.wrapping_sub(before),
        // Energy status is a 32-bit counter that wraps.
        Metric::Energy => after.wrapping_sub(before) & 0xFFFF_FFFF,
    }
}

pub fn measure(machine: &mut dyn Machine, pattern: Locality, metric: Metric, plan: &BenchPlan) -> Measurement {
    if machine.window().is_none() {
        return Measurement { average: None, checksum: 0 };
    }

    let mut total = 0u64;
    let mut checksum = 0u64;
    let mut available = true;

    for _ in 0..plan.samples {
        machine.flush_tlb();
        let before = read_metric(machine, metric);
        let sum = machine
            .window()
            .map_or(0, |window| walk(window, pattern, plan.iterations));
        let after = read_metric(machine, metric);

        checksum = checksum.wrapping_add(sum);
        match (before, after) {
            (Some(b), Some(a)) => total = total.wrapping_add(delta(metric, b, a)),
            _ => available = false,
        }
    }

    let average = if available && plan.samples > 0 {
        Some(total / plan.samples)
    } else {
        None
    };
    Measurement { average, checksum }
}

fn report(term: &mut dyn Terminal, label: &str, pattern: Locality, m: &Measurement) {
    if m.checksum != 0 {
        let _ = writeln!(term, "  checksum {:#x}", m.checksum);
    }
    match m.average {
        Some(avg) => {
            let _ = writeln!(term, "avg {} with {} locality: {}", label, pattern.name(), avg);
        }
        None => {
            let _ = writeln!(term, "avg {} with {} locality: unavailable", label, pattern.name());
        }
    }
}

fn run_phase(term: &mut dyn Terminal, machine: &mut dyn Machine, plan: &BenchPlan) {
    for pattern in Locality::ALL {
        let m = measure(machine, pattern, Metric::Cycles, plan);
        report(term, "cycles", pattern, &m);
    }
    for pattern in Locality::ALL {
        let m = measure(machine, pattern, Metric::Energy, plan);
        report(term, "energy", pattern, &m);
    }
}

/// Printed instead of any result when the machine has no window to walk.
pub const NO_WINDOW: &str = "benchmark window not backed by RAM";

/// Full benchmark: every pattern and metric on the 2 MiB-page mapping, then
/// again after `enable_paging`. Without a window nothing runs and paging is
/// left as it was.
pub fn run(term: &mut dyn Terminal, machine: &mut dyn Machine, plan: &BenchPlan) {
    if machine.window().is_none() {
        term.println(NO_WINDOW);
        return;
    }

    term.println("==================== PAGING OFF ====================");
    run_phase(term, machine, plan);

    machine.enable_paging();

    term.println("==================== PAGING ON =====================");
    run_phase(term, machine, plan);
}
