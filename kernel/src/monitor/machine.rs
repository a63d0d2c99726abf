/// Kernel services the diagnostic commands call into.
///
/// The monitor owns none of these; it only drives them. The kernel provides
/// `hw::KernelMachine`, tests provide `mock::FakeMachine`.
use crate::power::PowerCounter;

use super::bench::MemoryWindow;

pub trait Machine {
    /// Switch the benchmark window to its 4 KiB-page mapping. Either
    /// succeeds or halts the machine; calling it again is a no-op.
    fn enable_paging(&mut self);

    fn paging_enabled(&self) -> bool;

    /// Knock out the page-table entry covering the benchmark window and touch
    /// it. Does not return on real hardware unless the fault handler recovers.
    fn inject_page_fault(&mut self);

    /// Monotonic cycle counter, for differences only.
    fn cycles(&self) -> u64;

    fn flush_tlb(&mut self);

    fn power(&self) -> &dyn PowerCounter;

    /// The benchmark window, `None` if the machine has no RAM behind it.
    fn window(&self) -> Option<&dyn MemoryWindow>;
}
