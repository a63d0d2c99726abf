/// Real-hardware bindings for the monitor: the VGA text buffer, the PS/2
/// controller, the debug console port, and the kernel services behind
/// `Machine`. Also owns the global monitor instance and its session lock.
use spin::{Mutex, Once};

use crate::arch::x86_64::{cpu, inb, outb};
use crate::config::{
    BENCH_HUGE_WINDOW_VIRT, BENCH_WINDOW_PHYS, BENCH_WINDOW_VIRT, CRTC_ADDR, CRTC_CURSOR_HIGH,
    CRTC_CURSOR_LOW, CRTC_DATA, DEBUGCON_PORT, KBD_DATA_PORT, KBD_STATUS_PORT,
    MONITOR_HOTKEY_SCANCODE, SCREEN_CELLS, VGA_TEXT_PHYS, VGA_TEXT_VIRT,
};
use crate::mem::paging::{self, MapError};
use crate::mem::pte::{MMIO_FLAGS, WINDOW_FLAGS};
use crate::mem::ram_covers;
use crate::power::{PowerCounter, Rapl};
use crate::serial_println;

use super::bench::{MemoryWindow, WINDOW_BYTES};
use super::console::Mirror;
#[cfg(not(feature = "debugcon"))]
use super::console::NoMirror;
use super::line::{KeyboardController, STATUS_OUTPUT_FULL};
use super::machine::Machine;
use super::vga::{Display, TextScreen};
use super::{Monitor, SessionReport};

/// Colour text framebuffer, reached through its own uncached mapping.
pub struct VgaScreen {
    base: *mut u16,
}

// The framebuffer is only ever touched under the monitor lock.
unsafe impl Send for VgaScreen {}

impl VgaScreen {
    /// Map the framebuffer page at `VGA_TEXT_VIRT`.
    ///
    /// # Safety
    /// The HHDM offset and the frame pool must be set up, and the machine
    /// must have booted in colour text mode (framebuffer at `VGA_TEXT_PHYS`).
    pub unsafe fn map() -> Result<Self, MapError> {
        paging::map_page(VGA_TEXT_VIRT, VGA_TEXT_PHYS, MMIO_FLAGS)?;
        Ok(Self {
            base: VGA_TEXT_VIRT as *mut u16,
        })
    }
}

impl TextScreen for VgaScreen {
    fn read_cell(&self, index: usize) -> u16 {
        debug_assert!(index < SCREEN_CELLS);
        unsafe { self.base.add(index).read_volatile() }
    }

    fn write_cell(&mut self, index: usize, cell: u16) {
        debug_assert!(index < SCREEN_CELLS);
        unsafe { self.base.add(index).write_volatile(cell) }
    }

    fn set_hw_cursor(&mut self, pos: u16) {
        outb(CRTC_ADDR, CRTC_CURSOR_HIGH);
        outb(CRTC_DATA, (pos >> 8) as u8);
        outb(CRTC_ADDR, CRTC_CURSOR_LOW);
        outb(CRTC_DATA, pos as u8);
    }
}

/// The 8042 keyboard controller.
pub struct Ps2Controller;

impl KeyboardController for Ps2Controller {
    fn status(&mut self) -> u8 {
        inb(KBD_STATUS_PORT)
    }

    fn read_data(&mut self) -> u8 {
        inb(KBD_DATA_PORT)
    }
}

/// QEMU/Bochs debug console (`-debugcon`).
pub struct DebugCon;

impl Mirror for DebugCon {
    fn mirror_byte(&mut self, byte: u8) {
        if byte == b'\n' {
            outb(DEBUGCON_PORT, b'\r');
        }
        outb(DEBUGCON_PORT, byte);
    }
}

#[cfg(feature = "debugcon")]
pub type MonitorMirror = DebugCon;
#[cfg(not(feature = "debugcon"))]
pub type MonitorMirror = NoMirror;

#[cfg(feature = "debugcon")]
fn mirror() -> MonitorMirror {
    DebugCon
}

#[cfg(not(feature = "debugcon"))]
fn mirror() -> MonitorMirror {
    NoMirror
}

/// Benchmark window as 64-bit words starting at `base`.
struct WindowView {
    base: *const u64,
}

impl MemoryWindow for WindowView {
    fn read_word(&self, index: usize) -> u64 {
        unsafe { self.base.add(index).read_volatile() }
    }
}

/// Kernel services for the diagnostic commands.
pub struct KernelMachine {
    paging: bool,
    rapl: Rapl<cpu::CpuMsr>,
    window: Option<WindowView>,
}

// Raw window pointer; only used under the machine lock.
unsafe impl Send for KernelMachine {}

impl KernelMachine {
    /// `rapl` should already have been through `init`; if that failed every
    /// energy counter just reads as unavailable. `ram` lists the memory map
    /// entries backed by RAM. The benchmark window is mapped in 2 MiB pages
    /// only when they cover it; otherwise the machine has no window.
    ///
    /// # Safety
    /// The HHDM offset and the frame pool must be set up.
    pub unsafe fn new(rapl: Rapl<cpu::CpuMsr>, ram: &[(u64, u64)]) -> Self {
        Self {
            paging: false,
            rapl,
            window: map_huge_window(ram),
        }
    }
}

impl Machine for KernelMachine {
    fn enable_paging(&mut self) {
        if self.paging {
            return;
        }
        let Some(window) = self.window.as_mut() else {
            serial_println!("[mem] no benchmark window, nothing to remap");
            self.paging = true;
            return;
        };
        match unsafe { paging::map_range(BENCH_WINDOW_VIRT, BENCH_WINDOW_PHYS, WINDOW_BYTES, WINDOW_FLAGS) } {
            Ok(pages) => {
                serial_println!(
                    "[mem] benchmark window: {} 4 KiB pages at {:#x}",
                    pages,
                    BENCH_WINDOW_VIRT
                );
            }
            Err(e) => panic!("[mem] benchmark window mapping failed: {}", e),
        }
        window.base = BENCH_WINDOW_VIRT as *const u64;
        self.paging = true;
    }

    fn paging_enabled(&self) -> bool {
        self.paging
    }

    fn inject_page_fault(&mut self) {
        // The private slot is the only top-level entry that is safe to drop.
        self.enable_paging();
        serial_println!("[monitor] unmapping PML4 slot of {:#x}", BENCH_WINDOW_VIRT);
        unsafe {
            paging::unmap_top_level(BENCH_WINDOW_VIRT);
            core::ptr::read_volatile(BENCH_WINDOW_VIRT as *const u64);
        }
    }

    fn cycles(&self) -> u64 {
        cpu::rdtsc_serialized()
    }

    fn flush_tlb(&mut self) {
        paging::flush_tlb();
    }

    fn power(&self) -> &dyn PowerCounter {
        &self.rapl
    }

    fn window(&self) -> Option<&dyn MemoryWindow> {
        self.window.as_ref().map(|w| w as &dyn MemoryWindow)
    }
}

/// Map the benchmark window in 2 MiB pages at `BENCH_HUGE_WINDOW_VIRT`, if
/// RAM backs all of it.
unsafe fn map_huge_window(ram: &[(u64, u64)]) -> Option<WindowView> {
    if !ram_covers(ram, BENCH_WINDOW_PHYS, WINDOW_BYTES) {
        serial_println!(
            "[mem] benchmark window {:#x}+{:#x} not backed by RAM",
            BENCH_WINDOW_PHYS,
            WINDOW_BYTES
        );
        return None;
    }
    match paging::map_huge_range(BENCH_HUGE_WINDOW_VIRT, BENCH_WINDOW_PHYS, WINDOW_BYTES, WINDOW_FLAGS) {
        Ok(pages) => {
            serial_println!(
                "[mem] benchmark window: {} 2 MiB pages at {:#x}",
                pages,
                BENCH_HUGE_WINDOW_VIRT
            );
            Some(WindowView {
                base: BENCH_HUGE_WINDOW_VIRT as *const u64,
            })
        }
        Err(e) => {
            serial_println!("[mem] benchmark window mapping failed: {}", e);
            None
        }
    }
}

pub type KernelMonitor = Monitor<VgaScreen, Ps2Controller, MonitorMirror>;

/// The monitor instance. Holding this lock is holding the session.
static MONITOR: Once<Mutex<KernelMonitor>> = Once::new();
static MACHINE: Once<Mutex<KernelMachine>> = Once::new();

/// Bind the monitor to the hardware. Later calls are ignored. If the
/// framebuffer cannot be mapped the monitor stays unbound and `enter`
/// returns `None`.
///
/// # Safety
/// See `VgaScreen::map`.
pub unsafe fn init(machine: KernelMachine) -> Result<(), MapError> {
    if MONITOR.get().is_none() {
        let display = Display::new(VgaScreen::map()?);
        MONITOR.call_once(|| Mutex::new(Monitor::new(display, Ps2Controller, mirror())));
    }
    MACHINE.call_once(|| Mutex::new(machine));
    serial_println!("[monitor] ready, F9 enters");
    Ok(())
}

/// Run one session on this core. `None` if `init` has not run.
pub fn enter() -> Option<SessionReport> {
    let mut monitor = MONITOR.get()?.lock();
    let mut machine = MACHINE.get()?.lock();

    serial_println!("[monitor] session start");
    let report = monitor.enter(&mut *machine);
    serial_println!(
        "[monitor] session over: {} lines, {} commands",
        report.lines,
        report.commands
    );
    Some(report)
}

/// Drain one pending scancode, if any, and report whether it was the
/// hot-key. Bytes that are not the hot-key are discarded.
pub fn poll_hotkey() -> bool {
    let mut kbd = Ps2Controller;
    if kbd.status() & STATUS_OUTPUT_FULL == 0 {
        return false;
    }
    kbd.read_data() == MONITOR_HOTKEY_SCANCODE
}
