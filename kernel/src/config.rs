/// Compile-time configuration for the kernel and its debug monitor.
///
/// Everything the monitor needs to know about the machine lives here so the
/// hardware bindings and the host-side tests agree on geometry and ports.
use static_assertions::const_assert;

// ---- Text display ----

/// Text-mode columns.
pub const SCREEN_WIDTH: usize = 80;
/// Text-mode rows.
pub const SCREEN_HEIGHT: usize = 25;
/// Character cells on screen (each cell = char byte + attribute byte).
pub const SCREEN_CELLS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Physical address of the colour text framebuffer.
pub const VGA_TEXT_PHYS: u64 = 0xB8000;
/// Private virtual address of the text framebuffer, mapped uncached at
/// boot. The HHDM does not cover legacy VGA memory. PML4 slot 321.
pub const VGA_TEXT_VIRT: u64 = 0xFFFF_A080_0000_0000;

/// CRT controller index/data ports and cursor location registers.
pub const CRTC_ADDR: u16 = 0x3D4;
pub const CRTC_DATA: u16 = 0x3D5;
pub const CRTC_CURSOR_HIGH: u8 = 0x0E;
pub const CRTC_CURSOR_LOW: u8 = 0x0F;

const_assert!(SCREEN_CELLS <= u16::MAX as usize);

// ---- Keyboard controller ----

pub const KBD_DATA_PORT: u16 = 0x60;
pub const KBD_STATUS_PORT: u16 = 0x64;

/// Set-1 make code for F9, the monitor hot-key.
pub const MONITOR_HOTKEY_SCANCODE: u8 = 0x43;

// ---- Monitor ----

/// QEMU debug console; every byte the monitor prints is mirrored here.
pub const DEBUGCON_PORT: u16 = 0xE9;

/// Command buffer capacity, including the terminator slot.
pub const COMMAND_CAPACITY: usize = SCREEN_WIDTH * 2;

pub const PROMPT: &str = "monitor> ";
pub const ENTRY_BANNER: &str = "Vigil monitor entered";

// ---- Locality benchmark ----

/// Passes over an access pattern per timed sample.
pub const BENCH_ITERATIONS: u64 = 100;
/// Timed samples per pattern; results are averaged over this count.
pub const BENCH_SAMPLES: u64 = 100;
/// Physical base of the memory window the benchmark walks.
pub const BENCH_WINDOW_PHYS: u64 = 0x4000_0000;
/// Private virtual base for the 4 KiB mapping built by `paging_on`.
/// PML4 slot 320, clear of the HHDM and the higher-half kernel.
pub const BENCH_WINDOW_VIRT: u64 = 0xFFFF_A000_0000_0000;
/// Private virtual base for the 2 MiB-page mapping the "paging off" phase
/// reads through. PML4 slot 322.
pub const BENCH_HUGE_WINDOW_VIRT: u64 = 0xFFFF_A100_0000_0000;
