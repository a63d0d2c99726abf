//! Vigil kernel entry point.
//!
//! Booted by the Limine bootloader. Limine sets up long mode, page tables
//! (kernel in upper 2 GiB + HHDM for all physical memory), and jumps to kmain.
//! The kernel brings up just enough of the machine for the debug monitor,
//! runs one monitor session, then waits for the F9 hot-key.
#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]

use limine::BaseRevision;
use limine::memory_map::EntryType;
use limine::request::{
    HhdmRequest, MemoryMapRequest,
    RequestsEndMarker, RequestsStartMarker,
};

use vigil_kernel::arch::x86_64::{self, cpu, serial};
use vigil_kernel::mem;
use vigil_kernel::monitor::hw::{self, KernelMachine};
use vigil_kernel::power::{PowerCounter, Rapl};
use vigil_kernel::serial_println;

use core::panic::PanicInfo;

// ---- Limine requests ----
// Must be #[used] and in .requests section for Limine to discover them.
// Must also be referenced in kmain so the linker doesn't drop them.

#[used]
#[link_section = ".requests"]
static BASE_REVISION: BaseRevision = BaseRevision::new();

#[used]
#[link_section = ".requests"]
static HHDM_REQUEST: HhdmRequest = HhdmRequest::new();

#[used]
#[link_section = ".requests"]
static MEMMAP_REQUEST: MemoryMapRequest = MemoryMapRequest::new();

#[used]
#[link_section = ".requests_start_marker"]
static _START_MARKER: RequestsStartMarker = RequestsStartMarker::new();

#[used]
#[link_section = ".requests_end_marker"]
static _END_MARKER: RequestsEndMarker = RequestsEndMarker::new();

/// Kernel entry point, called by Limine after setting up long mode,
/// page tables (HHDM + kernel higher-half), and a stack.
#[no_mangle]
pub extern "C" fn kmain() -> ! {
    // 1. Serial console for kernel logging (before anything else)
    serial::SERIAL.lock().init();
    serial_println!("Vigil v{} booting...", env!("CARGO_PKG_VERSION"));

    // 2. Verify Limine boot protocol
    assert!(BASE_REVISION.is_supported(), "Limine base revision not supported");
    serial_println!("[boot] Limine protocol OK");

    // 3. HHDM offset: every page table is reached through it
    let hhdm_response = HHDM_REQUEST.get_response()
        .expect("Limine HHDM response missing");
    let hhdm_offset = hhdm_response.offset();
    mem::set_hhdm_offset(hhdm_offset);
    serial_println!("[boot] HHDM offset: {:#x}", hhdm_offset);

    // 4. Exception handlers, so faults the monitor provokes get reported
    unsafe { x86_64::idt::init(); }
    serial_println!("[cpu] IDT loaded (#DE #UD #DF #GP #PF)");

    // 5. Frame pool for page tables, from the Limine memory map
    let memmap_response = MEMMAP_REQUEST.get_response()
        .expect("Limine memory map response missing");

    let mut usable_regions = [(0u64, 0u64); 64];
    let mut region_count = 0usize;
    let mut total_usable: u64 = 0;
    // Everything with RAM behind it, for the benchmark window check.
    let mut ram_regions = [(0u64, 0u64); 64];
    let mut ram_count = 0usize;

    for entry in memmap_response.entries() {
        if entry.entry_type == EntryType::USABLE && region_count < usable_regions.len() {
            usable_regions[region_count] = (entry.base, entry.length);
            region_count += 1;
            total_usable += entry.length;
        }
        let is_ram = entry.entry_type == EntryType::USABLE
            || entry.entry_type == EntryType::BOOTLOADER_RECLAIMABLE
            || entry.entry_type == EntryType::ACPI_RECLAIMABLE
            || entry.entry_type == EntryType::EXECUTABLE_AND_MODULES;
        if is_ram && ram_count < ram_regions.len() {
            ram_regions[ram_count] = (entry.base, entry.length);
            ram_count += 1;
        }
    }

    serial_println!("[mem] {} usable regions, {} MiB total",
        region_count, total_usable / (1024 * 1024));

    mem::FRAMES.init(&usable_regions[..region_count]);
    serial_println!("[mem] Frame pool: {} frames free", mem::FRAMES.free_count());

    // 6. CPU features and energy counters
    serial_println!("[cpu] Invariant TSC: {}", cpu::has_invariant_tsc());

    let mut rapl = Rapl::new(cpu::CpuMsr);
    match rapl.init() {
        Ok(()) => {
            serial_println!("[power] RAPL on model {:#x}, energy unit 1/{} J",
                rapl.cpu_model(), rapl.energy_divisor());
        }
        Err(e) => {
            serial_println!("[power] {}", e);
        }
    }

    // 7. Debug monitor. Assumes a text-mode boot: the framebuffer at
    //    0xB8000 is mapped uncached, not taken from Limine.
    let machine = unsafe { KernelMachine::new(rapl, &ram_regions[..ram_count]) };
    if let Err(e) = unsafe { hw::init(machine) } {
        serial_println!("[monitor] text framebuffer mapping failed: {}, monitor disabled", e);
    }

    serial_println!("Vigil boot complete.");

    hw::enter();
    loop {
        if hw::poll_hotkey() {
            hw::enter();
        }
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::cli();
    unsafe { serial::force_unlock(); }
    serial_println!("!!! KERNEL PANIC !!!");
    serial_println!("{}", info);
    loop {
        x86_64::hlt();
    }
}
