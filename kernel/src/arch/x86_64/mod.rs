/// x86_64 architecture support.
///
/// This module provides:
/// - Port I/O (in/out instructions)
/// - Serial console (COM1) for kernel logging
/// - CPUID, TSC and MSR access
/// - A minimal exception table
pub mod serial;
pub mod cpu;
pub mod idt;

/// Halt the CPU until the next interrupt.
#[inline(always)]
pub fn hlt() {
    unsafe { core::arch::asm!("hlt", options(nostack, nomem)); }
}

/// Disable interrupts.
#[inline(always)]
pub fn cli() {
    unsafe { core::arch::asm!("cli", options(nostack, nomem)); }
}

/// Write a byte to an I/O port.
#[inline(always)]
pub fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nostack, preserves_flags),
        );
    }
}

/// Read a byte from an I/O port.
#[inline(always)]
pub fn inb(port: u16) -> u8 {
    let val: u8;
    unsafe {
        core::arch::asm!(
            "in al, dx",
            in("dx") port,
            out("al") val,
            options(nostack, preserves_flags),
        );
    }
    val
}

/// Current code segment selector, as loaded by the bootloader.
pub fn read_cs() -> u16 {
    let cs: u16;
    unsafe { core::arch::asm!("mov {:x}, cs", out(reg) cs, options(nostack, nomem, preserves_flags)); }
    cs
}
