/// CPU identification, timestamp counter and model-specific registers.
use crate::power::MsrAccess;

/// CPUID wrapper. Saves/restores rbx since LLVM reserves it.
pub fn cpuid(leaf: u32) -> (u32, u32, u32, u32) {
    let (eax, ebx, ecx, edx): (u32, u32, u32, u32);
    unsafe {
        core::arch::asm!(
            "push rbx",
            "cpuid",
            "mov {ebx_out:e}, ebx",
            "pop rbx",
            inout("eax") leaf => eax,
            ebx_out = out(reg) ebx,
            inout("ecx") 0u32 => ecx,
            out("edx") edx,
            options(nostack),
        );
    }
    (eax, ebx, ecx, edx)
}

/// Check if TSC is invariant (CPUID.80000007H:EDX.TscInvariant[bit 8]).
pub fn has_invariant_tsc() -> bool {
    let (max_ext, _, _, _) = cpuid(0x8000_0000);
    if max_ext < 0x8000_0007 {
        return false;
    }
    let (_, _, _, edx) = cpuid(0x8000_0007);
    edx & (1 << 8) != 0
}

/// RDTSC fenced so earlier loads retire before the counter is sampled.
#[inline(always)]
pub fn rdtsc_serialized() -> u64 {
    let (lo, hi): (u32, u32);
    unsafe {
        core::arch::asm!(
            "lfence",
            "rdtsc",
            "lfence",
            out("eax") lo,
            out("edx") hi,
            options(nostack, preserves_flags),
        );
    }
    ((hi as u64) << 32) | (lo as u64)
}

/// Read a model-specific register.
///
/// # Safety
/// Faults with #GP if the MSR does not exist on this CPU.
pub unsafe fn rdmsr(msr: u32) -> u64 {
    let (lo, hi): (u32, u32);
    core::arch::asm!(
        "rdmsr",
        in("ecx") msr,
        out("eax") lo,
        out("edx") hi,
        options(nostack, nomem, preserves_flags),
    );
    ((hi as u64) << 32) | (lo as u64)
}

/// The executing CPU's MSRs and CPUID leaves.
pub struct CpuMsr;

impl MsrAccess for CpuMsr {
    fn rdmsr(&self, msr: u32) -> u64 {
        // Only called for registers the RAPL detection has vetted.
        unsafe { rdmsr(msr) }
    }

    fn cpuid(&self, leaf: u32) -> (u32, u32, u32, u32) {
        cpuid(leaf)
    }
}
