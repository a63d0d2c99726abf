/// Intel RAPL (Running Average Power Limit) energy counters.
///
/// Sandy Bridge and later expose per-domain energy status MSRs. Units come
/// from MSR_RAPL_POWER_UNIT: each field is an exponent `n` meaning `1/2^n`
/// of a watt, joule or second.
use super::{CounterKind, PowerCounter, PowerError, COUNTER_UNAVAILABLE};

const MSR_RAPL_POWER_UNIT: u32 = 0x606;
const MSR_PKG_ENERGY_STATUS: u32 = 0x611;
const MSR_DRAM_ENERGY_STATUS: u32 = 0x619;
const MSR_PP0_ENERGY_STATUS: u32 = 0x639;
const MSR_PP1_ENERGY_STATUS: u32 = 0x641;

const POWER_UNIT_MASK: u64 = 0x0F;
const ENERGY_UNIT_MASK: u64 = 0x1F00;
const ENERGY_UNIT_SHIFT: u32 = 8;
const TIME_UNIT_MASK: u64 = 0xF0000;
const TIME_UNIT_SHIFT: u32 = 16;

pub const SANDY_BRIDGE_E3: u32 = 0x2A;
pub const SANDY_BRIDGE_E5: u32 = 0x2D;
pub const IVY_BRIDGE: u32 = 0x3A;
pub const HASWELL: u32 = 0x4A;

/// "GenuineIntel" as CPUID leaf 0 returns it in EBX, EDX, ECX.
const INTEL_EBX: u32 = u32::from_le_bytes(*b"Genu");
const INTEL_EDX: u32 = u32::from_le_bytes(*b"ineI");
const INTEL_ECX: u32 = u32::from_le_bytes(*b"ntel");

/// MSR and CPUID access; the kernel uses the real instructions, tests a fake.
pub trait MsrAccess {
    fn rdmsr(&self, msr: u32) -> u64;

    /// Returns (eax, ebx, ecx, edx).
    fn cpuid(&self, leaf: u32) -> (u32, u32, u32, u32);
}

#[derive(Clone, Copy)]
struct Domain {
    status_msr: u32,
    valid: bool,
}

pub struct Rapl<M: MsrAccess> {
    msr: M,
    /// Indexed by `CounterKind as usize`.
    domains: [Domain; 4],
    ready: bool,
    power_divisor: u64,
    energy_divisor: u64,
    time_divisor: u64,
}

impl<M: MsrAccess> Rapl<M> {
    pub const fn new(msr: M) -> Self {
        Self {
            msr,
            domains: [
                Domain { status_msr: MSR_PKG_ENERGY_STATUS, valid: true },
                Domain { status_msr: MSR_PP0_ENERGY_STATUS, valid: true },
                Domain { status_msr: MSR_PP1_ENERGY_STATUS, valid: false },
                Domain { status_msr: MSR_DRAM_ENERGY_STATUS, valid: false },
            ],
            ready: false,
            power_divisor: 0,
            energy_divisor: 0,
            time_divisor: 0,
        }
    }

    /// Display model: base model plus extended model shifted in.
    pub fn cpu_model(&self) -> u32 {
        let (eax, _, _, _) = self.msr.cpuid(1);
        let model = (eax & 0xF0) >> 4;
        let ext_model = (eax & 0xF_0000) >> 16;
        model + (ext_model << 4)
    }

    pub fn is_intel(&self) -> bool {
        let (_, ebx, ecx, edx) = self.msr.cpuid(0);
        ebx == INTEL_EBX && edx == INTEL_EDX && ecx == INTEL_ECX
    }

    pub fn power_divisor(&self) -> u64 {
        self.power_divisor
    }

    pub fn time_divisor(&self) -> u64 {
        self.time_divisor
    }

    fn latch_units(&mut self) {
        let units = self.msr.rdmsr(MSR_RAPL_POWER_UNIT);
        self.power_divisor = 1 << (units & POWER_UNIT_MASK);
        self.energy_divisor = 1 << ((units & ENERGY_UNIT_MASK) >> ENERGY_UNIT_SHIFT);
        self.time_divisor = 1 << ((units & TIME_UNIT_MASK) >> TIME_UNIT_SHIFT);
    }
}

fn supports_rapl(model: u32) -> bool {
    matches!(model, SANDY_BRIDGE_E3 | SANDY_BRIDGE_E5 | IVY_BRIDGE | HASWELL)
}

impl<M: MsrAccess> PowerCounter for Rapl<M> {
    fn init(&mut self) -> Result<(), PowerError> {
        if !self.is_intel() {
            return Err(PowerError::NotIntel);
        }
        let model = self.cpu_model();
        if !supports_rapl(model) {
            return Err(PowerError::Unsupported { model });
        }

        match model {
            SANDY_BRIDGE_E3 => self.domains[CounterKind::Peripheral as usize].valid = true,
            SANDY_BRIDGE_E5 => self.domains[CounterKind::Memory as usize].valid = true,
            _ => {}
        }

        self.latch_units();
        self.ready = true;
        Ok(())
    }

    fn is_valid(&self, kind: CounterKind) -> bool {
        self.ready && self.domains[kind as usize].valid
    }

    fn read(&self, kind: CounterKind) -> u64 {
        if !self.is_valid(kind) {
            return COUNTER_UNAVAILABLE;
        }
        self.msr.rdmsr(self.domains[kind as usize].status_msr)
    }

    fn energy_divisor(&self) -> u64 {
        self.energy_divisor
    }
}
