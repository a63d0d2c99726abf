/// Unit tests for RAPL detection, validity and sentinel reads.
///
/// Run with: cargo test --target x86_64-unknown-linux-gnu --lib
use super::rapl::{HASWELL, SANDY_BRIDGE_E3, SANDY_BRIDGE_E5};
use super::*;

/// Fake CPU: fixed vendor/model, MSR reads return `msr << 8 | 0x2A` except the
/// unit register.
struct FakeMsr {
    intel: bool,
    model: u32,
    units: u64,
}

impl FakeMsr {
    fn intel(model: u32) -> Self {
        // Family 6 signature with the model split into base and extended nibbles.
        Self { intel: true, model, units: 0x000A_0E03 }
    }
}

impl MsrAccess for FakeMsr {
    fn rdmsr(&self, msr: u32) -> u64 {
        if msr == 0x606 {
            self.units
        } else {
            ((msr as u64) << 8) | 0x2A
        }
    }

    fn cpuid(&self, leaf: u32) -> (u32, u32, u32, u32) {
        match leaf {
            0 if self.intel => (
                0xD,
                u32::from_le_bytes(*b"Genu"),
                u32::from_le_bytes(*b"ntel"),
                u32::from_le_bytes(*b"ineI"),
            ),
            0 => (
                0xD,
                u32::from_le_bytes(*b"Auth"),
                u32::from_le_bytes(*b"cAMD"),
                u32::from_le_bytes(*b"enti"),
            ),
            1 => {
                let base = self.model & 0xF;
                let ext = self.model >> 4;
                (0x600 | (ext << 16) | (base << 4), 0, 0, 0)
            }
            _ => (0, 0, 0, 0),
        }
    }
}

#[test]
fn model_is_decoded_from_cpuid_signature() {
    let rapl = Rapl::new(FakeMsr::intel(HASWELL));
    assert!(rapl.is_intel());
    assert_eq!(rapl.cpu_model(), HASWELL);
}

#[test]
fn init_rejects_non_intel() {
    let mut rapl = Rapl::new(FakeMsr { intel: false, model: HASWELL, units: 0 });
    assert_eq!(rapl.init(), Err(PowerError::NotIntel));
}

#[test]
fn init_rejects_unknown_model() {
    let mut rapl = Rapl::new(FakeMsr::intel(0x1E));
    assert_eq!(rapl.init(), Err(PowerError::Unsupported { model: 0x1E }));
    assert!(!rapl.is_valid(CounterKind::Package));
}

#[test]
fn nothing_is_valid_before_init() {
    let rapl = Rapl::new(FakeMsr::intel(HASWELL));
    for kind in CounterKind::ALL {
        assert!(!rapl.is_valid(kind));
        assert_eq!(rapl.read(kind), COUNTER_UNAVAILABLE);
        assert_eq!(rapl.reading(kind), None);
    }
}

#[test]
fn haswell_has_package_and_core_only() {
    let mut rapl = Rapl::new(FakeMsr::intel(HASWELL));
    rapl.init().unwrap();

    assert!(rapl.is_valid(CounterKind::Package));
    assert!(rapl.is_valid(CounterKind::Core));
    assert!(!rapl.is_valid(CounterKind::Peripheral));
    assert!(!rapl.is_valid(CounterKind::Memory));

    assert_eq!(rapl.read(CounterKind::Package), (0x611 << 8) | 0x2A);
    assert_eq!(rapl.read(CounterKind::Core), (0x639 << 8) | 0x2A);
}

#[test]
fn unsupported_counter_reads_sentinel_not_energy() {
    let mut rapl = Rapl::new(FakeMsr::intel(HASWELL));
    rapl.init().unwrap();

    assert_eq!(rapl.read(CounterKind::Memory), COUNTER_UNAVAILABLE);
    assert_eq!(rapl.reading(CounterKind::Memory), None);
    assert_eq!(rapl.energy_uj(CounterKind::Memory), None);
}

#[test]
fn sandy_bridge_variants_enable_extra_domains() {
    let mut e3 = Rapl::new(FakeMsr::intel(SANDY_BRIDGE_E3));
    e3.init().unwrap();
    assert!(e3.is_valid(CounterKind::Peripheral));
    assert!(!e3.is_valid(CounterKind::Memory));

    let mut e5 = Rapl::new(FakeMsr::intel(SANDY_BRIDGE_E5));
    e5.init().unwrap();
    assert!(!e5.is_valid(CounterKind::Peripheral));
    assert!(e5.is_valid(CounterKind::Memory));
}

#[test]
fn unit_divisors_come_from_unit_register() {
    let mut rapl = Rapl::new(FakeMsr::intel(HASWELL));
    rapl.init().unwrap();

    // 0x000A_0E03: power 2^3, energy 2^14, time 2^10.
    assert_eq!(rapl.power_divisor(), 8);
    assert_eq!(rapl.energy_divisor(), 16384);
    assert_eq!(rapl.time_divisor(), 1024);
}

#[test]
fn energy_conversion_uses_divisor() {
    let mut rapl = Rapl::new(FakeMsr::intel(HASWELL));
    rapl.init().unwrap();

    let raw = rapl.read(CounterKind::Package);
    let expected = raw * 1_000_000 / 16384;
    assert_eq!(rapl.energy_uj(CounterKind::Package), Some(expected));
}
