/// Page-table entry encoding and the kernel's private virtual layout.
///
/// Pure bit arithmetic, shared by the table walker in `paging` and the
/// host-side tests.
use crate::config::{BENCH_HUGE_WINDOW_VIRT, BENCH_WINDOW_VIRT, VGA_TEXT_VIRT};
use static_assertions::const_assert;

pub const ENTRIES_PER_TABLE: usize = 512;

/// Page table entry flags.
pub const PTE_PRESENT: u64 = 1 << 0;
pub const PTE_WRITABLE: u64 = 1 << 1;
pub const PTE_WRITE_THROUGH: u64 = 1 << 3;
pub const PTE_CACHE_DISABLE: u64 = 1 << 4;
pub const PTE_HUGE: u64 = 1 << 7;
pub const PTE_NO_EXECUTE: u64 = 1 << 63;
pub const PTE_ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000; // bits 51:12

pub const HUGE_PAGE_SIZE: u64 = 2 * 1024 * 1024;

/// Device memory: strong uncacheable (PCD + PWT with the default PAT).
pub const MMIO_FLAGS: u64 = PTE_WRITABLE | PTE_WRITE_THROUGH | PTE_CACHE_DISABLE | PTE_NO_EXECUTE;
/// Ordinary RAM read by the benchmark.
pub const WINDOW_FLAGS: u64 = PTE_WRITABLE | PTE_NO_EXECUTE;

/// Extract page table index for a given level from a virtual address.
/// Level 4 = PML4, Level 3 = PDPT, Level 2 = PD, Level 1 = PT
pub const fn table_index(vaddr: u64, level: u8) -> usize {
    let shift = 12 + 9 * (level as u64 - 1);
    ((vaddr >> shift) & 0x1FF) as usize
}

/// Present leaf entry for the frame at `paddr`.
pub const fn leaf_entry(paddr: u64, flags: u64) -> u64 {
    (paddr & PTE_ADDR_MASK) | flags | PTE_PRESENT
}

/// PML4 slot of the HHDM Limine builds (0xFFFF_8000_0000_0000).
pub const HHDM_SLOT: usize = 256;

// Each private mapping owns its top-level slot: dropping the benchmark slot
// to inject a fault must not take the screen or the HHDM with it.
const_assert!(table_index(BENCH_WINDOW_VIRT, 4) != table_index(VGA_TEXT_VIRT, 4));
const_assert!(table_index(BENCH_WINDOW_VIRT, 4) != table_index(BENCH_HUGE_WINDOW_VIRT, 4));
const_assert!(table_index(VGA_TEXT_VIRT, 4) != table_index(BENCH_HUGE_WINDOW_VIRT, 4));
const_assert!(table_index(BENCH_WINDOW_VIRT, 4) != HHDM_SLOT);
const_assert!(BENCH_HUGE_WINDOW_VIRT % HUGE_PAGE_SIZE == 0);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VGA_TEXT_PHYS;

    #[test]
    fn indices_split_a_canonical_address() {
        // 0xFFFF_8000_4020_3000: PML4 256, PDPT 1, PD 1, PT 3.
        let vaddr = 0xFFFF_8000_4020_3000;
        assert_eq!(table_index(vaddr, 4), 256);
        assert_eq!(table_index(vaddr, 3), 1);
        assert_eq!(table_index(vaddr, 2), 1);
        assert_eq!(table_index(vaddr, 1), 3);
    }

    #[test]
    fn private_mappings_have_their_own_slots() {
        let slots = [
            table_index(VGA_TEXT_VIRT, 4),
            table_index(BENCH_WINDOW_VIRT, 4),
            table_index(BENCH_HUGE_WINDOW_VIRT, 4),
        ];
        assert_eq!(slots, [321, 320, 322]);
        assert!(!slots.contains(&HHDM_SLOT));
    }

    #[test]
    fn text_buffer_entry_is_uncached() {
        let entry = leaf_entry(VGA_TEXT_PHYS, MMIO_FLAGS);
        assert_eq!(entry & PTE_ADDR_MASK, 0xB8000);
        assert_ne!(entry & PTE_PRESENT, 0);
        assert_ne!(entry & PTE_CACHE_DISABLE, 0);
        assert_ne!(entry & PTE_WRITE_THROUGH, 0);
        assert_eq!(entry & PTE_HUGE, 0);
    }

    #[test]
    fn leaf_entry_drops_offset_bits() {
        let entry = leaf_entry(0x4000_0123, WINDOW_FLAGS);
        assert_eq!(entry & PTE_ADDR_MASK, 0x4000_0000);
        assert_eq!(entry & PTE_CACHE_DISABLE, 0);
    }
}
