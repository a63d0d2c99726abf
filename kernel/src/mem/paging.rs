/// Page table manipulation for x86_64 4-level paging.
///
/// Limine sets up the initial page tables (HHDM in 1 GiB/2 MiB pages plus
/// the higher-half kernel). On top of those the kernel builds its own
/// private mappings: the text framebuffer, the benchmark window in 2 MiB
/// pages, and the same window in 4 KiB pages once `paging_on` runs.
///
/// Page table entries are reached through the HHDM: since all physical
/// memory is mapped at virt = phys + hhdm_offset, the physical addresses in
/// PTEs convert straight to virtual pointers.
use core::fmt;

use super::phys::{hhdm_offset, AllocError, FRAMES, PAGE_SIZE};
use super::pte::{
    leaf_entry, table_index, ENTRIES_PER_TABLE, HUGE_PAGE_SIZE, PTE_ADDR_MASK, PTE_HUGE,
    PTE_PRESENT, PTE_WRITABLE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// No frame left for an intermediate table.
    OutOfMemory,
    /// A large page already covers the address at this level (3 = PDPT, 2 = PD).
    HugePage { level: u8 },
}

impl From<AllocError> for MapError {
    fn from(_: AllocError) -> Self {
        MapError::OutOfMemory
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::OutOfMemory => write!(f, "out of frames for page tables"),
            MapError::HugePage { level } => {
                write!(f, "huge page in the way at level {}", level)
            }
        }
    }
}

/// Read CR3 (PML4 physical base address).
fn read_cr3() -> u64 {
    let cr3: u64;
    unsafe { core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nostack, nomem)); }
    cr3 & PTE_ADDR_MASK
}

/// Drop every non-global TLB entry by writing CR3 back.
pub fn flush_tlb() {
    unsafe {
        core::arch::asm!(
            "mov {tmp}, cr3",
            "mov cr3, {tmp}",
            tmp = out(reg) _,
            options(nostack, preserves_flags),
        );
    }
}

/// Flush a single TLB entry for a virtual address.
fn invlpg(vaddr: u64) {
    unsafe { core::arch::asm!("invlpg [{}]", in(reg) vaddr, options(nostack, preserves_flags)); }
}

/// Convert a physical page table address to a virtual pointer via HHDM.
fn phys_to_virt(phys: u64) -> *mut u64 {
    (phys + hhdm_offset()) as *mut u64
}

/// Fresh, zeroed page table.
unsafe fn alloc_table() -> Result<u64, MapError> {
    let frame = FRAMES.alloc_frame()?.as_u64();
    let table = phys_to_virt(frame);
    for i in 0..ENTRIES_PER_TABLE {
        table.add(i).write_volatile(0);
    }
    Ok(frame)
}

/// Map the 4 KiB page at `vaddr` to the frame at `paddr` with `flags`,
/// creating intermediate tables as needed. An existing mapping is replaced.
///
/// # Safety
/// `vaddr` must not alias memory the kernel relies on.
pub unsafe fn map_page(vaddr: u64, paddr: u64, flags: u64) -> Result<(), MapError> {
    let table = walk_to(vaddr, 1)?;
    let pte_ptr = table.add(table_index(vaddr, 1));
    pte_ptr.write_volatile(leaf_entry(paddr, flags));
    invlpg(vaddr);
    Ok(())
}

/// Map the 2 MiB page at `vaddr` to the 2 MiB frame at `paddr`. Both must
/// be 2 MiB aligned. An existing PD entry is replaced.
///
/// # Safety
/// `vaddr` must not alias memory the kernel relies on.
pub unsafe fn map_huge_page(vaddr: u64, paddr: u64, flags: u64) -> Result<(), MapError> {
    debug_assert!(vaddr % HUGE_PAGE_SIZE == 0 && paddr % HUGE_PAGE_SIZE == 0);
    let table = walk_to(vaddr, 2)?;
    let pde_ptr = table.add(table_index(vaddr, 2));
    pde_ptr.write_volatile(leaf_entry(paddr, flags | PTE_HUGE));
    invlpg(vaddr);
    Ok(())
}

/// Walk from the PML4 down to the table at `leaf_level`, filling holes.
unsafe fn walk_to(vaddr: u64, leaf_level: u8) -> Result<*mut u64, MapError> {
    let mut table = phys_to_virt(read_cr3());

    for level in (leaf_level + 1..=4).rev() {
        let entry_ptr = table.add(table_index(vaddr, level));
        let mut entry = entry_ptr.read_volatile();

        if entry & PTE_PRESENT == 0 {
            entry = alloc_table()? | PTE_PRESENT | PTE_WRITABLE;
            entry_ptr.write_volatile(entry);
        } else if level < 4 && entry & PTE_HUGE != 0 {
            return Err(MapError::HugePage { level });
        }

        table = phys_to_virt(entry & PTE_ADDR_MASK);
    }
    Ok(table)
}

/// Map `bytes` (rounded up to whole pages) from `paddr` at `vaddr`.
/// Returns the number of pages mapped.
///
/// # Safety
/// Same as `map_page`, for every page in the range.
pub unsafe fn map_range(vaddr: u64, paddr: u64, bytes: u64, flags: u64) -> Result<u64, MapError> {
    let pages = (bytes + PAGE_SIZE - 1) / PAGE_SIZE;
    for page in 0..pages {
        let offset = page * PAGE_SIZE;
        map_page(vaddr + offset, paddr + offset, flags)?;
    }
    Ok(pages)
}

/// Map `bytes` (rounded up to whole 2 MiB pages) from `paddr` at `vaddr`.
/// Returns the number of huge pages mapped.
///
/// # Safety
/// Same as `map_huge_page`, for every page in the range.
pub unsafe fn map_huge_range(vaddr: u64, paddr: u64, bytes: u64, flags: u64) -> Result<u64, MapError> {
    let pages = (bytes + HUGE_PAGE_SIZE - 1) / HUGE_PAGE_SIZE;
    for page in 0..pages {
        let offset = page * HUGE_PAGE_SIZE;
        map_huge_page(vaddr + offset, paddr + offset, flags)?;
    }
    Ok(pages)
}

/// Clear the present bit of the PML4 entry covering `vaddr`, taking out
/// its whole 512 GiB slot. Returns `false` if it was not present.
///
/// # Safety
/// Anything the kernel touches through that slot faults from now on.
pub unsafe fn unmap_top_level(vaddr: u64) -> bool {
    let pml4 = phys_to_virt(read_cr3());
    let entry_ptr = pml4.add(table_index(vaddr, 4));
    let entry = entry_ptr.read_volatile();
    if entry & PTE_PRESENT == 0 {
        return false;
    }
    entry_ptr.write_volatile(entry & !PTE_PRESENT);
    flush_tlb();
    true
}
