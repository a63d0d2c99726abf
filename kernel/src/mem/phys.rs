/// Physical addresses, the HHDM, and the frame pool page tables come from.
///
/// The only consumer of fresh frames is the page-table builder, and the
/// tables it builds are never torn down, so the pool hands out frames in
/// address order from the usable regions and never takes any back.
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

/// Higher-Half Direct Map offset, set once at boot from Limine's HHDM response.
/// All physical memory is linearly mapped at virtual address (phys + HHDM_OFFSET).
static HHDM_OFFSET: AtomicU64 = AtomicU64::new(0);

/// Set the HHDM offset. Must be called once during early boot before any
/// PhysAddr::as_ptr() calls.
pub fn set_hhdm_offset(offset: u64) {
    HHDM_OFFSET.store(offset, Ordering::Relaxed);
}

pub fn hhdm_offset() -> u64 {
    HHDM_OFFSET.load(Ordering::Relaxed)
}

/// A physical address. Transparent wrapper for clarity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(pub u64);

impl PhysAddr {
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Convert to a virtual pointer via the HHDM (Higher-Half Direct Map).
    /// virt = phys + hhdm_offset.
    pub fn as_ptr<T>(self) -> *mut T {
        (self.0 + hhdm_offset()) as *mut T
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory => write!(f, "out of physical memory"),
        }
    }
}

pub const PAGE_SIZE: u64 = 4096;

/// Frames below 1 MiB are left alone (real-mode leftovers, the VGA hole).
const LOW_MEMORY_END: u64 = 0x10_0000;

/// Usable regions remembered from the memory map; extra regions are ignored.
const MAX_REGIONS: usize = 64;

pub struct FramePool {
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    /// Page-aligned `[start, end)` ranges.
    regions: [(u64, u64); MAX_REGIONS],
    count: usize,
    /// Region currently being carved.
    current: usize,
    /// Next frame in `regions[current]`.
    next: u64,
    handed_out: usize,
}

impl FramePool {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                regions: [(0, 0); MAX_REGIONS],
                count: 0,
                current: 0,
                next: 0,
                handed_out: 0,
            }),
        }
    }

    /// Load `(base, length)` pairs of usable RAM. Bases round up and ends
    /// round down to whole frames; empty or low-memory-only regions drop out.
    /// Returns the number of regions kept.
    pub fn init(&self, regions: &[(u64, u64)]) -> usize {
        let mut inner = self.inner.lock();
        inner.count = 0;

        for &(base, length) in regions {
            if inner.count == MAX_REGIONS {
                break;
            }
            let start = align_up(base.max(LOW_MEMORY_END));
            let end = (base + length) & !(PAGE_SIZE - 1);
            if start < end {
                let slot = inner.count;
                inner.regions[slot] = (start, end);
                inner.count += 1;
            }
        }

        inner.current = 0;
        inner.next = if inner.count > 0 { inner.regions[0].0 } else { 0 };
        inner.handed_out = 0;
        inner.count
    }

    /// Take one frame. The contents are whatever the firmware left there.
    pub fn alloc_frame(&self) -> Result<PhysAddr, AllocError> {
        let mut inner = self.inner.lock();
        while inner.current < inner.count {
            let (_, end) = inner.regions[inner.current];
            if inner.next < end {
                let frame = inner.next;
                inner.next += PAGE_SIZE;
                inner.handed_out += 1;
                return Ok(PhysAddr::new(frame));
            }
            inner.current += 1;
            if inner.current < inner.count {
                inner.next = inner.regions[inner.current].0;
            }
        }
        Err(AllocError::OutOfMemory)
    }

    /// Frames still available.
    pub fn free_count(&self) -> usize {
        let inner = self.inner.lock();
        if inner.current >= inner.count {
            return 0;
        }
        let in_current = (inner.regions[inner.current].1 - inner.next) / PAGE_SIZE;
        let later: u64 = inner.regions[inner.current + 1..inner.count]
            .iter()
            .map(|&(start, end)| (end - start) / PAGE_SIZE)
            .sum();
        (in_current + later) as usize
    }

    pub fn handed_out(&self) -> usize {
        self.inner.lock().handed_out
    }
}

const fn align_up(addr: u64) -> u64 {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Whether `[start, start + len)` lies entirely inside the union of the
/// `(base, length)` RAM regions. Regions may come in any order and may
/// touch or overlap.
pub fn ram_covers(regions: &[(u64, u64)], start: u64, len: u64) -> bool {
    let Some(end) = start.checked_add(len) else {
        return false;
    };
    let mut cursor = start;
    while cursor < end {
        let reach = regions
            .iter()
            .filter(|&&(base, length)| base <= cursor && cursor - base < length)
            .map(|&(base, length)| base.saturating_add(length))
            .max();
        match reach {
            Some(next) => cursor = next,
            None => return false,
        }
    }
    true
}

/// Global frame pool instance.
pub static FRAMES: FramePool = FramePool::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_frames_in_region_order() {
        let pool = FramePool::new();
        let kept = pool.init(&[(0x20_0000, 2 * PAGE_SIZE), (0x80_0000, PAGE_SIZE)]);
        assert_eq!(kept, 2);
        assert_eq!(pool.free_count(), 3);

        assert_eq!(pool.alloc_frame(), Ok(PhysAddr::new(0x20_0000)));
        assert_eq!(pool.alloc_frame(), Ok(PhysAddr::new(0x20_1000)));
        assert_eq!(pool.alloc_frame(), Ok(PhysAddr::new(0x80_0000)));
        assert_eq!(pool.alloc_frame(), Err(AllocError::OutOfMemory));
        assert_eq!(pool.handed_out(), 3);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn regions_are_trimmed_to_whole_frames() {
        let pool = FramePool::new();
        // 0x20_0800..0x20_3800 holds two whole frames.
        pool.init(&[(0x20_0800, 0x3000)]);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.alloc_frame(), Ok(PhysAddr::new(0x20_1000)));
    }

    #[test]
    fn low_memory_is_skipped() {
        let pool = FramePool::new();
        let kept = pool.init(&[(0x1000, 0x9_F000), (0x8_0000, 0x9_0000)]);
        assert_eq!(kept, 1);
        assert_eq!(pool.alloc_frame(), Ok(PhysAddr::new(LOW_MEMORY_END)));
    }

    #[test]
    fn empty_pool_is_out_of_memory() {
        let pool = FramePool::new();
        assert_eq!(pool.init(&[]), 0);
        assert_eq!(pool.alloc_frame(), Err(AllocError::OutOfMemory));
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn window_inside_one_region_is_covered() {
        let ram = [(0x10_0000, 0x7FF0_0000)];
        assert!(ram_covers(&ram, 0x4000_0000, 0x2000_0000));
        assert!(!ram_covers(&ram, 0x4000_0000, 0x8000_0000));
    }

    #[test]
    fn adjacent_regions_cover_together_in_any_order() {
        let ram = [(0x8000_0000, 0x4000_0000), (0x4000_0000, 0x4000_0000)];
        assert!(ram_covers(&ram, 0x4000_0000, 0x8000_0000));
    }

    #[test]
    fn hole_in_the_middle_is_not_covered() {
        // PCI hole between 0xC000_0000 and 0x1_0000_0000.
        let ram = [(0x4000_0000, 0x8000_0000), (0x1_0000_0000, 0x4000_0000)];
        assert!(!ram_covers(&ram, 0x4000_0000, 0x8000_0000 + 0x1000));
    }

    #[test]
    fn nothing_is_covered_by_an_empty_map() {
        assert!(!ram_covers(&[], 0x4000_0000, 0x1000));
        assert!(ram_covers(&[], 0x4000_0000, 0));
        assert!(!ram_covers(&[(0, u64::MAX)], u64::MAX, 2));
    }
}
