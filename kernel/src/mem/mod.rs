pub mod phys;
pub mod pte;
#[cfg(not(test))]
pub mod paging;

pub use phys::{
    hhdm_offset, ram_covers, set_hhdm_offset, AllocError, FramePool, PhysAddr, FRAMES, PAGE_SIZE,
};
