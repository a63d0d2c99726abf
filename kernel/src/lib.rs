#![no_std]
#![feature(abi_x86_interrupt)]
#![allow(dead_code)]

// Host-target tests use heap-backed mocks; the kernel itself has no heap.
#[cfg(test)]
extern crate alloc;

pub mod config;
pub mod mem;
pub mod monitor;
pub mod power;

// Hardware-dependent modules: kernel target only, not host-target tests
#[cfg(not(test))]
pub mod arch;
