#![no_std]
//! Shared vocabulary of the paging simulator: geometry constants, page and
//! frame numbers, permission bits, fault causes and the error type.

pub mod mmu;
pub use mmu::*;

pub mod fault;
pub use fault::FaultCause;

pub mod result;
pub use result::{Result, VmError};
