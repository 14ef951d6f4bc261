//! Address-translation and memory-management core of the paging simulator.
//!
//! - [`memory`]: physical frames with mapcounts, and per-process two-level page tables.
//! - [`tlb`]: translation cache for the current process.
//! - [`mmu`]: the translator (TLB first, then page-table walk).
//! - [`fault`]: fault classification and copy-on-write repair.
//! - [`process`]: processes, the ready list, switch and fork.
//! - [`simulator`]: the facade owning all of the above.

pub mod config;
pub mod fault;
pub mod memory;
pub mod metering;
pub mod mmu;
pub mod process;
pub mod simulator;
pub mod tlb;

pub use config::Config;
pub use memory::{FrameTable, PageTable, Pte};
pub use metering::{Metering, NoopMeter, Stats, StatsMeter};
pub use mmu::{Translation, WalkError};
pub use process::{Process, SwitchOutcome};
pub use simulator::Simulator;
pub use tlb::{Tlb, TlbEntry};
