//! Physical frames and the per-process two-level page table.

mod frame;
mod page_table;
mod pte;

pub use frame::FrameTable;
pub use page_table::{PageTable, PteDirectory};
pub use pte::Pte;
