//! Trace-driven front end for the paging simulator.

pub mod logger;
pub mod render;
pub mod runner;
pub mod trace;

pub use render::Format;
pub use runner::{Flow, Options, Runner};
pub use trace::Command;
