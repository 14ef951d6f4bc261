use std::cell::RefCell;
use std::rc::Rc;

use types::{Access, FaultCause, Pfn, Pid, Vpn};

/// Pluggable observer for the memory-management core. Implementors can count
/// or trace events without changing the core. All methods default to no-op.
pub trait Metering: std::fmt::Debug {
    /// Called for every TLB probe (only when the TLB is enabled).
    fn on_tlb_lookup(&mut self, _vpn: Vpn, _access: Access, _hit: bool) {}

    /// Called after each page-table walk with whether it produced a frame.
    fn on_walk(&mut self, _vpn: Vpn, _access: Access, _ok: bool) {}

    /// Called once the fault handler has classified a fault.
    fn on_fault(&mut self, _vpn: Vpn, _access: Access, _cause: FaultCause, _resolved: bool) {}

    /// Called when copy-on-write repair moves a mapping to a private frame.
    fn on_cow_copy(&mut self, _vpn: Vpn, _from: Pfn, _to: Pfn) {}

    /// Called when a frame goes from free to in use.
    fn on_frame_alloc(&mut self, _pfn: Pfn) {}

    /// Called when a frame's last mapping goes away.
    fn on_frame_free(&mut self, _pfn: Pfn) {}

    /// Called on every process switch; `forked` is set when `to` was just created.
    fn on_switch(&mut self, _from: Pid, _to: Pid, _forked: bool) {}
}

/// Default metering that performs no accounting.
#[derive(Debug, Default)]
pub struct NoopMeter;

impl Metering for NoopMeter {}

/// Event totals gathered by [`StatsMeter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    pub walks: u64,
    pub failed_walks: u64,
    /// Indexed by [`FaultCause::index`].
    pub faults: [u64; 4],
    pub repaired: u64,
    pub cow_copies: u64,
    pub frames_allocated: u64,
    pub frames_freed: u64,
    pub switches: u64,
    pub forks: u64,
}

impl Stats {
    pub fn faults_of(&self, cause: FaultCause) -> u64 {
        self.faults[cause.index()]
    }

    pub fn total_faults(&self) -> u64 {
        self.faults.iter().sum()
    }
}

/// Counts events into a shared [`Stats`] so the caller can read them while
/// the simulator still owns the meter.
#[derive(Debug, Default, Clone)]
pub struct StatsMeter {
    stats: Rc<RefCell<Stats>>,
}

impl StatsMeter {
    pub fn new(stats: Rc<RefCell<Stats>>) -> Self {
        Self { stats }
    }

    pub fn handle(&self) -> Rc<RefCell<Stats>> {
        self.stats.clone()
    }
}

impl Metering for StatsMeter {
    fn on_tlb_lookup(&mut self, _vpn: Vpn, _access: Access, hit: bool) {
        let mut stats = self.stats.borrow_mut();
        if hit {
            stats.tlb_hits += 1;
        } else {
            stats.tlb_misses += 1;
        }
    }

    fn on_walk(&mut self, _vpn: Vpn, _access: Access, ok: bool) {
        let mut stats = self.stats.borrow_mut();
        stats.walks += 1;
        if !ok {
            stats.failed_walks += 1;
        }
    }

    fn on_fault(&mut self, _vpn: Vpn, _access: Access, cause: FaultCause, resolved: bool) {
        let mut stats = self.stats.borrow_mut();
        stats.faults[cause.index()] += 1;
        if resolved {
            stats.repaired += 1;
        }
    }

    fn on_cow_copy(&mut self, _vpn: Vpn, _from: Pfn, _to: Pfn) {
        self.stats.borrow_mut().cow_copies += 1;
    }

    fn on_frame_alloc(&mut self, _pfn: Pfn) {
        self.stats.borrow_mut().frames_allocated += 1;
    }

    fn on_frame_free(&mut self, _pfn: Pfn) {
        self.stats.borrow_mut().frames_freed += 1;
    }

    fn on_switch(&mut self, _from: Pid, _to: Pid, forked: bool) {
        let mut stats = self.stats.borrow_mut();
        stats.switches += 1;
        if forked {
            stats.forks += 1;
        }
    }
}
