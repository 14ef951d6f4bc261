use log::{debug, trace};
use types::{Access, PAGE_SIZE, Perms, Pfn, Pid, Result, VmError, Vpn};

use crate::config::Config;
use crate::fault;
use crate::memory::{FrameTable, PageTable};
use crate::metering::{Metering, NoopMeter};
use crate::mmu::{Mmu, Translation, WalkError};
use crate::process::{Process, Scheduler, SwitchOutcome};
use crate::tlb::{Tlb, TlbEntry};

/// The whole machine: physical frames, the TLB, and every process.
///
/// All state that the hardware would keep in registers (current process,
/// page-table base, mapcounts) lives here as plain fields, and every
/// operation either completes or leaves it untouched.
#[derive(Debug)]
pub struct Simulator {
    config: Config,
    frames: FrameTable,
    tlb: Tlb,
    sched: Scheduler,
    meter: Box<dyn Metering>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Simulator {
    pub fn new(config: Config) -> Self {
        Self::with_meter(config, Box::new(NoopMeter))
    }

    pub fn with_meter(config: Config, meter: Box<dyn Metering>) -> Self {
        Self {
            config,
            frames: FrameTable::new(),
            tlb: Tlb::new(),
            sched: Scheduler::new(Process::new(config.init_pid)),
            meter,
        }
    }

    /// Map `vpn` in the current process to the smallest free frame.
    pub fn alloc(&mut self, vpn: Vpn, perms: Perms) -> Result<Pfn> {
        check_vpn(vpn)?;
        if perms.is_empty() {
            return Err(VmError::InvalidPermission);
        }
        let pfn = self
            .sched
            .current_mut()
            .page_table
            .populate(&mut self.frames, vpn, perms.normalized())?;
        self.tlb.invalidate(vpn);
        self.meter.on_frame_alloc(pfn);
        debug!("alloc {} -> {} ({})", vpn, pfn, perms.normalized());
        Ok(pfn)
    }

    /// Unmap `vpn` from the current process. The frame stays in use while
    /// other processes still share it.
    pub fn free(&mut self, vpn: Vpn) -> Result<Pfn> {
        check_vpn(vpn)?;
        let pfn = self
            .sched
            .current_mut()
            .page_table
            .release(&mut self.frames, vpn)?;
        self.tlb.invalidate(vpn);
        if self.frames.mapcount(pfn) == 0 {
            self.meter.on_frame_free(pfn);
        }
        debug!("free {} (pfn {})", vpn, pfn);
        Ok(pfn)
    }

    /// One MMU translation against the current process, without fault handling.
    pub fn translate(
        &mut self,
        vpn: Vpn,
        access: Access,
    ) -> core::result::Result<Translation, WalkError> {
        let tlb = if self.config.tlb_enabled {
            Some(&mut self.tlb)
        } else {
            None
        };
        let mut mmu = Mmu::new(Some(&self.sched.current().page_table), tlb);
        mmu.translate(vpn, access, self.meter.as_mut())
    }

    /// Access `vpn` the way a CPU would: translate, and on failure run the
    /// fault handler and translate once more.
    pub fn access(&mut self, vpn: Vpn, access: Access) -> Result<Translation> {
        check_vpn(vpn)?;
        match self.translate(vpn, access) {
            Ok(translation) => return Ok(translation),
            Err(walk) => trace!("translation of {} for {} failed: {:?}", vpn, access, walk),
        }

        fault::handle_page_fault(
            &mut self.sched.current_mut().page_table,
            &mut self.frames,
            &mut self.tlb,
            vpn,
            access,
            self.meter.as_mut(),
        )?;

        self.translate(vpn, access)
            .map_err(|_| VmError::InvariantViolation("page faulted again after repair"))
    }

    /// Store `data` at `offset` within page `vpn`, resolving copy-on-write first.
    pub fn write_bytes(&mut self, vpn: Vpn, offset: usize, data: &[u8]) -> Result<Translation> {
        let range = page_range(offset, data.len())?;
        let translation = self.access(vpn, Access::Write)?;
        self.frames.frame_mut(translation.pfn)[range].copy_from_slice(data);
        Ok(translation)
    }

    /// Load `len` bytes at `offset` within page `vpn`.
    pub fn read_bytes(&mut self, vpn: Vpn, offset: usize, len: usize) -> Result<Vec<u8>> {
        let range = page_range(offset, len)?;
        let translation = self.access(vpn, Access::Read)?;
        Ok(self.frames.frame(translation.pfn)[range].to_vec())
    }

    /// Switch to `pid`, forking the current process if it does not exist.
    ///
    /// Only an accounting corruption found while forking can fail this.
    pub fn switch(&mut self, pid: Pid) -> Result<SwitchOutcome> {
        let from = self.sched.current_pid();
        let outcome = self.sched.switch_to(pid, &mut self.frames)?;
        match outcome {
            SwitchOutcome::AlreadyCurrent => {}
            SwitchOutcome::Switched { .. } => {
                self.tlb.flush();
                self.meter.on_switch(from, pid, false);
            }
            SwitchOutcome::Forked { .. } => {
                self.tlb.flush();
                self.meter.on_switch(from, pid, true);
            }
        }
        Ok(outcome)
    }

    /// Tear down a process parked on the ready list.
    pub fn reap(&mut self, pid: Pid) -> Result<Vec<Pfn>> {
        let released = self.sched.reap(pid, &mut self.frames)?;
        for pfn in &released {
            if self.frames.mapcount(*pfn) == 0 {
                self.meter.on_frame_free(*pfn);
            }
        }
        Ok(released)
    }

    pub fn current_pid(&self) -> Pid {
        self.sched.current_pid()
    }

    pub fn ready_pids(&self) -> Vec<Pid> {
        self.sched.ready_pids().collect()
    }

    pub fn current_page_table(&self) -> &PageTable {
        &self.sched.current().page_table
    }

    pub fn page_table(&self, pid: Pid) -> Option<&PageTable> {
        self.sched.find(pid).map(|p| &p.page_table)
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    pub fn mapcounts(&self) -> &[u32] {
        self.frames.mapcounts()
    }

    pub fn frames_in_use(&self) -> Vec<(Pfn, u32)> {
        self.frames.in_use().collect()
    }

    pub fn tlb_entries(&self) -> Vec<TlbEntry> {
        self.tlb.entries().copied().collect()
    }

    /// Recount every frame reference from the page tables and compare with
    /// the mapcounts; also check the scheduler and TLB bookkeeping.
    pub fn check_invariants(&self) -> Result<()> {
        let mut expected = vec![0u32; self.frames.len()];
        for process in self.sched.processes() {
            for (_, pte) in process.page_table.valid_ptes() {
                let slot = expected
                    .get_mut(pte.pfn.as_usize())
                    .ok_or(VmError::InvariantViolation("pte maps a frame outside memory"))?;
                *slot += 1;
            }
        }
        if expected.as_slice() != self.frames.mapcounts() {
            return Err(VmError::InvariantViolation("mapcount does not match valid ptes"));
        }

        let current = self.sched.current_pid();
        let mut pids: Vec<Pid> = self.sched.ready_pids().collect();
        if pids.contains(&current) {
            return Err(VmError::InvariantViolation("current process is on the ready list"));
        }
        pids.sort_unstable();
        if pids.windows(2).any(|w| w[0] == w[1]) {
            return Err(VmError::InvariantViolation("duplicate pid on the ready list"));
        }

        let table = self.current_page_table();
        for entry in self.tlb.entries() {
            let coherent = table
                .lookup(entry.vpn)
                .is_some_and(|pte| pte.pfn == entry.pfn && pte.perms.contains(entry.perms));
            if !coherent {
                return Err(VmError::InvariantViolation("stale tlb entry"));
            }
        }
        Ok(())
    }
}

fn check_vpn(vpn: Vpn) -> Result<()> {
    if vpn.in_range() {
        Ok(())
    } else {
        Err(VmError::InvalidVpn(vpn))
    }
}

fn page_range(offset: usize, len: usize) -> Result<core::ops::Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= PAGE_SIZE => Ok(offset..end),
        _ => Err(VmError::PageOverflow { offset, len }),
    }
}
