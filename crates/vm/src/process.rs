use std::collections::VecDeque;

use log::debug;
use types::{Pfn, Pid, Result, VmError};

use crate::memory::{FrameTable, PageTable};

/// A simulated process: its PID and the page table it exclusively owns.
#[derive(Debug)]
pub struct Process {
    pub pid: Pid,
    pub page_table: PageTable,
}

impl Process {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            page_table: PageTable::new(),
        }
    }
}

/// What `Scheduler::switch_to` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The requested PID was already running.
    AlreadyCurrent,
    /// Resumed a process from the ready list.
    Switched { from: Pid },
    /// No such process existed, so the current one was forked.
    Forked { parent: Pid, shared: usize },
}

/// The running process plus the ready list of everything else.
///
/// The current process is never on the ready list; switching parks it at
/// the tail.
#[derive(Debug)]
pub struct Scheduler {
    current: Process,
    ready: VecDeque<Process>,
}

impl Scheduler {
    pub fn new(init: Process) -> Self {
        Self {
            current: init,
            ready: VecDeque::new(),
        }
    }

    pub fn current(&self) -> &Process {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut Process {
        &mut self.current
    }

    pub fn current_pid(&self) -> Pid {
        self.current.pid
    }

    /// PIDs on the ready list, head first.
    pub fn ready_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.ready.iter().map(|p| p.pid)
    }

    pub fn find(&self, pid: Pid) -> Option<&Process> {
        if self.current.pid == pid {
            return Some(&self.current);
        }
        self.ready.iter().find(|p| p.pid == pid)
    }

    /// Every process, current first.
    pub fn processes(&self) -> impl Iterator<Item = &Process> + '_ {
        std::iter::once(&self.current).chain(self.ready.iter())
    }

    /// Make `pid` the current process, forking the current one if no
    /// process has that PID.
    pub fn switch_to(&mut self, pid: Pid, frames: &mut FrameTable) -> Result<SwitchOutcome> {
        if pid == self.current.pid {
            return Ok(SwitchOutcome::AlreadyCurrent);
        }

        let next = match self.ready.iter().position(|p| p.pid == pid) {
            Some(index) => self
                .ready
                .remove(index)
                .ok_or(VmError::InvariantViolation("ready list changed under switch"))?,
            None => {
                let page_table = self.current.page_table.fork_cow(frames)?;
                let child = Process { pid, page_table };
                let parent = std::mem::replace(&mut self.current, child);
                let shared = parent.page_table.valid_ptes().count();
                debug!("fork {} -> {} sharing {} pages", parent.pid, pid, shared);
                let outcome = SwitchOutcome::Forked {
                    parent: parent.pid,
                    shared,
                };
                self.ready.push_back(parent);
                return Ok(outcome);
            }
        };

        let prev = std::mem::replace(&mut self.current, next);
        debug!("switch {} -> {}", prev.pid, pid);
        let outcome = SwitchOutcome::Switched { from: prev.pid };
        self.ready.push_back(prev);
        Ok(outcome)
    }

    /// Remove a parked process and drop every frame reference it holds.
    /// Returns the frames it was mapping.
    pub fn reap(&mut self, pid: Pid, frames: &mut FrameTable) -> Result<Vec<Pfn>> {
        if pid == self.current.pid {
            return Err(VmError::ProcessIsCurrent(pid));
        }
        let index = self
            .ready
            .iter()
            .position(|p| p.pid == pid)
            .ok_or(VmError::NoSuchProcess(pid))?;
        let mut process = self
            .ready
            .remove(index)
            .ok_or(VmError::NoSuchProcess(pid))?;
        let released = process.page_table.teardown(frames)?;
        debug!("reaped {} releasing {} pages", pid, released.len());
        Ok(released)
    }
}
