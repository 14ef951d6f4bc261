use types::Pid;

/// Runtime knobs of the simulator. Geometry (page-table fan-out, frame
/// count, TLB size) is fixed at build time in `types::mmu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Consult and fill the TLB on every translation.
    pub tlb_enabled: bool,
    /// PID of the process that is current at start-up.
    pub init_pid: Pid,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tlb_enabled: false,
            init_pid: 0,
        }
    }
}

impl Config {
    pub fn with_tlb(mut self, enabled: bool) -> Self {
        self.tlb_enabled = enabled;
        self
    }

    pub fn with_init_pid(mut self, pid: Pid) -> Self {
        self.init_pid = pid;
        self
    }
}
