use core::fmt;

use crate::fault::FaultCause;
use crate::mmu::{Access, Pfn, Pid, Vpn};

/// Errors reported by the memory-management core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmError {
    /// `alloc` on a VPN that already has a valid mapping.
    AlreadyMapped { vpn: Vpn, pfn: Pfn },
    /// Every frame has a non-zero mapcount.
    OutOfMemory,
    /// `free` on a VPN without a valid mapping.
    NotMapped(Vpn),
    /// Access that the fault handler could not repair.
    TranslationFailed {
        vpn: Vpn,
        access: Access,
        cause: FaultCause,
    },
    /// VPN outside the two-level address space.
    InvalidVpn(Vpn),
    /// Allocation requested with no permission bits.
    InvalidPermission,
    /// No process with this PID on the ready list.
    NoSuchProcess(Pid),
    /// The operation is not allowed on the running process.
    ProcessIsCurrent(Pid),
    /// Byte access that runs past the end of the page.
    PageOverflow { offset: usize, len: usize },
    /// Frame or PTE accounting is corrupt. Never reachable with correct callers.
    InvariantViolation(&'static str),
}

/// Result alias used across the simulator.
pub type Result<T> = core::result::Result<T, VmError>;

impl VmError {
    /// Numeric code for logs and machine-readable output.
    pub const fn code(&self) -> u16 {
        match self {
            VmError::AlreadyMapped { .. } => 0x01,
            VmError::OutOfMemory => 0x02,
            VmError::NotMapped(_) => 0x03,
            VmError::TranslationFailed { .. } => 0x04,
            VmError::InvalidVpn(_) => 0x05,
            VmError::InvalidPermission => 0x06,
            VmError::NoSuchProcess(_) => 0x07,
            VmError::ProcessIsCurrent(_) => 0x08,
            VmError::PageOverflow { .. } => 0x09,
            VmError::InvariantViolation(_) => 0xff,
        }
    }

    /// Whether the simulation must stop instead of reporting and carrying on.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, VmError::InvariantViolation(_))
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::AlreadyMapped { vpn, pfn } => {
                write!(f, "{} is already allocated to {}", vpn, pfn)
            }
            VmError::OutOfMemory => f.write_str("memory is full"),
            VmError::NotMapped(vpn) => write!(f, "{} is not allocated", vpn),
            VmError::TranslationFailed { vpn, access, cause } => {
                write!(f, "unable to {} {} ({})", access, vpn, cause)
            }
            VmError::InvalidVpn(vpn) => write!(f, "vpn {} is out of range", vpn),
            VmError::InvalidPermission => f.write_str("empty permission set"),
            VmError::NoSuchProcess(pid) => write!(f, "no process with pid {}", pid),
            VmError::ProcessIsCurrent(pid) => write!(f, "pid {} is the current process", pid),
            VmError::PageOverflow { offset, len } => {
                write!(f, "{} bytes at offset {} cross the page end", len, offset)
            }
            VmError::InvariantViolation(what) => write!(f, "invariant violation: {}", what),
        }
    }
}

impl core::error::Error for VmError {}
