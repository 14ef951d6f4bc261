use core::fmt;

/// Why a translation could not be completed, in the order the fault handler
/// checks for them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FaultCause {
    /// No page-table page covers the VPN.
    DirectoryAbsent,
    /// The PTE exists but is not valid.
    EntryInvalid,
    /// Write to a page whose write bit was suppressed for sharing.
    CopyOnWrite,
    /// Write to a page the process was never allowed to write.
    PermissionViolation,
}

impl FaultCause {
    pub const ALL: [FaultCause; 4] = [
        FaultCause::DirectoryAbsent,
        FaultCause::EntryInvalid,
        FaultCause::CopyOnWrite,
        FaultCause::PermissionViolation,
    ];

    /// Only copy-on-write faults can be repaired.
    pub const fn is_recoverable(self) -> bool {
        matches!(self, FaultCause::CopyOnWrite)
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            FaultCause::DirectoryAbsent => "directory absent",
            FaultCause::EntryInvalid => "entry invalid",
            FaultCause::CopyOnWrite => "copy-on-write",
            FaultCause::PermissionViolation => "permission violation",
        }
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
