use types::{Perms, Pfn};

/// Page table entry used by the software MMU.
///
/// - `valid` gates the whole entry; `pfn` means nothing while it is clear.
/// - `perms` is what the MMU enforces right now.
/// - `original` is what the owning process was granted at allocation time.
///   A fork clears the write bit from `perms` but leaves `original` alone,
///   which is how the fault handler tells a shared page from a read-only one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pte {
    /// Valid bit: entry is present.
    pub valid: bool,
    /// Permissions currently enforced.
    pub perms: Perms,
    /// Physical frame number of the mapping.
    pub pfn: Pfn,
    /// Permissions granted before any copy-on-write suppression.
    pub original: Perms,
}

impl Pte {
    /// A fresh private mapping.
    pub fn mapped(pfn: Pfn, perms: Perms) -> Self {
        Self {
            valid: true,
            perms,
            pfn,
            original: perms,
        }
    }

    /// Write bit suppressed, but the process is entitled to write.
    pub fn is_cow(&self) -> bool {
        self.valid && !self.perms.can_write() && self.original.can_write()
    }

    /// Reset to the invalid state.
    pub fn clear(&mut self) {
        *self = Pte::default();
    }
}
