use log::trace;
use types::{Access, NR_TLB_ENTRIES, Perms, Pfn, Vpn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TlbEntry {
    pub valid: bool,
    pub vpn: Vpn,
    pub perms: Perms,
    pub pfn: Pfn,
}

/// Translation cache for the current process.
///
/// Sized to hold every mapping a page table can contain, so there is no
/// replacement policy: an insert either updates the entry already caching
/// the VPN or takes the first unused slot.
#[derive(Debug, Clone)]
pub struct Tlb {
    entries: Vec<TlbEntry>,
}

impl Default for Tlb {
    fn default() -> Self {
        Self::new()
    }
}

impl Tlb {
    pub fn new() -> Self {
        Self::with_capacity(NR_TLB_ENTRIES)
    }

    pub fn with_capacity(size: usize) -> Self {
        Self {
            entries: vec![TlbEntry::default(); size],
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Cached frame for `vpn`, but only if the cached permissions allow
    /// `access`. A write against a read-only entry misses so that the page
    /// table gets a chance to fault.
    pub fn lookup(&self, vpn: Vpn, access: Access) -> Option<Pfn> {
        let entry = self.find(vpn)?;
        if entry.perms.allows(access) {
            Some(entry.pfn)
        } else {
            None
        }
    }

    pub fn insert(&mut self, vpn: Vpn, perms: Perms, pfn: Pfn) {
        let index = self
            .entries
            .iter()
            .position(|e| e.valid && e.vpn == vpn)
            .or_else(|| self.entries.iter().position(|e| !e.valid))
            // Unreachable with the build-time sizing; keep the cache usable anyway.
            .unwrap_or(vpn.as_usize() % self.entries.len().max(1));
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = TlbEntry {
                valid: true,
                vpn,
                perms,
                pfn,
            };
            trace!("tlb[{}] <- {} -> {} ({})", index, vpn, pfn, perms);
        }
    }

    /// Drop the cached translation for `vpn`, if any.
    pub fn invalidate(&mut self, vpn: Vpn) {
        for entry in self.entries.iter_mut().filter(|e| e.valid && e.vpn == vpn) {
            entry.valid = false;
        }
    }

    pub fn flush(&mut self) {
        for entry in &mut self.entries {
            entry.valid = false;
        }
    }

    /// Valid entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &TlbEntry> + '_ {
        self.entries.iter().filter(|e| e.valid)
    }

    fn find(&self, vpn: Vpn) -> Option<&TlbEntry> {
        self.entries.iter().find(|e| e.valid && e.vpn == vpn)
    }
}
