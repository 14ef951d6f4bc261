use log::debug;
use types::{NR_PDES_PER_PAGE, NR_PTES_PER_PAGE, Perms, Pfn, Result, VmError, Vpn};

use crate::memory::frame::FrameTable;
use crate::memory::pte::Pte;

/// One page-table page: the PTEs for `NR_PTES_PER_PAGE` consecutive VPNs.
#[derive(Debug, Clone)]
pub struct PteDirectory {
    pub ptes: [Pte; NR_PTES_PER_PAGE],
}

impl Default for PteDirectory {
    fn default() -> Self {
        Self {
            ptes: [Pte::default(); NR_PTES_PER_PAGE],
        }
    }
}

/// Two-level page table owned by a single process.
///
/// The top level holds `NR_PDES_PER_PAGE` optional page-table pages indexed
/// by `vpn / NR_PTES_PER_PAGE`. A page is created the first time a mapping
/// lands in it and is kept for the lifetime of the table.
#[derive(Debug)]
pub struct PageTable {
    pdes: [Option<Box<PteDirectory>>; NR_PDES_PER_PAGE],
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTable {
    pub fn new() -> Self {
        Self {
            pdes: core::array::from_fn(|_| None),
        }
    }

    /// PTE for `vpn`, or `None` when its page-table page was never allocated.
    pub fn resolve(&self, vpn: Vpn) -> Option<&Pte> {
        let dir = self.pdes.get(vpn.pd_index())?.as_deref()?;
        dir.ptes.get(vpn.pte_index())
    }

    pub fn resolve_mut(&mut self, vpn: Vpn) -> Option<&mut Pte> {
        let dir = self.pdes.get_mut(vpn.pd_index())?.as_deref_mut()?;
        dir.ptes.get_mut(vpn.pte_index())
    }

    /// The valid PTE for `vpn`, if any.
    pub fn lookup(&self, vpn: Vpn) -> Option<&Pte> {
        self.resolve(vpn).filter(|pte| pte.valid)
    }

    /// PTE for `vpn`, allocating its page-table page with all entries invalid
    /// on first use.
    pub fn ensure_page(&mut self, vpn: Vpn) -> Result<&mut Pte> {
        let slot = self
            .pdes
            .get_mut(vpn.pd_index())
            .ok_or(VmError::InvalidVpn(vpn))?;
        let dir = slot.get_or_insert_with(|| {
            debug!("page-table page {} allocated", vpn.pd_index());
            Box::default()
        });
        dir.ptes
            .get_mut(vpn.pte_index())
            .ok_or(VmError::InvalidVpn(vpn))
    }

    /// Map `vpn` to a brand-new private frame.
    ///
    /// The frame is claimed before any table is touched, so running out of
    /// memory leaves the table exactly as it was.
    pub fn populate(&mut self, frames: &mut FrameTable, vpn: Vpn, perms: Perms) -> Result<Pfn> {
        if !vpn.in_range() {
            return Err(VmError::InvalidVpn(vpn));
        }
        if let Some(pte) = self.lookup(vpn) {
            return Err(VmError::AlreadyMapped { vpn, pfn: pte.pfn });
        }
        let pfn = frames.allocate()?;
        let pte = match self.ensure_page(vpn) {
            Ok(pte) => pte,
            Err(err) => {
                frames.decrement_ref(pfn)?;
                return Err(err);
            }
        };
        *pte = Pte::mapped(pfn, perms);
        Ok(pfn)
    }

    /// Unmap `vpn`, dropping this table's reference to the frame. Other
    /// processes sharing the frame keep their mappings.
    pub fn release(&mut self, frames: &mut FrameTable, vpn: Vpn) -> Result<Pfn> {
        let pte = self
            .resolve_mut(vpn)
            .filter(|pte| pte.valid)
            .ok_or(VmError::NotMapped(vpn))?;
        let pfn = pte.pfn;
        frames.decrement_ref(pfn)?;
        pte.clear();
        Ok(pfn)
    }

    /// Build a child table sharing every frame of this one.
    ///
    /// Both copies lose the write bit; each keeps the parent's `original`
    /// permissions so that later writes take the copy-on-write path. Every
    /// shared frame gains one reference.
    pub fn fork_cow(&mut self, frames: &mut FrameTable) -> Result<PageTable> {
        // Refuse before mutating anything if the accounting is already off.
        if self.valid_ptes().any(|(_, pte)| frames.mapcount(pte.pfn) == 0) {
            return Err(VmError::InvariantViolation("valid pte maps a free frame"));
        }

        let mut child = PageTable::new();
        for (slot, parent_dir) in child.pdes.iter_mut().zip(self.pdes.iter_mut()) {
            let Some(parent_dir) = parent_dir.as_deref_mut() else {
                continue;
            };
            let mut dir = Box::<PteDirectory>::default();
            for (pte, copy) in parent_dir.ptes.iter_mut().zip(dir.ptes.iter_mut()) {
                if !pte.valid {
                    continue;
                }
                frames.increment_ref(pte.pfn)?;
                pte.perms = pte.perms.read_only();
                *copy = *pte;
            }
            *slot = Some(dir);
        }
        Ok(child)
    }

    /// Release every valid mapping and return the frames that were
    /// referenced. Page-table pages stay allocated.
    pub fn teardown(&mut self, frames: &mut FrameTable) -> Result<Vec<Pfn>> {
        let vpns: Vec<Vpn> = self.valid_ptes().map(|(vpn, _)| vpn).collect();
        vpns.into_iter()
            .map(|vpn| self.release(frames, vpn))
            .collect()
    }

    /// Every entry of every allocated page-table page, invalid ones included.
    pub fn entries(&self) -> impl Iterator<Item = (Vpn, &Pte)> + '_ {
        self.pdes
            .iter()
            .enumerate()
            .filter_map(|(pd, dir)| dir.as_deref().map(|dir| (pd, dir)))
            .flat_map(|(pd, dir)| {
                dir.ptes
                    .iter()
                    .enumerate()
                    .map(move |(index, pte)| (Vpn::from_indices(pd, index), pte))
            })
    }

    pub fn valid_ptes(&self) -> impl Iterator<Item = (Vpn, &Pte)> + '_ {
        self.entries().filter(|(_, pte)| pte.valid)
    }

    /// Number of allocated page-table pages.
    pub fn directory_count(&self) -> usize {
        self.pdes.iter().filter(|dir| dir.is_some()).count()
    }

    pub fn has_directory(&self, pd_index: usize) -> bool {
        self.pdes.get(pd_index).is_some_and(|dir| dir.is_some())
    }
}
