use log::trace;
use types::{Access, Pfn, Vpn};

use crate::memory::{PageTable, Pte};
use crate::metering::Metering;
use crate::tlb::Tlb;

/// Successful translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    pub pfn: Pfn,
    /// Answered by the TLB without walking the page table.
    pub from_tlb: bool,
}

/// Where a walk stopped. The fault handler decides what each one means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkError {
    /// No page table is installed in the base register.
    NoPageTable,
    DirectoryAbsent,
    EntryInvalid,
    /// Valid entry without the write bit, for a write access.
    WriteProtected,
}

/// The address-translation hardware: a base register pointing at the active
/// page table, and an optional TLB in front of it.
#[derive(Debug)]
pub struct Mmu<'a> {
    pub ptbr: Option<&'a PageTable>,
    pub tlb: Option<&'a mut Tlb>,
}

impl<'a> Mmu<'a> {
    pub fn new(ptbr: Option<&'a PageTable>, tlb: Option<&'a mut Tlb>) -> Self {
        Self { ptbr, tlb }
    }

    /// Translate `vpn` for `access`.
    ///
    /// The TLB is consulted first; a miss (or a hit whose cached permissions
    /// do not cover `access`) falls back to walking the page table. A walk
    /// that succeeds refills the TLB.
    pub fn translate(
        &mut self,
        vpn: Vpn,
        access: Access,
        meter: &mut dyn Metering,
    ) -> Result<Translation, WalkError> {
        if let Some(tlb) = self.tlb.as_deref() {
            let hit = tlb.lookup(vpn, access);
            meter.on_tlb_lookup(vpn, access, hit.is_some());
            if let Some(pfn) = hit {
                trace!("tlb hit {} -> {}", vpn, pfn);
                return Ok(Translation {
                    pfn,
                    from_tlb: true,
                });
            }
        }

        let walked = self.walk(vpn, access);
        meter.on_walk(vpn, access, walked.is_ok());
        let pte = walked?;

        if let Some(tlb) = self.tlb.as_deref_mut() {
            tlb.insert(vpn, pte.perms, pte.pfn);
        }
        Ok(Translation {
            pfn: pte.pfn,
            from_tlb: false,
        })
    }

    fn walk(&self, vpn: Vpn, access: Access) -> Result<Pte, WalkError> {
        let table = self.ptbr.ok_or(WalkError::NoPageTable)?;
        let pte = table.resolve(vpn).ok_or(WalkError::DirectoryAbsent)?;
        if !pte.valid {
            return Err(WalkError::EntryInvalid);
        }
        if access == Access::Write && !pte.perms.can_write() {
            return Err(WalkError::WriteProtected);
        }
        trace!("walk {} -> {} ({})", vpn, pte.pfn, pte.perms);
        Ok(*pte)
    }
}
