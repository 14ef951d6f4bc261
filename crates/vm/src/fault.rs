//! Page-fault classification and copy-on-write repair.
//!
//! A fault is classified by checking, in order: is there a page-table page
//! for the VPN, is the entry valid, and for writes, was the write bit
//! suppressed by a fork (`original` still grants it) or never granted.
//! Only the copy-on-write case is repairable.

use log::{debug, warn};
use types::{Access, FaultCause, Pfn, Result, VmError, Vpn};

use crate::memory::{FrameTable, PageTable};
use crate::metering::Metering;
use crate::tlb::Tlb;

/// Why `vpn` cannot be translated for `access`, or `None` if it can.
pub fn classify(table: &PageTable, vpn: Vpn, access: Access) -> Option<FaultCause> {
    let Some(pte) = table.resolve(vpn) else {
        return Some(FaultCause::DirectoryAbsent);
    };
    if !pte.valid {
        return Some(FaultCause::EntryInvalid);
    }
    if access == Access::Write && !pte.perms.can_write() {
        if pte.original.can_write() {
            return Some(FaultCause::CopyOnWrite);
        }
        return Some(FaultCause::PermissionViolation);
    }
    None
}

/// Handle a failed translation of `vpn` for `access`.
///
/// Returns the repaired cause when the caller may retry the translation,
/// or `TranslationFailed` when the fault is genuine.
pub fn handle_page_fault(
    table: &mut PageTable,
    frames: &mut FrameTable,
    tlb: &mut Tlb,
    vpn: Vpn,
    access: Access,
    meter: &mut dyn Metering,
) -> Result<FaultCause> {
    let cause = classify(table, vpn, access)
        .ok_or(VmError::InvariantViolation("fault on a translatable page"))?;

    if !cause.is_recoverable() {
        warn!("{} fault on {} for {}", cause, vpn, access);
        meter.on_fault(vpn, access, cause, false);
        return Err(VmError::TranslationFailed { vpn, access, cause });
    }

    copy_on_write(table, frames, vpn, meter)?;
    tlb.invalidate(vpn);
    meter.on_fault(vpn, access, cause, true);
    Ok(cause)
}

/// Give `vpn` a private copy of the frame it shares and restore its
/// original permissions.
///
/// The shared reference is dropped first and the smallest free frame is
/// taken, so a process that turns out to be the last sharer may get its
/// own frame back. If no frame is free the reference is restored and the
/// mapping is left untouched.
pub fn copy_on_write(
    table: &mut PageTable,
    frames: &mut FrameTable,
    vpn: Vpn,
    meter: &mut dyn Metering,
) -> Result<Pfn> {
    let pte = table
        .resolve_mut(vpn)
        .filter(|pte| pte.is_cow())
        .ok_or(VmError::InvariantViolation("copy-on-write on a private page"))?;

    let shared = pte.pfn;
    let contents = frames.frame(shared).to_vec();
    let remaining = frames.decrement_ref(shared)?;
    let private = match frames.allocate() {
        Ok(pfn) => pfn,
        Err(err) => {
            frames.increment_ref(shared)?;
            return Err(err);
        }
    };
    frames.frame_mut(private).copy_from_slice(&contents);

    pte.pfn = private;
    pte.perms = pte.original;

    if private != shared {
        if remaining == 0 {
            meter.on_frame_free(shared);
        }
        meter.on_frame_alloc(private);
        meter.on_cow_copy(vpn, shared, private);
    }
    debug!("cow {}: frame {} -> {} ({} sharers left)", vpn, shared, private, remaining);
    Ok(private)
}
