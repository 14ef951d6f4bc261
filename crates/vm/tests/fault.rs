use types::{Access, FaultCause, Perms, Pfn, VmError, Vpn};
use vm::fault::{classify, copy_on_write, handle_page_fault};
use vm::{FrameTable, NoopMeter, PageTable, Tlb};

fn forked_pair(frames: &mut FrameTable, vpn: Vpn, perms: Perms) -> (PageTable, PageTable) {
    let mut parent = PageTable::new();
    parent.populate(frames, vpn, perms).unwrap();
    let child = parent.fork_cow(frames).unwrap();
    (parent, child)
}

#[test]
fn test_classify_precedence() {
    let mut frames = FrameTable::new();
    let mut pt = PageTable::new();
    assert_eq!(classify(&pt, Vpn(3), Access::Read), Some(FaultCause::DirectoryAbsent));

    pt.populate(&mut frames, Vpn(3), Perms::READ).unwrap();
    assert_eq!(classify(&pt, Vpn(4), Access::Write), Some(FaultCause::EntryInvalid));
    assert_eq!(classify(&pt, Vpn(3), Access::Read), None);
    assert_eq!(
        classify(&pt, Vpn(3), Access::Write),
        Some(FaultCause::PermissionViolation)
    );

    let (_, child) = forked_pair(&mut frames, Vpn(9), Perms::RW);
    assert_eq!(classify(&child, Vpn(9), Access::Write), Some(FaultCause::CopyOnWrite));
    assert_eq!(classify(&child, Vpn(9), Access::Read), None);
}

#[test]
fn test_unrecoverable_faults_report_cause() {
    let mut frames = FrameTable::new();
    let mut tlb = Tlb::new();
    let mut meter = NoopMeter;
    let mut pt = PageTable::new();
    pt.populate(&mut frames, Vpn(3), Perms::READ).unwrap();

    let err = handle_page_fault(&mut pt, &mut frames, &mut tlb, Vpn(3), Access::Write, &mut meter)
        .unwrap_err();
    assert_eq!(
        err,
        VmError::TranslationFailed {
            vpn: Vpn(3),
            access: Access::Write,
            cause: FaultCause::PermissionViolation,
        }
    );

    let err = handle_page_fault(&mut pt, &mut frames, &mut tlb, Vpn(100), Access::Read, &mut meter)
        .unwrap_err();
    assert!(matches!(
        err,
        VmError::TranslationFailed {
            cause: FaultCause::DirectoryAbsent,
            ..
        }
    ));
}

#[test]
fn test_fault_on_translatable_page_is_a_bug() {
    let mut frames = FrameTable::new();
    let mut tlb = Tlb::new();
    let mut pt = PageTable::new();
    pt.populate(&mut frames, Vpn(0), Perms::RW).unwrap();
    let err = handle_page_fault(&mut pt, &mut frames, &mut tlb, Vpn(0), Access::Write, &mut NoopMeter)
        .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_cow_copies_into_private_frame() {
    let mut frames = FrameTable::new();
    let (parent, mut child) = forked_pair(&mut frames, Vpn(5), Perms::RW);
    let shared = parent.lookup(Vpn(5)).unwrap().pfn;
    frames.frame_mut(shared)[..3].copy_from_slice(b"abc");

    let mut tlb = Tlb::new();
    tlb.insert(Vpn(5), Perms::READ, shared);
    let cause =
        handle_page_fault(&mut child, &mut frames, &mut tlb, Vpn(5), Access::Write, &mut NoopMeter)
            .unwrap();
    assert_eq!(cause, FaultCause::CopyOnWrite);
    assert_eq!(tlb.entries().count(), 0);

    let pte = child.lookup(Vpn(5)).unwrap();
    assert_ne!(pte.pfn, shared);
    assert_eq!(pte.perms, Perms::RW);
    assert_eq!(&frames.frame(pte.pfn)[..3], b"abc");
    assert_eq!(frames.mapcount(shared), 1);
    assert_eq!(frames.mapcount(pte.pfn), 1);

    // The parent keeps its suppressed write bit until it writes itself.
    assert!(parent.lookup(Vpn(5)).unwrap().is_cow());
}

#[test]
fn test_cow_last_sharer_reuses_smallest_frame() {
    let mut frames = FrameTable::new();
    let (mut parent, mut child) = forked_pair(&mut frames, Vpn(5), Perms::RW);
    let shared = parent.lookup(Vpn(5)).unwrap().pfn;
    assert_eq!(shared, Pfn(0));

    copy_on_write(&mut child, &mut frames, Vpn(5), &mut NoopMeter).unwrap();
    assert_eq!(child.lookup(Vpn(5)).unwrap().pfn, Pfn(1));

    // The parent is now the only user of frame 0, and frame 0 is the smallest
    // free frame once it lets go of it.
    let pfn = copy_on_write(&mut parent, &mut frames, Vpn(5), &mut NoopMeter).unwrap();
    assert_eq!(pfn, Pfn(0));
    assert_eq!(parent.lookup(Vpn(5)).unwrap().perms, Perms::RW);
    assert_eq!(frames.mapcount(Pfn(0)), 1);
}

#[test]
fn test_cow_out_of_memory_rolls_back() {
    let mut frames = FrameTable::with_frames(1);
    let (_parent, mut child) = forked_pair(&mut frames, Vpn(2), Perms::RW);

    let err = copy_on_write(&mut child, &mut frames, Vpn(2), &mut NoopMeter).unwrap_err();
    assert_eq!(err, VmError::OutOfMemory);
    assert_eq!(frames.mapcount(Pfn(0)), 2);
    let pte = child.lookup(Vpn(2)).unwrap();
    assert_eq!(pte.pfn, Pfn(0));
    assert!(pte.is_cow());
}

#[test]
fn test_cow_on_private_page_is_a_bug() {
    let mut frames = FrameTable::new();
    let mut pt = PageTable::new();
    pt.populate(&mut frames, Vpn(0), Perms::RW).unwrap();
    let err = copy_on_write(&mut pt, &mut frames, Vpn(0), &mut NoopMeter).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(frames.mapcount(Pfn(0)), 1);
}
