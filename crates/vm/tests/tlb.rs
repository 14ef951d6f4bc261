use types::{Access, NR_TLB_ENTRIES, Perms, Pfn, Vpn};
use vm::Tlb;

#[test]
fn test_lookup_respects_permissions() {
    let mut tlb = Tlb::new();
    tlb.insert(Vpn(3), Perms::READ, Pfn(9));

    assert_eq!(tlb.lookup(Vpn(3), Access::Read), Some(Pfn(9)));
    // A write must miss so that the page table gets a chance to fault.
    assert_eq!(tlb.lookup(Vpn(3), Access::Write), None);
    assert_eq!(tlb.lookup(Vpn(4), Access::Read), None);
}

#[test]
fn test_insert_updates_in_place() {
    let mut tlb = Tlb::new();
    tlb.insert(Vpn(1), Perms::RW, Pfn(1));
    tlb.insert(Vpn(2), Perms::RW, Pfn(2));
    tlb.insert(Vpn(1), Perms::READ, Pfn(7));

    let entries: Vec<_> = tlb.entries().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].vpn, Vpn(1));
    assert_eq!(entries[0].pfn, Pfn(7));
    assert_eq!(entries[0].perms, Perms::READ);
    assert_eq!(entries[1].vpn, Vpn(2));
}

#[test]
fn test_holds_every_vpn_without_eviction() {
    let mut tlb = Tlb::new();
    assert_eq!(tlb.capacity(), NR_TLB_ENTRIES);
    for vpn in 0..NR_TLB_ENTRIES as u32 {
        tlb.insert(Vpn(vpn), Perms::RW, Pfn(vpn % 128));
    }
    assert_eq!(tlb.entries().count(), NR_TLB_ENTRIES);
    for vpn in 0..NR_TLB_ENTRIES as u32 {
        assert_eq!(tlb.lookup(Vpn(vpn), Access::Write), Some(Pfn(vpn % 128)));
    }
}

#[test]
fn test_invalidate_and_flush() {
    let mut tlb = Tlb::new();
    tlb.insert(Vpn(1), Perms::RW, Pfn(1));
    tlb.insert(Vpn(2), Perms::RW, Pfn(2));

    tlb.invalidate(Vpn(1));
    assert_eq!(tlb.lookup(Vpn(1), Access::Read), None);
    assert_eq!(tlb.lookup(Vpn(2), Access::Read), Some(Pfn(2)));

    // The freed slot is reused.
    tlb.insert(Vpn(5), Perms::READ, Pfn(5));
    assert_eq!(tlb.entries().next().map(|e| e.vpn), Some(Vpn(5)));

    tlb.flush();
    assert_eq!(tlb.entries().count(), 0);
}
