use core::fmt;

use bitflags::bitflags;

/// Frame size in bytes (4 KiB).
pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Entries held by one page-table page (low VPN bits).
pub const NR_PTES_PER_PAGE: usize = 16;
/// Directory slots in the top-level table (high VPN bits).
pub const NR_PDES_PER_PAGE: usize = 16;
/// Size of the virtual page space spanned by the two levels.
pub const NR_VPNS: usize = NR_PDES_PER_PAGE * NR_PTES_PER_PAGE;

/// Physical frames available to the simulator.
pub const NR_PAGEFRAMES: usize = 128;

/// The TLB can hold every mapping of one page table, so it never evicts.
pub const NR_TLB_ENTRIES: usize = NR_VPNS;

const _: () = assert!(NR_TLB_ENTRIES >= NR_PDES_PER_PAGE * NR_PTES_PER_PAGE);
const _: () = assert!(NR_PAGEFRAMES > 0 && NR_PTES_PER_PAGE > 0 && NR_PDES_PER_PAGE > 0);

/// Process identifier.
pub type Pid = u32;

/// Virtual page number helper newtype.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Vpn(pub u32);

impl Vpn {
    /// Build a VPN from its directory and entry indices.
    pub const fn from_indices(pd_index: usize, pte_index: usize) -> Self {
        Vpn((pd_index * NR_PTES_PER_PAGE + pte_index) as u32)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Index into the top-level table.
    pub const fn pd_index(self) -> usize {
        self.as_usize() / NR_PTES_PER_PAGE
    }

    /// Index into the page-table page.
    pub const fn pte_index(self) -> usize {
        self.as_usize() % NR_PTES_PER_PAGE
    }

    /// True when the VPN falls inside the space the two levels can map.
    pub const fn in_range(self) -> bool {
        self.as_usize() < NR_VPNS
    }
}

impl From<u32> for Vpn {
    fn from(value: u32) -> Self {
        Vpn(value)
    }
}

impl fmt::Display for Vpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Physical frame number.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pfn(pub u32);

impl Pfn {
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Byte offset of this frame in the physical backing store.
    pub const fn base(self) -> usize {
        self.as_usize() << PAGE_SHIFT
    }
}

impl From<u32> for Pfn {
    fn from(value: u32) -> Self {
        Pfn(value)
    }
}

impl fmt::Display for Pfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

bitflags! {
    /// Permission bits carried by PTEs and TLB entries.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Perms: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const RW = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl Perms {
    /// No access at all; what an invalid PTE carries.
    pub const NONE: Self = Self::empty();

    pub const fn can_write(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Whether a mapping with these bits satisfies `access`.
    pub const fn allows(self, access: Access) -> bool {
        match access {
            Access::Read => self.contains(Self::READ),
            Access::Write => self.contains(Self::WRITE),
        }
    }

    /// Drop the write bit, keeping everything else.
    pub const fn read_only(self) -> Self {
        self.difference(Self::WRITE)
    }

    /// Write access always implies read access.
    pub const fn normalized(self) -> Self {
        if self.is_empty() {
            self
        } else {
            self.union(Self::READ)
        }
    }
}

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.contains(Perms::READ) { 'r' } else { ' ' };
        let w = if self.contains(Perms::WRITE) { 'w' } else { ' ' };
        write!(f, "{}{}", r, w)
    }
}

/// Kind of memory access being translated.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Writes win when a flag carries both bits.
    pub const fn from_perms(perms: Perms) -> Self {
        if perms.contains(Perms::WRITE) {
            Access::Write
        } else {
            Access::Read
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("write"),
        }
    }
}
