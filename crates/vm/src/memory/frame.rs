use log::{debug, trace};
use types::{NR_PAGEFRAMES, PAGE_SIZE, Pfn, Result, VmError};

/// Physical memory: a contiguous backing buffer cut into frames, plus the
/// number of valid PTEs (across every process) that reference each frame.
///
/// A frame with mapcount 0 is free. `allocate` always hands out the free
/// frame with the smallest number.
#[derive(Debug, Clone)]
pub struct FrameTable {
    mapcounts: Vec<u32>,
    backing: Vec<u8>,
}

impl Default for FrameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTable {
    pub fn new() -> Self {
        Self::with_frames(NR_PAGEFRAMES)
    }

    /// Physical memory with `count` frames. Used by tests that want a tiny machine.
    pub fn with_frames(count: usize) -> Self {
        Self {
            mapcounts: vec![0; count],
            backing: vec![0u8; count * PAGE_SIZE],
        }
    }

    pub fn len(&self) -> usize {
        self.mapcounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapcounts.is_empty()
    }

    /// Claim the smallest free frame, zero it, and set its mapcount to 1.
    pub fn allocate(&mut self) -> Result<Pfn> {
        let index = self
            .mapcounts
            .iter()
            .position(|&count| count == 0)
            .ok_or(VmError::OutOfMemory)?;
        self.mapcounts[index] = 1;
        let pfn = Pfn(index as u32);
        self.frame_mut(pfn).fill(0);
        debug!("frame {} allocated", pfn);
        Ok(pfn)
    }

    /// Add one sharer to a frame that is already in use.
    pub fn increment_ref(&mut self, pfn: Pfn) -> Result<u32> {
        let count = self.slot_mut(pfn)?;
        if *count == 0 {
            return Err(VmError::InvariantViolation("sharing a free frame"));
        }
        *count += 1;
        trace!("frame {} mapcount -> {}", pfn, *count);
        Ok(*count)
    }

    /// Drop one sharer. Returns the remaining count; 0 means the frame is free.
    pub fn decrement_ref(&mut self, pfn: Pfn) -> Result<u32> {
        let count = self.slot_mut(pfn)?;
        if *count == 0 {
            return Err(VmError::InvariantViolation("mapcount underflow"));
        }
        *count -= 1;
        trace!("frame {} mapcount -> {}", pfn, *count);
        if *count == 0 {
            debug!("frame {} released", pfn);
        }
        Ok(*count)
    }

    /// Current mapcount of `pfn` (0 for numbers outside physical memory).
    pub fn mapcount(&self, pfn: Pfn) -> u32 {
        self.mapcounts.get(pfn.as_usize()).copied().unwrap_or(0)
    }

    pub fn mapcounts(&self) -> &[u32] {
        &self.mapcounts
    }

    /// `(pfn, mapcount)` for every frame in use, in frame order.
    pub fn in_use(&self) -> impl Iterator<Item = (Pfn, u32)> + '_ {
        self.mapcounts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(index, count)| (Pfn(index as u32), *count))
    }

    pub fn free_count(&self) -> usize {
        self.mapcounts.iter().filter(|count| **count == 0).count()
    }

    /// Contents of a frame.
    ///
    /// Panics if `pfn` lies outside physical memory; PTEs only ever hold
    /// numbers handed out by `allocate`.
    pub fn frame(&self, pfn: Pfn) -> &[u8] {
        let base = pfn.base();
        &self.backing[base..base + PAGE_SIZE]
    }

    pub fn frame_mut(&mut self, pfn: Pfn) -> &mut [u8] {
        let base = pfn.base();
        &mut self.backing[base..base + PAGE_SIZE]
    }

    fn slot_mut(&mut self, pfn: Pfn) -> Result<&mut u32> {
        self.mapcounts
            .get_mut(pfn.as_usize())
            .ok_or(VmError::InvariantViolation("frame number out of range"))
    }
}
