// Licensed under the Apache-2.0 license

//! Host-side platform services for driving the engine model: identity DMA
//! mappings with fragmentation and failure injection, a checking mutex and a
//! panicking abort handler.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use log::{trace, warn};
use sym_crypto_common::FatalError;
use sym_crypto_driver::hil::{AbortHandler, DmaBlock, DmaDirection, DmaMapper, PalError, PalMutex};
use zerocopy::IntoBytes;

pub const PAL_ERR_INJECTED: PalError = PalError(1);
pub const PAL_ERR_BAD_HANDLE: PalError = PalError(2);
pub const PAL_ERR_LOCK_STATE: PalError = PalError(3);

/// One `map` call as the mapper saw it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mapping {
    pub handle: u32,
    pub addr: usize,
    pub size: usize,
    pub dir: DmaDirection,
    /// Fragments the buffer spans.
    pub count: usize,
}

/// Word-aligned contiguous memory.
pub struct MockBuffer {
    words: Box<[u32]>,
    len: usize,
}

impl AsRef<[u8]> for MockBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.words.as_bytes()[..self.len]
    }
}

impl AsMut<[u8]> for MockBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.words.as_mut_bytes()[..self.len]
    }
}

#[derive(Default)]
struct MapperState {
    next_handle: u32,
    live: Vec<Mapping>,
    history: Vec<Mapping>,
    fragments: HashMap<usize, Vec<usize>>,
    fail_map_in: Option<usize>,
    fail_unmap_in: Option<usize>,
    fail_alloc_in: Option<usize>,
    allocations: usize,
}

/// DMA mapper whose bus addresses equal host virtual addresses.
///
/// A buffer is contiguous unless a fragment plan was registered for its
/// address, in which case `map` splits it into the planned runs.
#[derive(Default)]
pub struct MockDmaMapper {
    state: RefCell<MapperState>,
}

impl MockDmaMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits the buffer at `addr` into runs of `sizes` bytes when it is mapped.
    pub fn fragment(&self, addr: usize, sizes: &[usize]) {
        self.state
            .borrow_mut()
            .fragments
            .insert(addr, sizes.to_vec());
    }

    /// Fails the `n`th `map` call from now, counting from zero.
    pub fn fail_map_in(&self, n: usize) {
        self.state.borrow_mut().fail_map_in = Some(n);
    }

    /// Fails the `n`th `unmap` call from now, counting from zero. The mapping
    /// stays live.
    pub fn fail_unmap_in(&self, n: usize) {
        self.state.borrow_mut().fail_unmap_in = Some(n);
    }

    /// Fails the `n`th `alloc_contiguous` call from now, counting from zero.
    pub fn fail_alloc_in(&self, n: usize) {
        self.state.borrow_mut().fail_alloc_in = Some(n);
    }

    /// Mappings made and not yet released.
    pub fn outstanding(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Contiguous allocations not yet freed.
    pub fn allocations(&self) -> usize {
        self.state.borrow().allocations
    }

    /// Every `map` call since the last [`MockDmaMapper::clear_history`].
    pub fn history(&self) -> Vec<Mapping> {
        self.state.borrow().history.clone()
    }

    pub fn clear_history(&self) {
        self.state.borrow_mut().history.clear();
    }

    /// Returns true if `[phys, phys + len)` lies inside one live mapping.
    pub fn is_mapped(&self, phys: u64, len: usize) -> bool {
        let start = phys as usize;
        let Some(end) = start.checked_add(len) else {
            return false;
        };
        self.state
            .borrow()
            .live
            .iter()
            .any(|m| m.addr <= start && end <= m.addr + m.size)
    }
}

/// Counts a pending injected failure down; true when it fires now.
fn fire(countdown: &mut Option<usize>) -> bool {
    match countdown {
        Some(0) => {
            *countdown = None;
            true
        }
        Some(n) => {
            *n -= 1;
            false
        }
        None => false,
    }
}

impl DmaMapper for MockDmaMapper {
    type Handle = u32;
    type Buffer = MockBuffer;

    fn is_contiguous(&self, addr: usize, _size: usize) -> bool {
        !self.state.borrow().fragments.contains_key(&addr)
    }

    fn map(
        &self,
        addr: usize,
        size: usize,
        dir: DmaDirection,
        blocks: &mut [DmaBlock],
    ) -> Result<(usize, u32), PalError> {
        let mut state = self.state.borrow_mut();
        if fire(&mut state.fail_map_in) {
            warn!("Injected map failure at 0x{:x}", addr);
            return Err(PAL_ERR_INJECTED);
        }

        let runs = state
            .fragments
            .get(&addr)
            .cloned()
            .unwrap_or_else(|| vec![size]);
        let mut offset = 0;
        for (block, run) in blocks.iter_mut().zip(&runs) {
            *block = DmaBlock {
                phys: (addr + offset) as u64,
                size: *run as u32,
            };
            offset += run;
        }

        let handle = state.next_handle;
        state.next_handle += 1;
        let mapping = Mapping {
            handle,
            addr,
            size,
            dir,
            count: runs.len(),
        };
        trace!("Mapped {:?}", mapping);
        state.live.push(mapping);
        state.history.push(mapping);
        Ok((runs.len(), handle))
    }

    fn unmap(
        &self,
        addr: usize,
        size: usize,
        _dir: DmaDirection,
        handle: u32,
    ) -> Result<(), PalError> {
        let mut state = self.state.borrow_mut();
        if fire(&mut state.fail_unmap_in) {
            warn!("Injected unmap failure at 0x{:x}", addr);
            return Err(PAL_ERR_INJECTED);
        }
        let index = state
            .live
            .iter()
            .position(|m| m.handle == handle && m.addr == addr && m.size == size)
            .ok_or_else(|| {
                warn!("Unmap of unknown handle {} at 0x{:x}", handle, addr);
                PAL_ERR_BAD_HANDLE
            })?;
        state.live.swap_remove(index);
        Ok(())
    }

    fn alloc_contiguous(&self, size: usize) -> Result<MockBuffer, PalError> {
        let mut state = self.state.borrow_mut();
        if fire(&mut state.fail_alloc_in) {
            warn!("Injected allocation failure of {} bytes", size);
            return Err(PAL_ERR_INJECTED);
        }
        state.allocations += 1;
        Ok(MockBuffer {
            words: vec![0u32; size.div_ceil(4)].into_boxed_slice(),
            len: size,
        })
    }

    fn free_contiguous(&self, _buf: MockBuffer) {
        let mut state = self.state.borrow_mut();
        state.allocations = state.allocations.saturating_sub(1);
    }
}

/// Non-reentrant lock that reports misuse as a platform error.
#[derive(Default)]
pub struct MockMutex {
    locked: Cell<bool>,
    acquisitions: Cell<usize>,
    fail_lock: Cell<bool>,
    fail_unlock: Cell<bool>,
}

impl MockMutex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.get()
    }

    pub fn fail_lock(&self, fail: bool) {
        self.fail_lock.set(fail);
    }

    pub fn fail_unlock(&self, fail: bool) {
        self.fail_unlock.set(fail);
    }
}

impl PalMutex for MockMutex {
    fn lock(&self) -> Result<(), PalError> {
        if self.fail_lock.get() {
            return Err(PAL_ERR_INJECTED);
        }
        if self.locked.replace(true) {
            warn!("Driver mutex taken twice");
            return Err(PAL_ERR_LOCK_STATE);
        }
        self.acquisitions.set(self.acquisitions.get() + 1);
        Ok(())
    }

    fn unlock(&self) -> Result<(), PalError> {
        if !self.locked.replace(false) {
            return Err(PAL_ERR_LOCK_STATE);
        }
        if self.fail_unlock.get() {
            return Err(PAL_ERR_INJECTED);
        }
        Ok(())
    }
}

/// Turns a fatal driver error into a panic.
pub struct PanicAbort;

impl AbortHandler for PanicAbort {
    fn abort(&self, err: FatalError) -> ! {
        panic!("Fatal driver error: {}", err)
    }
}
