// Licensed under the Apache-2.0 license

//! Platform stand-ins for unit tests.
//!
//! [`RecordingHal`] records descriptors without executing them. SRAM is
//! modelled only for the indirect access path so direct writes by the driver
//! can be checked. [`FakeMapper`] maps host addresses one to one.

use core::cell::{Cell, RefCell};

use sym_crypto_common::descriptor::HW_DESC_SIZE_WORDS;
use sym_crypto_common::{HwDesc, SymDriverConfig};
use zerocopy::IntoBytes;

use crate::driver::DriverEnv;
use crate::hil::{CcHal, DmaBlock, DmaDirection, DmaMapper, PalError, Reg};
use crate::hw_queue::HwQueue;
use crate::mlli::MlliManager;

pub const CTX_ADDR: u32 = 0x100;

#[derive(Default)]
struct HalState {
    words: [u32; HW_DESC_SIZE_WORDS],
    descriptors: Vec<HwDesc>,
    sram: Vec<u8>,
    sram_addr: u32,
    sram_primed: bool,
}

pub struct RecordingHal {
    state: RefCell<HalState>,
}

impl RecordingHal {
    pub fn new(sram_size: usize) -> Self {
        RecordingHal {
            state: RefCell::new(HalState {
                sram: vec![0; sram_size],
                ..Default::default()
            }),
        }
    }

    pub fn descriptors(&self) -> Vec<HwDesc> {
        self.state.borrow().descriptors.clone()
    }

    pub fn sram(&self, addr: u32, len: usize) -> Vec<u8> {
        let addr = addr as usize;
        self.state.borrow().sram[addr..addr + len].to_vec()
    }

    pub fn fill_sram(&self, addr: u32, data: &[u8]) {
        let addr = addr as usize;
        self.state.borrow_mut().sram[addr..addr + data.len()].copy_from_slice(data);
    }
}

impl CcHal for RecordingHal {
    fn read(&self, reg: Reg) -> u32 {
        let mut state = self.state.borrow_mut();
        match reg {
            Reg::QueueContent | Reg::SramDataReady => 1,
            Reg::SramData if !state.sram_primed => {
                state.sram_primed = true;
                0
            }
            Reg::SramData => {
                let addr = state.sram_addr as usize;
                state.sram_addr += 4;
                let mut word = [0u8; 4];
                word.copy_from_slice(&state.sram[addr..addr + 4]);
                u32::from_le_bytes(word)
            }
            _ => 0,
        }
    }

    fn write(&self, reg: Reg, val: u32) {
        let mut state = self.state.borrow_mut();
        match reg {
            Reg::QueueWord(i) => {
                state.words[i] = val;
                if i == HW_DESC_SIZE_WORDS - 1 {
                    let desc = HwDesc::from_words(state.words);
                    state.descriptors.push(desc);
                }
            }
            Reg::SramAddr => {
                state.sram_addr = val;
                state.sram_primed = false;
            }
            Reg::SramData => {
                let addr = state.sram_addr as usize;
                state.sram_addr += 4;
                state.sram[addr..addr + 4].copy_from_slice(&val.to_le_bytes());
            }
            _ => {}
        }
    }

    fn barrier(&self) {}

    fn wait_interrupt(&self, irq_mask: u32) -> u32 {
        irq_mask
    }
}

/// Runs `f` with an environment whose context cache sits at [`CTX_ADDR`].
pub fn with_env<R>(hal: &RecordingHal, f: impl FnOnce(&DriverEnv<'_, RecordingHal>) -> R) -> R {
    let queue = HwQueue::new(hal);
    let mlli = MlliManager::new(&SymDriverConfig::default());
    let env = DriverEnv::new(&queue, &mlli, CTX_ADDR);
    f(&env)
}

/// Word-aligned contiguous allocation.
pub struct FakeBuffer {
    words: Vec<u32>,
    len: usize,
}

impl AsRef<[u8]> for FakeBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.words.as_bytes()[..self.len]
    }
}

impl AsMut<[u8]> for FakeBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.words.as_mut_bytes()[..self.len]
    }
}

pub const FAKE_UNMAP_ERR: PalError = PalError(0x77);

/// Identity mapper. Buffers registered with `fragment` map to the given runs.
#[derive(Default)]
pub struct FakeMapper {
    fragments: RefCell<Vec<(usize, Vec<usize>)>>,
    live: RefCell<Vec<(u32, usize)>>,
    next_handle: Cell<u32>,
    fail_unmap: Cell<bool>,
}

impl FakeMapper {
    pub fn fragment(&self, addr: usize, runs: &[usize]) {
        self.fragments.borrow_mut().push((addr, runs.to_vec()));
    }

    /// Makes the next `unmap` fail and keep its mapping.
    pub fn fail_next_unmap(&self) {
        self.fail_unmap.set(true);
    }

    pub fn outstanding(&self) -> usize {
        self.live.borrow().len()
    }

    fn runs(&self, addr: usize) -> Option<Vec<usize>> {
        self.fragments
            .borrow()
            .iter()
            .find(|(start, _)| *start == addr)
            .map(|(_, runs)| runs.clone())
    }
}

impl DmaMapper for FakeMapper {
    type Handle = u32;
    type Buffer = FakeBuffer;

    fn is_contiguous(&self, addr: usize, _size: usize) -> bool {
        self.runs(addr).is_none()
    }

    fn map(
        &self,
        addr: usize,
        size: usize,
        _dir: DmaDirection,
        blocks: &mut [DmaBlock],
    ) -> Result<(usize, u32), PalError> {
        let runs = self.runs(addr).unwrap_or_else(|| vec![size]);
        let mut offset = 0;
        for (block, run) in blocks.iter_mut().zip(&runs) {
            *block = DmaBlock {
                phys: (addr + offset) as u64,
                size: *run as u32,
            };
            offset += run;
        }
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        self.live.borrow_mut().push((handle, addr));
        Ok((runs.len(), handle))
    }

    fn unmap(
        &self,
        _addr: usize,
        _size: usize,
        _dir: DmaDirection,
        handle: u32,
    ) -> Result<(), PalError> {
        if self.fail_unmap.replace(false) {
            return Err(FAKE_UNMAP_ERR);
        }
        self.live.borrow_mut().retain(|(live, _)| *live != handle);
        Ok(())
    }

    fn alloc_contiguous(&self, size: usize) -> Result<FakeBuffer, PalError> {
        Ok(FakeBuffer {
            words: vec![0; size.div_ceil(4)],
            len: size,
        })
    }

    fn free_contiguous(&self, _buf: FakeBuffer) {}
}
