// Licensed under the Apache-2.0 license

//! Descriptor queue and indirect SRAM access.

use core::hint::spin_loop;

use sym_crypto_common::descriptor::HW_DESC_SIZE_WORDS;
use sym_crypto_common::HwDesc;

use crate::hil::{CcHal, Reg};

const SRAM_DATA_READY: u32 = 0x1;

pub struct HwQueue<'a, H: CcHal> {
    hal: &'a H,
}

impl<'a, H: CcHal> HwQueue<'a, H> {
    pub fn new(hal: &'a H) -> Self {
        HwQueue { hal }
    }

    pub fn hal(&self) -> &'a H {
        self.hal
    }

    /// Pushes one descriptor, spinning until the queue has a free slot.
    ///
    /// There is no timeout. The last word is fenced on both sides so the engine
    /// never samples a partially written descriptor.
    pub fn push(&self, desc: HwDesc) {
        while self.hal.read(Reg::QueueContent) == 0 {
            spin_loop();
        }
        let words = desc.words();
        let last = HW_DESC_SIZE_WORDS - 1;
        for (i, word) in words[..last].iter().enumerate() {
            self.hal.write(Reg::QueueWord(i), *word);
        }
        self.hal.barrier();
        self.hal.write(Reg::QueueWord(last), words[last]);
        self.hal.barrier();
    }

    fn wait_sram_ready(&self) {
        while self.hal.read(Reg::SramDataReady) & SRAM_DATA_READY == 0 {
            spin_loop();
        }
    }

    pub fn write_sram_words(&self, addr: u32, words: &[u32]) {
        self.hal.write(Reg::SramAddr, addr);
        for word in words {
            self.hal.write(Reg::SramData, *word);
            self.wait_sram_ready();
        }
    }

    /// Writes `data` as little-endian words; a trailing partial word is zero padded.
    pub fn write_sram(&self, addr: u32, data: &[u8]) {
        self.hal.write(Reg::SramAddr, addr);
        for chunk in data.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.hal.write(Reg::SramData, u32::from_le_bytes(word));
            self.wait_sram_ready();
        }
    }

    /// Zeroes `size` bytes, rounded down to whole words.
    pub fn clear_sram(&self, addr: u32, size: u32) {
        self.hal.write(Reg::SramAddr, addr);
        for _ in 0..size / 4 {
            self.hal.write(Reg::SramData, 0);
            self.wait_sram_ready();
        }
    }

    pub fn read_sram(&self, addr: u32, out: &mut [u8]) {
        self.hal.write(Reg::SramAddr, addr);
        // The first data read only primes the read pipeline.
        let _ = self.hal.read(Reg::SramData);
        for chunk in out.chunks_mut(4) {
            self.wait_sram_ready();
            let word = self.hal.read(Reg::SramData).to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        self.wait_sram_ready();
    }
}
