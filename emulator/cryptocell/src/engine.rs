// Licensed under the Apache-2.0 license

//! Register-level model of the engine host interface.
//!
//! Descriptor words are latched and the descriptor runs when word 5 is written.
//! Only bypass flows move data. Every other flow is recorded and otherwise
//! ignored, which is what the driver tests inspect. A descriptor marked last
//! whose output goes to host memory bumps the AXI completion counter and
//! raises the completion interrupt.

use std::cell::RefCell;
use std::ops::Range;

use log::{debug, trace, warn};
use sym_crypto_common::context::CryptoKeyType;
use sym_crypto_common::descriptor::{DmaMode, FlowMode, HW_DESC_SIZE_WORDS};
use sym_crypto_common::lli::{decode_table, LliEntry, LLI_ENTRY_BYTE_SIZE};
use sym_crypto_common::HwDesc;
use sym_crypto_driver::hil::{CcHal, KeyStatus, Reg, AXIM_COMP_INT_BIT};

use crate::platform::MockDmaMapper;

/// AXI monitor flag raised for an access outside every live mapping.
pub const AXI_ERR_UNMAPPED: u32 = 1 << 0;
/// AXI monitor flag raised for an SRAM access past the end of SRAM.
pub const AXI_ERR_SRAM_RANGE: u32 = 1 << 1;

const IMR_RESET: u32 = 0xFFFF_FFFF;
const QUEUE_SLOTS: u32 = 8;

/// One host-interface access, in the order the driver issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Read(Reg),
    Write(Reg, u32),
    Barrier,
    Wait(u32),
}

/// Misbehavior applied at the next interrupt wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The completion interrupt arrives but nothing was counted.
    DropCompletion,
    /// One more write completes than the driver issued.
    ExtraCompletion,
    AxiError(u32),
}

struct EngineState {
    queue: [u32; HW_DESC_SIZE_WORDS],
    free_slots: u32,
    stall_polls: u32,
    imr: u32,
    irq_status: u32,
    axim_comp: u32,
    axim_err: u32,
    sram: Vec<u8>,
    sram_addr: u32,
    sram_primed: bool,
    descriptors: Vec<HwDesc>,
    events: Vec<BusEvent>,
    fault: Option<Fault>,
    key_status: KeyStatus,
}

pub struct CryptoCell<'m> {
    mapper: &'m MockDmaMapper,
    state: RefCell<EngineState>,
}

impl<'m> CryptoCell<'m> {
    /// Creates an engine with `sram_size` bytes of zeroed SRAM that reaches host
    /// memory through the mappings of `mapper`.
    pub fn new(mapper: &'m MockDmaMapper, sram_size: usize) -> Self {
        CryptoCell {
            mapper,
            state: RefCell::new(EngineState {
                queue: [0; HW_DESC_SIZE_WORDS],
                free_slots: QUEUE_SLOTS,
                stall_polls: 0,
                imr: IMR_RESET,
                irq_status: 0,
                axim_comp: 0,
                axim_err: 0,
                sram: vec![0; sram_size],
                sram_addr: 0,
                sram_primed: false,
                descriptors: Vec::new(),
                events: Vec::new(),
                fault: None,
                key_status: KeyStatus::Valid,
            }),
        }
    }

    /// Descriptors executed so far.
    pub fn descriptors(&self) -> Vec<HwDesc> {
        self.state.borrow().descriptors.clone()
    }

    pub fn take_descriptors(&self) -> Vec<HwDesc> {
        std::mem::take(&mut self.state.borrow_mut().descriptors)
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn sram(&self, addr: u32, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        match sram_range(&state.sram, addr, len) {
            Some(range) => state.sram[range].to_vec(),
            None => vec![0; len],
        }
    }

    pub fn load_sram(&self, addr: u32, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(range) = sram_range(&state.sram, addr, data.len()) {
            state.sram[range].copy_from_slice(data);
        }
    }

    /// Makes the next `polls` reads of the free-slot register report a full queue.
    pub fn stall_queue(&self, polls: u32) {
        self.state.borrow_mut().stall_polls = polls;
    }

    pub fn inject(&self, fault: Fault) {
        self.state.borrow_mut().fault = Some(fault);
    }

    /// Status reported for every hardware key.
    pub fn set_key_status(&self, status: KeyStatus) {
        self.state.borrow_mut().key_status = status;
    }

    pub fn interrupt_mask(&self) -> u32 {
        self.state.borrow().imr
    }

    fn execute(&self, state: &mut EngineState) {
        let desc = HwDesc::from_words(state.queue);
        trace!("Executing {:?}", desc);
        state.descriptors.push(desc);

        if desc.flow_mode() == u32::from(FlowMode::Bypass) {
            let data = self.gather(state, &desc);
            self.scatter(state, &desc, &data);
        }

        let dout_mode = DmaMode::try_from(desc.dout_dma_mode());
        if desc.is_last_ind() && matches!(dout_mode, Ok(DmaMode::Dlli) | Ok(DmaMode::Mlli)) {
            state.axim_comp += 1;
            state.irq_status |= AXIM_COMP_INT_BIT;
        }
    }

    /// Reads the input side of a bypass descriptor.
    fn gather(&self, state: &mut EngineState, desc: &HwDesc) -> Vec<u8> {
        let size = desc.din_size() as usize;
        if desc.is_din_const() {
            let word = desc.words()[0].to_le_bytes();
            return word.iter().copied().cycle().take(size).collect();
        }
        match DmaMode::try_from(desc.din_dma_mode()) {
            Ok(DmaMode::Sram) => match sram_range(&state.sram, desc.din_addr() as u32, size) {
                Some(range) => state.sram[range].to_vec(),
                None => {
                    state.axim_err |= AXI_ERR_SRAM_RANGE;
                    Vec::new()
                }
            },
            Ok(DmaMode::Dlli) => self.host_read(state, desc.din_addr(), size),
            Ok(DmaMode::Mlli) => {
                let mut data = Vec::new();
                for entry in self.table(state, desc.din_addr() as u32, size) {
                    data.extend(self.host_read(state, entry.addr, entry.size as usize));
                }
                data
            }
            _ => Vec::new(),
        }
    }

    /// Writes the output side of a bypass descriptor.
    fn scatter(&self, state: &mut EngineState, desc: &HwDesc, data: &[u8]) {
        let size = (desc.dout_size() as usize).min(data.len());
        match DmaMode::try_from(desc.dout_dma_mode()) {
            Ok(DmaMode::Sram) => match sram_range(&state.sram, desc.dout_addr() as u32, size) {
                Some(range) => state.sram[range].copy_from_slice(&data[..size]),
                None => state.axim_err |= AXI_ERR_SRAM_RANGE,
            },
            Ok(DmaMode::Dlli) => self.host_write(state, desc.dout_addr(), &data[..size]),
            Ok(DmaMode::Mlli) => {
                let mut offset = 0;
                let entries = self.table(state, desc.dout_addr() as u32, desc.dout_size() as usize);
                for entry in entries {
                    let end = (offset + entry.size as usize).min(data.len());
                    self.host_write(state, entry.addr, &data[offset..end]);
                    offset = end;
                }
            }
            _ => (),
        }
    }

    /// Decodes `count` scatter entries from SRAM.
    fn table(&self, state: &mut EngineState, addr: u32, count: usize) -> Vec<LliEntry> {
        match sram_range(&state.sram, addr, count * LLI_ENTRY_BYTE_SIZE) {
            Some(range) => decode_table(&state.sram[range]).collect(),
            None => {
                state.axim_err |= AXI_ERR_SRAM_RANGE;
                Vec::new()
            }
        }
    }

    fn host_read(&self, state: &mut EngineState, addr: u64, len: usize) -> Vec<u8> {
        if !self.mapper.is_mapped(addr, len) {
            warn!("DMA read of {} bytes at unmapped 0x{:x}", len, addr);
            state.axim_err |= AXI_ERR_UNMAPPED;
            return vec![0; len];
        }
        // SAFETY: the mapper hands out identity mappings of live host buffers
        // and the range lies inside one of them.
        unsafe { std::slice::from_raw_parts(addr as usize as *const u8, len).to_vec() }
    }

    fn host_write(&self, state: &mut EngineState, addr: u64, data: &[u8]) {
        if !self.mapper.is_mapped(addr, data.len()) {
            warn!("DMA write of {} bytes at unmapped 0x{:x}", data.len(), addr);
            state.axim_err |= AXI_ERR_UNMAPPED;
            return;
        }
        // SAFETY: as in `host_read`; the mapping outlives the descriptor.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), addr as usize as *mut u8, data.len());
        }
    }
}

fn sram_range(sram: &[u8], addr: u32, len: usize) -> Option<Range<usize>> {
    let start = addr as usize;
    let end = start.checked_add(len)?;
    if end <= sram.len() {
        Some(start..end)
    } else {
        warn!("SRAM access of {} bytes at 0x{:x} out of range", len, addr);
        None
    }
}

impl CcHal for CryptoCell<'_> {
    fn read(&self, reg: Reg) -> u32 {
        let mut state = self.state.borrow_mut();
        state.events.push(BusEvent::Read(reg));
        match reg {
            Reg::QueueContent => {
                if state.stall_polls > 0 {
                    state.stall_polls -= 1;
                    0
                } else {
                    state.free_slots
                }
            }
            Reg::HostImr => state.imr,
            Reg::AximMonComp => std::mem::take(&mut state.axim_comp),
            Reg::AximMonErr => state.axim_err,
            Reg::SramAddr => state.sram_addr,
            Reg::SramData => {
                if !state.sram_primed {
                    state.sram_primed = true;
                    return 0;
                }
                let addr = state.sram_addr;
                state.sram_addr = addr.wrapping_add(4);
                match sram_range(&state.sram, addr, 4) {
                    Some(range) => {
                        let mut word = [0u8; 4];
                        word.copy_from_slice(&state.sram[range]);
                        u32::from_le_bytes(word)
                    }
                    None => 0,
                }
            }
            Reg::SramDataReady => 1,
            Reg::QueueWord(_) | Reg::HostIcr => 0,
        }
    }

    fn write(&self, reg: Reg, val: u32) {
        let mut state = self.state.borrow_mut();
        state.events.push(BusEvent::Write(reg, val));
        match reg {
            Reg::QueueWord(i) if i < HW_DESC_SIZE_WORDS => {
                state.queue[i] = val;
                if i == HW_DESC_SIZE_WORDS - 1 {
                    self.execute(&mut state);
                }
            }
            Reg::QueueWord(i) => warn!("Write to queue word {}", i),
            Reg::HostImr => state.imr = val,
            Reg::HostIcr => state.irq_status &= !val,
            Reg::AximMonErr => state.axim_err &= !val,
            Reg::SramAddr => {
                state.sram_addr = val;
                state.sram_primed = false;
            }
            Reg::SramData => {
                let addr = state.sram_addr;
                state.sram_addr = addr.wrapping_add(4);
                if let Some(range) = sram_range(&state.sram, addr, 4) {
                    state.sram[range].copy_from_slice(&val.to_le_bytes());
                }
            }
            Reg::QueueContent | Reg::AximMonComp | Reg::SramDataReady => {
                warn!("Write to read-only register {:?}", reg)
            }
        }
    }

    fn barrier(&self) {
        self.state.borrow_mut().events.push(BusEvent::Barrier);
    }

    fn wait_interrupt(&self, irq_mask: u32) -> u32 {
        let mut state = self.state.borrow_mut();
        state.events.push(BusEvent::Wait(irq_mask));
        match state.fault.take() {
            Some(Fault::DropCompletion) => {
                debug!("Dropping completion");
                state.axim_comp = 0;
            }
            Some(Fault::ExtraCompletion) => state.axim_comp += 1,
            Some(Fault::AxiError(err)) => state.axim_err |= err,
            None => (),
        }
        let status = state.irq_status & irq_mask;
        state.irq_status &= !irq_mask;
        status
    }

    fn key_status(&self, key: CryptoKeyType) -> KeyStatus {
        match key {
            CryptoKeyType::User => KeyStatus::Valid,
            _ => self.state.borrow().key_status,
        }
    }
}
