// Licensed under the Apache-2.0 license

//! Synchronous completion of a descriptor sequence.
//!
//! The engine raises the AXI completion interrupt when a descriptor marked
//! "last" has written its output. Every sequence therefore ends with a sentinel
//! that writes one constant word into a dummy buffer; once the interrupt fires
//! the completed-write counter must read exactly one.

use log::{debug, error};
use sym_crypto_common::descriptor::FlowMode;
use sym_crypto_common::{DriverResult, FatalError, HwDesc, SymError, SymResult};

use crate::hil::{CcHal, DmaBlock, DmaDirection, DmaMapper, Reg, AXIM_COMP_INT_BIT};
use crate::hw_queue::HwQueue;

const DUMMY_BUFFER_SIZE: usize = 4;

/// Target of the completion sentinel, mapped for the lifetime of the driver.
pub struct CompletionBuffer<D: DmaMapper> {
    buf: D::Buffer,
    block: DmaBlock,
    handle: D::Handle,
}

impl<D: DmaMapper> CompletionBuffer<D> {
    pub fn alloc(mapper: &D) -> SymResult<Self> {
        let mut buf = mapper
            .alloc_contiguous(DUMMY_BUFFER_SIZE)
            .map_err(|_| SymError::NoMem)?;
        let addr = buf.as_mut().as_mut_ptr() as usize;
        let mut blocks = [DmaBlock::default(); 1];
        match mapper.map(addr, DUMMY_BUFFER_SIZE, DmaDirection::Bi, &mut blocks) {
            Ok((1, handle)) => Ok(CompletionBuffer {
                buf,
                block: blocks[0],
                handle,
            }),
            Ok((count, handle)) => {
                error!("Completion buffer mapped to {} fragments", count);
                let _ = mapper.unmap(addr, DUMMY_BUFFER_SIZE, DmaDirection::Bi, handle);
                mapper.free_contiguous(buf);
                Err(SymError::NoMem)
            }
            Err(err) => {
                error!("Failed to map the completion buffer: {:?}", err);
                mapper.free_contiguous(buf);
                Err(SymError::NoMem)
            }
        }
    }

    pub fn free(mut self, mapper: &D) {
        let addr = self.buf.as_mut().as_mut_ptr() as usize;
        if let Err(err) = mapper.unmap(addr, DUMMY_BUFFER_SIZE, DmaDirection::Bi, self.handle) {
            error!("Failed to unmap the completion buffer: {:?}", err);
        }
        mapper.free_contiguous(self.buf);
    }

    pub fn block(&self) -> DmaBlock {
        self.block
    }
}

/// Unmasks and clears the completion interrupt if it is currently masked.
pub fn init_completion<H: CcHal>(hal: &H) {
    let imr = hal.read(Reg::HostImr);
    if imr & AXIM_COMP_INT_BIT != 0 {
        hal.write(Reg::HostImr, imr & !AXIM_COMP_INT_BIT);
        hal.write(Reg::HostIcr, AXIM_COMP_INT_BIT);
        // The completion counter clears on read.
        let _ = hal.read(Reg::AximMonComp);
    }
}

/// Appends the completion sentinel and blocks until the queue has drained.
///
/// A counter other than one or a raised AXI monitor error means the driver and
/// the engine disagree about what ran, which is fatal.
pub fn wait_for_sequence<H: CcHal>(
    queue: &HwQueue<'_, H>,
    dummy: DmaBlock,
    preemptible: bool,
) -> DriverResult<()> {
    let hal = queue.hal();
    init_completion(hal);

    let desc = HwDesc::new()
        .din_const(0, DUMMY_BUFFER_SIZE as u32)
        .dout_dlli(dummy.phys, dummy.size, false, false)
        .flow(FlowMode::Bypass);
    let desc = if preemptible {
        desc.queue_last()
    } else {
        desc.last_ind()
    };
    queue.push(desc);

    let status = hal.wait_interrupt(AXIM_COMP_INT_BIT);
    debug!("Completion interrupt status 0x{:x}", status);

    let completed = hal.read(Reg::AximMonComp);
    if completed != 1 {
        error!("AXI completion counter is {}", completed);
        Err(FatalError::CompletionCount(completed))?;
    }
    let axi_err = hal.read(Reg::AximMonErr);
    if axi_err != 0 {
        error!("AXI monitor error 0x{:x}", axi_err);
        Err(FatalError::AxiMonitor(axi_err))?;
    }
    Ok(())
}
