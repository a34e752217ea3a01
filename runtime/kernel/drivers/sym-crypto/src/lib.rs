// Licensed under the Apache-2.0 license

//! Descriptor/DMA driver core of the symmetric crypto engine.
//!
//! Callers hand the [`adaptor::SymAdaptor`] a typed context and raw data
//! buffers. The adaptor serializes the call, maps the buffers for DMA, runs the
//! per-algorithm state machine that emits engine descriptors, waits for the
//! queue to drain and unwinds every mapping before returning.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod adaptor;
pub mod completion;
pub mod dispatch;
pub mod dma_buffer;
pub mod driver;
pub mod hil;
pub mod hw_queue;
pub mod mlli;

#[cfg(test)]
mod testing;

pub use adaptor::{SymAdaptor, SymData, SymDriver};
