// Licensed under the Apache-2.0 license

//! Per-algorithm descriptor sequences.
//!
//! Each family exposes `init`, `process` and `finalize` over its typed context.
//! State the descriptors address in place lives in the SRAM context cache at
//! [`DriverEnv::ctx_addr`]; the adaptor moves it between host and SRAM.

pub mod aead;
pub mod bypass;
pub mod cipher;
pub mod hash;
pub mod hmac;

use sym_crypto_common::descriptor::DmaMode;
use sym_crypto_common::lli::LLI_ENTRY_BYTE_SIZE;
use sym_crypto_common::{DriverResult, HwDesc};

use crate::dma_buffer::{DmaBuffer, DmaTarget};
use crate::hil::CcHal;
use crate::hw_queue::HwQueue;
use crate::mlli::{MlliDirection, MlliManager};

/// What a state machine needs to emit descriptors for one call.
pub struct DriverEnv<'a, H: CcHal> {
    pub queue: &'a HwQueue<'a, H>,
    pub mlli: &'a MlliManager,
    /// SRAM address of the cached context.
    pub ctx_addr: u32,
}

/// A data reference as a descriptor encodes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataRef {
    pub mode: DmaMode,
    pub addr: u64,
    /// Bytes, or scatter entries for MLLI.
    pub size: u32,
    pub ns: bool,
}

impl DataRef {
    pub const NONE: DataRef = DataRef {
        mode: DmaMode::NoDma,
        addr: 0,
        size: 0,
        ns: false,
    };
}

impl<'a, H: CcHal> DriverEnv<'a, H> {
    pub fn new(queue: &'a HwQueue<'a, H>, mlli: &'a MlliManager, ctx_addr: u32) -> Self {
        DriverEnv {
            queue,
            mlli,
            ctx_addr,
        }
    }

    pub fn push(&self, desc: HwDesc) {
        self.queue.push(desc);
    }

    /// SRAM address of a context field.
    pub fn field(&self, offset: u32) -> u32 {
        self.ctx_addr + offset
    }

    /// Turns a handle into a descriptor data reference. A scatter table is
    /// loaded into the slot for `dir` first and referenced by entry count.
    pub fn resolve(&self, buf: &DmaBuffer, dir: MlliDirection) -> DriverResult<DataRef> {
        let data = match buf.target {
            DmaTarget::Absent => DataRef::NONE,
            DmaTarget::Mlli { addr, size } => {
                self.mlli.load_table(self.queue, addr, size, buf.ns, dir)?;
                DataRef {
                    mode: DmaMode::Mlli,
                    addr: self.mlli.first_entry_address(dir) as u64,
                    size: size / LLI_ENTRY_BYTE_SIZE as u32,
                    ns: buf.ns,
                }
            }
            DmaTarget::Dlli { addr, size } => DataRef {
                mode: DmaMode::Dlli,
                addr,
                size,
                ns: buf.ns,
            },
            DmaTarget::Sram { addr, size } => DataRef {
                mode: DmaMode::Sram,
                addr: addr as u64,
                size,
                ns: buf.ns,
            },
            DmaTarget::Const { size } => DataRef {
                mode: DmaMode::Sram,
                addr: 0,
                size,
                ns: false,
            },
        };
        Ok(data)
    }
}

/// Sets the DIN fields of `desc` from `data`.
pub(crate) fn din(desc: HwDesc, data: &DataRef) -> HwDesc {
    desc.din_type(data.mode, data.addr, data.size, data.ns)
}

/// Sets the DOUT fields of `desc` from `data`.
pub(crate) fn dout(desc: HwDesc, data: &DataRef) -> HwDesc {
    desc.dout_type(data.mode, data.addr, data.size, data.ns)
}
