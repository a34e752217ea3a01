// Licensed under the Apache-2.0 license

//! Plain copies between host memory and engine SRAM.

use log::warn;
use sym_crypto_common::descriptor::{DmaMode, FlowMode};
use sym_crypto_common::{DriverResult, HwDesc, SymError, SymResult};

use super::DriverEnv;
use crate::dma_buffer::{DmaBuffer, DmaTarget};
use crate::hil::CcHal;

/// Checks a copy for types the engine can move in one descriptor.
fn check_pair(input: &DmaBuffer, output: &DmaBuffer) -> SymResult<()> {
    let word_ok = |addr: u64, size: u32| addr % 4 == 0 || size % 4 == 0;
    match (input.target, output.target) {
        (DmaTarget::Dlli { .. }, DmaTarget::Dlli { .. }) => Ok(()),
        (DmaTarget::Sram { addr, size }, DmaTarget::Dlli { .. })
        | (DmaTarget::Dlli { .. }, DmaTarget::Sram { addr, size }) => {
            if word_ok(addr as u64, size) {
                Ok(())
            } else {
                warn!("Unaligned SRAM copy at 0x{:x} of {} bytes", addr, size);
                Err(SymError::InvalidArg)
            }
        }
        (DmaTarget::Sram { .. }, DmaTarget::Sram { .. }) => Err(SymError::UnsupportedAlgMode),
        _ => Err(SymError::InvalidArg),
    }
}

pub fn process<H: CcHal>(
    env: &DriverEnv<'_, H>,
    input: &DmaBuffer,
    output: &DmaBuffer,
) -> DriverResult<()> {
    check_pair(input, output)?;
    let ns_of = |buf: &DmaBuffer| buf.dma_mode() == DmaMode::Dlli && buf.ns;
    env.push(
        HwDesc::new()
            .din_type(input.dma_mode(), input.addr(), input.size(), ns_of(input))
            .dout_type(output.dma_mode(), output.addr(), output.size(), ns_of(output))
            .flow(FlowMode::Bypass),
    );
    Ok(())
}
