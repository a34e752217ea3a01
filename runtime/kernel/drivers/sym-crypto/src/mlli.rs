// Licensed under the Apache-2.0 license

//! On-chip scatter-table workspace.
//!
//! The engine walks scatter tables out of SRAM, so a host table is copied into
//! one of two fixed slots (input, output) before the data descriptor that uses it.

use log::{debug, error, warn};
use sym_crypto_common::descriptor::{DmaMode, FlowMode};
use sym_crypto_common::{DriverResult, FatalError, HwDesc, SymDriverConfig, SymError};

use crate::hil::CcHal;
use crate::hw_queue::HwQueue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MlliDirection {
    Input = 0,
    Output = 1,
}

pub struct MlliManager {
    base: u32,
    slot_size: u32,
    external_alloc: bool,
}

impl MlliManager {
    pub fn new(config: &SymDriverConfig) -> Self {
        MlliManager {
            base: config.mlli_sram_base,
            slot_size: config.mlli_slot_size(),
            external_alloc: config.mlli_external_alloc,
        }
    }

    pub fn slot_size(&self) -> u32 {
        self.slot_size
    }

    /// SRAM address of the first entry of the table for `dir`.
    pub fn first_entry_address(&self, dir: MlliDirection) -> u32 {
        self.base + self.slot_size * dir as u32
    }

    /// Queues the copy of a host table at `table_phys` into the slot for `dir`.
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue the bypass descriptor is pushed to.
    /// * `table_phys` - Bus address of the host table.
    /// * `size` - Table length in bytes.
    /// * `ns` - Non-secure attribute of the host table.
    /// * `dir` - Slot to load.
    ///
    /// # Returns
    ///
    /// * `Err(SymError::MlliOversize)` if the table does not fit the slot.
    /// * `Err(FatalError::MlliExternallyAllocated)` if another agent owns the workspace.
    pub fn load_table<H: CcHal>(
        &self,
        queue: &HwQueue<'_, H>,
        table_phys: u64,
        size: u32,
        ns: bool,
        dir: MlliDirection,
    ) -> DriverResult<()> {
        if self.external_alloc {
            error!("Scatter table workspace is owned by another agent");
            Err(FatalError::MlliExternallyAllocated)?;
        }
        if size > self.slot_size {
            warn!(
                "Scatter table of {} bytes exceeds the {} byte slot",
                size, self.slot_size
            );
            Err(SymError::MlliOversize(size))?;
        }

        let sram_addr = self.first_entry_address(dir);
        queue.push(
            HwDesc::new()
                .din_type(DmaMode::Dlli, table_phys, size, ns)
                .dout_sram(sram_addr, size)
                .flow(FlowMode::Bypass),
        );
        debug!("Loading {} table bytes to SRAM 0x{:x}", size, sram_addr);
        Ok(())
    }
}
