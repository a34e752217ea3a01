// Licensed under the Apache-2.0 license

use crate::context::{CTX_CACHE_SIZE, HMAC_SCRATCH_SIZE};
use crate::error::{SymError, SymResult};
use crate::lli::{LLI_ENTRY_BYTE_SIZE, LLI_SIZE_MAX};

/// Host-side scatter tables are sized for this many fragments.
pub const MLLI_MAX_ENTRIES_CAP: usize = 128;

/// Largest transfer a single descriptor can address (24-bit size field).
pub const MAX_DLLI_BLOCK_SIZE: u32 = (1 << 24) - 1;

/// Configures the driver core for a platform.
/// These are the defaults for the reference SRAM layout and can be overridden per platform.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymDriverConfig {
    /// Fragmented buffers strictly smaller than this are copied into a contiguous scratch region.
    pub dlli_optimized_buf_size: u32,
    /// Maximum number of fragments in one scatter table.
    pub mlli_max_entries: u32,
    /// SRAM address of the input scratch-table slot; the output slot follows it.
    pub mlli_sram_base: u32,
    /// SRAM address of the context cache.
    pub ctx_cache_sram_addr: u32,
    pub sram_size: u32,
    /// Page granularity used by context placement.
    pub page_size: u32,
    pub max_dlli_size: u32,
    pub mlli_entry_max_size: u32,
    /// Mark the completion sentinel queue-last instead of last.
    pub preemptible_completion: bool,
    /// The scratch-table workspace is owned by another agent.
    pub mlli_external_alloc: bool,
}

impl Default for SymDriverConfig {
    fn default() -> Self {
        SymDriverConfig {
            dlli_optimized_buf_size: 128,
            mlli_max_entries: 125,
            mlli_sram_base: 0x400,
            ctx_cache_sram_addr: 0x0,
            sram_size: 0x1000,
            page_size: 4096,
            max_dlli_size: MAX_DLLI_BLOCK_SIZE,
            mlli_entry_max_size: LLI_SIZE_MAX,
            preemptible_completion: false,
            mlli_external_alloc: false,
        }
    }
}

impl SymDriverConfig {
    /// Capacity of one on-chip scratch-table slot in bytes.
    pub fn mlli_slot_size(&self) -> u32 {
        self.mlli_max_entries * LLI_ENTRY_BYTE_SIZE as u32
    }

    /// Bytes reserved at the context cache address (context plus HMAC pad scratch).
    pub fn ctx_cache_region(&self) -> u32 {
        (CTX_CACHE_SIZE + HMAC_SCRATCH_SIZE) as u32
    }

    pub fn validate(&self) -> SymResult<()> {
        if self.dlli_optimized_buf_size == 0 || self.mlli_max_entries == 0 {
            Err(SymError::InvalidArg)?;
        }
        if self.mlli_max_entries as usize > MLLI_MAX_ENTRIES_CAP {
            Err(SymError::InvalidArg)?;
        }
        if !self.page_size.is_power_of_two() {
            Err(SymError::InvalidArg)?;
        }
        if self.max_dlli_size > MAX_DLLI_BLOCK_SIZE || self.mlli_entry_max_size > LLI_SIZE_MAX {
            Err(SymError::InvalidArg)?;
        }

        let mlli_start = self.mlli_sram_base as u64;
        let mlli_end = mlli_start + 2 * self.mlli_slot_size() as u64;
        let ctx_start = self.ctx_cache_sram_addr as u64;
        let ctx_end = ctx_start + self.ctx_cache_region() as u64;
        if mlli_end > self.sram_size as u64 || ctx_end > self.sram_size as u64 {
            Err(SymError::InvalidArg)?;
        }
        if mlli_start < ctx_end && ctx_start < mlli_end {
            Err(SymError::InvalidArg)?;
        }
        if self.mlli_sram_base % 4 != 0 || self.ctx_cache_sram_addr % 4 != 0 {
            Err(SymError::InvalidBadAddr)?;
        }
        Ok(())
    }
}
