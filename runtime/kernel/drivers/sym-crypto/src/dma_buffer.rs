// Licensed under the Apache-2.0 license

//! Mapping of caller buffers into engine-addressable form.
//!
//! A host buffer becomes one of three handles. An empty buffer is
//! [`DmaTarget::Absent`]. A physically contiguous buffer, or a small
//! fragmented one copied into a contiguous bounce region, is a single
//! [`DmaTarget::Dlli`] fragment. Anything else gets a scatter table and
//! becomes [`DmaTarget::Mlli`]. Every mapping made by `build` is recorded in
//! the build slot so `unbuild` releases exactly those mappings, and a failed
//! build releases what it had already mapped before returning.

use core::cell::{RefCell, RefMut};

use arrayvec::ArrayVec;
use bitflags::bitflags;
use log::{debug, warn};
use sym_crypto_common::config::MLLI_MAX_ENTRIES_CAP;
use sym_crypto_common::descriptor::DmaMode;
use sym_crypto_common::lli::{encode_table, LliEntry, LLI_ENTRY_BYTE_SIZE};
use sym_crypto_common::{SymDriverConfig, SymError, SymResult};
use zeroize::Zeroize;

use crate::hil::{DmaBlock, DmaDirection, DmaMapper, PalError};

/// Concurrent build slots per direction. The adaptor uses slot 0.
pub const BUILD_SLOT_COUNT: usize = 1;
pub const SYM_ADAPTOR_BUFFER_INDEX: usize = 0;

const MLLI_TABLE_BUFFER_SIZE: usize = MLLI_MAX_ENTRIES_CAP * LLI_ENTRY_BYTE_SIZE;

/// Where the engine finds one side of a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaTarget {
    Absent,
    /// One physical fragment.
    Dlli { addr: u64, size: u32 },
    /// A scatter table; `size` counts table bytes, not payload bytes.
    Mlli { addr: u64, size: u32 },
    /// On-chip memory.
    Sram { addr: u32, size: u32 },
    /// The engine generates `size` bytes of constant input; nothing is mapped.
    Const { size: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaBuffer {
    pub target: DmaTarget,
    /// Non-secure bus attribute.
    pub ns: bool,
}

impl DmaBuffer {
    pub const ABSENT: DmaBuffer = DmaBuffer {
        target: DmaTarget::Absent,
        ns: false,
    };

    pub fn dlli(addr: u64, size: u32) -> Self {
        DmaBuffer {
            target: DmaTarget::Dlli { addr, size },
            ns: false,
        }
    }

    pub fn mlli(addr: u64, size: u32) -> Self {
        DmaBuffer {
            target: DmaTarget::Mlli { addr, size },
            ns: false,
        }
    }

    pub fn sram(addr: u32, size: u32) -> Self {
        DmaBuffer {
            target: DmaTarget::Sram { addr, size },
            ns: false,
        }
    }

    pub fn constant(size: u32) -> Self {
        DmaBuffer {
            target: DmaTarget::Const { size },
            ns: false,
        }
    }

    pub fn dma_mode(&self) -> DmaMode {
        match self.target {
            DmaTarget::Absent => DmaMode::NoDma,
            DmaTarget::Dlli { .. } => DmaMode::Dlli,
            DmaTarget::Mlli { .. } => DmaMode::Mlli,
            DmaTarget::Sram { .. } | DmaTarget::Const { .. } => DmaMode::Sram,
        }
    }

    pub fn addr(&self) -> u64 {
        match self.target {
            DmaTarget::Dlli { addr, .. } | DmaTarget::Mlli { addr, .. } => addr,
            DmaTarget::Sram { addr, .. } => addr as u64,
            DmaTarget::Absent | DmaTarget::Const { .. } => 0,
        }
    }

    pub fn size(&self) -> u32 {
        match self.target {
            DmaTarget::Absent => 0,
            DmaTarget::Dlli { size, .. }
            | DmaTarget::Mlli { size, .. }
            | DmaTarget::Sram { size, .. }
            | DmaTarget::Const { size } => size,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.target == DmaTarget::Absent
    }
}

bitflags! {
    /// Mappings held by a build slot.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Mapped: u32 {
        const CONTIG_DLLI = 0x1;
        const SMALL_SIZE_DLLI = 0x2;
        const MLLI_MAIN = 0x4;
        const MLLI_TABLE = 0x10;
    }
}

bitflags! {
    /// Sides of a composite build that need unbuilding.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BuiltFlags: u32 {
        const BI_DIR = 0x1;
        const INPUT_BUFF = 0x2;
        const OUTPUT_BUFF = 0x4;
    }
}

/// Per-direction scratch state of one build: the fragment list, the
/// scatter-table backing, the small-buffer bounce region and the mappings made.
pub struct BuildSlot<D: DmaMapper> {
    table: D::Buffer,
    bounce: D::Buffer,
    blocks: [DmaBlock; MLLI_MAX_ENTRIES_CAP],
    num_blocks: usize,
    table_len: usize,
    mapped: Mapped,
    user_addr: usize,
    user_size: usize,
    dir: DmaDirection,
    main_handle: Option<D::Handle>,
    bounce_handle: Option<D::Handle>,
    table_handle: Option<D::Handle>,
}

impl<D: DmaMapper> BuildSlot<D> {
    fn alloc(mapper: &D, config: &SymDriverConfig) -> SymResult<Self> {
        let table = mapper
            .alloc_contiguous(MLLI_TABLE_BUFFER_SIZE)
            .map_err(|_| SymError::NoMem)?;
        if table.as_ref().as_ptr() as usize % 4 != 0 {
            warn!("Scatter table backing is not word aligned");
            mapper.free_contiguous(table);
            return Err(SymError::InvalidBadAddr);
        }
        let bounce = match mapper.alloc_contiguous(config.dlli_optimized_buf_size as usize) {
            Ok(bounce) => bounce,
            Err(_) => {
                mapper.free_contiguous(table);
                return Err(SymError::NoMem);
            }
        };
        let mut slot = BuildSlot {
            table,
            bounce,
            blocks: [DmaBlock::default(); MLLI_MAX_ENTRIES_CAP],
            num_blocks: 0,
            table_len: 0,
            mapped: Mapped::empty(),
            user_addr: 0,
            user_size: 0,
            dir: DmaDirection::ToDevice,
            main_handle: None,
            bounce_handle: None,
            table_handle: None,
        };
        slot.clear();
        Ok(slot)
    }

    fn free(self, mapper: &D) {
        mapper.free_contiguous(self.bounce);
        mapper.free_contiguous(self.table);
    }

    fn clear(&mut self) {
        self.blocks.fill(DmaBlock::default());
        self.num_blocks = 0;
        self.table_len = 0;
        self.mapped = Mapped::empty();
        self.main_handle = None;
        self.bounce_handle = None;
        self.table_handle = None;
        self.table.as_mut().zeroize();
        self.bounce.as_mut().zeroize();
    }

    pub fn mapped(&self) -> Mapped {
        self.mapped
    }

    /// Fragments of the last scatter build.
    pub fn blocks(&self) -> &[DmaBlock] {
        &self.blocks[..self.num_blocks.min(MLLI_MAX_ENTRIES_CAP)]
    }
}

/// Build slots for one direction.
pub struct SlotPool<D: DmaMapper> {
    slots: ArrayVec<RefCell<BuildSlot<D>>, BUILD_SLOT_COUNT>,
}

impl<D: DmaMapper> SlotPool<D> {
    pub fn alloc(mapper: &D, config: &SymDriverConfig) -> SymResult<Self> {
        let mut pool = SlotPool {
            slots: ArrayVec::new(),
        };
        for _ in 0..BUILD_SLOT_COUNT {
            match BuildSlot::alloc(mapper, config) {
                Ok(slot) => pool.slots.push(RefCell::new(slot)),
                Err(err) => {
                    pool.free(mapper);
                    return Err(err);
                }
            }
        }
        Ok(pool)
    }

    pub fn free(self, mapper: &D) {
        for slot in self.slots {
            slot.into_inner().free(mapper);
        }
    }

    /// Takes the slot at `index`, cleared. It is released when the guard drops.
    pub fn acquire(&self, index: usize) -> SymResult<RefMut<'_, BuildSlot<D>>> {
        let slot = self.slots.get(index).ok_or(SymError::InvalidCtxIndex)?;
        let mut guard = slot.try_borrow_mut().map_err(|_| SymError::Busy)?;
        guard.clear();
        Ok(guard)
    }
}

/// Buffers of a composite build. Buffers the engine writes are borrowed mutably.
#[derive(Debug)]
pub enum PairSource<'b> {
    /// One buffer read and written by the engine.
    InPlace(&'b mut [u8]),
    Separate {
        input: Option<&'b [u8]>,
        output: Option<&'b mut [u8]>,
    },
    /// Constant engine input of `size` bytes; only the output is mapped.
    ConstInput {
        size: usize,
        output: Option<&'b mut [u8]>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuiltPair {
    pub input: DmaBuffer,
    pub output: DmaBuffer,
    pub flags: BuiltFlags,
}

pub struct DmaBuilder<'a, D: DmaMapper> {
    mapper: &'a D,
    config: &'a SymDriverConfig,
}

impl<'a, D: DmaMapper> DmaBuilder<'a, D> {
    pub fn new(mapper: &'a D, config: &'a SymDriverConfig) -> Self {
        DmaBuilder { mapper, config }
    }

    /// Maps `buf` for the engine to read.
    pub fn build(&self, slot: &mut BuildSlot<D>, buf: &[u8]) -> SymResult<DmaBuffer> {
        self.build_at(
            slot,
            buf.as_ptr() as usize,
            buf.len(),
            DmaDirection::ToDevice,
            |bounce| bounce.copy_from_slice(buf),
        )
    }

    /// Maps `buf` for the engine to write, or to read and write with
    /// [`DmaDirection::Bi`].
    pub fn build_mut(
        &self,
        slot: &mut BuildSlot<D>,
        buf: &mut [u8],
        dir: DmaDirection,
    ) -> SymResult<DmaBuffer> {
        let size = buf.len();
        let addr = buf.as_mut_ptr() as usize;
        self.build_at(slot, addr, size, dir, |bounce| {
            if dir == DmaDirection::Bi {
                bounce.copy_from_slice(buf);
            }
        })
    }

    /// `fill` seeds the bounce region when a small fragmented buffer is copied.
    fn build_at(
        &self,
        slot: &mut BuildSlot<D>,
        addr: usize,
        size: usize,
        dir: DmaDirection,
        fill: impl FnOnce(&mut [u8]),
    ) -> SymResult<DmaBuffer> {
        if size == 0 {
            return Ok(DmaBuffer::ABSENT);
        }
        slot.user_addr = addr;
        slot.user_size = size;
        slot.dir = dir;
        slot.mapped = Mapped::empty();

        if self.mapper.is_contiguous(addr, size) {
            if size > self.config.max_dlli_size as usize {
                warn!("Contiguous buffer of {} bytes exceeds the DLLI limit", size);
                return Err(SymError::NoMem);
            }
            let (count, handle) = self
                .mapper
                .map(addr, size, dir, &mut slot.blocks[..1])
                .map_err(|err| {
                    warn!("Failed to map contiguous buffer: {:?}", err);
                    SymError::NoMem
                })?;
            slot.main_handle = Some(handle);
            slot.mapped |= Mapped::CONTIG_DLLI;
            slot.num_blocks = count;
            if count != 1 {
                warn!("Contiguous buffer mapped to {} fragments", count);
                let _ = self.release(slot);
                return Err(SymError::OsFault);
            }
            debug!("DLLI build: {} bytes", size);
            return Ok(DmaBuffer::dlli(slot.blocks[0].phys, size as u32));
        }

        if size < self.config.dlli_optimized_buf_size as usize {
            let bounce = slot.bounce.as_mut();
            fill(&mut bounce[..size]);
            let bounce_addr = bounce.as_ptr() as usize;
            let (count, handle) = self
                .mapper
                .map(bounce_addr, size, dir, &mut slot.blocks[..1])
                .map_err(|err| {
                    warn!("Failed to map the bounce buffer: {:?}", err);
                    SymError::NoMem
                })?;
            slot.bounce_handle = Some(handle);
            slot.mapped |= Mapped::SMALL_SIZE_DLLI;
            slot.num_blocks = count;
            if count != 1 {
                warn!("Bounce buffer mapped to {} fragments", count);
                let _ = self.release(slot);
                return Err(SymError::OsFault);
            }
            debug!("Bounced DLLI build: {} bytes", size);
            return Ok(DmaBuffer::dlli(slot.blocks[0].phys, size as u32));
        }

        let max_entries = (self.config.mlli_max_entries as usize).min(MLLI_MAX_ENTRIES_CAP);
        let (count, handle) = self
            .mapper
            .map(addr, size, dir, &mut slot.blocks[..max_entries])
            .map_err(|err| {
                warn!("Failed to map fragmented buffer: {:?}", err);
                SymError::NoMem
            })?;
        slot.main_handle = Some(handle);
        slot.mapped |= Mapped::MLLI_MAIN;
        slot.num_blocks = count;
        if count > max_entries {
            warn!("Buffer spans {} fragments, limit is {}", count, max_entries);
            let _ = self.release(slot);
            return Err(SymError::NoMem);
        }
        if count == 0 {
            let _ = self.release(slot);
            return Err(SymError::OsFault);
        }

        let entries: ArrayVec<LliEntry, MLLI_MAX_ENTRIES_CAP> = slot.blocks[..count]
            .iter()
            .map(|block| LliEntry::new(block.phys, block.size))
            .collect();
        let table_len = match encode_table(
            &entries,
            slot.table.as_mut(),
            self.config.mlli_entry_max_size,
        ) {
            Ok(len) => len,
            Err(err) => {
                warn!("Scatter table encode failed: {:?}", err);
                let _ = self.release(slot);
                return Err(SymError::NoMem);
            }
        };
        slot.table_len = table_len;

        let table_addr = slot.table.as_ref().as_ptr() as usize;
        let mut table_block = [DmaBlock::default(); 1];
        let (table_count, table_handle) = match self.mapper.map(
            table_addr,
            table_len,
            DmaDirection::Bi,
            &mut table_block,
        ) {
            Ok(mapping) => mapping,
            Err(err) => {
                warn!("Failed to map the scatter table: {:?}", err);
                let _ = self.release(slot);
                return Err(SymError::NoMem);
            }
        };
        slot.table_handle = Some(table_handle);
        slot.mapped |= Mapped::MLLI_TABLE;
        if table_count != 1 {
            warn!("Scatter table mapped to {} fragments", table_count);
            let _ = self.release(slot);
            return Err(SymError::OsFault);
        }
        debug!("MLLI build: {} bytes in {} fragments", size, count);
        Ok(DmaBuffer::mlli(table_block[0].phys, table_len as u32))
    }

    /// Drops every mapping the slot holds and reports the first unmap failure.
    fn release(&self, slot: &mut BuildSlot<D>) -> Result<(), PalError> {
        let mut result = Ok(());
        if slot.mapped.intersects(Mapped::CONTIG_DLLI | Mapped::MLLI_MAIN) {
            if let Some(handle) = slot.main_handle.take() {
                result = result.and(self.mapper.unmap(
                    slot.user_addr,
                    slot.user_size,
                    slot.dir,
                    handle,
                ));
            }
        }
        if slot.mapped.contains(Mapped::SMALL_SIZE_DLLI) {
            if let Some(handle) = slot.bounce_handle.take() {
                let bounce_addr = slot.bounce.as_ref().as_ptr() as usize;
                result = result.and(self.mapper.unmap(
                    bounce_addr,
                    slot.user_size,
                    slot.dir,
                    handle,
                ));
            }
        }
        if slot.mapped.contains(Mapped::MLLI_TABLE) {
            if let Some(handle) = slot.table_handle.take() {
                let table_addr = slot.table.as_ref().as_ptr() as usize;
                result = result.and(self.mapper.unmap(
                    table_addr,
                    slot.table_len,
                    DmaDirection::Bi,
                    handle,
                ));
            }
        }
        slot.mapped = Mapped::empty();
        result
    }

    /// Releases what `build` mapped. Bounced data flows back into `copy_back`
    /// for device-to-host directions.
    ///
    /// Every mapping is released even when one unmap fails; the first
    /// platform code is returned as [`SymError::DmaUnmap`].
    pub fn unbuild(&self, slot: &mut BuildSlot<D>, copy_back: Option<&mut [u8]>) -> SymResult<()> {
        let bounced = slot.mapped.contains(Mapped::SMALL_SIZE_DLLI);
        let released = self.release(slot);
        if bounced {
            let size = slot.user_size;
            if matches!(slot.dir, DmaDirection::FromDevice | DmaDirection::Bi) {
                if let Some(dst) = copy_back {
                    let len = size.min(dst.len());
                    dst[..len].copy_from_slice(&slot.bounce.as_ref()[..len]);
                }
            }
            slot.bounce.as_mut()[..size].zeroize();
        }
        released.map_err(|err| {
            warn!("Unmap failed during unbuild: {:?}", err);
            SymError::DmaUnmap(err.0)
        })
    }

    /// Builds both sides of a data call. In place, one bidirectional mapping
    /// serves input and output.
    pub fn build_pair(
        &self,
        in_slot: &mut BuildSlot<D>,
        out_slot: &mut BuildSlot<D>,
        source: PairSource<'_>,
    ) -> SymResult<BuiltPair> {
        let mut flags = BuiltFlags::empty();
        let (input, output) = match source {
            PairSource::InPlace(buf) => {
                let input = self.build_mut(in_slot, buf, DmaDirection::Bi)?;
                flags |= BuiltFlags::BI_DIR;
                return Ok(BuiltPair {
                    input,
                    output: input,
                    flags,
                });
            }
            PairSource::Separate { input, output } => {
                let input = match input {
                    Some(buf) => {
                        let built = self.build(in_slot, buf)?;
                        flags |= BuiltFlags::INPUT_BUFF;
                        built
                    }
                    None => DmaBuffer::ABSENT,
                };
                (input, output)
            }
            PairSource::ConstInput { size, output } => (DmaBuffer::constant(size as u32), output),
        };

        let output = match output {
            Some(buf) => match self.build_mut(out_slot, buf, DmaDirection::FromDevice) {
                Ok(built) => {
                    flags |= BuiltFlags::OUTPUT_BUFF;
                    built
                }
                Err(err) => {
                    if flags.contains(BuiltFlags::INPUT_BUFF) {
                        let _ = self.unbuild(in_slot, None);
                    }
                    return Err(err);
                }
            },
            None => DmaBuffer::ABSENT,
        };
        Ok(BuiltPair {
            input,
            output,
            flags,
        })
    }

    /// Reverses `build_pair`; the first failure is reported.
    pub fn unbuild_pair(
        &self,
        in_slot: &mut BuildSlot<D>,
        out_slot: &mut BuildSlot<D>,
        flags: BuiltFlags,
        in_place: Option<&mut [u8]>,
        output: Option<&mut [u8]>,
    ) -> SymResult<()> {
        let mut result = Ok(());
        if flags.contains(BuiltFlags::BI_DIR) {
            result = result.and(self.unbuild(in_slot, in_place));
        }
        if flags.contains(BuiltFlags::INPUT_BUFF) {
            result = result.and(self.unbuild(in_slot, None));
        }
        if flags.contains(BuiltFlags::OUTPUT_BUFF) {
            result = result.and(self.unbuild(out_slot, output));
        }
        result
    }
}
