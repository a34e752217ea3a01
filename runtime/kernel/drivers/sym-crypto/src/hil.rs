// Licensed under the Apache-2.0 license

//! HIL interfaces the driver core needs from its platform.
//!
//! The core never touches memory-mapped registers, DMA mappings or locks
//! directly; a platform provides them through the traits below. All methods
//! take `&self` so a single platform object can be shared by the adaptor and
//! the engine model used in tests.

use sym_crypto_common::context::CryptoKeyType;
use sym_crypto_common::FatalError;

/// Host-interface registers the driver core uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg {
    /// Descriptor queue word `n` (0..=5).
    QueueWord(usize),
    /// Number of free descriptor slots.
    QueueContent,
    /// Interrupt mask register.
    HostImr,
    /// Interrupt clear register.
    HostIcr,
    /// Completed AXI writes since the last read; clear on read.
    AximMonComp,
    /// AXI monitor error flags.
    AximMonErr,
    SramAddr,
    SramData,
    SramDataReady,
}

/// Completion interrupt bit in the mask, clear and status registers.
pub const AXIM_COMP_INT_BIT: u32 = 1 << 23;

/// Availability of a non-user key as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyStatus {
    Valid,
    Invalid,
    SecureDisabled,
    FatalErrorLatched,
}

/// Register access and interrupt wait.
pub trait CcHal {
    /// Reads a host-interface register.
    fn read(&self, reg: Reg) -> u32;

    /// Writes a host-interface register.
    fn write(&self, reg: Reg, val: u32);

    /// Write memory barrier. Writes issued before the barrier are visible to
    /// the engine before any write issued after it.
    fn barrier(&self);

    /// Blocks until one of the interrupts in `irq_mask` is raised.
    ///
    /// # Arguments
    ///
    /// * `irq_mask` - Interrupt status bits to wait for.
    ///
    /// # Returns
    ///
    /// The interrupt status bits observed when the wait ended.
    fn wait_interrupt(&self, irq_mask: u32) -> u32;

    /// Reports whether a hardware key can currently be used.
    ///
    /// Platforms without OTP-backed keys keep the default.
    fn key_status(&self, _key: CryptoKeyType) -> KeyStatus {
        KeyStatus::Valid
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaDirection {
    ToDevice,
    FromDevice,
    Bi,
}

/// One physically contiguous run of a mapped buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DmaBlock {
    pub phys: u64,
    pub size: u32,
}

/// Platform error code passed through from a PAL primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PalError(pub u32);

/// DMA mapping and contiguous allocation.
pub trait DmaMapper {
    /// Token returned by `map` and handed back to `unmap`.
    type Handle: Copy;
    /// A physically contiguous, word-aligned allocation. The memory must stay
    /// at the same address when the value itself is moved.
    type Buffer: AsRef<[u8]> + AsMut<[u8]>;

    /// Returns true if `[addr, addr + size)` is physically contiguous.
    fn is_contiguous(&self, addr: usize, size: usize) -> bool;

    /// Maps a host buffer for the engine.
    ///
    /// # Arguments
    ///
    /// * `addr` - Virtual address of the buffer.
    /// * `size` - Length in bytes.
    /// * `dir` - Transfer direction.
    /// * `blocks` - Receives the physical fragments.
    ///
    /// # Returns
    ///
    /// * `Ok((count, handle))` with the number of fragments the buffer spans.
    ///   `count` may exceed `blocks.len()`; only the first `blocks.len()`
    ///   fragments are written and the caller must still `unmap`.
    /// * `Err(PalError)` if nothing was mapped.
    fn map(
        &self,
        addr: usize,
        size: usize,
        dir: DmaDirection,
        blocks: &mut [DmaBlock],
    ) -> Result<(usize, Self::Handle), PalError>;

    /// Releases a mapping made by `map`.
    fn unmap(
        &self,
        addr: usize,
        size: usize,
        dir: DmaDirection,
        handle: Self::Handle,
    ) -> Result<(), PalError>;

    /// Allocates `size` bytes of physically contiguous memory.
    fn alloc_contiguous(&self, size: usize) -> Result<Self::Buffer, PalError>;

    fn free_contiguous(&self, buf: Self::Buffer);
}

/// The process-wide lock around every driver call.
pub trait PalMutex {
    fn lock(&self) -> Result<(), PalError>;
    fn unlock(&self) -> Result<(), PalError>;
}

/// Terminal handler for platform-integrity failures.
pub trait AbortHandler {
    fn abort(&self, err: FatalError) -> !;
}
