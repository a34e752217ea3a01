// Licensed under the Apache-2.0 license

//! Page-safe placement of a context inside a caller-owned buffer.
//!
//! The engine reads the context through a single DMA fragment, so the context
//! must not straddle a page. The buffer starts with a small header recording
//! where the context currently lives. If the buffer has moved since (for example
//! it was copied or remapped), [`get_location`] picks a new offset and moves the
//! context there.

use log::debug;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{SymError, SymResult};

pub const CTX_BUFF_PROPS_SIZE: usize = 12;

const CONTEXT_ALIGNMENT: usize = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct CtxBufProps {
    buf_size: U32<LittleEndian>,
    ctx_size: U32<LittleEndian>,
    ctx_offset: U32<LittleEndian>,
}

const _: () = assert!(core::mem::size_of::<CtxBufProps>() == CTX_BUFF_PROPS_SIZE);

fn align_up(addr: usize) -> usize {
    (addr + CONTEXT_ALIGNMENT - 1) & !(CONTEXT_ALIGNMENT - 1)
}

fn crosses_page(start: usize, size: usize, page_size: usize) -> bool {
    size != 0 && start / page_size < (start + size - 1) / page_size
}

/// Offset from `start` of a `ctx_size` run inside `[start, start + size)` that stays in one page.
fn non_crossing_offset(start: usize, size: usize, ctx_size: usize, page_size: usize) -> usize {
    let page_mask = !(page_size - 1);
    let next_page = (start + page_size) & page_mask;
    let end_page = (start + size - 1) & page_mask;

    let location = if next_page > end_page {
        align_up(start)
    } else if next_page == end_page {
        let aligned = align_up(start);
        if next_page.saturating_sub(aligned) < ctx_size {
            end_page
        } else {
            aligned
        }
    } else {
        next_page
    };
    location - start
}

fn check_page_size(page_size: usize) -> SymResult<()> {
    if !page_size.is_power_of_two() || page_size < CONTEXT_ALIGNMENT {
        Err(SymError::InvalidArg)?;
    }
    Ok(())
}

/// Computes the context offset from the buffer start and records it in the header.
fn set_props(buf: &mut [u8], ctx_size: usize, page_size: usize) -> SymResult<usize> {
    let region_start = buf.as_ptr() as usize + CTX_BUFF_PROPS_SIZE;
    let region_size = buf.len() - CTX_BUFF_PROPS_SIZE;
    let offset =
        CTX_BUFF_PROPS_SIZE + non_crossing_offset(region_start, region_size, ctx_size, page_size);
    if offset + ctx_size > buf.len() {
        Err(SymError::InvalidArg)?;
    }

    let props = CtxBufProps {
        buf_size: U32::new(buf.len() as u32),
        ctx_size: U32::new(ctx_size as u32),
        ctx_offset: U32::new(offset as u32),
    };
    props
        .write_to_prefix(buf)
        .map_err(|_| SymError::InvalidArg)?;
    Ok(offset)
}

/// Places a `ctx_size` context in `buf` and returns its byte offset.
///
/// `buf` must hold the header plus twice the context, which guarantees a
/// non-crossing run exists wherever the buffer starts. `ctx_size` must be a
/// whole number of words: the context is word aligned, and an odd size can
/// leave both candidate runs a few bytes short.
pub fn init_location(buf: &mut [u8], ctx_size: usize, page_size: usize) -> SymResult<usize> {
    check_page_size(page_size)?;
    if ctx_size == 0 || ctx_size > page_size || ctx_size % CONTEXT_ALIGNMENT != 0 {
        Err(SymError::InvalidArg)?;
    }
    if buf.len() < CTX_BUFF_PROPS_SIZE + 2 * ctx_size || buf.len() > u32::MAX as usize {
        Err(SymError::InvalidArg)?;
    }
    set_props(buf, ctx_size, page_size)
}

/// Returns the context offset for the buffer's current address, moving the
/// context (and the private data after it) if the recorded offset now crosses a page.
pub fn get_location(buf: &mut [u8], page_size: usize) -> SymResult<usize> {
    check_page_size(page_size)?;
    let (props, _) = CtxBufProps::read_from_prefix(buf).map_err(|_| SymError::InvalidCtx)?;
    let buf_size = props.buf_size.get() as usize;
    let ctx_size = props.ctx_size.get() as usize;
    let old_offset = props.ctx_offset.get() as usize;
    if buf_size != buf.len()
        || ctx_size == 0
        || ctx_size % CONTEXT_ALIGNMENT != 0
        || old_offset + ctx_size > buf_size
    {
        Err(SymError::InvalidCtx)?;
    }

    let base = buf.as_ptr() as usize;
    if !crosses_page(base + old_offset, ctx_size, page_size) {
        return Ok(old_offset);
    }

    let new_offset = set_props(buf, ctx_size, page_size)?;
    let move_len =
        ((buf_size - CTX_BUFF_PROPS_SIZE) / 2).min(buf_size - old_offset.max(new_offset));
    buf.copy_within(old_offset..old_offset + move_len, new_offset);
    debug!(
        "Context moved from offset {} to {} ({} bytes)",
        old_offset, new_offset, move_len
    );
    Ok(new_offset)
}
