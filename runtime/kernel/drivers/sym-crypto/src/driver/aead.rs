// Licensed under the Apache-2.0 license

//! AES-CCM and AES-GCM.
//!
//! A message is fed as associated data followed by text, in any number of
//! `process` calls. [`AeadFlowState`] records where the next call lands and
//! [`AeadInternalMode`] which MAC sub-mode the engine runs in. Both MAC and
//! counter state are reloaded from and stored to the context cache around
//! every data descriptor.

use log::{debug, warn};
use sym_crypto_common::context::{
    AeadContext, AeadFlowState, AeadInternalMode, AeadMode, AeadSramState, AES_BLOCK_SIZE,
    AES_KEY_SIZE_MAX, CCM_NONCE_SIZE_MAX,
};
use sym_crypto_common::descriptor::{
    CipherMode, Direction, DmaMode, FlowMode, HashHwMode, SetupOp, HASH_DIGEST_RESULT_LITTLE_ENDIAN,
    HASH_PADDING_ENABLED,
};
use sym_crypto_common::{DriverResult, HwDesc, SymError, SymResult};

use super::{din, dout, DriverEnv};
use crate::dma_buffer::DmaBuffer;
use crate::hil::CcHal;
use crate::mlli::MlliDirection;

const BLOCK: u32 = AES_BLOCK_SIZE as u32;
const CCM_NONCE_SIZE_MIN: u32 = 7;
/// Placeholder size of the no-DMA descriptors that fence the GHASH engine.
const AEAD_BARRIER_SIZE: u32 = 0xfffff0;

/// Size of the length prefix that leads CCM associated data.
pub fn ccm_a0_prefix_size(header_size: u32) -> usize {
    match header_size {
        0 => 0,
        h if h < 0xFF00 => 2,
        _ => 6,
    }
}

/// Formats the first CCM associated-data block: the encoded header length
/// followed by as many leading header bytes as fit.
///
/// # Returns
///
/// The block, the number of its bytes to feed, and how many bytes of
/// `header` it carries.
pub fn format_ccm_a0(header_size: u32, header: &[u8]) -> ([u8; AES_BLOCK_SIZE], usize, usize) {
    let mut a0 = [0u8; AES_BLOCK_SIZE];
    let prefix = ccm_a0_prefix_size(header_size);
    match prefix {
        2 => a0[..2].copy_from_slice(&(header_size as u16).to_be_bytes()),
        6 => {
            a0[..2].copy_from_slice(&[0xFF, 0xFE]);
            a0[2..6].copy_from_slice(&header_size.to_be_bytes());
        }
        _ => {}
    }
    let borrowed = (AES_BLOCK_SIZE - prefix).min(header.len());
    a0[prefix..prefix + borrowed].copy_from_slice(&header[..borrowed]);
    (a0, prefix + borrowed, borrowed)
}

/// Header bytes left and the next state once `input` is fed as CCM
/// associated data. Nothing is pushed, so a rejected call leaves the MAC alone.
fn ccm_header_step(
    ctx: &AeadContext,
    state: AeadFlowState,
    input: &DmaBuffer,
) -> SymResult<(u32, AeadFlowState)> {
    let remaining = if input.dma_mode() == DmaMode::Mlli {
        // A scatter table carries the rest of the header in one call.
        0
    } else {
        let consumed = if state == AeadFlowState::AdataInit {
            input
                .size()
                .checked_sub(ccm_a0_prefix_size(ctx.header_size) as u32)
                .ok_or(SymError::InvalidArg)?
        } else {
            input.size()
        };
        ctx.header_remaining.checked_sub(consumed).ok_or_else(|| {
            warn!(
                "{} associated data bytes with {} left",
                consumed, ctx.header_remaining
            );
            SymError::NoExec
        })?
    };
    let next = if remaining == 0 {
        AeadFlowState::TextDataInit
    } else {
        AeadFlowState::AdataProcess
    };
    Ok((remaining, next))
}

/// Formats the CCM B0 block.
///
/// # Arguments
///
/// * `nonce` - Nonce bytes.
/// * `tag_size` - Tag length in bytes.
/// * `header_size` - Associated data length in bytes.
/// * `text_size` - Payload length in bytes.
///
/// # Returns
///
/// The block and the width in bytes of its length field.
pub fn format_ccm_b0(
    nonce: &[u8],
    tag_size: u32,
    header_size: u32,
    text_size: u32,
) -> ([u8; AES_BLOCK_SIZE], u32) {
    let nonce_size = (nonce.len() as u32).min(CCM_NONCE_SIZE_MAX);
    let text_bytes = (u32::BITS - text_size.leading_zeros()).div_ceil(8);
    let mut q = text_bytes.max(2);
    if 15 - nonce_size > q {
        q = 15 - nonce_size;
    }

    let mut b0 = [0u8; AES_BLOCK_SIZE];
    b0[0] = (((header_size > 0) as u8) << 6)
        | (((tag_size.saturating_sub(2) >> 1) as u8) << 3)
        | (q - 1) as u8;
    let nonce_len = (15 - q) as usize;
    b0[1..1 + nonce_len].copy_from_slice(&nonce[..nonce_len]);
    // Only 32 bits of length are carried; wider fields stay zero-extended.
    for i in 0..q.min(4) as usize {
        b0[15 - i] = (text_size >> (8 * i)) as u8;
    }
    (b0, q)
}

fn ccm_counter_block(ctx: &AeadContext, value: u8) -> [u8; AES_BLOCK_SIZE] {
    let mut ctr = [0u8; AES_BLOCK_SIZE];
    let nonce_len = 15usize.saturating_sub(ctx.q as usize);
    ctr[0] = ctx.q.saturating_sub(1) as u8;
    ctr[1..1 + nonce_len].copy_from_slice(&ctx.sram.nonce[..nonce_len]);
    ctr[AES_BLOCK_SIZE - 1] = value;
    ctr
}

/// Writes the CCM counter block `value` into the cached block state through the engine.
fn init_ccm_counter<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext, value: u8) {
    let ctr = ccm_counter_block(ctx, value);
    let block_state = env.field(AeadSramState::BLOCK_STATE);
    for (i, chunk) in ctr.chunks_exact(4).enumerate() {
        let mut word = [0u8; 4];
        word.copy_from_slice(chunk);
        env.push(
            HwDesc::new()
                .din_const(u32::from_le_bytes(word), 4)
                .dout_sram(block_state + 4 * i as u32, 4)
                .flow(FlowMode::Bypass),
        );
    }
}

fn clear_key_tail<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    if ctx.key_size == 24 {
        env.queue.clear_sram(
            env.field(AeadSramState::KEY) + 24,
            AES_KEY_SIZE_MAX as u32 - 24,
        );
    }
}

fn push_barrier<H: CcHal>(env: &DriverEnv<'_, H>) {
    env.push(HwDesc::new().din_no_dma(0, AEAD_BARRIER_SIZE).last_ind());
}

fn load_mac<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    let desc = HwDesc::new()
        .key_size_aes(ctx.key_size)
        .flow(FlowMode::SDinToHash)
        .aes_not_hash()
        .din_sram(env.field(AeadSramState::MAC_STATE), BLOCK)
        .cipher_config0(ctx.direction.into())
        .setup(SetupOp::LoadState0);
    let desc = match ctx.mode {
        AeadMode::Ccm => desc.cipher_mode(CipherMode::CbcMac),
        AeadMode::Gcm => desc
            .hash_mode(HashHwMode::Ghash)
            .cipher_config1(HASH_PADDING_ENABLED),
    };
    env.push(desc);
}

fn store_mac<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    let desc = HwDesc::new()
        .dout_sram(env.field(AeadSramState::MAC_STATE), BLOCK)
        .flow(FlowMode::SHashToDout)
        .aes_not_hash()
        .cipher_config0(HASH_DIGEST_RESULT_LITTLE_ENDIAN)
        .setup(SetupOp::WriteState0);
    let desc = match ctx.mode {
        AeadMode::Ccm => desc.cipher_mode(CipherMode::CbcMac),
        AeadMode::Gcm => desc.hash_mode(HashHwMode::Ghash),
    };
    env.push(desc);
}

fn counter_mode(ctx: &AeadContext) -> CipherMode {
    match ctx.mode {
        AeadMode::Ccm => CipherMode::Ctr,
        AeadMode::Gcm => CipherMode::Gctr,
    }
}

fn load_cipher_state<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    env.push(
        HwDesc::new()
            .cipher_mode(counter_mode(ctx))
            .key_size_aes(ctx.key_size)
            .flow(FlowMode::SDinToAes)
            .din_sram(env.field(AeadSramState::BLOCK_STATE), BLOCK)
            .setup(SetupOp::LoadState1),
    );
}

fn store_cipher_state<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    env.push(
        HwDesc::new()
            .cipher_mode(counter_mode(ctx))
            .dout_sram(env.field(AeadSramState::BLOCK_STATE), BLOCK)
            .flow(FlowMode::SAesToDout)
            .setup(SetupOp::WriteState1),
    );
}

fn load_gcm_hash_key<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    env.push(
        HwDesc::new()
            .hash_mode(HashHwMode::Ghash)
            .cipher_config1(HASH_PADDING_ENABLED)
            .din_sram(env.field(AeadSramState::HKEY), BLOCK)
            .flow(FlowMode::SDinToHash)
            .aes_not_hash()
            .setup(SetupOp::LoadKey0),
    );
    // The first GHASH of a message also resets the engine's running hash.
    if ctx.internal_mode == AeadInternalMode::GcmInit {
        env.push(
            HwDesc::new()
                .flow(FlowMode::SDinToHash)
                .aes_not_hash()
                .hash_mode(HashHwMode::Ghash)
                .cipher_do(1)
                .cipher_config0(Direction::Encrypt.into())
                .cipher_config1(HASH_PADDING_ENABLED)
                .setup(SetupOp::LoadKey0),
        );
    }
}

/// Loads the key for the cipher (`SDinToAes`) or MAC (`SDinToHash`) side.
fn load_key<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext, flow: FlowMode) {
    clear_key_tail(env, ctx);
    let mac_side = flow == FlowMode::SDinToHash;
    if mac_side && ctx.mode == AeadMode::Gcm {
        load_gcm_hash_key(env, ctx);
        return;
    }
    let desc = if mac_side {
        HwDesc::new().cipher_mode(CipherMode::CbcMac).aes_not_hash()
    } else {
        HwDesc::new().cipher_mode(counter_mode(ctx))
    };
    env.push(
        desc.key_size_aes(ctx.key_size)
            .din_sram(env.field(AeadSramState::KEY), ctx.key_size)
            .flow(flow)
            .setup(SetupOp::LoadKey0),
    );
}

/// H = AES_K(0^128), stored to the hash-key field.
fn gcm_calc_h<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    clear_key_tail(env, ctx);
    env.push(
        HwDesc::new()
            .cipher_mode(CipherMode::Ecb)
            .cipher_config0(Direction::Encrypt.into())
            .key_size_aes(ctx.key_size)
            .din_sram(env.field(AeadSramState::KEY), ctx.key_size)
            .flow(FlowMode::SDinToAes)
            .setup(SetupOp::LoadKey0),
    );
    env.push(
        HwDesc::new()
            .din_const(0, BLOCK)
            .dout_sram(env.field(AeadSramState::HKEY), BLOCK)
            .flow(FlowMode::DinAesDout),
    );
    push_barrier(env);
}

/// Closes the IV GHASH with the length block and stores J0 over the nonce field.
fn gcm_calc_j0<H: CcHal>(env: &DriverEnv<'_, H>) {
    let nonce = env.field(AeadSramState::NONCE);
    env.push(HwDesc::new().din_sram(nonce, BLOCK).flow(FlowMode::DinHash));
    env.push(
        HwDesc::new()
            .hash_mode(HashHwMode::Ghash)
            .dout_sram(nonce, BLOCK)
            .setup(SetupOp::WriteState0)
            .flow(FlowMode::SHashToDout)
            .aes_not_hash(),
    );
    push_barrier(env);
}

fn final_ccm_mac<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    if ctx.tag_size == 0 {
        return;
    }
    clear_key_tail(env, ctx);
    // The tag is encrypted with counter block zero.
    init_ccm_counter(env, ctx, 0);

    let ctr = HwDesc::new()
        .cipher_mode(CipherMode::Ctr)
        .cipher_config0(Direction::Encrypt.into())
        .key_size_aes(ctx.key_size)
        .flow(FlowMode::SDinToAes);
    env.push(
        ctr.din_sram(env.field(AeadSramState::BLOCK_STATE), BLOCK)
            .setup(SetupOp::LoadState1),
    );
    env.push(
        ctr.din_sram(env.field(AeadSramState::KEY), ctx.key_size)
            .setup(SetupOp::LoadKey0),
    );
    let mac_state = env.field(AeadSramState::MAC_STATE);
    env.push(
        HwDesc::new()
            .din_sram(mac_state, ctx.tag_size)
            .dout_sram(mac_state, ctx.tag_size)
            .flow(FlowMode::DinAesDout),
    );
}

fn final_gcm_mac<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &AeadContext) {
    let mac_state = env.field(AeadSramState::MAC_STATE);
    clear_key_tail(env, ctx);
    load_key(env, ctx, FlowMode::SDinToHash);
    load_mac(env, ctx);

    env.push(
        HwDesc::new()
            .din_sram(env.field(AeadSramState::GCM_LEN_BLOCK), BLOCK)
            .flow(FlowMode::DinHash),
    );
    env.push(
        HwDesc::new()
            .hash_mode(HashHwMode::Ghash)
            .din_no_dma(0, AEAD_BARRIER_SIZE)
            .dout_sram(mac_state, BLOCK)
            .setup(SetupOp::WriteState0)
            .flow(FlowMode::SHashToDout)
            .aes_not_hash(),
    );

    let gctr = HwDesc::new()
        .cipher_mode(CipherMode::Gctr)
        .cipher_config0(Direction::Encrypt.into())
        .key_size_aes(ctx.key_size)
        .flow(FlowMode::SDinToAes);
    // Without text the GCTR key was never loaded.
    if ctx.text_size == 0 {
        env.push(
            gctr.din_sram(env.field(AeadSramState::KEY), ctx.key_size)
                .setup(SetupOp::LoadKey0),
        );
    }
    env.push(
        gctr.din_sram(env.field(AeadSramState::NONCE), BLOCK)
            .setup(SetupOp::LoadState1),
    );
    push_barrier(env);

    // Tag = GCTR(J0, S).
    env.push(
        HwDesc::new()
            .cipher_mode(CipherMode::Gctr)
            .din_sram(mac_state, BLOCK)
            .dout_sram(mac_state, ctx.tag_size)
            .flow(FlowMode::DinAesDout)
            .queue_last(),
    );
}

pub fn init<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &mut AeadContext) -> DriverResult<()> {
    env.queue
        .clear_sram(env.field(AeadSramState::BLOCK_STATE), BLOCK);
    env.queue
        .clear_sram(env.field(AeadSramState::MAC_STATE), BLOCK);
    ctx.header_remaining = ctx.header_size;

    match ctx.mode {
        AeadMode::Ccm => {
            if !(CCM_NONCE_SIZE_MIN..=CCM_NONCE_SIZE_MAX).contains(&ctx.nonce_size) {
                warn!("CCM nonce of {} bytes", ctx.nonce_size);
                Err(SymError::InvalidArg)?;
            }
            ctx.internal_mode = AeadInternalMode::CcmA;
            ctx.next_state = if ctx.header_size == 0 {
                AeadFlowState::TextDataInit
            } else {
                AeadFlowState::AdataInit
            };

            let (b0, q) = format_ccm_b0(
                &ctx.sram.nonce[..ctx.nonce_size as usize],
                ctx.tag_size,
                ctx.header_size,
                ctx.text_size,
            );
            ctx.q = q;
            env.queue
                .write_sram(env.field(AeadSramState::BLOCK_STATE), &b0);

            // MAC state = CBC-MAC(B0).
            load_mac(env, ctx);
            load_key(env, ctx, FlowMode::SDinToHash);
            env.push(
                HwDesc::new()
                    .din_sram(env.field(AeadSramState::BLOCK_STATE), BLOCK)
                    .flow(FlowMode::DinHash),
            );
            store_mac(env, ctx);
        }
        AeadMode::Gcm => {
            ctx.internal_mode = AeadInternalMode::GcmInit;
            ctx.next_state = if ctx.nonce_size != 12 {
                AeadFlowState::GcmIv
            } else if ctx.header_size == 0 {
                AeadFlowState::TextDataInit
            } else {
                AeadFlowState::AdataInit
            };
            gcm_calc_h(env, ctx);
        }
    }
    debug!("{:?} init, first state {:?}", ctx.mode, ctx.next_state);
    Ok(())
}

pub fn process<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut AeadContext,
    input: &DmaBuffer,
    output: &DmaBuffer,
) -> DriverResult<()> {
    let state = ctx.next_state;
    if input.dma_mode() == DmaMode::NoDma {
        warn!("AEAD {:?} step without input data", state);
        Err(SymError::InvalidArg)?;
    }
    let text_step = matches!(
        state,
        AeadFlowState::TextDataInit | AeadFlowState::TextDataProcess
    );
    if text_step && output.is_absent() {
        warn!("AEAD text step without an output buffer");
        Err(SymError::InvalidArg)?;
    }
    if state == AeadFlowState::GcmIv && ctx.mode != AeadMode::Gcm {
        Err(SymError::UnsupportedAlgMode)?;
    }

    let in_place = input.target == output.target
        || output.is_absent()
        || matches!(
            state,
            AeadFlowState::GcmIv | AeadFlowState::AdataInit | AeadFlowState::AdataProcess
        );
    let header_step = match (ctx.mode, state) {
        (AeadMode::Ccm, AeadFlowState::AdataInit | AeadFlowState::AdataProcess) => {
            Some(ccm_header_step(ctx, state, input)?)
        }
        _ => None,
    };

    let flow = match state {
        AeadFlowState::GcmIv => {
            load_key(env, ctx, FlowMode::SDinToHash);
            load_mac(env, ctx);
            FlowMode::DinHash
        }
        AeadFlowState::AdataInit | AeadFlowState::AdataProcess => {
            if state == AeadFlowState::AdataInit && ctx.mode == AeadMode::Ccm {
                init_ccm_counter(env, ctx, 1);
            }
            load_mac(env, ctx);
            load_key(env, ctx, FlowMode::SDinToHash);
            if ctx.mode == AeadMode::Gcm {
                // GCM associated data arrives whole.
                ctx.header_remaining = 0;
                ctx.next_state = AeadFlowState::TextDataInit;
                ctx.internal_mode = AeadInternalMode::GcmStartTextGhash;
            }
            FlowMode::DinHash
        }
        AeadFlowState::TextDataInit | AeadFlowState::TextDataProcess => {
            if state == AeadFlowState::TextDataInit {
                ctx.next_state = AeadFlowState::TextDataProcess;
                match ctx.mode {
                    AeadMode::Ccm => {
                        ctx.internal_mode = match ctx.direction {
                            Direction::Encrypt => AeadInternalMode::CcmPE,
                            Direction::Decrypt => AeadInternalMode::CcmPD,
                        };
                        init_ccm_counter(env, ctx, 1);
                    }
                    AeadMode::Gcm => {
                        ctx.start_gcm_counter();
                        env.queue.write_sram(
                            env.field(AeadSramState::BLOCK_STATE),
                            &ctx.sram.block_state,
                        );
                    }
                }
            }
            load_key(env, ctx, FlowMode::SDinToAes);
            load_cipher_state(env, ctx);
            load_mac(env, ctx);
            load_key(env, ctx, FlowMode::SDinToHash);
            // The MAC always covers the plaintext for CCM and the ciphertext for GCM.
            let mac_after_cipher = match ctx.mode {
                AeadMode::Ccm => ctx.direction == Direction::Decrypt,
                AeadMode::Gcm => {
                    ctx.internal_mode = AeadInternalMode::GcmStartTextGhash;
                    ctx.direction == Direction::Encrypt
                }
            };
            if mac_after_cipher {
                FlowMode::AesToHashAndDout
            } else {
                FlowMode::AesAndHash
            }
        }
    };

    let data_in = env.resolve(input, MlliDirection::Input)?;
    let data_out = if in_place {
        data_in
    } else {
        env.resolve(output, MlliDirection::Output)?
    };

    let desc = din(HwDesc::new(), &data_in);
    let desc = if ctx.internal_mode == AeadInternalMode::CcmA || state == AeadFlowState::GcmIv {
        desc
    } else {
        dout(desc, &data_out)
    };
    env.push(desc.flow(flow));
    debug!("AEAD {:?} step, {} units", state, data_in.size);

    if ctx.internal_mode == AeadInternalMode::CcmA {
        store_mac(env, ctx);
        if let Some((remaining, next)) = header_step {
            ctx.header_remaining = remaining;
            ctx.next_state = next;
        }
        return Ok(());
    }

    if state == AeadFlowState::GcmIv {
        gcm_calc_j0(env);
        env.queue
            .clear_sram(env.field(AeadSramState::MAC_STATE), BLOCK);
        ctx.next_state = if ctx.header_size == 0 {
            AeadFlowState::TextDataInit
        } else {
            AeadFlowState::AdataInit
        };
        return Ok(());
    }

    store_mac(env, ctx);
    if ctx.mode == AeadMode::Ccm || ctx.next_state == AeadFlowState::TextDataProcess {
        store_cipher_state(env, ctx);
    }
    Ok(())
}

/// Feeds any remaining text and produces the tag in the MAC state field.
pub fn finalize<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut AeadContext,
    input: &DmaBuffer,
    output: &DmaBuffer,
) -> DriverResult<()> {
    if input.dma_mode() != DmaMode::NoDma && input.size() > 0 {
        process(env, ctx, input, output)?;
    }
    match ctx.mode {
        AeadMode::Ccm => final_ccm_mac(env, ctx),
        AeadMode::Gcm => final_gcm_mac(env, ctx),
    }
    Ok(())
}
