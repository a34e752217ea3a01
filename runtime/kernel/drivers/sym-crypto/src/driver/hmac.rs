// Licensed under the Apache-2.0 license

//! HMAC over the hash engine.
//!
//! `init` hashes K0 XOR ipad into the running digest and K0 XOR opad into the
//! K0 field, which the outer pass reloads during `finalize`.

use log::warn;
use sym_crypto_common::context::{
    HashContext, HashMode, HashSramState, CTX_CACHE_SIZE, HASH_LENGTH_SIZE, HMAC_BLOCK_SIZE_MAX,
};
use sym_crypto_common::descriptor::{FlowMode, SetupOp, DO_NOT_PAD};
use sym_crypto_common::{DriverResult, HwDesc, SymError, SymResult};
use zeroize::Zeroize;

use super::{hash, DriverEnv};
use crate::dma_buffer::DmaBuffer;
use crate::hil::CcHal;

const HMAC_IPAD_CONST: u32 = 0x3636_3636;
const HMAC_OPAD_CONST: u32 = 0x5C5C_5C5C;

/// Hashes one block of `data_addr` XOR `pad_const` from the initial digest and
/// stores the intermediate digest at `result_addr`.
///
/// # Arguments
///
/// * `env` - Descriptor environment.
/// * `mode` - Hash algorithm.
/// * `pad_const` - Repeated pad word.
/// * `data_addr` - SRAM address of the padded key.
/// * `size` - Block size in bytes.
/// * `result_addr` - SRAM address receiving the intermediate digest.
fn pad<H: CcHal>(
    env: &DriverEnv<'_, H>,
    mode: HashMode,
    pad_const: u32,
    data_addr: u32,
    size: u32,
    result_addr: u32,
) -> SymResult<()> {
    if mode == HashMode::Sm3 {
        warn!("HMAC is not available for SM3");
        Err(SymError::UnsupportedAlgMode)?;
    }
    let hw_mode = mode.hw_mode();
    let hw_digest = mode.hw_digest_size();
    let scratch = env.field(CTX_CACHE_SIZE as u32);
    env.queue.write_sram_words(scratch, mode.larval_digest());

    let base = HwDesc::new().hash_mode(hw_mode);
    env.push(
        base.din_sram(scratch, hw_digest)
            .flow(FlowMode::SDinToHash)
            .setup(SetupOp::LoadState0),
    );
    env.push(
        base.din_const(0, HASH_LENGTH_SIZE as u32)
            .flow(FlowMode::SDinToHash)
            .setup(SetupOp::LoadKey0),
    );
    env.push(
        base.xor_val(pad_const)
            .flow(FlowMode::SDinToHash)
            .setup(SetupOp::LoadState1),
    );
    env.push(
        base.din_sram(data_addr, size)
            .xor_active()
            .flow(FlowMode::DinHash),
    );
    env.push(
        base.dout_sram(result_addr, hw_digest)
            .flow(FlowMode::SHashToDout)
            .setup(SetupOp::WriteState0),
    );
    env.push(
        base.cipher_do(DO_NOT_PAD)
            .dout_sram(env.field(HashSramState::LENGTH), HASH_LENGTH_SIZE as u32)
            .flow(FlowMode::SHashToDout)
            .setup(SetupOp::WriteState1),
    );
    Ok(())
}

pub fn init<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &mut HashContext) -> DriverResult<()> {
    let block = ctx.mode.block_size();
    let k0_addr = env.field(HashSramState::K0);
    let key_len = ctx.k0_size.min(block);

    // Zero-extend the key to a full block.
    if key_len % 4 == 0 {
        env.queue.clear_sram(k0_addr + key_len, block - key_len);
    } else {
        let mut k0 = [0u8; HMAC_BLOCK_SIZE_MAX];
        let k0 = &mut k0[..block as usize];
        env.queue.read_sram(k0_addr, k0);
        k0[key_len as usize..].fill(0);
        env.queue.write_sram(k0_addr, k0);
        k0.zeroize();
    }

    hash::init(env, ctx)?;
    pad(
        env,
        ctx.mode,
        HMAC_IPAD_CONST,
        k0_addr,
        block,
        env.field(HashSramState::DIGEST),
    )?;
    pad(env, ctx.mode, HMAC_OPAD_CONST, k0_addr, block, k0_addr)?;
    Ok(())
}

/// Feeds the inner hash. Once the outer pass has run the MAC is sealed.
pub fn process<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut HashContext,
    input: &DmaBuffer,
) -> DriverResult<()> {
    if ctx.hmac_finalization {
        warn!("HMAC update after finalize");
        Err(SymError::NoExec)?;
    }
    hash::process(env, ctx, input)
}

/// Finishes the inner hash, then hashes its digest from the outer-pad state.
pub fn finalize<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut HashContext,
    input: &DmaBuffer,
) -> DriverResult<()> {
    hash::finalize(env, ctx, input)?;
    ctx.hmac_finalization = true;
    let inner = DmaBuffer::sram(
        env.field(HashSramState::DIGEST),
        ctx.mode.digest_size(),
    );
    hash::finalize(env, ctx, &inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sym_crypto_common::descriptor::DmaMode;
    use sym_crypto_common::DriverError;

    use crate::testing::{with_env, RecordingHal, CTX_ADDR};

    const STALE: u8 = 0xEE;

    /// Runs `init` over a K0 field holding `key` followed by stale bytes.
    fn init_over_stale(mode: HashMode, key: &[u8]) -> (RecordingHal, HashContext) {
        let hal = RecordingHal::new(0x800);
        let k0 = CTX_ADDR + HashSramState::K0;
        hal.fill_sram(k0, &[STALE; HMAC_BLOCK_SIZE_MAX]);
        hal.fill_sram(k0, key);
        let mut ctx = HashContext::hmac(mode, key);
        with_env(&hal, |env| init(env, &mut ctx)).unwrap();
        (hal, ctx)
    }

    #[test]
    fn test_word_multiple_key_is_zero_extended() {
        let key = [0x0B; 20];
        let (hal, _) = init_over_stale(HashMode::Sha256, &key);
        let k0 = hal.sram(CTX_ADDR + HashSramState::K0, 64);
        assert_eq!(k0[..20], key);
        assert!(k0[20..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_odd_key_is_zero_extended_inside_last_word() {
        let key = [0x0B; 21];
        let (hal, _) = init_over_stale(HashMode::Sha256, &key);
        let k0 = hal.sram(CTX_ADDR + HashSramState::K0, 64);
        assert_eq!(k0[..21], key);
        assert!(k0[21..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_wide_block_key_tail() {
        let key = [0x5A; 70];
        let (hal, _) = init_over_stale(HashMode::Sha512, &key);
        let k0 = hal.sram(CTX_ADDR + HashSramState::K0, 128);
        assert_eq!(k0[..70], key);
        assert!(k0[70..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_pads_land_in_digest_and_k0() {
        let (hal, ctx) = init_over_stale(HashMode::Sha256, &[0x0B; 20]);
        let descs = hal.descriptors();
        let xored: Vec<u32> = descs
            .iter()
            .filter(|desc| desc.is_xor_active())
            .map(|desc| desc.words()[0])
            .collect();
        // Both pad passes hash the full K0 block.
        assert_eq!(xored, [CTX_ADDR + HashSramState::K0; 2]);
        let pads: Vec<u32> = descs
            .iter()
            .filter(|desc| desc.setup_op() == u32::from(SetupOp::LoadState1))
            .map(|desc| desc.words()[2])
            .collect();
        assert_eq!(pads, [HMAC_IPAD_CONST, HMAC_OPAD_CONST]);
        let stores: Vec<u64> = descs
            .iter()
            .filter(|desc| desc.setup_op() == u32::from(SetupOp::WriteState0))
            .map(|desc| desc.dout_addr())
            .collect();
        assert_eq!(
            stores,
            [
                (CTX_ADDR + HashSramState::DIGEST) as u64,
                (CTX_ADDR + HashSramState::K0) as u64
            ]
        );
        assert!(!ctx.hmac_finalization);
    }

    #[test]
    fn test_sm3_is_rejected() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hmac(HashMode::Sm3, &[1; 16]);
        assert_eq!(
            with_env(&hal, |env| init(env, &mut ctx)),
            Err(DriverError::Sym(SymError::UnsupportedAlgMode))
        );
    }

    #[test]
    fn test_update_feeds_inner_hash() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hmac(HashMode::Sha256, &[0x0B; 20]);
        let input = DmaBuffer::dlli(0x8000_0000, 64);
        with_env(&hal, |env| process(env, &mut ctx, &input)).unwrap();
        let descs = hal.descriptors();
        assert_eq!(descs[0].din_addr(), (CTX_ADDR + HashSramState::DIGEST) as u64);
        assert!(descs.iter().any(|desc| {
            desc.flow_mode() == u32::from(FlowMode::DinHash)
                && desc.din_dma_mode() == u32::from(DmaMode::Dlli)
        }));
    }

    #[test]
    fn test_update_after_finalize_is_rejected() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hmac(HashMode::Sha256, &[0x0B; 20]);
        ctx.hmac_finalization = true;
        let input = DmaBuffer::dlli(0x8000_0000, 64);
        assert_eq!(
            with_env(&hal, |env| process(env, &mut ctx, &input)),
            Err(DriverError::Sym(SymError::NoExec))
        );
        assert!(hal.descriptors().is_empty());
    }

    #[test]
    fn test_finalize_runs_outer_pass_over_inner_digest() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hmac(HashMode::Sha256, &[0x0B; 20]);
        with_env(&hal, |env| finalize(env, &mut ctx, &DmaBuffer::ABSENT)).unwrap();
        assert!(ctx.hmac_finalization);
        let descs = hal.descriptors();
        let outer = descs
            .iter()
            .find(|desc| {
                desc.flow_mode() == u32::from(FlowMode::DinHash)
                    && desc.din_dma_mode() == u32::from(DmaMode::Sram)
            })
            .unwrap();
        assert_eq!(outer.din_addr(), (CTX_ADDR + HashSramState::DIGEST) as u64);
        assert_eq!(outer.din_size(), 32);
    }
}
