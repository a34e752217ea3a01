// Licensed under the Apache-2.0 license

//! MD5, SHA-1, SHA-2 and SM3.
//!
//! The running digest and the processed-length counter live in the context
//! cache between calls. Every `process` reloads both, feeds the data and
//! writes them back; `finalize` lets the engine pad and emits the digest.

use log::{debug, warn};
use sym_crypto_common::context::{HashContext, HashSramState, HASH_LENGTH_SIZE};
use sym_crypto_common::descriptor::{
    DmaMode, FlowMode, HashHwMode, SetupOp, DO_NOT_PAD, DO_PAD, HASH_DIGEST_RESULT_LITTLE_ENDIAN,
    HASH_PADDING_DISABLED, HASH_PADDING_ENABLED,
};
use sym_crypto_common::{DriverResult, HwDesc, SymError};

use super::{din, DriverEnv};
use crate::dma_buffer::DmaBuffer;
use crate::hil::CcHal;
use crate::mlli::MlliDirection;

/// Restores the running digest and length counter.
///
/// During the outer HMAC pass the digest comes from the saved outer-pad state
/// and the length counter is reset to one processed block.
fn load_state<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &HashContext, padding: u32) {
    let hw_mode = ctx.mode.hw_mode();
    let hw_digest = ctx.mode.hw_digest_size();
    let length_addr = env.field(HashSramState::LENGTH);

    let digest_addr = if ctx.hmac_finalization {
        env.field(HashSramState::K0)
    } else {
        env.field(HashSramState::DIGEST)
    };
    env.push(
        HwDesc::new()
            .din_sram(digest_addr, hw_digest)
            .hash_mode(hw_mode)
            .flow(FlowMode::SDinToHash)
            .setup(SetupOp::LoadState0),
    );

    if ctx.hmac_finalization {
        env.push(
            HwDesc::new()
                .din_const(0, HASH_LENGTH_SIZE as u32)
                .dout_sram(length_addr, HASH_LENGTH_SIZE as u32)
                .flow(FlowMode::Bypass),
        );
        env.push(
            HwDesc::new()
                .din_const(ctx.mode.block_size(), 4)
                .dout_sram(length_addr, 4)
                .flow(FlowMode::Bypass),
        );
    }

    env.push(
        HwDesc::new()
            .hash_mode(hw_mode)
            .cipher_config1(padding)
            .cipher_do(DO_NOT_PAD)
            .din_sram(length_addr, ctx.mode.length_size())
            .flow(FlowMode::SDinToHash)
            .setup(SetupOp::LoadKey0),
    );
}

fn store_state<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &HashContext) {
    let hw_mode = ctx.mode.hw_mode();
    env.push(
        HwDesc::new()
            .hash_mode(hw_mode)
            .dout_sram(env.field(HashSramState::DIGEST), ctx.mode.hw_digest_size())
            .flow(FlowMode::SHashToDout)
            .setup(SetupOp::WriteState0),
    );
    env.push(
        HwDesc::new()
            .hash_mode(hw_mode)
            .dout_sram(env.field(HashSramState::LENGTH), ctx.mode.length_size())
            .flow(FlowMode::SHashToDout)
            .setup(SetupOp::WriteState1),
    );
}

/// Seeds the cached digest with the initial value and zeroes the length counter.
pub fn init<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &mut HashContext) -> DriverResult<()> {
    env.queue
        .write_sram_words(env.field(HashSramState::DIGEST), ctx.mode.larval_digest());
    env.queue
        .clear_sram(env.field(HashSramState::LENGTH), HASH_LENGTH_SIZE as u32);
    ctx.hmac_finalization = false;
    Ok(())
}

pub fn process<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut HashContext,
    input: &DmaBuffer,
) -> DriverResult<()> {
    if input.dma_mode() == DmaMode::NoDma {
        warn!("Hash update without input data");
        Err(SymError::InvalidArg)?;
    }

    load_state(env, ctx, HASH_PADDING_DISABLED);
    let data = env.resolve(input, MlliDirection::Input)?;
    env.push(din(HwDesc::new(), &data).flow(FlowMode::DinHash));
    store_state(env, ctx);
    debug!("{:?} update of {} units", ctx.mode, data.size);
    Ok(())
}

/// Pads the stream and writes the final digest to the cached digest field.
pub fn finalize<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut HashContext,
    input: &DmaBuffer,
) -> DriverResult<()> {
    let hw_mode = ctx.mode.hw_mode();
    let remaining = input.dma_mode() != DmaMode::NoDma && input.size() > 0;

    if remaining {
        load_state(env, ctx, HASH_PADDING_ENABLED);
        let data = env.resolve(input, MlliDirection::Input)?;
        env.push(din(HwDesc::new(), &data).flow(FlowMode::DinHash));
    } else {
        // Nothing left to feed: have the engine run the padding block on its own.
        load_state(env, ctx, HASH_PADDING_DISABLED);
        env.push(
            HwDesc::new()
                .hash_mode(hw_mode)
                .cipher_config1(HASH_PADDING_DISABLED)
                .cipher_do(DO_PAD)
                .dout_sram(env.field(HashSramState::LENGTH), ctx.mode.length_size())
                .flow(FlowMode::SHashToDout)
                .setup(SetupOp::WriteState1),
        );
    }

    let desc = HwDesc::new()
        .hash_mode(hw_mode)
        .dout_sram(env.field(HashSramState::DIGEST), ctx.mode.hw_digest_size());
    let desc = if matches!(hw_mode, HashHwMode::Md5 | HashHwMode::Sha512) {
        desc.bytes_swap(true)
    } else {
        desc.cipher_config0(HASH_DIGEST_RESULT_LITTLE_ENDIAN)
    };
    env.push(
        desc.cipher_config1(HASH_PADDING_DISABLED)
            .cipher_do(DO_NOT_PAD)
            .flow(FlowMode::SHashToDout)
            .setup(SetupOp::WriteState0),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sym_crypto_common::context::HashMode;
    use sym_crypto_common::DriverError;

    use crate::testing::{with_env, RecordingHal, CTX_ADDR};

    fn steps(descs: &[HwDesc]) -> Vec<(FlowMode, SetupOp)> {
        descs
            .iter()
            .map(|desc| {
                (
                    FlowMode::try_from(desc.flow_mode()).unwrap(),
                    SetupOp::try_from(desc.setup_op()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_init_seeds_digest_and_clears_length() {
        let hal = RecordingHal::new(0x800);
        hal.fill_sram(CTX_ADDR + HashSramState::LENGTH, &[0xFF; HASH_LENGTH_SIZE]);
        let mut ctx = HashContext::hash(HashMode::Sha1);
        ctx.hmac_finalization = true;
        with_env(&hal, |env| init(env, &mut ctx)).unwrap();

        let larval: Vec<u8> = HashMode::Sha1
            .larval_digest()
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        assert_eq!(hal.sram(CTX_ADDR + HashSramState::DIGEST, larval.len()), larval);
        assert_eq!(
            hal.sram(CTX_ADDR + HashSramState::LENGTH, HASH_LENGTH_SIZE),
            [0; HASH_LENGTH_SIZE]
        );
        assert!(!ctx.hmac_finalization);
        assert!(hal.descriptors().is_empty());
    }

    #[test]
    fn test_update_saves_state_around_data() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hash(HashMode::Sha256);
        let input = DmaBuffer::dlli(0x8000_0000, 128);
        with_env(&hal, |env| process(env, &mut ctx, &input)).unwrap();

        let descs = hal.descriptors();
        assert_eq!(
            steps(&descs),
            [
                (FlowMode::SDinToHash, SetupOp::LoadState0),
                (FlowMode::SDinToHash, SetupOp::LoadKey0),
                (FlowMode::DinHash, SetupOp::None),
                (FlowMode::SHashToDout, SetupOp::WriteState0),
                (FlowMode::SHashToDout, SetupOp::WriteState1),
            ]
        );
        assert_eq!(descs[0].din_addr(), (CTX_ADDR + HashSramState::DIGEST) as u64);
        assert_eq!(descs[0].din_size(), 32);
        assert_eq!(descs[1].din_addr(), (CTX_ADDR + HashSramState::LENGTH) as u64);
        assert_eq!(descs[1].config1(), HASH_PADDING_DISABLED);
        assert_eq!(descs[2].din_dma_mode(), u32::from(DmaMode::Dlli));
        assert_eq!(descs[2].din_addr(), 0x8000_0000);
        assert_eq!(descs[2].din_size(), 128);
        assert_eq!(descs[3].dout_addr(), (CTX_ADDR + HashSramState::DIGEST) as u64);
        assert_eq!(descs[4].dout_addr(), (CTX_ADDR + HashSramState::LENGTH) as u64);
    }

    #[test]
    fn test_update_without_data_is_rejected() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hash(HashMode::Sha256);
        assert_eq!(
            with_env(&hal, |env| process(env, &mut ctx, &DmaBuffer::ABSENT)),
            Err(DriverError::Sym(SymError::InvalidArg))
        );
        assert!(hal.descriptors().is_empty());
    }

    #[test]
    fn test_final_tail_is_padded_in_stream() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hash(HashMode::Sha256);
        let tail = DmaBuffer::dlli(0x9000_0000, 40);
        with_env(&hal, |env| finalize(env, &mut ctx, &tail)).unwrap();

        let descs = hal.descriptors();
        assert_eq!(descs[1].config1(), HASH_PADDING_ENABLED);
        assert!(!descs.iter().any(|desc| desc.cipher_do_raw() == DO_PAD));
        let digest = descs.last().unwrap();
        assert_eq!(digest.setup_op(), u32::from(SetupOp::WriteState0));
        assert_eq!(digest.config0(), HASH_DIGEST_RESULT_LITTLE_ENDIAN);
        assert!(!digest.is_bytes_swap());
    }

    #[test]
    fn test_empty_final_pads_on_engine() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hash(HashMode::Md5);
        with_env(&hal, |env| finalize(env, &mut ctx, &DmaBuffer::ABSENT)).unwrap();

        let descs = hal.descriptors();
        assert_eq!(
            steps(&descs),
            [
                (FlowMode::SDinToHash, SetupOp::LoadState0),
                (FlowMode::SDinToHash, SetupOp::LoadKey0),
                (FlowMode::SHashToDout, SetupOp::WriteState1),
                (FlowMode::SHashToDout, SetupOp::WriteState0),
            ]
        );
        assert_eq!(descs[2].cipher_do_raw(), DO_PAD);
        assert_eq!(descs[2].dout_addr(), (CTX_ADDR + HashSramState::LENGTH) as u64);
        // MD5 leaves the engine in the other byte order.
        assert!(descs[3].is_bytes_swap());
        assert_eq!(descs[3].dout_size(), 16);
    }

    #[test]
    fn test_outer_pass_restarts_from_k0() {
        let hal = RecordingHal::new(0x800);
        let mut ctx = HashContext::hmac(HashMode::Sha256, &[0x0B; 20]);
        ctx.hmac_finalization = true;
        let inner = DmaBuffer::sram(CTX_ADDR + HashSramState::DIGEST, 32);
        with_env(&hal, |env| process(env, &mut ctx, &inner)).unwrap();

        let descs = hal.descriptors();
        assert_eq!(descs[0].din_addr(), (CTX_ADDR + HashSramState::K0) as u64);
        // The length counter restarts at one block.
        assert_eq!(descs[1].flow_mode(), u32::from(FlowMode::Bypass));
        assert!(descs[1].is_din_const());
        assert_eq!(descs[1].din_addr(), 0);
        assert_eq!(descs[1].dout_size(), HASH_LENGTH_SIZE as u32);
        assert_eq!(descs[2].flow_mode(), u32::from(FlowMode::Bypass));
        assert_eq!(descs[2].din_addr(), 64);
        assert_eq!(descs[2].dout_addr(), (CTX_ADDR + HashSramState::LENGTH) as u64);
        assert_eq!(descs[2].dout_size(), 4);
    }
}
