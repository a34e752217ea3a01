// Licensed under the Apache-2.0 license

//! AES, DES and SM4 block cipher and MAC modes.

use log::{debug, warn};
use sym_crypto_common::context::{
    CipherAlg, CipherContext, CipherSramState, CryptoKeyType, DataBlockType, Engine,
    AES_BLOCK_SIZE, AES_KEY_SIZE_MAX, DES_DOUBLE_KEY_SIZE, DES_ONE_KEY_SIZE, DES_TRIPLE_KEY_SIZE,
};
use sym_crypto_common::descriptor::{CipherMode, Direction, DmaMode, FlowMode, SetupOp};
use sym_crypto_common::{DriverResult, HwDesc, SymError, SymResult};
use zeroize::Zeroize;

use super::{din, dout, DriverEnv};
use crate::dma_buffer::DmaBuffer;
use crate::hil::{CcHal, KeyStatus};
use crate::mlli::MlliDirection;

const AES_128_BIT_KEY_SIZE: u32 = 16;
const AES_256_BIT_KEY_SIZE: u32 = 32;
const XCBC_MAC_NUM_KEYS: u32 = 3;
const XCBC_KEY_CONST: u32 = 0x0101_0101;

// XCBC-MAC derived keys overlay the upper key half and the XEX key.
const XCBC_K1: u32 = CipherSramState::KEY + AES_128_BIT_KEY_SIZE;
const XCBC_K2: u32 = XCBC_K1 + AES_128_BIT_KEY_SIZE;
const XCBC_K3: u32 = XCBC_K2 + AES_128_BIT_KEY_SIZE;

fn config_dir(ctx: &CipherContext) -> Direction {
    if ctx.is_tunnel {
        ctx.tunnel_dir
    } else {
        ctx.direction
    }
}

fn aes_setup_flow(ctx: &CipherContext) -> FlowMode {
    match ctx.engine {
        Engine::Engine1 => FlowMode::SDinToAes,
        Engine::Engine2 => FlowMode::SDinToAes2,
    }
}

/// Maps the platform's view of a hardware key to a result code.
fn validate_key<H: CcHal>(hal: &H, key_type: CryptoKeyType) -> SymResult<()> {
    if matches!(key_type, CryptoKeyType::User | CryptoKeyType::Customer) {
        return Ok(());
    }
    match hal.key_status(key_type) {
        KeyStatus::Valid => Ok(()),
        KeyStatus::SecureDisabled => Err(SymError::SecureDisabled),
        KeyStatus::FatalErrorLatched => Err(SymError::FatalErrorLocked),
        KeyStatus::Invalid => Err(match key_type {
            CryptoKeyType::Root => SymError::KdrInvalid,
            CryptoKeyType::Session => SymError::SessionKey,
            CryptoKeyType::Kcp => SymError::KcpInvalid,
            CryptoKeyType::Kpicv => SymError::KpicvInvalid,
            CryptoKeyType::User | CryptoKeyType::Customer => SymError::InvalidKeyType,
        }),
    }
}

/// Loads the IV or counter for `mode`. ECB has no state.
fn load_state<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &CipherContext, mode: CipherMode) {
    if mode == CipherMode::Ecb {
        return;
    }
    let setup = match mode {
        CipherMode::Ctr | CipherMode::Xts | CipherMode::Ofb => SetupOp::LoadState1,
        _ => SetupOp::LoadState0,
    };
    let desc = HwDesc::new().setup(setup).cipher_mode(mode);
    let desc = match ctx.alg {
        CipherAlg::Aes => desc
            .cipher_config0(config_dir(ctx).into())
            .key_size_aes(ctx.key_size)
            .cipher_config1(ctx.is_tunnel as u32)
            .flow(aes_setup_flow(ctx)),
        CipherAlg::Sm4 => desc
            .flow(FlowMode::SDinToSm4)
            .cipher_config0(ctx.direction.into())
            .key_size_aes(ctx.key_size),
        CipherAlg::Des => desc
            .flow(FlowMode::SDinToDes)
            .cipher_config0(ctx.direction.into())
            .key_size_des(ctx.key_size),
    };
    env.push(desc.din_sram(
        env.field(CipherSramState::BLOCK_STATE),
        ctx.alg.block_size(),
    ));
}

fn store_state<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &CipherContext) {
    if ctx.mode == CipherMode::Ecb {
        return;
    }
    let setup = match ctx.mode {
        CipherMode::Ctr | CipherMode::Ofb | CipherMode::Xts => SetupOp::WriteState1,
        _ => SetupOp::WriteState0,
    };
    let desc = HwDesc::new().cipher_mode(ctx.mode).setup(setup);
    let desc = match ctx.alg {
        CipherAlg::Aes => desc
            .cipher_config0(config_dir(ctx).into())
            .cipher_config1(ctx.is_tunnel as u32)
            .flow(match ctx.engine {
                Engine::Engine1 => FlowMode::SAesToDout,
                Engine::Engine2 => FlowMode::SAes2ToDout,
            }),
        CipherAlg::Sm4 => desc
            .cipher_config0(ctx.direction.into())
            .flow(FlowMode::SSm4ToDout),
        CipherAlg::Des => desc
            .cipher_config0(ctx.direction.into())
            .flow(FlowMode::SDesToDout),
    };
    env.push(desc.dout_sram(
        env.field(CipherSramState::BLOCK_STATE),
        ctx.alg.block_size(),
    ));
}

fn load_key<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &CipherContext, mode: CipherMode) {
    let key_addr = env.field(CipherSramState::KEY);
    // A 192-bit key is loaded as 256 bits.
    if ctx.key_size == 24 {
        env.queue
            .clear_sram(key_addr + 24, AES_KEY_SIZE_MAX as u32 - 24);
    }

    let desc = HwDesc::new().cipher_mode(mode);
    let desc = match ctx.alg {
        CipherAlg::Aes => {
            let desc = desc
                .cipher_config0(config_dir(ctx).into())
                .cipher_config1(ctx.is_tunnel as u32)
                .hw_crypto_key(ctx.crypto_key_type.into())
                .key_size_aes(ctx.key_size);
            let desc = if mode == CipherMode::XcbcMac {
                desc.din_sram(env.field(XCBC_K1), AES_128_BIT_KEY_SIZE)
                    .key_size_aes(AES_128_BIT_KEY_SIZE)
            } else if ctx.crypto_key_type == CryptoKeyType::User {
                desc.din_sram(key_addr, ctx.key_size)
            } else {
                desc
            };
            desc.flow(aes_setup_flow(ctx))
        }
        CipherAlg::Sm4 => desc
            .din_sram(key_addr, ctx.key_size)
            .flow(FlowMode::SDinToSm4)
            .key_size_aes(ctx.key_size)
            .cipher_config0(ctx.direction.into()),
        CipherAlg::Des => desc
            .din_sram(key_addr, ctx.key_size)
            .flow(FlowMode::SDinToDes)
            .key_size_des(ctx.key_size)
            .cipher_config0(ctx.direction.into()),
    };
    let desc = desc.setup(SetupOp::LoadKey0);
    env.push(desc);

    if mode == CipherMode::Xts {
        env.push(
            HwDesc::new()
                .cipher_mode(mode)
                .cipher_config0(config_dir(ctx).into())
                .din_sram(env.field(CipherSramState::XEX_KEY), ctx.key_size)
                .xex_data_unit_size(ctx.data_unit_size)
                .cipher_config1(ctx.is_tunnel as u32)
                .flow(aes_setup_flow(ctx))
                .key_size_aes(ctx.key_size)
                .setup(SetupOp::LoadXexKey),
        );
    }

    if mode == CipherMode::XcbcMac {
        let desc = desc
            .din_sram(env.field(XCBC_K2), AES_128_BIT_KEY_SIZE)
            .setup(SetupOp::LoadState1);
        env.push(desc);
        env.push(
            desc.din_sram(env.field(XCBC_K3), AES_128_BIT_KEY_SIZE)
                .setup(SetupOp::LoadState2),
        );
    }
}

/// Undoes the last MAC block so a zero-length finalize can redo it as the final block.
fn revert_last_mac_block<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &CipherContext) -> SymResult<()> {
    if !matches!(ctx.mode, CipherMode::XcbcMac | CipherMode::Cmac) {
        warn!("MAC revert requested for {:?}", ctx.mode);
        Err(SymError::UnsupportedAlgMode)?;
    }
    if ctx.crypto_key_type == CryptoKeyType::Root {
        warn!("Root key cannot be used for XCBC-MAC or CMAC revert");
        Err(SymError::UnsupportedAlgMode)?;
    }
    if ctx.mode == CipherMode::XcbcMac && ctx.key_size != AES_128_BIT_KEY_SIZE {
        warn!("Bad XCBC-MAC key size {}", ctx.key_size);
        Err(SymError::InvalidKeySize)?;
    }

    let block_state = env.field(CipherSramState::BLOCK_STATE);
    let desc = HwDesc::new()
        .cipher_mode(CipherMode::Ecb)
        .cipher_config0(Direction::Decrypt.into())
        .hw_crypto_key(ctx.crypto_key_type.into());
    let desc = if ctx.mode == CipherMode::XcbcMac {
        desc.din_sram(env.field(XCBC_K1), AES_128_BIT_KEY_SIZE)
            .key_size_aes(AES_128_BIT_KEY_SIZE)
    } else if ctx.crypto_key_type == CryptoKeyType::User {
        desc.key_size_aes(ctx.key_size)
            .din_sram(env.field(CipherSramState::KEY), ctx.key_size)
    } else {
        desc.key_size_aes(ctx.key_size)
    };
    env.push(desc.flow(FlowMode::SDinToAes).setup(SetupOp::LoadKey0));
    env.push(
        HwDesc::new()
            .din_sram(block_state, AES_BLOCK_SIZE as u32)
            .dout_sram(block_state, AES_BLOCK_SIZE as u32)
            .flow(FlowMode::DinAesDout),
    );
    Ok(())
}

/// Derives K1, K2 and K3 by encrypting the XCBC constants under the user key.
fn calc_xcbc_keys<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &mut CipherContext) {
    let setup = HwDesc::new()
        .cipher_mode(CipherMode::Ecb)
        .cipher_config0(Direction::Encrypt.into())
        .key_size_aes(AES_128_BIT_KEY_SIZE)
        .flow(FlowMode::SDinToAes)
        .setup(SetupOp::LoadKey0)
        .hw_crypto_key(ctx.crypto_key_type.into());
    let setup = if ctx.crypto_key_type == CryptoKeyType::User {
        setup.din_sram(env.field(CipherSramState::KEY), AES_128_BIT_KEY_SIZE)
    } else {
        setup
    };
    env.push(setup);

    let data = HwDesc::new().flow(FlowMode::DinAesDout);
    for i in 0..XCBC_MAC_NUM_KEYS {
        env.push(
            data.din_const(XCBC_KEY_CONST * (i + 1), AES_128_BIT_KEY_SIZE)
                .dout_sram(
                    env.field(XCBC_K1 + i * AES_128_BIT_KEY_SIZE),
                    AES_128_BIT_KEY_SIZE,
                ),
        );
    }
    // The derived keys are plain SRAM keys from here on.
    ctx.crypto_key_type = CryptoKeyType::User;
}

pub fn init<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &mut CipherContext) -> DriverResult<()> {
    validate_key(env.queue.hal(), ctx.crypto_key_type)?;
    let block_state = env.field(CipherSramState::BLOCK_STATE);

    if ctx.alg == CipherAlg::Des {
        // Two-key 3DES runs as K1, K2, K1.
        if ctx.key_size == DES_DOUBLE_KEY_SIZE {
            let key_addr = env.field(CipherSramState::KEY);
            let mut k1 = [0u8; DES_ONE_KEY_SIZE as usize];
            env.queue.read_sram(key_addr, &mut k1);
            env.queue.write_sram(key_addr + DES_DOUBLE_KEY_SIZE, &k1);
            k1.zeroize();
            ctx.key_size = DES_TRIPLE_KEY_SIZE;
        }
        return Ok(());
    }

    match ctx.mode {
        CipherMode::Cmac => {
            env.queue.clear_sram(block_state, AES_BLOCK_SIZE as u32);
            ctx.sram.block_state.zeroize();
            if ctx.crypto_key_type == CryptoKeyType::Root {
                ctx.key_size = AES_256_BIT_KEY_SIZE;
            }
        }
        CipherMode::XcbcMac => {
            if ctx.key_size != AES_128_BIT_KEY_SIZE {
                warn!("XCBC-MAC needs a 128-bit key, got {} bytes", ctx.key_size);
                Err(SymError::InvalidArg)?;
            }
            env.queue.clear_sram(block_state, AES_BLOCK_SIZE as u32);
            calc_xcbc_keys(env, ctx);
        }
        _ => {}
    }

    ctx.engine = Engine::Engine1;
    ctx.is_tunnel = false;
    ctx.data_block_type = DataBlockType::First;
    Ok(())
}

pub fn process<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut CipherContext,
    input: &DmaBuffer,
    output: &DmaBuffer,
) -> DriverResult<()> {
    let in_place = input.target == output.target || ctx.mode.is_mac();

    // CBC-CTS runs as plain CBC until the final two blocks.
    let mode = if ctx.mode == CipherMode::CbcCts && ctx.data_block_type != DataBlockType::Last {
        CipherMode::Cbc
    } else {
        ctx.mode
    };
    load_key(env, ctx, mode);
    load_state(env, ctx, mode);

    let in_mode = input.dma_mode();
    let out_mode = output.dma_mode();
    if !in_place && ((in_mode == DmaMode::NoDma) != (out_mode == DmaMode::NoDma)) {
        warn!("Inconsistent DMA modes {:?} -> {:?}", in_mode, out_mode);
        Err(SymError::InvalidArg)?;
    }

    let data_in = env.resolve(input, MlliDirection::Input)?;
    let data_out = if in_place {
        data_in
    } else {
        env.resolve(output, MlliDirection::Output)?
    };

    let desc = if ctx.is_sm4_ofb {
        HwDesc::new().din_const(0, data_in.size)
    } else {
        din(HwDesc::new(), &data_in)
    };
    let desc = if matches!(ctx.mode, CipherMode::Cmac | CipherMode::XcbcMac) {
        desc.din_not_last()
    } else {
        desc
    };
    let desc = if ctx.mode.is_mac() {
        desc
    } else {
        dout(desc, &data_out)
    };
    let flow = match ctx.alg {
        CipherAlg::Aes => FlowMode::DinAesDout,
        CipherAlg::Sm4 => FlowMode::DinSm4Dout,
        CipherAlg::Des => FlowMode::DinDesDout,
    };
    env.push(desc.flow(flow));
    debug!("{:?}/{:?} data descriptor, {} units", ctx.alg, ctx.mode, data_in.size);

    ctx.data_block_type = DataBlockType::Middle;
    store_state(env, ctx);
    Ok(())
}

pub fn finalize<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut CipherContext,
    input: &DmaBuffer,
    output: &DmaBuffer,
) -> DriverResult<()> {
    let remaining = input.dma_mode() != DmaMode::NoDma && input.size() > 0;

    match ctx.mode {
        CipherMode::Cmac | CipherMode::XcbcMac => {
            let desc = if remaining {
                let data_in = env.resolve(input, MlliDirection::Input)?;
                din(HwDesc::new(), &data_in).flow(FlowMode::DinAesDout)
            } else if ctx.data_block_type == DataBlockType::First {
                // MAC of the empty message.
                HwDesc::new()
                    .cipher_mode(ctx.mode)
                    .key_size_aes(ctx.key_size)
                    .cmac_size0()
                    .flow(FlowMode::SDinToAes)
            } else {
                revert_last_mac_block(env, ctx)?;
                HwDesc::new()
                    .din_const(0, AES_BLOCK_SIZE as u32)
                    .flow(FlowMode::DinAesDout)
            };
            load_key(env, ctx, ctx.mode);
            load_state(env, ctx, ctx.mode);
            env.push(desc);
            store_state(env, ctx);
            Ok(())
        }
        _ => {
            if ctx.mode == CipherMode::CbcCts {
                if input.size() == AES_BLOCK_SIZE as u32
                    && ctx.data_block_type == DataBlockType::Middle
                {
                    warn!("CBC-CTS final block of one AES block after earlier data");
                    Err(SymError::InvalidArg)?;
                }
                ctx.data_block_type = DataBlockType::Last;
            }

            if remaining {
                process(env, ctx, input, output)
            } else if ctx.mode == CipherMode::CbcMac && ctx.data_block_type == DataBlockType::First
            {
                // The MAC of no data is the encrypted IV.
                load_key(env, ctx, ctx.mode);
                load_state(env, ctx, ctx.mode);
                env.push(
                    HwDesc::new()
                        .din_const(0, AES_BLOCK_SIZE as u32)
                        .flow(FlowMode::DinAesDout),
                );
                store_state(env, ctx);
                Ok(())
            } else {
                Ok(())
            }
        }
    }
}
