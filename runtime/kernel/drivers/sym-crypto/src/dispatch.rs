// Licensed under the Apache-2.0 license

//! Algorithm-ID to driver-family dispatch.

use log::{debug, warn};
use sym_crypto_common::context::{AlgId, SymContext, ALG_COUNT};
use sym_crypto_common::{DriverResult, SymError, SymResult};

use crate::dma_buffer::DmaBuffer;
use crate::driver::{aead, bypass, cipher, hash, hmac, DriverEnv};
use crate::hil::CcHal;

/// Implementation behind an algorithm ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    Cipher,
    Hash,
    Hmac,
    Aead,
    /// Process only.
    Bypass,
}

/// Indexed by [`AlgId`]. `None` marks an algorithm this build does not carry.
const DISPATCH_TABLE: [Option<Family>; ALG_COUNT] = [
    Some(Family::Cipher), // Aes
    Some(Family::Cipher), // Des
    Some(Family::Hash),   // Hash
    None,                 // C2
    Some(Family::Hmac),   // Hmac
    Some(Family::Aead),   // Aead
    Some(Family::Bypass), // Bypass
    Some(Family::Hash),   // Sm3
    Some(Family::Cipher), // Sm4
];

pub fn lookup(alg: AlgId) -> SymResult<Family> {
    DISPATCH_TABLE
        .get(u32::from(alg) as usize)
        .copied()
        .flatten()
        .ok_or_else(|| {
            warn!("Unsupported algorithm {:?}", alg);
            SymError::UnsupportedAlg
        })
}

pub fn init<H: CcHal>(env: &DriverEnv<'_, H>, ctx: &mut SymContext) -> DriverResult<()> {
    let family = lookup(ctx.alg())?;
    debug!("Init {:?} at SRAM 0x{:x}", family, env.ctx_addr);
    match (family, ctx) {
        (Family::Cipher, SymContext::Cipher(ctx)) => cipher::init(env, ctx),
        (Family::Hash, SymContext::Hash(ctx)) => hash::init(env, ctx),
        (Family::Hmac, SymContext::Hash(ctx)) => hmac::init(env, ctx),
        (Family::Aead, SymContext::Aead(ctx)) => aead::init(env, ctx),
        (Family::Bypass, SymContext::Bypass(_)) => Err(SymError::UnsupportedAlg.into()),
        _ => Err(SymError::InvalidCtx.into()),
    }
}

pub fn process<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut SymContext,
    input: &DmaBuffer,
    output: &DmaBuffer,
) -> DriverResult<()> {
    let family = lookup(ctx.alg())?;
    debug!(
        "Process {:?}: in {:?}, out {:?}",
        family, input.target, output.target
    );
    match (family, ctx) {
        (Family::Cipher, SymContext::Cipher(ctx)) => cipher::process(env, ctx, input, output),
        (Family::Hash, SymContext::Hash(ctx)) => hash::process(env, ctx, input),
        (Family::Hmac, SymContext::Hash(ctx)) => hmac::process(env, ctx, input),
        (Family::Aead, SymContext::Aead(ctx)) => aead::process(env, ctx, input, output),
        (Family::Bypass, SymContext::Bypass(_)) => bypass::process(env, input, output),
        _ => Err(SymError::InvalidCtx.into()),
    }
}

pub fn finalize<H: CcHal>(
    env: &DriverEnv<'_, H>,
    ctx: &mut SymContext,
    input: &DmaBuffer,
    output: &DmaBuffer,
) -> DriverResult<()> {
    let family = lookup(ctx.alg())?;
    debug!(
        "Finalize {:?}: in {:?}, out {:?}",
        family, input.target, output.target
    );
    match (family, ctx) {
        (Family::Cipher, SymContext::Cipher(ctx)) => cipher::finalize(env, ctx, input, output),
        (Family::Hash, SymContext::Hash(ctx)) => hash::finalize(env, ctx, input),
        (Family::Hmac, SymContext::Hash(ctx)) => hmac::finalize(env, ctx, input),
        (Family::Aead, SymContext::Aead(ctx)) => aead::finalize(env, ctx, input, output),
        (Family::Bypass, SymContext::Bypass(_)) => Err(SymError::UnsupportedAlg.into()),
        _ => Err(SymError::InvalidCtx.into()),
    }
}
