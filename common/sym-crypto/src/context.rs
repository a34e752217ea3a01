// Licensed under the Apache-2.0 license

//! Typed algorithm contexts.
//!
//! Every context starts with a `#[repr(C)]` SRAM image. For algorithms whose
//! descriptors address state in place, the adaptor copies that image into the
//! on-chip context cache before a call and back out after it, so the field
//! offsets below are also SRAM offsets relative to the cache address.

use core::mem::{offset_of, size_of};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
use zeroize::Zeroize;

use crate::descriptor::{CipherMode, Direction, HashHwMode};

/// Driver context size of the engine API (64 words).
pub const CTX_CACHE_SIZE: usize = 256;
/// HMAC pad results are staged directly after the cached context.
pub const HMAC_SCRATCH_SIZE: usize = 64;

pub const AES_BLOCK_SIZE: usize = 16;
pub const AES_KEY_SIZE_MAX: usize = 32;
pub const DES_BLOCK_SIZE: usize = 8;
pub const DES_ONE_KEY_SIZE: u32 = 8;
pub const DES_DOUBLE_KEY_SIZE: u32 = 16;
pub const DES_TRIPLE_KEY_SIZE: u32 = 24;
pub const DIGEST_SIZE_MAX: usize = 64;
pub const HMAC_BLOCK_SIZE_MAX: usize = 128;
pub const HASH_LENGTH_SIZE: usize = 16;
pub const CCM_NONCE_SIZE_MAX: u32 = 13;
pub const GCM_IV_96_BIT_SIZE: u32 = 12;

/// Algorithm identifier. The value indexes the dispatch table.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum AlgId {
    Aes = 0,
    Des = 1,
    Hash = 2,
    C2 = 3,
    Hmac = 4,
    Aead = 5,
    Bypass = 6,
    Sm3 = 7,
    Sm4 = 8,
}

pub const ALG_COUNT: usize = 9;

/// Key source. The value is what the descriptor hardware-key field carries.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum CryptoKeyType {
    #[default]
    User = 0,
    Root = 1,
    Kcp = 2,
    Session = 3,
    Kpicv = 4,
    Customer = 6,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Engine {
    #[default]
    Engine1,
    Engine2,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataBlockType {
    #[default]
    First,
    Middle,
    Last,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherAlg {
    Aes,
    Des,
    Sm4,
}

impl CipherAlg {
    pub fn alg_id(&self) -> AlgId {
        match self {
            CipherAlg::Aes => AlgId::Aes,
            CipherAlg::Des => AlgId::Des,
            CipherAlg::Sm4 => AlgId::Sm4,
        }
    }

    pub fn block_size(&self) -> u32 {
        match self {
            CipherAlg::Des => DES_BLOCK_SIZE as u32,
            _ => AES_BLOCK_SIZE as u32,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Zeroize)]
pub struct CipherSramState {
    pub block_state: [u8; AES_BLOCK_SIZE],
    pub key: [u8; AES_KEY_SIZE_MAX],
    pub xex_key: [u8; AES_KEY_SIZE_MAX],
}

impl CipherSramState {
    pub const BLOCK_STATE: u32 = offset_of!(CipherSramState, block_state) as u32;
    pub const KEY: u32 = offset_of!(CipherSramState, key) as u32;
    pub const XEX_KEY: u32 = offset_of!(CipherSramState, xex_key) as u32;
}

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CipherContext {
    pub sram: CipherSramState,
    pub alg: CipherAlg,
    pub mode: CipherMode,
    pub direction: Direction,
    pub crypto_key_type: CryptoKeyType,
    pub key_size: u32,
    /// XTS data-unit size in bytes.
    pub data_unit_size: u32,
    pub engine: Engine,
    pub is_tunnel: bool,
    pub tunnel_dir: Direction,
    pub data_block_type: DataBlockType,
    /// SM4-OFB runs as CBC encryption of a constant zero input; the caller
    /// XORs the keystream into its data.
    pub is_sm4_ofb: bool,
}

impl Drop for CipherContext {
    fn drop(&mut self) {
        self.sram.zeroize();
    }
}

impl CipherContext {
    pub fn new(alg: CipherAlg, mode: CipherMode, direction: Direction) -> Self {
        CipherContext {
            sram: CipherSramState::default(),
            alg,
            mode,
            direction,
            crypto_key_type: CryptoKeyType::User,
            key_size: 0,
            data_unit_size: 0,
            engine: Engine::Engine1,
            is_tunnel: false,
            tunnel_dir: Direction::Encrypt,
            data_block_type: DataBlockType::First,
            is_sm4_ofb: false,
        }
    }

    /// SM4 in OFB mode. The engine has no SM4-OFB, so the keystream is
    /// produced by CBC-encrypting zeros in both directions.
    pub fn sm4_ofb() -> Self {
        let mut ctx = CipherContext::new(CipherAlg::Sm4, CipherMode::Cbc, Direction::Encrypt);
        ctx.is_sm4_ofb = true;
        ctx
    }

    /// Loads a user key; the caller has already checked the size for the algorithm.
    pub fn with_key(mut self, key: &[u8]) -> Self {
        let len = key.len().min(AES_KEY_SIZE_MAX);
        self.sram.key[..len].copy_from_slice(&key[..len]);
        self.key_size = len as u32;
        self
    }

    pub fn with_iv(mut self, iv: &[u8]) -> Self {
        let len = iv.len().min(AES_BLOCK_SIZE);
        self.sram.block_state[..len].copy_from_slice(&iv[..len]);
        self
    }

    pub fn with_xex_key(mut self, key: &[u8], data_unit_size: u32) -> Self {
        let len = key.len().min(AES_KEY_SIZE_MAX);
        self.sram.xex_key[..len].copy_from_slice(&key[..len]);
        self.data_unit_size = data_unit_size;
        self
    }

    pub fn with_key_type(mut self, key_type: CryptoKeyType) -> Self {
        self.crypto_key_type = key_type;
        self
    }
}

/// Hash algorithm as selected by the API. The value indexes the size tables.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum HashMode {
    Sha1 = 0,
    Sha256 = 1,
    Sha224 = 2,
    Sha512 = 3,
    Sha384 = 4,
    Md5 = 5,
    Sm3 = 6,
}

const HASH_DIGEST_SIZE: [u32; 7] = [20, 32, 28, 64, 48, 16, 32];
const HASH_HW_DIGEST_SIZE: [u32; 7] = [20, 32, 32, 64, 64, 16, 32];
const HASH_HW_MODE: [HashHwMode; 7] = [
    HashHwMode::Sha1,
    HashHwMode::Sha256,
    HashHwMode::Sha256,
    HashHwMode::Sha512,
    HashHwMode::Sha512,
    HashHwMode::Md5,
    HashHwMode::Sm3,
];

// Initial digests in the engine's register order: last word first, 64-bit
// words stored low half first.
const LARVAL_MD5: [u32; 4] = [0x10325476, 0x98badcfe, 0xefcdab89, 0x67452301];
const LARVAL_SHA1: [u32; 5] = [0xc3d2e1f0, 0x10325476, 0x98badcfe, 0xefcdab89, 0x67452301];
const LARVAL_SHA224: [u32; 8] = [
    0xbefa4fa4, 0x64f98fa7, 0x68581511, 0xffc00b31, 0xf70e5939, 0x3070dd17, 0x367cd507, 0xc1059ed8,
];
const LARVAL_SHA256: [u32; 8] = [
    0x5be0cd19, 0x1f83d9ab, 0x9b05688c, 0x510e527f, 0xa54ff53a, 0x3c6ef372, 0xbb67ae85, 0x6a09e667,
];
const LARVAL_SHA384: [u32; 16] = [
    0xbefa4fa4, 0x47b5481d, 0x64f98fa7, 0xdb0c2e0d, 0x68581511, 0x8eb44a87, 0xffc00b31, 0x67332667,
    0xf70e5939, 0x152fecd8, 0x3070dd17, 0x9159015a, 0x367cd507, 0x629a292a, 0xc1059ed8, 0xcbbb9d5d,
];
const LARVAL_SHA512: [u32; 16] = [
    0x137e2179, 0x5be0cd19, 0xfb41bd6b, 0x1f83d9ab, 0x2b3e6c1f, 0x9b05688c, 0xade682d1, 0x510e527f,
    0x5f1d36f1, 0xa54ff53a, 0xfe94f82b, 0x3c6ef372, 0x84caa73b, 0xbb67ae85, 0xf3bcc908, 0x6a09e667,
];
const LARVAL_SM3: [u32; 8] = [
    0xb0fb0e4e, 0xe38dee4d, 0x163138aa, 0xa96f30bc, 0xda8a0600, 0x172442d7, 0x4914b2b9, 0x7380166f,
];

impl HashMode {
    fn index(&self) -> usize {
        u32::from(*self) as usize
    }

    pub fn digest_size(&self) -> u32 {
        HASH_DIGEST_SIZE[self.index()]
    }

    /// Size of the running state the engine keeps (SHA-224/384 run on the wider core).
    pub fn hw_digest_size(&self) -> u32 {
        HASH_HW_DIGEST_SIZE[self.index()]
    }

    pub fn hw_mode(&self) -> HashHwMode {
        HASH_HW_MODE[self.index()]
    }

    pub fn block_size(&self) -> u32 {
        match self {
            HashMode::Sha384 | HashMode::Sha512 => 128,
            _ => 64,
        }
    }

    /// Width of the processed-length counter in bytes.
    pub fn length_size(&self) -> u32 {
        match self {
            HashMode::Sm3 => 8,
            _ => HASH_LENGTH_SIZE as u32,
        }
    }

    pub fn larval_digest(&self) -> &'static [u32] {
        match self {
            HashMode::Sha1 => &LARVAL_SHA1,
            HashMode::Sha224 => &LARVAL_SHA224,
            HashMode::Sha256 => &LARVAL_SHA256,
            HashMode::Sha384 => &LARVAL_SHA384,
            HashMode::Sha512 => &LARVAL_SHA512,
            HashMode::Md5 => &LARVAL_MD5,
            HashMode::Sm3 => &LARVAL_SM3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlg {
    Hash,
    Hmac,
    Sm3,
}

impl HashAlg {
    pub fn alg_id(&self) -> AlgId {
        match self {
            HashAlg::Hash => AlgId::Hash,
            HashAlg::Hmac => AlgId::Hmac,
            HashAlg::Sm3 => AlgId::Sm3,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Zeroize)]
pub struct HashSramState {
    pub digest: [u8; DIGEST_SIZE_MAX],
    pub length: [u8; HASH_LENGTH_SIZE],
    /// HMAC key, padded to the block size; holds the outer-pad state after init.
    pub k0: [u8; HMAC_BLOCK_SIZE_MAX],
}

impl Default for HashSramState {
    fn default() -> Self {
        HashSramState {
            digest: [0; DIGEST_SIZE_MAX],
            length: [0; HASH_LENGTH_SIZE],
            k0: [0; HMAC_BLOCK_SIZE_MAX],
        }
    }
}

impl HashSramState {
    pub const DIGEST: u32 = offset_of!(HashSramState, digest) as u32;
    pub const LENGTH: u32 = offset_of!(HashSramState, length) as u32;
    pub const K0: u32 = offset_of!(HashSramState, k0) as u32;
}

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashContext {
    pub sram: HashSramState,
    pub alg: HashAlg,
    pub mode: HashMode,
    pub k0_size: u32,
    /// Set while the outer HMAC hash runs.
    pub hmac_finalization: bool,
}

impl HashContext {
    pub fn hash(mode: HashMode) -> Self {
        let alg = if mode == HashMode::Sm3 {
            HashAlg::Sm3
        } else {
            HashAlg::Hash
        };
        HashContext {
            sram: HashSramState::default(),
            alg,
            mode,
            k0_size: 0,
            hmac_finalization: false,
        }
    }

    /// `key` must already be reduced to at most one block.
    pub fn hmac(mode: HashMode, key: &[u8]) -> Self {
        let mut ctx = HashContext::hash(mode);
        ctx.alg = HashAlg::Hmac;
        let len = key.len().min(HMAC_BLOCK_SIZE_MAX);
        ctx.sram.k0[..len].copy_from_slice(&key[..len]);
        ctx.k0_size = len as u32;
        ctx
    }

    pub fn digest(&self) -> &[u8] {
        &self.sram.digest[..self.mode.digest_size() as usize]
    }
}

impl Drop for HashContext {
    fn drop(&mut self) {
        self.sram.zeroize();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AeadMode {
    Ccm,
    Gcm,
}

/// Sub-mode of the AEAD MAC engine for the next data descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AeadInternalMode {
    #[default]
    None,
    /// CCM associated data.
    CcmA,
    /// CCM text, encrypting.
    CcmPE,
    /// CCM text, decrypting.
    CcmPD,
    GcmInit,
    GcmStartTextGhash,
}

/// Where the next `process` call lands in the AEAD stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AeadFlowState {
    #[default]
    AdataInit,
    AdataProcess,
    TextDataInit,
    TextDataProcess,
    /// A non-96-bit GCM IV is hashed into J0 first.
    GcmIv,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Zeroize)]
pub struct AeadSramState {
    pub block_state: [u8; AES_BLOCK_SIZE],
    pub mac_state: [u8; AES_BLOCK_SIZE],
    /// GCM hash subkey H.
    pub hkey: [u8; AES_BLOCK_SIZE],
    /// CCM nonce, or the GCM IV that becomes J0.
    pub nonce: [u8; AES_BLOCK_SIZE],
    /// GCM len(A) || len(C) in bits, big-endian.
    pub gcm_len_block: [u8; AES_BLOCK_SIZE],
    pub key: [u8; AES_KEY_SIZE_MAX],
}

impl AeadSramState {
    pub const BLOCK_STATE: u32 = offset_of!(AeadSramState, block_state) as u32;
    pub const MAC_STATE: u32 = offset_of!(AeadSramState, mac_state) as u32;
    pub const HKEY: u32 = offset_of!(AeadSramState, hkey) as u32;
    pub const NONCE: u32 = offset_of!(AeadSramState, nonce) as u32;
    pub const GCM_LEN_BLOCK: u32 = offset_of!(AeadSramState, gcm_len_block) as u32;
    pub const KEY: u32 = offset_of!(AeadSramState, key) as u32;
}

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AeadContext {
    pub sram: AeadSramState,
    pub mode: AeadMode,
    pub direction: Direction,
    pub key_size: u32,
    pub nonce_size: u32,
    pub header_size: u32,
    pub text_size: u32,
    pub tag_size: u32,
    /// CCM length-field width, set while formatting B0.
    pub q: u32,
    /// Associated data bytes the caller has yet to feed.
    pub header_remaining: u32,
    pub internal_mode: AeadInternalMode,
    pub next_state: AeadFlowState,
}

impl AeadContext {
    fn new(mode: AeadMode, direction: Direction, key: &[u8]) -> Self {
        let mut sram = AeadSramState::default();
        let len = key.len().min(AES_KEY_SIZE_MAX);
        sram.key[..len].copy_from_slice(&key[..len]);
        AeadContext {
            sram,
            mode,
            direction,
            key_size: len as u32,
            nonce_size: 0,
            header_size: 0,
            text_size: 0,
            tag_size: 0,
            q: 0,
            header_remaining: 0,
            internal_mode: AeadInternalMode::None,
            next_state: AeadFlowState::AdataInit,
        }
    }

    pub fn ccm(
        direction: Direction,
        key: &[u8],
        nonce: &[u8],
        header_size: u32,
        text_size: u32,
        tag_size: u32,
    ) -> Self {
        let mut ctx = AeadContext::new(AeadMode::Ccm, direction, key);
        let len = nonce.len().min(AES_BLOCK_SIZE);
        ctx.sram.nonce[..len].copy_from_slice(&nonce[..len]);
        ctx.nonce_size = len as u32;
        ctx.header_size = header_size;
        ctx.text_size = text_size;
        ctx.tag_size = tag_size;
        ctx
    }

    /// A 96-bit IV is formatted straight into J0; any other length is hashed on the engine.
    pub fn gcm(
        direction: Direction,
        key: &[u8],
        iv: &[u8],
        header_size: u32,
        text_size: u32,
        tag_size: u32,
    ) -> Self {
        let mut ctx = AeadContext::new(AeadMode::Gcm, direction, key);
        ctx.nonce_size = iv.len() as u32;
        if ctx.nonce_size == GCM_IV_96_BIT_SIZE {
            ctx.sram.nonce[..12].copy_from_slice(iv);
            ctx.sram.nonce[12..].copy_from_slice(&1u32.to_be_bytes());
        } else {
            // The IV length block closes the GHASH pass that derives J0.
            let iv_bits = (ctx.nonce_size as u64) << 3;
            ctx.sram.nonce[8..].copy_from_slice(&iv_bits.to_be_bytes());
        }
        ctx.header_size = header_size;
        ctx.text_size = text_size;
        ctx.tag_size = tag_size;
        ctx.set_gcm_len_block();
        ctx
    }

    pub fn set_gcm_len_block(&mut self) {
        let header_bits = (self.header_size as u64) << 3;
        let text_bits = (self.text_size as u64) << 3;
        self.sram.gcm_len_block[..8].copy_from_slice(&header_bits.to_be_bytes());
        self.sram.gcm_len_block[8..].copy_from_slice(&text_bits.to_be_bytes());
    }

    /// Seeds the GCTR counter with inc32(J0) once J0 is known.
    pub fn start_gcm_counter(&mut self) {
        let mut counter = [0u8; 4];
        counter.copy_from_slice(&self.sram.nonce[12..]);
        let counter = u32::from_be_bytes(counter).wrapping_add(1);
        self.sram.block_state[..12].copy_from_slice(&self.sram.nonce[..12]);
        self.sram.block_state[12..].copy_from_slice(&counter.to_be_bytes());
    }

    pub fn tag(&self) -> &[u8] {
        let len = (self.tag_size as usize).min(AES_BLOCK_SIZE);
        &self.sram.mac_state[..len]
    }
}

impl Drop for AeadContext {
    fn drop(&mut self) {
        self.sram.zeroize();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BypassContext;

/// A caller-owned context for one Init/Process/Finalize sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymContext {
    Cipher(CipherContext),
    Hash(HashContext),
    Aead(AeadContext),
    Bypass(BypassContext),
}

impl SymContext {
    pub fn alg(&self) -> AlgId {
        match self {
            SymContext::Cipher(ctx) => ctx.alg.alg_id(),
            SymContext::Hash(ctx) => ctx.alg.alg_id(),
            SymContext::Aead(_) => AlgId::Aead,
            SymContext::Bypass(_) => AlgId::Bypass,
        }
    }

    /// Whether the SRAM image must be copied to the context cache around `init`.
    pub fn init_needs_cache(&self) -> bool {
        match self {
            SymContext::Cipher(ctx) => match ctx.alg {
                CipherAlg::Aes => ctx.mode == CipherMode::XcbcMac,
                CipherAlg::Des => true,
                CipherAlg::Sm4 => false,
            },
            SymContext::Hash(_) | SymContext::Aead(_) => true,
            SymContext::Bypass(_) => false,
        }
    }

    /// Bytes of the SRAM image the cache holds for this algorithm.
    pub fn cached_len(&self) -> usize {
        match self {
            SymContext::Cipher(_) => size_of::<CipherSramState>(),
            SymContext::Hash(ctx) => match ctx.alg {
                HashAlg::Hmac => size_of::<HashSramState>(),
                _ => HashSramState::K0 as usize,
            },
            SymContext::Aead(_) => size_of::<AeadSramState>(),
            SymContext::Bypass(_) => 0,
        }
    }

    /// The cacheable prefix of the SRAM image.
    pub fn cached_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.cached_len();
        match self {
            SymContext::Cipher(ctx) => &mut ctx.sram.as_mut_bytes()[..len],
            SymContext::Hash(ctx) => &mut ctx.sram.as_mut_bytes()[..len],
            SymContext::Aead(ctx) => &mut ctx.sram.as_mut_bytes()[..len],
            SymContext::Bypass(_) => &mut [],
        }
    }
}

const _: () = assert!(size_of::<CipherSramState>() == 80);
const _: () = assert!(size_of::<HashSramState>() == 208);
const _: () = assert!(size_of::<AeadSramState>() == 112);
const _: () = assert!(size_of::<CipherContext>() <= CTX_CACHE_SIZE);
const _: () = assert!(size_of::<HashContext>() <= CTX_CACHE_SIZE);
const _: () = assert!(size_of::<AeadContext>() <= CTX_CACHE_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sram_offsets() {
        assert_eq!(CipherSramState::KEY, 16);
        assert_eq!(CipherSramState::XEX_KEY, 48);
        assert_eq!(HashSramState::LENGTH, 64);
        assert_eq!(HashSramState::K0, 80);
        assert_eq!(AeadSramState::GCM_LEN_BLOCK, 64);
        assert_eq!(AeadSramState::KEY, 80);
    }

    #[test]
    fn test_hash_tables() {
        assert_eq!(HashMode::Sha224.digest_size(), 28);
        assert_eq!(HashMode::Sha224.hw_digest_size(), 32);
        assert_eq!(HashMode::Sha384.hw_mode(), HashHwMode::Sha512);
        assert_eq!(HashMode::Sha384.block_size(), 128);
        assert_eq!(HashMode::Sm3.length_size(), 8);
        for mode in [
            HashMode::Sha1,
            HashMode::Sha224,
            HashMode::Sha256,
            HashMode::Sha384,
            HashMode::Sha512,
            HashMode::Md5,
            HashMode::Sm3,
        ] {
            assert_eq!(mode.larval_digest().len() * 4, mode.hw_digest_size() as usize);
        }
    }

    #[test]
    fn test_cache_sizes() {
        let ctx = SymContext::Hash(HashContext::hash(HashMode::Sha256));
        assert_eq!(ctx.cached_len(), 80);
        let ctx = SymContext::Hash(HashContext::hmac(HashMode::Sha256, b"key"));
        assert_eq!(ctx.cached_len(), 208);
        assert_eq!(ctx.alg(), AlgId::Hmac);
        let ctx = SymContext::Hash(HashContext::hash(HashMode::Sm3));
        assert_eq!(ctx.alg(), AlgId::Sm3);
    }

    #[test]
    fn test_init_cache_selection() {
        let xcbc = CipherContext::new(CipherAlg::Aes, CipherMode::XcbcMac, Direction::Encrypt);
        assert!(SymContext::Cipher(xcbc).init_needs_cache());
        let cbc = CipherContext::new(CipherAlg::Aes, CipherMode::Cbc, Direction::Encrypt);
        assert!(!SymContext::Cipher(cbc).init_needs_cache());
        let des = CipherContext::new(CipherAlg::Des, CipherMode::Cbc, Direction::Decrypt);
        assert!(SymContext::Cipher(des).init_needs_cache());
    }

    #[test]
    fn test_gcm_96_bit_iv_and_lengths() {
        let ctx = AeadContext::gcm(Direction::Encrypt, &[0u8; 16], &[0xaa; 12], 20, 48, 16);
        assert_eq!(&ctx.sram.nonce[..12], &[0xaa; 12]);
        assert_eq!(&ctx.sram.nonce[12..], &[0, 0, 0, 1]);
        assert_eq!(&ctx.sram.gcm_len_block[..8], &160u64.to_be_bytes());
        assert_eq!(&ctx.sram.gcm_len_block[8..], &384u64.to_be_bytes());
    }

    #[test]
    fn test_gcm_long_iv_and_counter() {
        let mut ctx = AeadContext::gcm(Direction::Decrypt, &[0u8; 16], &[0x55; 60], 0, 32, 16);
        assert_eq!(&ctx.sram.nonce[..8], &[0u8; 8]);
        assert_eq!(&ctx.sram.nonce[8..], &480u64.to_be_bytes());

        ctx.sram.nonce[12..].copy_from_slice(&u32::MAX.to_be_bytes());
        ctx.start_gcm_counter();
        assert_eq!(&ctx.sram.block_state[12..], &[0, 0, 0, 0]);
    }
}
