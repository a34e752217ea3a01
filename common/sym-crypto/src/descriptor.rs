// Licensed under the Apache-2.0 license

//! Hardware descriptor record.
//!
//! A descriptor is six 32-bit words pushed into the engine queue. The field
//! layout below is a hardware contract and must not change.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use tock_registers::fields::{Field, FieldValue};
use tock_registers::{register_bitfields, LocalRegisterCopy, RegisterLongName};

pub const HW_DESC_SIZE_WORDS: usize = 6;

register_bitfields! {
    u32,
    pub Word1 [
        DinDmaMode OFFSET(0) NUMBITS(2) [],
        DinSize OFFSET(2) NUMBITS(24) [],
        Ns OFFSET(26) NUMBITS(1) [],
        DinConst OFFSET(27) NUMBITS(1) [],
        NotLast OFFSET(28) NUMBITS(1) [],
        LockQueue OFFSET(29) NUMBITS(1) [],
    ],
    pub Word3 [
        DoutDmaMode OFFSET(0) NUMBITS(2) [],
        DoutSize OFFSET(2) NUMBITS(24) [],
        Ns OFFSET(26) NUMBITS(1) [],
        LastInd OFFSET(27) NUMBITS(1) [],
        HashXorBit OFFSET(29) NUMBITS(1) [],
        QueueLast OFFSET(31) NUMBITS(1) [],
    ],
    pub Word4 [
        DataFlowMode OFFSET(0) NUMBITS(6) [],
        AesSelNotHash OFFSET(6) NUMBITS(1) [],
        AesXorCryptoKey OFFSET(7) NUMBITS(1) [],
        AckNeeded OFFSET(8) NUMBITS(2) [],
        CipherMode OFFSET(10) NUMBITS(4) [],
        CmacSize0 OFFSET(14) NUMBITS(1) [],
        CipherDo OFFSET(15) NUMBITS(2) [],
        CipherConf0 OFFSET(17) NUMBITS(2) [],
        CipherConf1 OFFSET(19) NUMBITS(1) [],
        CipherConf2 OFFSET(20) NUMBITS(2) [],
        KeySize OFFSET(22) NUMBITS(2) [],
        SetupOperation OFFSET(24) NUMBITS(4) [],
        DinSramEndianness OFFSET(28) NUMBITS(1) [],
        DoutSramEndianness OFFSET(29) NUMBITS(1) [],
        WordSwap OFFSET(30) NUMBITS(1) [],
        BytesSwap OFFSET(31) NUMBITS(1) [],
    ],
    pub Word5 [
        DinAddrHigh OFFSET(0) NUMBITS(16) [],
        DoutAddrHigh OFFSET(16) NUMBITS(16) [],
    ],
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum DmaMode {
    NoDma = 0,
    Sram = 1,
    Dlli = 2,
    Mlli = 3,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum FlowMode {
    Bypass = 0,
    DinAesDout = 1,
    AesToHash = 2,
    AesAndHash = 3,
    DinDesDout = 4,
    DesToHash = 5,
    DesAndHash = 6,
    DinHash = 7,
    DinHashAndBypass = 8,
    AesMacAndBypass = 9,
    AesToHashAndDout = 10,
    DinSm4Dout = 16,
    DinAesAesMac = 17,
    HashToDout = 18,
    // setup flows
    SDinToAes = 32,
    SDinToAes2 = 33,
    SDinToDes = 34,
    SDinToSm4 = 36,
    SDinToHash = 37,
    SAesToDout = 38,
    SAes2ToDout = 39,
    SSm4ToDout = 40,
    SDesToDout = 42,
    SHashToDout = 43,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum SetupOp {
    None = 0,
    LoadState0 = 1,
    LoadState1 = 2,
    LoadState2 = 3,
    LoadKey0 = 4,
    LoadXexKey = 5,
    WriteState0 = 8,
    WriteState1 = 9,
    WriteState2 = 10,
    WriteState3 = 11,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum CipherMode {
    Ecb = 0,
    Cbc = 1,
    Ctr = 2,
    CbcMac = 3,
    Xts = 4,
    XcbcMac = 5,
    Ofb = 6,
    Cmac = 7,
    Ccm = 8,
    CbcCts = 11,
    Gctr = 12,
}

impl CipherMode {
    pub fn is_mac(&self) -> bool {
        matches!(self, CipherMode::CbcMac | CipherMode::XcbcMac | CipherMode::Cmac)
    }
}

/// Hash engine sub-mode, carried in the cipher-mode field.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum HashHwMode {
    Md5 = 0,
    Sha1 = 1,
    Sha256 = 2,
    Sha512 = 4,
    Ghash = 6,
    Sha224 = 10,
    Sha384 = 12,
    Sm3 = 14,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Direction {
    #[default]
    Encrypt = 0,
    Decrypt = 1,
}

// Hash config1 values.
pub const HASH_PADDING_DISABLED: u32 = 0;
pub const HASH_PADDING_ENABLED: u32 = 1;
// Hash config0 value selecting a little-endian digest.
pub const HASH_DIGEST_RESULT_LITTLE_ENDIAN: u32 = 2;
// Hash cipher-do values.
pub const DO_NOT_PAD: u32 = 0;
pub const DO_PAD: u32 = 1;

/// One engine command. Built by value, then pushed.
///
/// ```
/// use sym_crypto_common::descriptor::{FlowMode, HwDesc};
/// let desc = HwDesc::new().din_const(0, 4).flow(FlowMode::Bypass);
/// assert_eq!(desc.din_size(), 4);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct HwDesc {
    words: [u32; HW_DESC_SIZE_WORDS],
}

impl core::fmt::Debug for HwDesc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "HwDesc[")?;
        for (i, word) in self.words.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{:08x}", word)?;
        }
        write!(f, "]")
    }
}

impl HwDesc {
    pub const fn new() -> Self {
        HwDesc {
            words: [0; HW_DESC_SIZE_WORDS],
        }
    }

    pub const fn from_words(words: [u32; HW_DESC_SIZE_WORDS]) -> Self {
        HwDesc { words }
    }

    pub fn words(&self) -> [u32; HW_DESC_SIZE_WORDS] {
        self.words
    }

    fn set<R: RegisterLongName>(mut self, idx: usize, field: FieldValue<u32, R>) -> Self {
        let mut word = LocalRegisterCopy::<u32, R>::new(self.words[idx]);
        word.modify(field);
        self.words[idx] = word.get();
        self
    }

    fn get<R: RegisterLongName>(&self, idx: usize, field: Field<u32, R>) -> u32 {
        LocalRegisterCopy::<u32, R>::new(self.words[idx]).read(field)
    }

    pub fn din_type(mut self, mode: DmaMode, addr: u64, size: u32, ns: bool) -> Self {
        self.words[0] = addr as u32;
        self.set(
            1,
            Word1::DinDmaMode.val(mode.into()) + Word1::DinSize.val(size) + Word1::Ns.val(ns as u32),
        )
        .set(5, Word5::DinAddrHigh.val((addr >> 32) as u32 & 0xFFFF))
    }

    pub fn din_no_dma(mut self, addr: u32, size: u32) -> Self {
        self.words[0] = addr;
        self.set(
            1,
            Word1::DinDmaMode.val(DmaMode::NoDma.into()) + Word1::DinSize.val(size),
        )
    }

    pub fn din_sram(mut self, addr: u32, size: u32) -> Self {
        self.words[0] = addr;
        self.set(
            1,
            Word1::DinDmaMode.val(DmaMode::Sram.into()) + Word1::DinSize.val(size),
        )
    }

    /// Feeds `size` bytes of the repeated word `val` instead of reading memory.
    pub fn din_const(mut self, val: u32, size: u32) -> Self {
        self.words[0] = val;
        self.set(
            1,
            Word1::DinConst::SET
                + Word1::DinDmaMode.val(DmaMode::Sram.into())
                + Word1::DinSize.val(size),
        )
    }

    pub fn din_not_last(self) -> Self {
        self.set(1, Word1::NotLast::SET)
    }

    pub fn dout_type(mut self, mode: DmaMode, addr: u64, size: u32, ns: bool) -> Self {
        self.words[2] = addr as u32;
        self.set(
            3,
            Word3::DoutDmaMode.val(mode.into())
                + Word3::DoutSize.val(size)
                + Word3::Ns.val(ns as u32),
        )
        .set(5, Word5::DoutAddrHigh.val((addr >> 32) as u32 & 0xFFFF))
    }

    pub fn dout_dlli(self, addr: u64, size: u32, ns: bool, last: bool) -> Self {
        let desc = self.dout_type(DmaMode::Dlli, addr, size, ns);
        if last {
            desc.last_ind()
        } else {
            desc
        }
    }

    pub fn dout_sram(mut self, addr: u32, size: u32) -> Self {
        self.words[2] = addr;
        self.set(
            3,
            Word3::DoutDmaMode.val(DmaMode::Sram.into()) + Word3::DoutSize.val(size),
        )
    }

    /// Word 2 doubles as the XOR operand when no output address is used.
    pub fn xor_val(mut self, val: u32) -> Self {
        self.words[2] = val;
        self
    }

    pub fn xor_active(self) -> Self {
        self.set(3, Word3::HashXorBit::SET)
    }

    /// Word 2 doubles as the XTS data-unit size.
    pub fn xex_data_unit_size(mut self, size: u32) -> Self {
        self.words[2] = size;
        self
    }

    pub fn queue_last(self) -> Self {
        self.set(3, Word3::QueueLast::SET + Word3::LastInd::SET)
    }

    pub fn last_ind(self) -> Self {
        self.set(3, Word3::LastInd::SET)
    }

    pub fn flow(self, mode: FlowMode) -> Self {
        self.set(4, Word4::DataFlowMode.val(mode.into()))
    }

    pub fn aes_not_hash(self) -> Self {
        self.set(4, Word4::AesSelNotHash::SET)
    }

    pub fn cipher_mode(self, mode: CipherMode) -> Self {
        self.set(4, Word4::CipherMode.val(mode.into()))
    }

    pub fn hash_mode(self, mode: HashHwMode) -> Self {
        self.set(4, Word4::CipherMode.val(mode.into()))
    }

    pub fn cipher_config0(self, val: u32) -> Self {
        self.set(4, Word4::CipherConf0.val(val))
    }

    pub fn cipher_config1(self, val: u32) -> Self {
        self.set(4, Word4::CipherConf1.val(val))
    }

    pub fn cipher_do(self, val: u32) -> Self {
        self.set(4, Word4::CipherDo.val(val))
    }

    /// Hardware key selector: the low two bits go to cipher-do, the rest to config2.
    pub fn hw_crypto_key(self, key: u32) -> Self {
        self.set(
            4,
            Word4::CipherDo.val(key & 0x3) + Word4::CipherConf2.val((key >> 2) & 0x3),
        )
    }

    pub fn key_size_aes(self, key_bytes: u32) -> Self {
        self.set(4, Word4::KeySize.val((key_bytes >> 3).saturating_sub(2)))
    }

    pub fn key_size_des(self, key_bytes: u32) -> Self {
        self.set(4, Word4::KeySize.val((key_bytes >> 3).saturating_sub(1)))
    }

    pub fn setup(self, op: SetupOp) -> Self {
        self.set(4, Word4::SetupOperation.val(op.into()))
    }

    pub fn cmac_size0(self) -> Self {
        self.set(4, Word4::CmacSize0::SET)
    }

    pub fn bytes_swap(self, swap: bool) -> Self {
        self.set(4, Word4::BytesSwap.val(swap as u32))
    }

    pub fn din_dma_mode(&self) -> u32 {
        self.get(1, Word1::DinDmaMode)
    }

    pub fn din_addr(&self) -> u64 {
        ((self.get(5, Word5::DinAddrHigh) as u64) << 32) | self.words[0] as u64
    }

    pub fn din_size(&self) -> u32 {
        self.get(1, Word1::DinSize)
    }

    pub fn din_ns(&self) -> bool {
        self.get(1, Word1::Ns) != 0
    }

    pub fn is_din_const(&self) -> bool {
        self.get(1, Word1::DinConst) != 0
    }

    pub fn is_din_not_last(&self) -> bool {
        self.get(1, Word1::NotLast) != 0
    }

    pub fn dout_dma_mode(&self) -> u32 {
        self.get(3, Word3::DoutDmaMode)
    }

    pub fn dout_addr(&self) -> u64 {
        ((self.get(5, Word5::DoutAddrHigh) as u64) << 32) | self.words[2] as u64
    }

    pub fn dout_size(&self) -> u32 {
        self.get(3, Word3::DoutSize)
    }

    pub fn dout_ns(&self) -> bool {
        self.get(3, Word3::Ns) != 0
    }

    pub fn is_last_ind(&self) -> bool {
        self.get(3, Word3::LastInd) != 0
    }

    pub fn is_queue_last(&self) -> bool {
        self.get(3, Word3::QueueLast) != 0
    }

    pub fn is_xor_active(&self) -> bool {
        self.get(3, Word3::HashXorBit) != 0
    }

    pub fn flow_mode(&self) -> u32 {
        self.get(4, Word4::DataFlowMode)
    }

    pub fn is_aes_not_hash(&self) -> bool {
        self.get(4, Word4::AesSelNotHash) != 0
    }

    pub fn cipher_mode_raw(&self) -> u32 {
        self.get(4, Word4::CipherMode)
    }

    pub fn is_cmac_size0(&self) -> bool {
        self.get(4, Word4::CmacSize0) != 0
    }

    pub fn cipher_do_raw(&self) -> u32 {
        self.get(4, Word4::CipherDo)
    }

    pub fn config0(&self) -> u32 {
        self.get(4, Word4::CipherConf0)
    }

    pub fn config1(&self) -> u32 {
        self.get(4, Word4::CipherConf1)
    }

    pub fn config2(&self) -> u32 {
        self.get(4, Word4::CipherConf2)
    }

    pub fn key_size_raw(&self) -> u32 {
        self.get(4, Word4::KeySize)
    }

    pub fn setup_op(&self) -> u32 {
        self.get(4, Word4::SetupOperation)
    }

    pub fn is_bytes_swap(&self) -> bool {
        self.get(4, Word4::BytesSwap) != 0
    }
}
