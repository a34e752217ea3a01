// Licensed under the Apache-2.0 license

//! Scatter (MLLI) entry codec.
//!
//! An entry is two little-endian words: the low 32 address bits, then the
//! fragment size in bits 15:0 and address bits 47:32 in bits 31:16. The same
//! layout is used for host tables and for the copy the engine reads from SRAM.

use tock_registers::{register_bitfields, LocalRegisterCopy};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const LLI_ENTRY_WORD_SIZE: usize = 2;
pub const LLI_ENTRY_BYTE_SIZE: usize = LLI_ENTRY_WORD_SIZE * 4;

/// Largest fragment one entry can describe.
///
/// The size field is 16 bits wide. A 64 KiB fragment would encode as size
/// zero, so it is rejected instead of being split or truncated.
pub const LLI_SIZE_MAX: u32 = 0xFFFF;

register_bitfields! {
    u32,
    LliWord1 [
        AddrHigh OFFSET(16) NUMBITS(16) [],
        Size OFFSET(0) NUMBITS(16) [],
    ],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct LliWire {
    word0: U32<LittleEndian>,
    word1: U32<LittleEndian>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LliEntry {
    pub addr: u64,
    pub size: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LliError {
    /// Fragment does not fit the entry size field or the configured ceiling.
    EntryTooLarge { index: usize, size: u32 },
    /// Address does not fit in 48 bits.
    AddressTooWide { index: usize },
    /// Destination cannot hold the table.
    TableTooSmall,
}

impl LliEntry {
    pub fn new(addr: u64, size: u32) -> Self {
        LliEntry { addr, size }
    }

    pub fn to_words(&self) -> [u32; LLI_ENTRY_WORD_SIZE] {
        let mut word1 = LocalRegisterCopy::<u32, LliWord1::Register>::new(0);
        word1.modify(
            LliWord1::Size.val(self.size & LLI_SIZE_MAX)
                + LliWord1::AddrHigh.val(((self.addr >> 32) & 0xFFFF) as u32),
        );
        [self.addr as u32, word1.get()]
    }

    pub fn from_words(words: [u32; LLI_ENTRY_WORD_SIZE]) -> Self {
        let word1 = LocalRegisterCopy::<u32, LliWord1::Register>::new(words[1]);
        LliEntry {
            addr: ((word1.read(LliWord1::AddrHigh) as u64) << 32) | words[0] as u64,
            size: word1.read(LliWord1::Size),
        }
    }
}

/// Encodes `entries` into `out`, rejecting fragments above `max_entry_size`.
///
/// Returns the number of table bytes written. On error the destination is zeroed
/// so a half-built table is never handed to the engine.
pub fn encode_table(
    entries: &[LliEntry],
    out: &mut [u8],
    max_entry_size: u32,
) -> Result<usize, LliError> {
    let table_len = entries.len() * LLI_ENTRY_BYTE_SIZE;
    if out.len() < table_len {
        return Err(LliError::TableTooSmall);
    }
    let ceiling = max_entry_size.min(LLI_SIZE_MAX);

    for (index, (entry, chunk)) in entries
        .iter()
        .zip(out.chunks_exact_mut(LLI_ENTRY_BYTE_SIZE))
        .enumerate()
    {
        let err = if entry.size > ceiling {
            Some(LliError::EntryTooLarge {
                index,
                size: entry.size,
            })
        } else if entry.addr >> 48 != 0 {
            Some(LliError::AddressTooWide { index })
        } else {
            None
        };
        if let Some(err) = err {
            out.fill(0);
            return Err(err);
        }

        let words = entry.to_words();
        let wire = LliWire {
            word0: U32::new(words[0]),
            word1: U32::new(words[1]),
        };
        chunk.copy_from_slice(wire.as_bytes());
    }
    Ok(table_len)
}

/// Decodes a table previously produced by [`encode_table`]; a trailing partial entry is ignored.
pub fn decode_table(table: &[u8]) -> impl Iterator<Item = LliEntry> + '_ {
    table.chunks_exact(LLI_ENTRY_BYTE_SIZE).filter_map(|chunk| {
        LliWire::read_from_bytes(chunk)
            .ok()
            .map(|wire| LliEntry::from_words([wire.word0.get(), wire.word1.get()]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_word_layout() {
        let entry = LliEntry::new(0x1234_8765_4321, 0x7d0);
        assert_eq!(entry.to_words(), [0x8765_4321, 0x1234_07d0]);
    }

    #[test]
    fn test_table_is_little_endian() {
        let entries = [LliEntry::new(0x0000_0001_0203_0405, 0x0a0b)];
        let mut table = [0u8; LLI_ENTRY_BYTE_SIZE];
        assert_eq!(encode_table(&entries, &mut table, LLI_SIZE_MAX), Ok(8));
        assert_eq!(table, [0x05, 0x04, 0x03, 0x02, 0x0b, 0x0a, 0x01, 0x00]);
    }

    #[test]
    fn test_table_round_trip() {
        let entries = [
            LliEntry::new(0x8000_0000, 2000),
            LliEntry::new(0x0000_7fff_9000_0010, 1000),
            LliEntry::new(0x4000_1000, 1096),
        ];
        let mut table = [0u8; 3 * LLI_ENTRY_BYTE_SIZE];
        encode_table(&entries, &mut table, LLI_SIZE_MAX).unwrap();
        let decoded: Vec<LliEntry> = decode_table(&table).collect();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn test_oversized_entry_clears_table() {
        let entries = [LliEntry::new(0x1000, 16), LliEntry::new(0x2000, 0x1_0000)];
        let mut table = [0xffu8; 2 * LLI_ENTRY_BYTE_SIZE];
        assert_eq!(
            encode_table(&entries, &mut table, LLI_SIZE_MAX),
            Err(LliError::EntryTooLarge {
                index: 1,
                size: 0x1_0000
            })
        );
        assert!(table.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_widest_encodable_entry() {
        let entries = [LliEntry::new(0x2000, LLI_SIZE_MAX)];
        let mut table = [0u8; LLI_ENTRY_BYTE_SIZE];
        // A larger configured ceiling is clamped to the field width.
        assert_eq!(encode_table(&entries, &mut table, 0x1_0000), Ok(8));
        assert_eq!(decode_table(&table).next(), Some(entries[0]));

        let entries = [LliEntry::new(0x2000, 0x1_0000)];
        assert_eq!(
            encode_table(&entries, &mut table, 0x1_0000),
            Err(LliError::EntryTooLarge {
                index: 0,
                size: 0x1_0000
            })
        );
    }

    #[test]
    fn test_configured_ceiling() {
        let entries = [LliEntry::new(0x1000, 512)];
        let mut table = [0u8; LLI_ENTRY_BYTE_SIZE];
        assert!(encode_table(&entries, &mut table, 256).is_err());
        assert!(encode_table(&entries, &mut table, 512).is_ok());
    }
}
