// Licensed under the Apache-2.0 license

//! Host model of the symmetric crypto engine and the platform services the
//! driver core expects, used to run the driver off target.

mod engine;
mod platform;

pub use engine::{BusEvent, CryptoCell, Fault, AXI_ERR_SRAM_RANGE, AXI_ERR_UNMAPPED};
pub use platform::{
    Mapping, MockBuffer, MockDmaMapper, MockMutex, PanicAbort, PAL_ERR_BAD_HANDLE,
    PAL_ERR_INJECTED, PAL_ERR_LOCK_STATE,
};

#[cfg(test)]
mod tests {
    use super::*;
    use sym_crypto_common::descriptor::{DmaMode, FlowMode};
    use sym_crypto_common::HwDesc;
    use sym_crypto_driver::hil::{CcHal, DmaBlock, DmaDirection, DmaMapper, Reg};
    use sym_crypto_driver::hw_queue::HwQueue;

    #[test]
    fn test_sram_indirect_access() {
        let mapper = MockDmaMapper::new();
        let cc = CryptoCell::new(&mapper, 0x100);
        let queue = HwQueue::new(&cc);
        queue.write_sram(0x10, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(cc.sram(0x10, 8), [1, 2, 3, 4, 5, 6, 0, 0]);

        let mut out = [0u8; 6];
        queue.read_sram(0x10, &mut out);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_bypass_to_sram_and_back() {
        let mapper = MockDmaMapper::new();
        let cc = CryptoCell::new(&mapper, 0x100);
        let queue = HwQueue::new(&cc);

        let src = [0xA5u8; 16];
        let mut block = [DmaBlock::default(); 1];
        let (_, handle) = mapper
            .map(src.as_ptr() as usize, 16, DmaDirection::ToDevice, &mut block)
            .unwrap();
        queue.push(
            HwDesc::new()
                .din_type(DmaMode::Dlli, block[0].phys, 16, false)
                .dout_sram(0x40, 16)
                .flow(FlowMode::Bypass),
        );
        mapper
            .unmap(src.as_ptr() as usize, 16, DmaDirection::ToDevice, handle)
            .unwrap();
        assert_eq!(cc.sram(0x40, 16), src);
        assert_eq!(cc.read(Reg::AximMonErr), 0);
    }

    #[test]
    fn test_unmapped_access_flags_axi_error() {
        let mapper = MockDmaMapper::new();
        let cc = CryptoCell::new(&mapper, 0x100);
        let queue = HwQueue::new(&cc);
        let dst = [0u8; 4];
        queue.push(
            HwDesc::new()
                .din_const(0x1234_5678, 4)
                .dout_dlli(dst.as_ptr() as u64, 4, false, true)
                .flow(FlowMode::Bypass),
        );
        assert_eq!(dst, [0; 4]);
        assert_eq!(cc.read(Reg::AximMonErr), AXI_ERR_UNMAPPED);
        // Counted even though the write faulted.
        assert_eq!(cc.read(Reg::AximMonComp), 1);
        assert_eq!(cc.read(Reg::AximMonComp), 0);
    }

    #[test]
    fn test_fragmented_map() {
        let mapper = MockDmaMapper::new();
        let buf = vec![0u8; 96];
        let addr = buf.as_ptr() as usize;
        mapper.fragment(addr, &[32, 32, 32]);
        assert!(!mapper.is_contiguous(addr, 96));

        let mut blocks = [DmaBlock::default(); 2];
        let (count, handle) = mapper
            .map(addr, 96, DmaDirection::ToDevice, &mut blocks)
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(blocks[1].phys, addr as u64 + 32);
        assert_eq!(mapper.outstanding(), 1);
        mapper
            .unmap(addr, 96, DmaDirection::ToDevice, handle)
            .unwrap();
        assert_eq!(mapper.outstanding(), 0);
        assert_eq!(
            mapper.unmap(addr, 96, DmaDirection::ToDevice, handle),
            Err(PAL_ERR_BAD_HANDLE)
        );
    }
}
