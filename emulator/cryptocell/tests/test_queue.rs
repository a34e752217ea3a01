// Licensed under the Apache-2.0 license

#[cfg(test)]
mod common;

use common::setup;
use emulator_cryptocell::{BusEvent, Fault};
use sym_crypto_common::context::{HashMode, SymContext};
use sym_crypto_common::descriptor::{DmaMode, FlowMode};
use sym_crypto_common::context::HashContext;
use sym_crypto_common::{DriverError, FatalError, HwDesc, SymDriverConfig};
use sym_crypto_driver::hil::{Reg, AXIM_COMP_INT_BIT};
use sym_crypto_driver::hw_queue::HwQueue;
use sym_crypto_driver::SymData;

#[test]
fn test_push_waits_for_free_slot() {
    setup(SymDriverConfig::default(), |bench| {
        let queue = HwQueue::new(bench.cc);
        let desc = HwDesc::new()
            .din_no_dma(0, 16)
            .dout_sram(0x200, 16)
            .flow(FlowMode::Bypass);
        bench.cc.clear_events();
        bench.cc.stall_queue(3);
        queue.push(desc);

        let words = desc.words();
        let mut expected = vec![BusEvent::Read(Reg::QueueContent); 4];
        for (i, word) in words[..5].iter().enumerate() {
            expected.push(BusEvent::Write(Reg::QueueWord(i), *word));
        }
        expected.push(BusEvent::Barrier);
        expected.push(BusEvent::Write(Reg::QueueWord(5), words[5]));
        expected.push(BusEvent::Barrier);
        assert_eq!(bench.cc.events(), expected);
        assert_eq!(bench.cc.descriptors(), vec![desc]);
    });
}

#[test]
fn test_every_sequence_ends_with_sentinel() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Hash(HashContext::hash(HashMode::Sha256));
        let data = common::pattern(64, 0);
        bench.cc.clear_events();
        bench.run_input(&mut ctx, &[&data]);

        let waits = bench
            .cc
            .events()
            .iter()
            .filter(|event| matches!(event, BusEvent::Wait(AXIM_COMP_INT_BIT)))
            .count();
        let sentinels: Vec<HwDesc> = bench
            .cc
            .descriptors()
            .into_iter()
            .filter(|desc| desc.is_last_ind() && desc.dout_dma_mode() == u32::from(DmaMode::Dlli))
            .collect();
        assert_eq!(sentinels.len(), waits);
        for desc in sentinels {
            assert!(desc.is_din_const());
            assert_eq!(desc.din_size(), 4);
            assert_eq!(desc.dout_size(), 4);
            assert!(!desc.is_queue_last());
        }
        assert_eq!(bench.cc.interrupt_mask() & AXIM_COMP_INT_BIT, 0);
    });
}

#[test]
fn test_preemptible_sentinel() {
    let config = SymDriverConfig {
        preemptible_completion: true,
        ..Default::default()
    };
    setup(config, |bench| {
        let mut ctx = SymContext::Hash(HashContext::hash(HashMode::Sha1));
        bench.adaptor.init(&mut ctx).unwrap();
        let last = bench.cc.descriptors().pop().unwrap();
        assert!(last.is_queue_last());
        assert!(last.is_last_ind());
    });
}

#[test]
fn test_completion_count_mismatch_is_fatal() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Hash(HashContext::hash(HashMode::Sha256));
        bench.adaptor.init(&mut ctx).unwrap();
        let data = common::pattern(32, 7);

        bench.cc.inject(Fault::DropCompletion);
        assert_eq!(
            bench.adaptor.process(&mut ctx, SymData::input(&data)),
            Err(DriverError::Fatal(FatalError::CompletionCount(0)))
        );
        bench.cc.inject(Fault::ExtraCompletion);
        assert_eq!(
            bench.adaptor.process(&mut ctx, SymData::input(&data)),
            Err(DriverError::Fatal(FatalError::CompletionCount(2)))
        );
        // Mappings are released and the lock is free on the fatal path too.
        assert_eq!(bench.mapper.outstanding(), 1);
        assert!(!bench.mutex.is_locked());
    });
}

#[test]
fn test_axi_monitor_error_is_fatal() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Hash(HashContext::hash(HashMode::Sha256));
        bench.cc.inject(Fault::AxiError(0x40));
        let err = bench.adaptor.init(&mut ctx).unwrap_err();
        assert_eq!(err, DriverError::Fatal(FatalError::AxiMonitor(0x40)));
        assert!(err.is_fatal());
        assert_eq!(err.sym(), None);
    });
}
