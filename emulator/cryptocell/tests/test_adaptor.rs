// Licensed under the Apache-2.0 license

#[cfg(test)]
mod common;

use common::{init_logger, pattern, setup};
use emulator_cryptocell::{CryptoCell, Fault, MockDmaMapper, MockMutex, PanicAbort};
use sym_crypto_common::context::{
    CipherAlg, CipherContext, CryptoKeyType, HashContext, HashMode, SymContext,
    DES_TRIPLE_KEY_SIZE,
};
use sym_crypto_common::descriptor::{CipherMode, Direction, DmaMode, FlowMode};
use sym_crypto_common::{DriverError, FatalError, SymDriverConfig, SymError};
use sym_crypto_driver::hil::{DmaDirection, KeyStatus};
use sym_crypto_driver::{SymAdaptor, SymData, SymDriver};

fn aes(mode: CipherMode) -> CipherContext {
    CipherContext::new(CipherAlg::Aes, mode, Direction::Encrypt)
        .with_key(&[0x11; 16])
        .with_iv(&[0x5A; 16])
}

#[test]
fn test_in_place_cipher_maps_once() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Cipher(aes(CipherMode::Cbc));
        bench.adaptor.init(&mut ctx).unwrap();

        let mut buf = pattern(64, 0);
        let addr = buf.as_ptr() as usize;
        bench.mapper.clear_history();
        bench
            .adaptor
            .process(&mut ctx, SymData::InPlace(&mut buf))
            .unwrap();

        let data_maps: Vec<_> = bench
            .mapper
            .history()
            .into_iter()
            .filter(|m| m.addr == addr)
            .collect();
        assert_eq!(data_maps.len(), 1);
        assert_eq!(data_maps[0].dir, DmaDirection::Bi);
        assert_eq!(data_maps[0].size, 64);

        let data = bench
            .cc
            .descriptors()
            .into_iter()
            .find(|desc| desc.flow_mode() == u32::from(FlowMode::DinAesDout))
            .unwrap();
        assert_eq!(data.din_addr(), addr as u64);
        assert_eq!(data.dout_addr(), addr as u64);
        assert_eq!(bench.mapper.outstanding(), 1);
    });
}

#[test]
fn test_des_double_key_expands_through_sram() {
    setup(SymDriverConfig::default(), |bench| {
        let key = pattern(16, 1);
        let cipher = CipherContext::new(CipherAlg::Des, CipherMode::Cbc, Direction::Encrypt)
            .with_key(&key)
            .with_iv(&[0; 8]);
        let mut ctx = SymContext::Cipher(cipher);
        bench.adaptor.init(&mut ctx).unwrap();

        let SymContext::Cipher(cipher) = &ctx else {
            panic!("context changed family");
        };
        assert_eq!(cipher.key_size, DES_TRIPLE_KEY_SIZE);
        assert_eq!(&cipher.sram.key[..16], key.as_slice());
        assert_eq!(&cipher.sram.key[16..24], &key[..8]);
    });
}

#[test]
fn test_hash_init_loads_larval_digest() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Hash(HashContext::hash(HashMode::Sha256));
        bench.adaptor.init(&mut ctx).unwrap();

        let expected: Vec<u8> = HashMode::Sha256
            .larval_digest()
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        let SymContext::Hash(hash) = &ctx else {
            panic!("context changed family");
        };
        assert_eq!(&hash.sram.digest[..32], expected.as_slice());
        assert_eq!(hash.sram.length, [0; 16]);
        assert!(!hash.hmac_finalization);
    });
}

#[test]
fn test_hmac_key_is_zero_extended() {
    setup(SymDriverConfig::default(), |bench| {
        let mut hmac = HashContext::hmac(HashMode::Sha256, &[0xAB; 5]);
        hmac.sram.k0[5..12].fill(0xFF);
        let mut ctx = SymContext::Hash(hmac);
        bench.adaptor.init(&mut ctx).unwrap();

        let SymContext::Hash(hmac) = &ctx else {
            panic!("context changed family");
        };
        assert_eq!(hmac.sram.k0[..5], [0xAB; 5]);
        assert!(hmac.sram.k0[5..64].iter().all(|b| *b == 0));
    });
}

#[test]
fn test_mac_finalize_writes_block_state() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Cipher(aes(CipherMode::CbcMac));
        bench.adaptor.init(&mut ctx).unwrap();
        let data = pattern(32, 9);
        bench
            .adaptor
            .process(&mut ctx, SymData::input(&data))
            .unwrap();

        let mut mac = [0u8; 16];
        bench
            .adaptor
            .finalize(
                &mut ctx,
                SymData::Separate {
                    input: None,
                    output: Some(&mut mac),
                },
            )
            .unwrap();
        assert_eq!(mac, [0x5A; 16]);

        // The MAC data descriptor never has an output.
        for desc in bench.cc.descriptors() {
            if desc.flow_mode() == u32::from(FlowMode::DinAesDout) {
                assert_eq!(desc.dout_dma_mode(), u32::from(DmaMode::NoDma));
            }
        }
    });
}

#[test]
fn test_in_place_mac_finalize() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Cipher(aes(CipherMode::CbcMac));
        bench.adaptor.init(&mut ctx).unwrap();
        let mut last = pattern(16, 0x30);
        bench
            .adaptor
            .finalize(&mut ctx, SymData::InPlace(&mut last))
            .unwrap();
        assert_eq!(last, [0x5A; 16]);

        let mut ctx = SymContext::Cipher(aes(CipherMode::CbcMac));
        bench.adaptor.init(&mut ctx).unwrap();
        let mut short = [0u8; 8];
        let result = bench.adaptor.finalize(
            &mut ctx,
            SymData::Separate {
                input: None,
                output: Some(&mut short),
            },
        );
        assert_eq!(result, Err(DriverError::Sym(SymError::InvalidArg)));
    });
}

#[test]
fn test_sm4_ofb_uses_constant_input() {
    setup(SymDriverConfig::default(), |bench| {
        let cipher = CipherContext::sm4_ofb()
            .with_key(&[0x22; 16])
            .with_iv(&[0x33; 16]);
        let mut ctx = SymContext::Cipher(cipher);
        bench.adaptor.init(&mut ctx).unwrap();

        let input = pattern(32, 0);
        let mut output = vec![0u8; 32];
        let out_addr = output.as_ptr() as usize;
        bench.mapper.clear_history();
        bench
            .adaptor
            .process(&mut ctx, SymData::pair(&input, &mut output))
            .unwrap();
        assert!(bench
            .mapper
            .history()
            .iter()
            .all(|m| m.addr != input.as_ptr() as usize));

        let data = bench
            .cc
            .descriptors()
            .into_iter()
            .find(|desc| desc.flow_mode() == u32::from(FlowMode::DinSm4Dout))
            .unwrap();
        assert!(data.is_din_const());
        assert_eq!(data.din_size(), 32);
        assert_eq!(data.dout_addr(), out_addr as u64);

        let mut buf = pattern(32, 0);
        assert_eq!(
            bench.adaptor.process(&mut ctx, SymData::InPlace(&mut buf)),
            Err(DriverError::Sym(SymError::InvalidArg))
        );
    });
}

#[test]
fn test_rejected_data_shapes() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Cipher(aes(CipherMode::Cbc));
        bench.adaptor.init(&mut ctx).unwrap();

        let input = pattern(32, 0);
        let mut output = vec![0u8; 16];
        assert_eq!(
            bench
                .adaptor
                .process(&mut ctx, SymData::pair(&input, &mut output)),
            Err(DriverError::Sym(SymError::InvalidArg))
        );
        assert_eq!(
            bench.adaptor.process(&mut ctx, SymData::none()),
            Err(DriverError::Sym(SymError::InvalidArg))
        );
        assert_eq!(bench.mapper.outstanding(), 1);
    });
}

#[test]
fn test_hardware_key_status() {
    setup(SymDriverConfig::default(), |bench| {
        let cases = [
            (KeyStatus::Invalid, SymError::KdrInvalid),
            (KeyStatus::SecureDisabled, SymError::SecureDisabled),
            (KeyStatus::FatalErrorLatched, SymError::FatalErrorLocked),
        ];
        for (status, expected) in cases {
            bench.cc.set_key_status(status);
            let mut ctx =
                SymContext::Cipher(aes(CipherMode::Cmac).with_key_type(CryptoKeyType::Root));
            assert_eq!(
                bench.adaptor.init(&mut ctx),
                Err(DriverError::Sym(expected))
            );
        }
        bench.cc.set_key_status(KeyStatus::Valid);
        let mut ctx = SymContext::Cipher(aes(CipherMode::Cmac).with_key_type(CryptoKeyType::Root));
        bench.adaptor.init(&mut ctx).unwrap();
        let SymContext::Cipher(cipher) = &ctx else {
            panic!("context changed family");
        };
        assert_eq!(cipher.key_size, 32);
        assert_eq!(cipher.sram.block_state, [0; 16]);
    });
}

#[test]
fn test_mutex_failures_are_fatal() {
    setup(SymDriverConfig::default(), |bench| {
        let mut ctx = SymContext::Hash(HashContext::hash(HashMode::Sha1));
        bench.mutex.fail_lock(true);
        assert_eq!(
            bench.adaptor.init(&mut ctx),
            Err(DriverError::Fatal(FatalError::MutexLock))
        );
        bench.mutex.fail_lock(false);

        bench.mutex.fail_unlock(true);
        assert_eq!(
            bench.adaptor.init(&mut ctx),
            Err(DriverError::Fatal(FatalError::MutexUnlock))
        );
        bench.mutex.fail_unlock(false);
        assert!(!bench.mutex.is_locked());

        let before = bench.mutex.acquisitions();
        bench.adaptor.init(&mut ctx).unwrap();
        assert_eq!(bench.mutex.acquisitions(), before + 1);
    });
}

#[test]
fn test_module_lifecycle() {
    init_logger();
    let config = SymDriverConfig::default();
    let mapper = MockDmaMapper::new();
    let cc = CryptoCell::new(&mapper, config.sram_size as usize);
    let mutex = MockMutex::new();
    let mut adaptor = SymAdaptor::new(&cc, &mapper, &mutex, config).unwrap();

    let mut ctx = SymContext::Hash(HashContext::hash(HashMode::Sha256));
    assert_eq!(
        adaptor.init(&mut ctx),
        Err(DriverError::Sym(SymError::NoExec))
    );

    // Two slot pools of two buffers each, then the completion buffer.
    for n in 0..5 {
        mapper.fail_alloc_in(n);
        assert_eq!(adaptor.module_init(), Err(SymError::NoMem));
        assert_eq!(mapper.allocations(), 0);
    }
    mapper.fail_map_in(0);
    assert_eq!(adaptor.module_init(), Err(SymError::NoMem));
    assert_eq!(mapper.allocations(), 0);
    assert_eq!(mapper.outstanding(), 0);

    adaptor.module_init().unwrap();
    assert_eq!(mapper.allocations(), 5);
    assert_eq!(mapper.outstanding(), 1);
    adaptor.module_init().unwrap();
    assert_eq!(mapper.allocations(), 5);

    adaptor.init(&mut ctx).unwrap();
    adaptor.terminate();
    assert_eq!(mapper.allocations(), 0);
    assert_eq!(mapper.outstanding(), 0);
    assert_eq!(
        adaptor.init(&mut ctx),
        Err(DriverError::Sym(SymError::NoExec))
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    init_logger();
    let mapper = MockDmaMapper::new();
    let cc = CryptoCell::new(&mapper, 0x1000);
    let mutex = MockMutex::new();
    let config = SymDriverConfig {
        mlli_max_entries: 0,
        ..Default::default()
    };
    assert!(matches!(
        SymAdaptor::new(&cc, &mapper, &mutex, config),
        Err(SymError::InvalidArg)
    ));
}

#[test]
fn test_driver_passes_recoverable_errors() {
    init_logger();
    let config = SymDriverConfig::default();
    let mapper = MockDmaMapper::new();
    let cc = CryptoCell::new(&mapper, config.sram_size as usize);
    let mutex = MockMutex::new();
    let mut driver = SymDriver::new(
        SymAdaptor::new(&cc, &mapper, &mutex, config).unwrap(),
        &PanicAbort,
    );
    driver.module_init().unwrap();

    let mut ctx = SymContext::Cipher(aes(CipherMode::Cbc));
    driver.init(&mut ctx).unwrap();
    assert_eq!(
        driver.process(&mut ctx, SymData::none()),
        Err(SymError::InvalidArg)
    );
    driver.terminate();
}

#[test]
#[should_panic(expected = "Completion counter is 0")]
fn test_driver_aborts_on_fatal() {
    init_logger();
    let config = SymDriverConfig::default();
    let mapper = MockDmaMapper::new();
    let cc = CryptoCell::new(&mapper, config.sram_size as usize);
    let mutex = MockMutex::new();
    let mut driver = SymDriver::new(
        SymAdaptor::new(&cc, &mapper, &mutex, config).unwrap(),
        &PanicAbort,
    );
    driver.module_init().unwrap();

    let mut ctx = SymContext::Hash(HashContext::hash(HashMode::Sha256));
    cc.inject(Fault::DropCompletion);
    let _ = driver.init(&mut ctx);
}
