// Licensed under the Apache-2.0 license
#![allow(dead_code)]

use emulator_cryptocell::{CryptoCell, MockDmaMapper, MockMutex};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use sym_crypto_common::context::SymContext;
use sym_crypto_common::SymDriverConfig;
use sym_crypto_driver::{SymAdaptor, SymData};

pub type Adaptor<'a> = SymAdaptor<'a, CryptoCell<'a>, MockDmaMapper, MockMutex>;

/// An initialized adaptor over the engine model, plus the mocks behind it.
pub struct Bench<'a> {
    pub cc: &'a CryptoCell<'a>,
    pub mapper: &'a MockDmaMapper,
    pub mutex: &'a MockMutex,
    pub adaptor: Adaptor<'a>,
}

impl Bench<'_> {
    /// Runs init, the `process` chunks and an empty finalize.
    pub fn run_input(&self, ctx: &mut SymContext, chunks: &[&[u8]]) {
        self.adaptor.init(ctx).unwrap();
        for chunk in chunks {
            self.adaptor.process(ctx, SymData::input(chunk)).unwrap();
        }
        self.adaptor.finalize(ctx, SymData::none()).unwrap();
    }
}

pub fn init_logger() {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
}

/// Builds the engine model and a module-initialized adaptor with `config`
/// and hands them to `f`.
pub fn setup<R>(config: SymDriverConfig, f: impl FnOnce(&mut Bench<'_>) -> R) -> R {
    init_logger();
    let mapper = MockDmaMapper::new();
    let cc = CryptoCell::new(&mapper, config.sram_size as usize);
    let mutex = MockMutex::new();
    let mut adaptor = SymAdaptor::new(&cc, &mapper, &mutex, config).unwrap();
    adaptor.module_init().unwrap();
    let mut bench = Bench {
        cc: &cc,
        mapper: &mapper,
        mutex: &mutex,
        adaptor,
    };
    f(&mut bench)
}

/// A buffer of `len` bytes counting up from `seed`.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}
