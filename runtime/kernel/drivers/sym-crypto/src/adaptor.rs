// Licensed under the Apache-2.0 license

//! Entry points of the driver core.
//!
//! Every call runs as one critical section under the platform mutex: build the
//! DMA handles, move the context image into the SRAM cache, dispatch, wait for
//! the engine, move the image back and unbuild. Handles are unbuilt on the
//! error path as well, and the first error wins over a later cleanup error.

use log::{debug, error, warn};
use sym_crypto_common::context::{
    AeadFlowState, AeadMode, BypassContext, CipherAlg, SymContext, AES_BLOCK_SIZE,
};
use sym_crypto_common::{DriverError, DriverResult, FatalError, SymDriverConfig, SymError, SymResult};
use zeroize::Zeroize;

use crate::completion::{wait_for_sequence, CompletionBuffer};
use crate::dispatch;
use crate::dma_buffer::{
    BuiltPair, DmaBuffer, DmaBuilder, PairSource, SlotPool, SYM_ADAPTOR_BUFFER_INDEX,
};
use crate::driver::{aead, DriverEnv};
use crate::hil::{AbortHandler, CcHal, DmaBlock, DmaDirection, DmaMapper, PalMutex};
use crate::hw_queue::HwQueue;
use crate::mlli::MlliManager;

/// Data buffers of one `process` or `finalize` call.
pub enum SymData<'d> {
    Separate {
        input: Option<&'d [u8]>,
        output: Option<&'d mut [u8]>,
    },
    /// The engine reads and writes the same buffer.
    InPlace(&'d mut [u8]),
}

impl<'d> SymData<'d> {
    pub fn none() -> Self {
        SymData::Separate {
            input: None,
            output: None,
        }
    }

    pub fn input(input: &'d [u8]) -> Self {
        SymData::Separate {
            input: Some(input),
            output: None,
        }
    }

    pub fn pair(input: &'d [u8], output: &'d mut [u8]) -> Self {
        SymData::Separate {
            input: Some(input),
            output: Some(output),
        }
    }
}

enum CopyDir {
    ToSram,
    FromSram,
}

/// Buffers owned between `module_init` and `terminate`.
struct Resources<D: DmaMapper> {
    in_slots: SlotPool<D>,
    out_slots: SlotPool<D>,
    completion: CompletionBuffer<D>,
}

pub struct SymAdaptor<'a, H: CcHal, D: DmaMapper, M: PalMutex> {
    hal: &'a H,
    mapper: &'a D,
    mutex: &'a M,
    config: SymDriverConfig,
    mlli: MlliManager,
    resources: Option<Resources<D>>,
}

impl<'a, H: CcHal, D: DmaMapper, M: PalMutex> SymAdaptor<'a, H, D, M> {
    pub fn new(hal: &'a H, mapper: &'a D, mutex: &'a M, config: SymDriverConfig) -> SymResult<Self> {
        config.validate().map_err(|err| {
            warn!("Rejected driver configuration: {}", err);
            SymError::InvalidArg
        })?;
        Ok(SymAdaptor {
            hal,
            mapper,
            mutex,
            config,
            mlli: MlliManager::new(&config),
            resources: None,
        })
    }

    pub fn config(&self) -> &SymDriverConfig {
        &self.config
    }

    /// Allocates the build slots of both directions and the completion buffer.
    ///
    /// Calling it again keeps the resources already held.
    pub fn module_init(&mut self) -> SymResult<()> {
        if self.resources.is_some() {
            return Ok(());
        }
        let in_slots = SlotPool::alloc(self.mapper, &self.config).map_err(|_| SymError::NoMem)?;
        let out_slots = match SlotPool::alloc(self.mapper, &self.config) {
            Ok(slots) => slots,
            Err(_) => {
                in_slots.free(self.mapper);
                return Err(SymError::NoMem);
            }
        };
        let completion = match CompletionBuffer::alloc(self.mapper) {
            Ok(completion) => completion,
            Err(_) => {
                in_slots.free(self.mapper);
                out_slots.free(self.mapper);
                return Err(SymError::NoMem);
            }
        };
        self.resources = Some(Resources {
            in_slots,
            out_slots,
            completion,
        });
        debug!("Symmetric driver resources allocated");
        Ok(())
    }

    pub fn terminate(&mut self) {
        if let Some(res) = self.resources.take() {
            res.in_slots.free(self.mapper);
            res.out_slots.free(self.mapper);
            res.completion.free(self.mapper);
        }
    }

    fn resources(&self) -> SymResult<&Resources<D>> {
        self.resources.as_ref().ok_or_else(|| {
            warn!("Driver used before module init");
            SymError::NoExec
        })
    }

    /// Runs `f` with the driver mutex held.
    fn locked<T>(&self, f: impl FnOnce() -> DriverResult<T>) -> DriverResult<T> {
        if let Err(err) = self.mutex.lock() {
            error!("Failed to acquire the driver mutex: {:?}", err);
            Err(FatalError::MutexLock)?;
        }
        let result = f();
        if let Err(err) = self.mutex.unlock() {
            error!("Failed to release the driver mutex: {:?}", err);
            Err(FatalError::MutexUnlock)?;
        }
        result
    }

    fn env<'q>(&'q self, queue: &'q HwQueue<'q, H>) -> DriverEnv<'q, H> {
        DriverEnv::new(queue, &self.mlli, self.config.ctx_cache_sram_addr)
    }

    fn wait(&self, queue: &HwQueue<'_, H>, res: &Resources<D>) -> DriverResult<()> {
        wait_for_sequence(
            queue,
            res.completion.block(),
            self.config.preemptible_completion,
        )
    }

    /// Moves a context image between host memory and the SRAM cache with a
    /// bypass copy over one bidirectional mapping.
    fn copy_ctx(
        &self,
        queue: &HwQueue<'_, H>,
        res: &Resources<D>,
        dir: CopyDir,
        image: &mut [u8],
    ) -> DriverResult<()> {
        if image.is_empty() {
            return Ok(());
        }
        let addr = image.as_mut_ptr() as usize;
        let size = image.len();
        let mut block = [DmaBlock::default(); 1];
        let (count, handle) = self
            .mapper
            .map(addr, size, DmaDirection::Bi, &mut block)
            .map_err(|err| {
                warn!("Failed to map the context image: {:?}", err);
                SymError::NoMem
            })?;

        let result = if count != 1 {
            warn!("Context image mapped to {} fragments", count);
            Err(SymError::OsFault.into())
        } else {
            let host = DmaBuffer::dlli(block[0].phys, size as u32);
            let sram = DmaBuffer::sram(self.config.ctx_cache_sram_addr, size as u32);
            let (input, output) = match dir {
                CopyDir::ToSram => (host, sram),
                CopyDir::FromSram => (sram, host),
            };
            let mut bypass = SymContext::Bypass(BypassContext);
            dispatch::process(&self.env(queue), &mut bypass, &input, &output)
                .and_then(|_| self.wait(queue, res))
        };

        let unmapped = self.mapper.unmap(addr, size, DmaDirection::Bi, handle);
        result?;
        unmapped.map_err(|err| {
            warn!("Failed to unmap the context image: {:?}", err);
            SymError::DmaUnmap(err.0)
        })?;
        Ok(())
    }

    /// Prepares `ctx` for its first data call.
    pub fn init(&self, ctx: &mut SymContext) -> DriverResult<()> {
        let res = self.resources()?;
        let queue = HwQueue::new(self.hal);
        let cached = ctx.init_needs_cache();
        self.locked(|| {
            if cached {
                self.copy_ctx(&queue, res, CopyDir::ToSram, ctx.cached_bytes_mut())?;
            }
            dispatch::init(&self.env(&queue), ctx)?;
            self.wait(&queue, res)?;
            if cached {
                self.copy_ctx(&queue, res, CopyDir::FromSram, ctx.cached_bytes_mut())?;
            }
            Ok(())
        })
    }

    /// Feeds the next chunk of data. CCM associated data is passed raw; its
    /// length prefix is added here.
    pub fn process(&self, ctx: &mut SymContext, data: SymData<'_>) -> DriverResult<()> {
        let ccm_header = match &*ctx {
            SymContext::Aead(aead)
                if aead.mode == AeadMode::Ccm && aead.next_state == AeadFlowState::AdataInit =>
            {
                Some((aead.header_size, aead.header_remaining))
            }
            _ => None,
        };
        match ccm_header {
            Some((header_size, remaining)) => {
                self.process_ccm_header(ctx, data, header_size, remaining)
            }
            None => self.run(ctx, data, false),
        }
    }

    /// Runs the first CCM associated-data call as two engine steps: the A0
    /// block (length prefix and leading header bytes), then the rest of the
    /// caller's bytes.
    fn process_ccm_header(
        &self,
        ctx: &mut SymContext,
        data: SymData<'_>,
        header_size: u32,
        remaining: u32,
    ) -> DriverResult<()> {
        let header: &[u8] = match &data {
            SymData::Separate {
                input: Some(input), ..
            } => input,
            SymData::InPlace(buf) => &**buf,
            SymData::Separate { input: None, .. } => &[],
        };
        if header.is_empty() {
            warn!("CCM associated data call without data");
            Err(SymError::InvalidArg)?;
        }
        if header.len() > remaining as usize {
            warn!(
                "{} bytes of associated data with {} expected",
                header.len(),
                remaining
            );
            Err(SymError::NoExec)?;
        }

        let (mut a0, a0_len, borrowed) = aead::format_ccm_a0(header_size, header);
        let result = self.run(ctx, SymData::input(&a0[..a0_len]), false);
        a0.zeroize();
        result?;
        if borrowed < header.len() {
            self.run(ctx, SymData::input(&header[borrowed..]), false)?;
        }
        Ok(())
    }

    /// Completes the operation. For CBC-MAC, XCBC-MAC and CMAC the output
    /// receives the 16-byte MAC instead of engine output.
    pub fn finalize(&self, ctx: &mut SymContext, data: SymData<'_>) -> DriverResult<()> {
        self.run(ctx, data, true)
    }

    fn run(&self, ctx: &mut SymContext, data: SymData<'_>, finalize: bool) -> DriverResult<()> {
        let res = self.resources()?;
        let (is_mac, is_sm4_ofb) = match ctx {
            SymContext::Cipher(cipher) => (
                cipher.alg == CipherAlg::Aes && cipher.mode.is_mac(),
                cipher.alg == CipherAlg::Sm4 && cipher.is_sm4_ofb,
            ),
            _ => (false, false),
        };

        let (input, mut output, mut in_place) = match data {
            SymData::InPlace(buf) => (None, None, Some(buf)),
            SymData::Separate { input, output } => (input, output, None),
        };
        // The MAC is copied out of the context, never written by DMA.
        let mut mac_out = if is_mac { output.take() } else { None };

        if let (Some(input), Some(output)) = (&input, &output) {
            if input.len() != output.len() {
                warn!(
                    "Input of {} bytes with output of {} bytes",
                    input.len(),
                    output.len()
                );
                Err(SymError::InvalidArg)?;
            }
        }
        let data_len = in_place
            .as_deref()
            .or(input)
            .or(output.as_deref())
            .map_or(0, |buf| buf.len());

        let const_input = is_sm4_ofb && (!finalize || data_len != 0);
        if const_input && (in_place.is_some() || output.is_none()) {
            warn!("SM4-OFB needs a separate output buffer");
            Err(SymError::InvalidArg)?;
        }
        if !finalize && !const_input && input.is_none() && in_place.is_none() {
            warn!("Process call without input data");
            Err(SymError::InvalidArg)?;
        }

        let builder = DmaBuilder::new(self.mapper, &self.config);
        let mut in_slot = res.in_slots.acquire(SYM_ADAPTOR_BUFFER_INDEX)?;
        let mut out_slot = res.out_slots.acquire(SYM_ADAPTOR_BUFFER_INDEX)?;
        let queue = HwQueue::new(self.hal);

        self.locked(|| {
            let source = match in_place.as_deref_mut() {
                // An in-place MAC only reads the buffer; the MAC lands in it afterwards.
                Some(buf) if is_mac => PairSource::Separate {
                    input: Some(&*buf),
                    output: None,
                },
                Some(buf) => PairSource::InPlace(buf),
                None if const_input => PairSource::ConstInput {
                    size: data_len,
                    output: output.as_deref_mut(),
                },
                None => PairSource::Separate {
                    input,
                    output: output.as_deref_mut(),
                },
            };
            let BuiltPair {
                input: dma_in,
                output: dma_out,
                flags,
            } = builder.build_pair(&mut in_slot, &mut out_slot, source)?;

            let result = self
                .run_locked(&queue, res, ctx, &dma_in, &dma_out, finalize)
                .and_then(|_| {
                    if finalize && is_mac {
                        copy_mac(ctx, mac_out.as_deref_mut().or(in_place.as_deref_mut()))
                    } else {
                        Ok(())
                    }
                });

            let unbuilt = builder.unbuild_pair(
                &mut in_slot,
                &mut out_slot,
                flags,
                in_place.as_deref_mut(),
                output.as_deref_mut(),
            );
            result?;
            unbuilt?;
            Ok(())
        })
    }

    fn run_locked(
        &self,
        queue: &HwQueue<'_, H>,
        res: &Resources<D>,
        ctx: &mut SymContext,
        input: &DmaBuffer,
        output: &DmaBuffer,
        finalize: bool,
    ) -> DriverResult<()> {
        self.copy_ctx(queue, res, CopyDir::ToSram, ctx.cached_bytes_mut())?;
        let env = self.env(queue);
        if finalize {
            dispatch::finalize(&env, ctx, input, output)?;
        } else {
            dispatch::process(&env, ctx, input, output)?;
        }
        self.wait(queue, res)?;
        self.copy_ctx(queue, res, CopyDir::FromSram, ctx.cached_bytes_mut())
    }
}

fn copy_mac(ctx: &SymContext, out: Option<&mut [u8]>) -> DriverResult<()> {
    let SymContext::Cipher(cipher) = ctx else {
        return Ok(());
    };
    match out {
        Some(out) if out.len() >= AES_BLOCK_SIZE => {
            out[..AES_BLOCK_SIZE].copy_from_slice(&cipher.sram.block_state);
            Ok(())
        }
        _ => {
            warn!("MAC finalize needs a {} byte output", AES_BLOCK_SIZE);
            Err(SymError::InvalidArg.into())
        }
    }
}

/// The adaptor with fatal errors routed to the platform abort handler.
pub struct SymDriver<'a, H: CcHal, D: DmaMapper, M: PalMutex, A: AbortHandler> {
    adaptor: SymAdaptor<'a, H, D, M>,
    abort: &'a A,
}

impl<'a, H: CcHal, D: DmaMapper, M: PalMutex, A: AbortHandler> SymDriver<'a, H, D, M, A> {
    pub fn new(adaptor: SymAdaptor<'a, H, D, M>, abort: &'a A) -> Self {
        SymDriver { adaptor, abort }
    }

    fn escalate<T>(&self, result: DriverResult<T>) -> SymResult<T> {
        match result {
            Ok(val) => Ok(val),
            Err(DriverError::Sym(err)) => Err(err),
            Err(DriverError::Fatal(err)) => {
                error!("Fatal driver error: {}", err);
                self.abort.abort(err)
            }
        }
    }

    pub fn module_init(&mut self) -> SymResult<()> {
        self.adaptor.module_init()
    }

    pub fn terminate(&mut self) {
        self.adaptor.terminate()
    }

    pub fn init(&self, ctx: &mut SymContext) -> SymResult<()> {
        self.escalate(self.adaptor.init(ctx))
    }

    pub fn process(&self, ctx: &mut SymContext, data: SymData<'_>) -> SymResult<()> {
        self.escalate(self.adaptor.process(ctx, data))
    }

    pub fn finalize(&self, ctx: &mut SymContext, data: SymData<'_>) -> SymResult<()> {
        self.escalate(self.adaptor.finalize(ctx, data))
    }
}
