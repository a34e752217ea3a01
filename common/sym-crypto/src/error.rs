// Licensed under the Apache-2.0 license

use thiserror::Error;

pub type SymResult<T> = Result<T, SymError>;
pub type DriverResult<T> = Result<T, DriverError>;

/// Recoverable failures, returned to the caller with every partial build unwound.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymError {
    #[error("Unsupported algorithm")]
    UnsupportedAlg,
    #[error("Unsupported algorithm mode")]
    UnsupportedAlgMode,
    #[error("Unsupported operation")]
    UnsupportedOperation,
    #[error("Unsupported hardware key")]
    UnsupportedHwKey,
    #[error("Invalid hardware key")]
    InvalidHwKey,
    #[error("Invalid argument")]
    InvalidArg,
    #[error("Invalid key size")]
    InvalidKeySize,
    #[error("Invalid context index")]
    InvalidCtxIndex,
    #[error("Invalid context")]
    InvalidCtx,
    #[error("Invalid buffer address")]
    InvalidBadAddr,
    #[error("Inconsistent DMA type pairing")]
    InconsistentDmaType,
    #[error("Operation not permitted")]
    Permission,
    #[error("Operation cannot be executed in the current state")]
    NoExec,
    #[error("Resource busy")]
    Busy,
    #[error("Out of memory or mapping failure")]
    NoMem,
    #[error("Unexpected mapping result")]
    OsFault,
    #[error("Root key is invalid")]
    KdrInvalid,
    #[error("Session key is not set")]
    SessionKey,
    #[error("Provisioning key is invalid")]
    KcpInvalid,
    #[error("ICV provisioning key is invalid")]
    KpicvInvalid,
    #[error("Invalid user key size")]
    InvalidUserKeySize,
    #[error("Invalid key type")]
    InvalidKeyType,
    #[error("Fatal error latch is set")]
    FatalErrorLocked,
    #[error("Secure disable is asserted")]
    SecureDisabled,
    #[error("Scatter table of {0} bytes exceeds the on-chip slot")]
    MlliOversize(u32),
    #[error("DMA unmap failed with platform code {0}")]
    DmaUnmap(u32),
}

/// Platform-integrity violations. These are never returned to a crypto API caller;
/// the top level hands them to the abort handler.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    #[error("Failed to acquire the driver mutex")]
    MutexLock,
    #[error("Failed to release the driver mutex")]
    MutexUnlock,
    #[error("Completion counter is {0}, expected 1")]
    CompletionCount(u32),
    #[error("AXI monitor reported error 0x{0:x}")]
    AxiMonitor(u32),
    #[error("Scatter table workspace is externally allocated")]
    MlliExternallyAllocated,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    #[error(transparent)]
    Sym(#[from] SymError),
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl DriverError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Fatal(_))
    }

    pub fn sym(&self) -> Option<SymError> {
        match self {
            DriverError::Sym(err) => Some(*err),
            DriverError::Fatal(_) => None,
        }
    }
}
