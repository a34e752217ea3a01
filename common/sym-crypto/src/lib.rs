// Licensed under the Apache-2.0 license

//! Hardware-facing formats and shared types of the symmetric crypto engine driver.
//!
//! Everything in this crate is either a bit-exact hardware contract (descriptors,
//! scatter entries) or plain data shared between the driver core and its platform.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod lli;
pub mod relocation;

pub use config::SymDriverConfig;
pub use descriptor::HwDesc;
pub use error::{DriverError, DriverResult, FatalError, SymError, SymResult};
