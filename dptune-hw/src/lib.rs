//! # dptune-hw
//!
//! Hardware register definitions and MSR primitives for the Atom E-core
//! dynamic prefetcher tuner. This crate knows nothing about the control
//! loop, tuning algorithms, or CLI — it is the narrow, testable layer that
//! turns typed register layouts into raw MSR addresses and values, and
//! provides the transport used to read/write them.
//!
//! ## Usage
//!
//! ```ignore
//! use dptune_hw::msr::{DevMsrTransport, MsrTransport};
//! use dptune_hw::prefetch::{PREFETCH_MSR, level_value};
//!
//! let mut t = DevMsrTransport::open(8)?;
//! t.write(PREFETCH_MSR, level_value(3))?;
//! ```

pub mod arch;
pub mod msr;
pub mod pmu_events;
pub mod prefetch;
pub mod register;

pub use msr::{read_msr, write_msr, DevMsrTransport, MsrError, MsrTransport};
pub use register::{Register, RegisterLayout};

#[cfg(feature = "skylake")]
pub use arch::skylake as current_arch;
