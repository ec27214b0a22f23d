//! Intel Skylake-generation register definitions for the cores and uncore
//! units this crate actually drives: core PMU, RDT/MBM, and the IMC
//! bandwidth-estimation fallback.
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Intel® Xeon® Processor Scalable Family Uncore Performance Monitoring
//!   Reference Manual

pub mod core;
pub mod imc;
pub mod rdt;
