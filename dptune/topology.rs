//! CPU-topology discovery: a collaborator external to the core control
//! loop, implemented here as a thin sysfs reader so the binary is
//! self-contained.
//!
//! Identifies the contiguous range of "efficient" (Atom E-core) logical
//! CPUs via the hybrid-core type exposed in `/sys/devices/cpu_atom` on
//! kernels that support heterogeneous topology, falling back to treating
//! every online CPU as E-core on non-hybrid systems.

use std::fs;

use crate::error::{DpfError, Result};

const CPU_ATOM_CPULIST: &str = "/sys/devices/cpu_atom/cpus";
const ONLINE_CPULIST: &str = "/sys/devices/system/cpu/online";

/// Returns the inclusive `(first, last)` E-core range, or
/// `ConfigurationError` if none could be identified.
pub fn efficient_cores() -> Result<(i32, i32)> {
    if let Ok(contents) = fs::read_to_string(CPU_ATOM_CPULIST) {
        if let Some(range) = parse_contiguous_range(&contents) {
            return Ok(range);
        }
    }

    let contents = fs::read_to_string(ONLINE_CPULIST)
        .map_err(|e| DpfError::ConfigurationError(format!("cannot read {ONLINE_CPULIST}: {e}")))?;
    parse_contiguous_range(&contents)
        .ok_or_else(|| DpfError::ConfigurationError("no E-cores found".into()))
}

/// Parses a sysfs cpulist like `8-11` or `0-7,16-23` into the first
/// contiguous range it contains. Module-lead detection assumes
/// `core_first` aligns to a module boundary; ranges here are taken from
/// the first comma-separated group.
fn parse_contiguous_range(contents: &str) -> Option<(i32, i32)> {
    let first_group = contents.trim().split(',').next()?;
    if first_group.is_empty() {
        return None;
    }
    if let Some((lo, hi)) = first_group.split_once('-') {
        let lo: i32 = lo.trim().parse().ok()?;
        let hi: i32 = hi.trim().parse().ok()?;
        Some((lo, hi))
    } else {
        let v: i32 = first_group.trim().parse().ok()?;
        Some((v, v))
    }
}
