//! DMI/BIOS bandwidth scraping (a collaborator
//! explicitly out of scope for the core control loop). Reads the
//! manufacturer-declared theoretical peak memory bandwidth out of the
//! DMI memory-device table under sysfs, where exposed.
//!
//! Returns `-1` when no figure can be found, matching the contract's
//! int-or-sentinel return rather than a `Result`, since absence here is
//! routine (not every platform exposes DMI memory timing) rather than an
//! error worth propagating through `DpfError`.

use std::fs;

const DMI_MAX_SPEED_PATH: &str = "/sys/class/dmi/id/memory_array_max_speed_mts";
const DEFAULT_CHANNELS: u32 = 2;
const BYTES_PER_TRANSFER: u32 = 8;

/// Theoretical aggregate bandwidth in MB/s, or `-1` if unavailable.
pub fn theoretical_bandwidth_mb_s() -> i64 {
    match fs::read_to_string(DMI_MAX_SPEED_PATH) {
        Ok(contents) => match contents.trim().parse::<u64>() {
            Ok(mts) if mts > 0 => {
                (mts * DEFAULT_CHANNELS as u64 * BYTES_PER_TRANSFER as u64) as i64 / 1000
            }
            _ => -1,
        },
        Err(_) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_sentinel_or_positive() {
        let v = theoretical_bandwidth_mb_s();
        assert!(v == -1 || v > 0);
    }
}
