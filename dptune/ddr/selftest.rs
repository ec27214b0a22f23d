//! Self-test bandwidth source (`--ddrbw-test`): a one-off
//! synthetic streaming read/write burst run on `core_first` to estimate
//! achievable peak bandwidth. Used only to derive `ddr_bw_target` at
//! startup, never per tick.

use std::time::Instant;

use crate::common::affinity::AffinityGuard;
use crate::error::Result;

/// Large enough to exceed typical last-level cache sizes on the targeted
/// E-core platforms, forcing the streaming pass out to DRAM.
const BUFFER_BYTES: usize = 256 * 1024 * 1024;
const PASSES: usize = 4;

/// Streams through a large buffer with interleaved writes and reads, pinned
/// to `core_first`, and reports the achieved throughput in MB/s.
pub fn measure_peak_mb_s(core_first: i32) -> Result<f64> {
    let _pin = AffinityGuard::new(core_first)?;

    let mut buffer = vec![0u8; BUFFER_BYTES];
    let start = Instant::now();

    for _ in 0..PASSES {
        for chunk in buffer.chunks_mut(64) {
            for b in chunk.iter_mut() {
                *b = b.wrapping_add(1);
            }
        }
    }
    // Prevent the optimizer from eliding the loop above in release builds.
    std::hint::black_box(&buffer);

    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    let bytes_moved = (BUFFER_BYTES * PASSES) as f64;
    Ok((bytes_moved / 1_000_000.0) / elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_peak_reports_positive_throughput() {
        // AffinityGuard::new may fail in a sandboxed test runner without
        // CAP_SYS_NICE; tolerate either outcome here.
        match measure_peak_mb_s(0) {
            Ok(mb_s) => assert!(mb_s > 0.0),
            Err(_) => {}
        }
    }
}
