//! RDT/MBM bandwidth source: reads aggregate
//! local-memory bandwidth from the CPU's hardware memory-bandwidth
//! monitoring facility via `IA32_QM_EVTSEL`/`IA32_QM_CTR`, associating each
//! monitored core with an RMID through `IA32_PQR_ASSOC`.
//!
//! Grounded on the RMID-allocation and per-core MBM read pattern used by
//! this codebase's socket-level RDT counters, narrowed to the single
//! aggregate number this tuner's oracle needs.

use std::time::Instant;

use dptune_hw::{read_msr, write_msr};

use crate::common::cpuid;
use crate::ddr::BandwidthSource;
use crate::error::{DpfError, Result};
use crate::state::GlobalConfig;

const IA32_PQR_ASSOC: u64 = 0xC8F;
const IA32_QM_EVTSEL: u64 = 0xC8D;
const IA32_QM_CTR: u64 = 0xC8E;
const LOCAL_MEM_BW_EVENT: u64 = 0x02;

const RMID_MAX: u32 = 256;

/// `CPUID.(EAX=07H, ECX=0):EBX.PQM[bit 12]` — platform supports the
/// Intel RDT monitoring facility (of which MBM is a sub-feature).
pub fn supported() -> bool {
    let (_eax, ebx, _ecx, _edx) = cpuid::cpuid(0x7, 0);
    ebx & (1 << 12) != 0
}

pub struct RdtMbmSource {
    monitoring_core: u32,
    core_to_rmid: Vec<(i32, u32)>,
    mbm_scaling_factor: u64,
    prev_counters: Vec<u64>,
    last_sample_at: Instant,
}

impl RdtMbmSource {
    pub fn init(cfg: &GlobalConfig) -> Result<Self> {
        let scaling = cpuid::get_mbm_scaling_factor()
            .map_err(|e| DpfError::NotAvailable(format!("MBM scaling factor: {e}")))?;

        let mut core_to_rmid = Vec::new();
        for (i, core) in (cfg.core_first..=cfg.core_last).enumerate() {
            let rmid = (i as u32 + 1) % RMID_MAX;
            let current = read_msr(core as u32, IA32_PQR_ASSOC)?;
            let updated = (current & !0x3FF) | (rmid as u64);
            write_msr(core as u32, IA32_PQR_ASSOC, updated)?;
            core_to_rmid.push((core, rmid));
        }

        let prev_counters = vec![0u64; core_to_rmid.len()];
        Ok(Self {
            monitoring_core: cfg.core_first as u32,
            core_to_rmid,
            mbm_scaling_factor: scaling as u64,
            prev_counters,
            last_sample_at: Instant::now(),
        })
    }

    /// Returns the aggregate bandwidth as a whole-MB/s integer; the oracle
    /// itself consumes the finer-grained [`BandwidthSource::sample_mb_s`].
    pub fn read_aggregate_mb_s(&mut self) -> Result<i64> {
        Ok(self.sample_mb_s()?.round() as i64)
    }

    pub fn reset(&mut self) -> Result<()> {
        for &(core, _) in &self.core_to_rmid {
            write_msr(core as u32, IA32_PQR_ASSOC, 0)?;
        }
        self.prev_counters.iter_mut().for_each(|c| *c = 0);
        Ok(())
    }
}

impl BandwidthSource for RdtMbmSource {
    fn sample_mb_s(&mut self) -> Result<f64> {
        let mut total_delta_bytes = 0u64;
        for (i, &(_, rmid)) in self.core_to_rmid.iter().enumerate() {
            write_msr(
                self.monitoring_core,
                IA32_QM_EVTSEL,
                ((rmid as u64) << 32) | LOCAL_MEM_BW_EVENT,
            )?;
            let counter = read_msr(self.monitoring_core, IA32_QM_CTR)?;
            let delta = counter.saturating_sub(self.prev_counters[i]);
            total_delta_bytes += delta * self.mbm_scaling_factor;
            self.prev_counters[i] = counter;
        }

        let elapsed = self.last_sample_at.elapsed().as_secs_f64().max(1e-6);
        self.last_sample_at = Instant::now();
        Ok((total_delta_bytes as f64 / 1_000_000.0) / elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_does_not_panic() {
        let _ = supported();
    }
}
