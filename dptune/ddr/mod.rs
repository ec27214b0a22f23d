//! DDR bandwidth oracle: produces a recent aggregate memory
//! bandwidth estimate in MB/s from whichever source is available, selected
//! once at startup in priority order (RDT/MBM, then DDR PMU, then self-test
//! only to derive `ddr_bw_target`).

pub mod ddr_pmu;
pub mod rdt_mbm;
pub mod selftest;

use crate::error::{DpfError, Result};
use crate::state::GlobalConfig;

/// After this many consecutive stale ticks the oracle reports "bandwidth
/// cap disabled" instead of a stale number, so the tuner falls back to
/// acting on PMU counters alone.
pub const MAX_STALE_TICKS: u32 = 5;

/// A source of per-tick aggregate DDR bandwidth samples. RDT/MBM and DDR
/// PMU both implement it; the self-test source is used only once at
/// startup and does not implement this trait.
pub trait BandwidthSource: Send {
    fn sample_mb_s(&mut self) -> Result<f64>;
}

/// Wraps whichever [`BandwidthSource`] was selected at startup and applies
/// the stale-tick fallback policy.
pub struct DdrBandwidthOracle {
    source: Option<Box<dyn BandwidthSource>>,
    last_known: f64,
    stale_ticks: u32,
}

impl DdrBandwidthOracle {
    pub fn new(source: Option<Box<dyn BandwidthSource>>) -> Self {
        Self {
            source,
            last_known: 0.0,
            stale_ticks: 0,
        }
    }

    /// Returns `Some(mb_s)` when a usable estimate exists, `None` once the
    /// cap should be treated as disabled.
    pub fn sample(&mut self) -> Option<f64> {
        let Some(source) = self.source.as_mut() else {
            return None;
        };

        match source.sample_mb_s() {
            Ok(v) => {
                self.last_known = v;
                self.stale_ticks = 0;
                Some(v)
            }
            Err(_) => {
                self.stale_ticks += 1;
                if self.stale_ticks > MAX_STALE_TICKS {
                    None
                } else {
                    Some(self.last_known)
                }
            }
        }
    }
}

/// Selects `ddr_bw_target`: explicit `--ddrbw-set` wins; else a self-test
/// peak; else DMI theoretical bandwidth times a utilization factor. Fails
/// startup if none of those yields a positive value.
pub fn resolve_ddr_bw_target(
    explicit_set: Option<f64>,
    selftest_peak: Option<f64>,
    dmi_theoretical: Option<f64>,
    utilization_factor: f64,
) -> Result<f64> {
    if let Some(v) = explicit_set {
        if v > 0.0 {
            return Ok(v);
        }
    }
    if let Some(v) = selftest_peak {
        if v > 0.0 {
            return Ok(v);
        }
    }
    if let Some(theoretical) = dmi_theoretical {
        let v = theoretical * utilization_factor;
        if v > 0.0 {
            return Ok(v);
        }
    }
    Err(DpfError::ConfigurationError(
        "no source produced a positive ddr_bw_target".into(),
    ))
}

pub fn select_source(cfg: &GlobalConfig) -> Option<Box<dyn BandwidthSource>> {
    if rdt_mbm::supported() {
        if let Ok(source) = rdt_mbm::RdtMbmSource::init(cfg) {
            tracing::info!("DDR bandwidth oracle: using RDT/MBM");
            return Some(Box::new(source));
        }
    }
    match ddr_pmu::DdrPmuSource::init(cfg) {
        Ok(source) => {
            tracing::info!("DDR bandwidth oracle: using DDR PMU fallback");
            Some(Box::new(source))
        }
        Err(e) => {
            tracing::warn!("no DDR bandwidth source available: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantSource(f64);
    impl BandwidthSource for ConstantSource {
        fn sample_mb_s(&mut self) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct FlakySource {
        calls: u32,
    }
    impl BandwidthSource for FlakySource {
        fn sample_mb_s(&mut self) -> Result<f64> {
            self.calls += 1;
            Err(DpfError::TransientIO("no counter".into()))
        }
    }

    #[test]
    fn oracle_passes_through_constant_source() {
        let mut oracle = DdrBandwidthOracle::new(Some(Box::new(ConstantSource(12345.0))));
        assert_eq!(oracle.sample(), Some(12345.0));
        assert_eq!(oracle.sample(), Some(12345.0));
    }

    #[test]
    fn oracle_disables_cap_after_max_stale_ticks() {
        let mut oracle = DdrBandwidthOracle::new(Some(Box::new(FlakySource { calls: 0 })));
        for _ in 0..=MAX_STALE_TICKS {
            oracle.sample();
        }
        assert_eq!(oracle.sample(), None);
    }

    #[test]
    fn oracle_with_no_source_always_none() {
        let mut oracle = DdrBandwidthOracle::new(None);
        assert_eq!(oracle.sample(), None);
    }

    #[test]
    fn resolve_target_prefers_explicit_set() {
        let v = resolve_ddr_bw_target(Some(20000.0), Some(99999.0), Some(1.0), 0.7).unwrap();
        assert_eq!(v, 20000.0);
    }

    #[test]
    fn resolve_target_falls_back_to_dmi_times_factor() {
        let v = resolve_ddr_bw_target(None, None, Some(10000.0), 0.7).unwrap();
        assert_eq!(v, 7000.0);
    }

    #[test]
    fn resolve_target_fails_with_no_source() {
        assert!(resolve_ddr_bw_target(None, None, None, 0.7).is_err());
    }
}
