//! Shared data model: per-core state, per-module desired MSR image, and the
//! immutable configuration every worker is spawned with.

use dptune_hw::pmu_events::PMU_COUNTERS;

/// `core_id` position within its 4-core module. Only module-lead cores
/// (`index 0`) may write the shared prefetcher MSR.
pub fn module_index(core_id: i32, core_first: i32) -> u32 {
    ((core_id - core_first).rem_euclid(4)) as u32
}

/// Per-core measurement state, owned by the worker pinned to `core_id` and
/// read cross-thread only between the two barrier phases.
#[derive(Debug, Clone)]
pub struct CoreState {
    pub core_id: i32,
    pub module_index: u32,
    pub disabled: bool,
    pub pmu_prev: [u64; PMU_COUNTERS],
    pub pmu_curr: [u64; PMU_COUNTERS],
    pub pmu_delta: [u64; PMU_COUNTERS],
    pub instr_retired_prev: u64,
    pub cpu_cycles_prev: u64,
    pub instr_retired_delta: u64,
    pub cpu_cycles_delta: u64,
    pub priority: u8,
}

impl CoreState {
    pub fn new(core_id: i32, core_first: i32, priority: u8) -> Self {
        Self {
            core_id,
            module_index: module_index(core_id, core_first),
            disabled: false,
            pmu_prev: [0; PMU_COUNTERS],
            pmu_curr: [0; PMU_COUNTERS],
            pmu_delta: [0; PMU_COUNTERS],
            instr_retired_prev: 0,
            cpu_cycles_prev: 0,
            instr_retired_delta: 0,
            cpu_cycles_delta: 0,
            priority,
        }
    }

    /// Apply a fresh sample, computing wrap-safe deltas: an apparent
    /// decrease is treated as a counter reset, not a wrap.
    pub fn apply_sample(
        &mut self,
        counters: [u64; PMU_COUNTERS],
        instr: u64,
        cycles: u64,
    ) {
        self.pmu_curr = counters;
        for i in 0..PMU_COUNTERS {
            self.pmu_delta[i] = self.pmu_curr[i].saturating_sub(self.pmu_prev[i]);
        }
        self.instr_retired_delta = instr.saturating_sub(self.instr_retired_prev);
        self.cpu_cycles_delta = cycles.saturating_sub(self.cpu_cycles_prev);

        self.pmu_prev = self.pmu_curr;
        self.instr_retired_prev = instr;
        self.cpu_cycles_prev = cycles;
    }
}

/// Shared, per-module actuation state: the value the tuner wants programmed
/// and whether it has been applied yet (invariants 4, 5).
#[derive(Debug, Clone)]
pub struct ModuleState {
    pub desired_msr: u64,
    pub msr_dirty: bool,
    pub original_msr: u64,
}

impl ModuleState {
    pub fn new(original_msr: u64) -> Self {
        Self {
            desired_msr: original_msr,
            msr_dirty: false,
            original_msr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneAlg {
    Basic0,
    Basic1,
    Mab,
}

impl TuneAlg {
    pub fn from_flag(v: u8) -> Option<Self> {
        match v {
            0 => Some(TuneAlg::Basic0),
            1 => Some(TuneAlg::Basic1),
            2 => Some(TuneAlg::Mab),
            _ => None,
        }
    }

    pub fn is_basic(&self) -> bool {
        matches!(self, TuneAlg::Basic0 | TuneAlg::Basic1)
    }
}

/// Process-wide configuration, immutable once the control loop starts and
/// passed explicitly to every worker rather than read from globals.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub core_first: i32,
    pub core_last: i32,
    pub tick_interval: std::time::Duration,
    pub aggressiveness: f64,
    pub ddr_bw_target: f64,
    pub tune_alg: TuneAlg,
    pub priority: Vec<u8>,
}

impl GlobalConfig {
    pub fn active_threads(&self) -> usize {
        (self.core_last - self.core_first + 1) as usize
    }

    pub fn module_count(&self) -> usize {
        self.active_threads().div_ceil(4)
    }

    pub fn priority_for(&self, core_id: i32) -> u8 {
        let idx = (core_id - self.core_first) as usize;
        self.priority.get(idx).copied().unwrap_or(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_index_wraps_every_four_cores() {
        assert_eq!(module_index(8, 8), 0);
        assert_eq!(module_index(9, 8), 1);
        assert_eq!(module_index(11, 8), 3);
        assert_eq!(module_index(12, 8), 0);
    }

    #[test]
    fn apply_sample_treats_decrease_as_reset() {
        let mut s = CoreState::new(8, 8, 50);
        s.apply_sample([10; PMU_COUNTERS], 1000, 2000);
        assert_eq!(s.pmu_delta[0], 10);
        // Counter "reset" — current < previous snapshot.
        s.apply_sample([5; PMU_COUNTERS], 900, 1800);
        assert_eq!(s.pmu_delta[0], 0);
        assert_eq!(s.instr_retired_delta, 0);
    }

    #[test]
    fn active_threads_and_module_count() {
        let cfg = GlobalConfig {
            core_first: 8,
            core_last: 11,
            tick_interval: std::time::Duration::from_secs(1),
            aggressiveness: 1.0,
            ddr_bw_target: 1000.0,
            tune_alg: TuneAlg::Basic0,
            priority: vec![50; 4],
        };
        assert_eq!(cfg.active_threads(), 4);
        assert_eq!(cfg.module_count(), 1);
    }
}
