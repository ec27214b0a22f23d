//! Basic hill-climbing tuner: walks a fixed, ordered table of
//! prefetcher-MSR values up or down based on DDR bandwidth headroom.
//! `BASIC_1` additionally brakes on DRAM-hit pressure.

use dptune_hw::prefetch::{level_value, MAX_LEVEL};

use crate::tuner::Decision;

/// Headroom magnitude (MB/s) past which the level moves by one step in
/// either direction; scaled by `aggressiveness`.
const THRESHOLD_UP_MB_S: f64 = 2000.0;
const THRESHOLD_DOWN_MB_S: f64 = 2000.0;

/// Extra headroom penalty applied per unit of DRAM-hit ratio under
/// `BASIC_1`, a reviewable constant — the reference implementation exposes
/// algorithm 1 only as a boolean flag with its exact per-metric weighting
/// unspecified.
const DRAM_HIT_BRAKE_WEIGHT: f64 = 4000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Hold,
}

pub struct BasicTuner {
    levels: Vec<usize>,
    last_direction: Vec<Direction>,
}

impl BasicTuner {
    pub fn new(module_count: usize) -> Self {
        Self {
            levels: vec![0; module_count],
            last_direction: vec![Direction::Hold; module_count],
        }
    }

    pub fn level(&self, module: usize) -> usize {
        self.levels[module]
    }

    /// Runs one decision step for `module`. `dram_hit_ratio`
    /// is the module's DRAM-hit-to-total-load ratio, consumed only when
    /// `is_basic1` is set.
    pub fn decide(
        &mut self,
        module: usize,
        bw: f64,
        ddr_bw_target: f64,
        aggressiveness: f64,
        dram_hit_ratio: f64,
        is_basic1: bool,
    ) -> Decision {
        let headroom = ddr_bw_target - bw;
        let adjusted_headroom = if is_basic1 {
            headroom - DRAM_HIT_BRAKE_WEIGHT * dram_hit_ratio
        } else {
            headroom
        };

        let current = self.levels[module];
        let next = if adjusted_headroom > THRESHOLD_UP_MB_S * aggressiveness {
            self.last_direction[module] = Direction::Up;
            current.saturating_add(1).min(MAX_LEVEL)
        } else if adjusted_headroom < -THRESHOLD_DOWN_MB_S * aggressiveness {
            self.last_direction[module] = Direction::Down;
            current.saturating_sub(1)
        } else {
            self.last_direction[module] = Direction::Hold;
            current
        };

        self.levels[module] = next;
        Decision {
            desired_msr: level_value(next),
            changed: next != current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_zero_under_sustained_overload() {
        let mut tuner = BasicTuner::new(1);
        tuner.levels[0] = MAX_LEVEL;
        for _ in 0..=MAX_LEVEL {
            tuner.decide(0, 40000.0, 20000.0, 1.0, 0.0, false);
        }
        assert_eq!(tuner.level(0), 0);
    }

    #[test]
    fn climbs_to_max_under_sustained_slack() {
        let mut tuner = BasicTuner::new(1);
        for _ in 0..=MAX_LEVEL {
            tuner.decide(0, 5000.0, 20000.0, 1.0, 0.0, false);
        }
        assert_eq!(tuner.level(0), MAX_LEVEL);
    }

    #[test]
    fn holds_within_threshold_band() {
        let mut tuner = BasicTuner::new(1);
        tuner.levels[0] = 2;
        let d = tuner.decide(0, 20000.0, 20500.0, 1.0, 0.0, false);
        assert!(!d.changed);
        assert_eq!(tuner.level(0), 2);
    }

    #[test]
    fn basic1_dram_hit_brake_holds_back_climb() {
        let mut tuner = BasicTuner::new(1);
        // Plenty of raw headroom, but a high DRAM-hit ratio should brake
        // the climb under BASIC_1 where BASIC_0 would advance.
        let basic1 = tuner.decide(0, 15000.0, 20000.0, 1.0, 0.9, true);
        let mut tuner0 = BasicTuner::new(1);
        let basic0 = tuner0.decide(0, 15000.0, 20000.0, 1.0, 0.9, false);
        assert!(basic0.changed);
        assert!(!basic1.changed);
    }
}
