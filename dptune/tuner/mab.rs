//! Multi-armed bandit tuner: UCB1 over a fixed set of
//! prefetcher-MSR "arms", reward = IPC, optionally bandwidth-penalized and
//! modulated by a rolling IPC standard deviation.
//!
//! Buffer lifecycle note: the reference implementation frees its dynamic-SD
//! ring buffers from inside the SIGINT handler, racing workers that may
//! still read them. Here the buffers live in [`MabTuner`], owned by the
//! primary worker and dropped only after every worker has joined — never
//! from a signal handler.

use std::collections::VecDeque;

use crate::tuner::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicSdMode {
    Off,
    On,
    Step,
}

pub struct MabTuner {
    arms: Vec<u64>,
    chosen_arm: usize,
    mean_reward: Vec<f64>,
    trials: Vec<u64>,
    total_trials: u64,
    dynamic_sd_mode: DynamicSdMode,
    ipc_buffer: VecDeque<f64>,
    sd_window: usize,
    exploration_base: f64,
}

impl MabTuner {
    pub fn new(arms: Vec<u64>, aggressiveness: f64, dynamic_sd_mode: DynamicSdMode, active_threads: usize) -> Self {
        let n = arms.len().max(1);
        Self {
            arms,
            chosen_arm: 0,
            mean_reward: vec![0.0; n],
            trials: vec![0; n],
            total_trials: 0,
            dynamic_sd_mode,
            ipc_buffer: VecDeque::with_capacity(active_threads.max(1) * 8),
            sd_window: active_threads.max(1) * 8,
            exploration_base: aggressiveness,
        }
    }

    pub fn chosen_arm(&self) -> usize {
        self.chosen_arm
    }

    pub fn trials(&self, arm: usize) -> u64 {
        self.trials[arm]
    }

    fn ipc_std_dev(&self) -> f64 {
        if self.ipc_buffer.len() < 2 {
            return 0.0;
        }
        let n = self.ipc_buffer.len() as f64;
        let mean: f64 = self.ipc_buffer.iter().sum::<f64>() / n;
        let variance: f64 = self.ipc_buffer.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt()
    }

    fn exploration_coefficient(&self) -> f64 {
        match self.dynamic_sd_mode {
            DynamicSdMode::Off => self.exploration_base,
            DynamicSdMode::On => self.exploration_base * (1.0 + self.ipc_std_dev()),
            DynamicSdMode::Step => {
                let sd = self.ipc_std_dev();
                const SD_STEP_THRESHOLD: f64 = 0.2;
                const SD_STEP_SIZE: f64 = 0.5;
                let steps = (sd / SD_STEP_THRESHOLD).floor();
                self.exploration_base + steps * SD_STEP_SIZE
            }
        }
    }

    fn select_arm(&self) -> usize {
        // Round-robin warm-up: every arm must be pulled at least once
        // before UCB selection kicks in.
        if let Some(unplayed) = self.trials.iter().position(|&t| t == 0) {
            return unplayed;
        }

        let c = self.exploration_coefficient();
        let ln_total = (self.total_trials as f64).ln().max(0.0);

        let mut best_arm = 0;
        let mut best_score = f64::MIN;
        for (arm, (&mean, &trials)) in self.mean_reward.iter().zip(self.trials.iter()).enumerate() {
            let bonus = c * (ln_total / trials as f64).sqrt();
            let score = mean + bonus;
            if score > best_score {
                best_score = score;
                best_arm = arm;
            }
        }
        best_arm
    }

    /// One decision step: chooses an arm, folds in the observed IPC as a
    /// bandwidth-penalized reward, and returns whether the arm's MSR value
    /// changed from the previous tick.
    pub fn decide(&mut self, instr_sum: u64, cycles_sum: u64, bw: f64, ddr_bw_target: f64) -> Decision {
        let ipc = instr_sum as f64 / (cycles_sum.max(1) as f64);
        let reward = if bw > ddr_bw_target && bw > 0.0 {
            ipc * (ddr_bw_target / bw)
        } else {
            ipc
        };

        let previous_arm = self.chosen_arm;
        let arm = self.select_arm();

        self.trials[arm] += 1;
        self.total_trials += 1;
        let n = self.trials[arm] as f64;
        self.mean_reward[arm] += (reward - self.mean_reward[arm]) / n;

        if self.dynamic_sd_mode != DynamicSdMode::Off {
            self.ipc_buffer.push_back(ipc);
            while self.ipc_buffer.len() > self.sd_window {
                self.ipc_buffer.pop_front();
            }
        }

        self.chosen_arm = arm;
        Decision {
            desired_msr: self.arms[arm],
            changed: arm != previous_arm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_plays_every_arm_once_before_ucb() {
        let mut mab = MabTuner::new(vec![1, 2, 3, 4], 1.0, DynamicSdMode::Off, 4);
        for _ in 0..4 {
            mab.decide(1000, 1000, 0.0, 20000.0);
        }
        for arm in 0..4 {
            assert!(mab.trials(arm) >= 1);
        }
    }

    #[test]
    fn converges_to_best_arm_after_warmup() {
        let mut mab = MabTuner::new(vec![1, 2, 3, 4], 1.0, DynamicSdMode::Off, 4);
        // Warm-up sweep.
        for _ in 0..4 {
            mab.decide(1000, 1000, 0.0, 20000.0);
        }

        let mut arm2_count = 0;
        for _ in 0..100 {
            let instr = if mab.chosen_arm() == 2 { 2000 } else { 1000 };
            mab.decide(instr, 1000, 0.0, 20000.0);
            if mab.chosen_arm() == 2 {
                arm2_count += 1;
            }
        }
        assert!(arm2_count >= 80, "arm2_count={arm2_count}");
    }

    #[test]
    fn bandwidth_cap_penalizes_high_reward_arm() {
        let mut mab = MabTuner::new(vec![1, 2, 3, 4], 1.0, DynamicSdMode::Off, 4);
        for _ in 0..4 {
            mab.decide(1000, 1000, 0.0, 20000.0);
        }

        let mut arm2_count = 0;
        for _ in 0..200 {
            let chosen = mab.chosen_arm();
            let (instr, bw) = if chosen == 2 {
                (2000, 60000.0)
            } else {
                (1000, 5000.0)
            };
            mab.decide(instr, 1000, bw, 20000.0);
            if mab.chosen_arm() == 2 {
                arm2_count += 1;
            }
        }
        assert!(arm2_count <= 100, "arm2_count={arm2_count}");
    }
}
