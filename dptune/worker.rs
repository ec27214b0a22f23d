//! Core-worker pool: one pinned native thread per monitored logical core,
//! executing sample→sync→(decide)→apply every tick. No cooperative
//! scheduler, no async runtime — a deliberate divergence from this
//! codebase's historical tokio-based collector loop, since nothing here
//! names an HTTP metrics endpoint to drive from an async reactor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use dptune_hw::msr::MsrTransport;
use parking_lot::Mutex;

use crate::common::affinity::AffinityGuard;
use crate::ddr::DdrBandwidthOracle;
use crate::error::{DpfError, Result};
use crate::hw::gateway::MsrGateway;
use crate::hw::pmu;
use crate::state::{module_index, CoreState, GlobalConfig, ModuleState, TuneAlg};
use crate::sync::Barrier;
use crate::tuner::basic::BasicTuner;
use crate::tuner::mab::{DynamicSdMode, MabTuner};

/// Index within `EVENTS`/`pmu_delta` of `MEM_UOPS_RETIRED.ALL_LOADS`.
const IDX_ALL_LOADS: usize = 0;
/// Index within `EVENTS`/`pmu_delta` of `MEM_LOAD_UOPS_RETIRED.DRAM_HIT`.
const IDX_DRAM_HIT: usize = 3;

pub struct WorkerPool {
    quit: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    first_error: Arc<Mutex<Option<DpfError>>>,
}

impl WorkerPool {
    /// Spawns one worker per core in `cfg.core_first..=cfg.core_last`,
    /// each pinned, and starts the control loop. `arms` is the MAB action
    /// table; ignored when `cfg.tune_alg` is a basic variant. `T` is the
    /// MSR transport every worker opens its gateway over — production
    /// code supplies `DevMsrTransport`; tests can supply a fake.
    pub fn spawn<T: MsrTransport + Send + 'static>(
        cfg: Arc<GlobalConfig>,
        oracle: DdrBandwidthOracle,
        arms: Vec<u64>,
        dynamic_sd_mode: DynamicSdMode,
    ) -> Result<Self> {
        let active_threads = cfg.active_threads();
        let module_count = cfg.module_count();

        let quit = Arc::new(AtomicBool::new(false));
        let first_error: Arc<Mutex<Option<DpfError>>> = Arc::new(Mutex::new(None));
        let barrier = Arc::new(Barrier::new(active_threads));
        let core_states: Arc<Vec<Mutex<CoreState>>> = Arc::new(
            (cfg.core_first..=cfg.core_last)
                .map(|core_id| Mutex::new(CoreState::new(core_id, cfg.core_first, cfg.priority_for(core_id))))
                .collect(),
        );
        let module_states: Arc<Vec<Mutex<Option<ModuleState>>>> =
            Arc::new((0..module_count).map(|_| Mutex::new(None)).collect());
        let oracle = Arc::new(Mutex::new(oracle));

        let mut handles = Vec::with_capacity(active_threads);
        for (position, core_id) in (cfg.core_first..=cfg.core_last).enumerate() {
            let cfg = Arc::clone(&cfg);
            let quit = Arc::clone(&quit);
            let first_error_handle = Arc::clone(&first_error);
            let barrier = Arc::clone(&barrier);
            let core_states = Arc::clone(&core_states);
            let module_states = Arc::clone(&module_states);
            let oracle = Arc::clone(&oracle);
            let arms = arms.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("dptune-core{core_id}"))
                .spawn(move || {
                    if let Err(e) = run_worker::<T>(
                        core_id,
                        position,
                        cfg,
                        quit,
                        barrier,
                        core_states,
                        module_states,
                        oracle,
                        arms,
                        dynamic_sd_mode,
                    ) {
                        tracing::error!("worker for core {core_id} exited with error: {e}");
                        let mut slot = first_error_handle.lock();
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    quit.store(true, Ordering::Release);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(DpfError::Fatal(format!(
                        "failed to spawn worker thread for core {core_id}: {e}"
                    )));
                }
            }
        }

        Ok(Self {
            quit,
            handles,
            first_error,
        })
    }

    /// Requests shutdown; does not block. Call [`WorkerPool::join`] after.
    pub fn request_shutdown(&self) {
        self.quit.store(true, Ordering::Release);
    }

    /// Joins every worker thread and returns the first error any of them
    /// raised, if any — a `PermissionDenied` at MSR-open or any mid-tick
    /// failure surfaces here instead of being silently swallowed.
    pub fn join(self) -> Result<()> {
        for handle in self.handles {
            let _ = handle.join();
        }
        match self.first_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker<T: MsrTransport>(
    core_id: i32,
    position: usize,
    cfg: Arc<GlobalConfig>,
    quit: Arc<AtomicBool>,
    barrier: Arc<Barrier>,
    core_states: Arc<Vec<Mutex<CoreState>>>,
    module_states: Arc<Vec<Mutex<Option<ModuleState>>>>,
    oracle: Arc<Mutex<DdrBandwidthOracle>>,
    arms: Vec<u64>,
    dynamic_sd_mode: DynamicSdMode,
) -> Result<()> {
    let module = module_index(core_id, cfg.core_first) as usize;
    let module_idx = (core_id - cfg.core_first) as usize / 4;
    let is_primary = core_id == cfg.core_first;
    let is_module_lead = module == 0;

    let setup = (|| -> Result<(AffinityGuard, MsrGateway<T>, u64)> {
        let pin = AffinityGuard::new(core_id)?;
        let mut gateway = MsrGateway::<T>::open(core_id as u32)?;

        let original_msr = if is_module_lead {
            let value = gateway.read_prefetch_msr()?;
            *module_states[module_idx].lock() = Some(ModuleState::new(value));
            value
        } else {
            0
        };

        gateway.enable_fixed_counters()?;
        gateway.configure_programmable_events()?;
        Ok((pin, gateway, original_msr))
    })();

    // A setup failure (most commonly MSR-open `PermissionDenied`) has no
    // prefetcher state to restore; signal peers and bail.
    let (_pin, mut gateway, original_msr) = match setup {
        Ok(v) => v,
        Err(e) => {
            quit.store(true, Ordering::Release);
            return Err(e);
        }
    };

    let mut basic_tuner = if cfg.tune_alg.is_basic() && is_primary {
        Some(BasicTuner::new(cfg.module_count()))
    } else {
        None
    };
    let mut mab_tuner = if cfg.tune_alg == TuneAlg::Mab && is_primary {
        Some(MabTuner::new(
            arms,
            cfg.aggressiveness,
            dynamic_sd_mode,
            cfg.active_threads(),
        ))
    } else {
        None
    };

    let loop_result = tick_loop(
        &cfg,
        &quit,
        &barrier,
        &core_states,
        &module_states,
        &oracle,
        &mut gateway,
        position,
        module_idx,
        is_primary,
        is_module_lead,
        &mut basic_tuner,
        &mut mab_tuner,
    );

    // Whatever happened in the loop — clean shutdown or a mid-tick error —
    // signal peers so nobody spins on the barrier forever, and restore the
    // prefetcher MSR this module lead owns before the thread exits.
    quit.store(true, Ordering::Release);
    let restore_result = if is_module_lead {
        gateway.write_prefetch_msr(original_msr)
    } else {
        Ok(())
    };

    loop_result.and(restore_result)
}

#[allow(clippy::too_many_arguments)]
fn tick_loop<T: MsrTransport>(
    cfg: &GlobalConfig,
    quit: &AtomicBool,
    barrier: &Barrier,
    core_states: &[Mutex<CoreState>],
    module_states: &[Mutex<Option<ModuleState>>],
    oracle: &Mutex<DdrBandwidthOracle>,
    gateway: &mut MsrGateway<T>,
    position: usize,
    module_idx: usize,
    is_primary: bool,
    is_module_lead: bool,
    basic_tuner: &mut Option<BasicTuner>,
    mab_tuner: &mut Option<MabTuner>,
) -> Result<()> {
    while !quit.load(Ordering::Acquire) {
        std::thread::sleep(cfg.tick_interval);
        if quit.load(Ordering::Acquire) {
            break;
        }

        let sample = pmu::sample(gateway)?;
        {
            let mut state = core_states[position].lock();
            state.apply_sample(sample.counters, sample.instr_retired, sample.cpu_cycles);
        }

        barrier.arrive();

        if is_primary {
            barrier.wait_for_all_arrived_or_quit(quit);
            if quit.load(Ordering::Acquire) {
                break;
            }

            let bw = oracle.lock().sample().unwrap_or(0.0);
            decide(
                cfg,
                core_states,
                module_states,
                bw,
                basic_tuner,
                mab_tuner,
            );

            barrier.release();
        } else if is_module_lead {
            barrier.wait_for_release_or_quit(quit);
        }

        if is_module_lead {
            let mut slot = module_states[module_idx].lock();
            if let Some(module_state) = slot.as_mut() {
                if module_state.msr_dirty {
                    gateway.write_prefetch_msr(module_state.desired_msr)?;
                    module_state.msr_dirty = false;
                }
            }
        }
    }

    Ok(())
}

fn decide(
    cfg: &GlobalConfig,
    core_states: &[Mutex<CoreState>],
    module_states: &[Mutex<Option<ModuleState>>],
    bw: f64,
    basic_tuner: &mut Option<BasicTuner>,
    mab_tuner: &mut Option<MabTuner>,
) {
    match cfg.tune_alg {
        TuneAlg::Basic0 | TuneAlg::Basic1 => {
            let is_basic1 = cfg.tune_alg == TuneAlg::Basic1;
            let Some(tuner) = basic_tuner else { return };

            for module in 0..cfg.module_count() {
                let first_in_module = module * 4;
                let last_in_module = (first_in_module + 3).min(core_states.len() - 1);

                let mut loads = 0u64;
                let mut dram_hits = 0u64;
                for state in &core_states[first_in_module..=last_in_module] {
                    let state = state.lock();
                    loads += state.pmu_delta[IDX_ALL_LOADS];
                    dram_hits += state.pmu_delta[IDX_DRAM_HIT];
                }
                let dram_hit_ratio = if loads > 0 {
                    dram_hits as f64 / loads as f64
                } else {
                    0.0
                };

                let decision = tuner.decide(
                    module,
                    bw,
                    cfg.ddr_bw_target,
                    cfg.aggressiveness,
                    dram_hit_ratio,
                    is_basic1,
                );
                if decision.changed {
                    apply_decision(module_states, module, decision.desired_msr);
                }
            }
        }
        TuneAlg::Mab => {
            let Some(tuner) = mab_tuner else { return };

            let mut instr_sum = 0u64;
            let mut cycles_sum = 0u64;
            for state in core_states {
                let state = state.lock();
                if !state.disabled {
                    instr_sum += state.instr_retired_delta;
                    cycles_sum += state.cpu_cycles_delta;
                }
            }

            let decision = tuner.decide(instr_sum, cycles_sum, bw, cfg.ddr_bw_target);
            if decision.changed {
                for module in 0..cfg.module_count() {
                    apply_decision(module_states, module, decision.desired_msr);
                }
            }
        }
    }
}

fn apply_decision(module_states: &[Mutex<Option<ModuleState>>], module: usize, desired_msr: u64) {
    let mut slot = module_states[module].lock();
    if let Some(state) = slot.as_mut() {
        if state.desired_msr != desired_msr {
            state.desired_msr = desired_msr;
            state.msr_dirty = true;
        }
    }
}
