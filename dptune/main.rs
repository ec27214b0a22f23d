use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use dptune::config::{self, Cli};
use dptune::ddr::{self, selftest};
use dptune::dmi;
use dptune::error::{DpfError, Result};
use dptune::tuner::mab::DynamicSdMode;
use dptune_hw::msr::DevMsrTransport;

/// Set from the SIGINT handler, polled at the top of `main`'s join loop.
/// A raw `libc::signal` handler can only touch a `'static` atomic, not a
/// per-run `Arc` — mirrors the original process-wide `quitflag`, but
/// without the dynamic-SD buffer free the reference implementation does
/// from inside the handler; buffer teardown here happens in the shutdown
/// path after join instead.
static QUIT_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_sig: libc::c_int) {
    QUIT_REQUESTED.store(true, Ordering::Release);
}

fn install_signal_handler() {
    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_sigint as libc::sighandler_t);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    dptune::log::set_level(cli.log);

    let mut cfg = config::build_global_config(&cli)?;
    tracing::info!(
        "starting control loop on cores {}..={}, alg={:?}",
        cfg.core_first,
        cfg.core_last,
        cfg.tune_alg
    );

    let selftest_peak = if cli.ddrbw_test {
        Some(selftest::measure_peak_mb_s(cfg.core_first)?)
    } else {
        None
    };
    let dmi_theoretical = {
        let v = dmi::theoretical_bandwidth_mb_s();
        if v > 0 {
            Some(v as f64)
        } else {
            None
        }
    };

    cfg.ddr_bw_target = ddr::resolve_ddr_bw_target(
        cli.ddrbw_set.map(|v| v as f64),
        selftest_peak,
        dmi_theoretical,
        config::utilization_factor(&cli),
    )?;
    tracing::info!("ddr_bw_target = {:.1} MB/s", cfg.ddr_bw_target);

    let oracle_source = ddr::select_source(&cfg);
    let oracle = ddr::DdrBandwidthOracle::new(oracle_source);

    let arms: Vec<u64> = dptune_hw::prefetch::PREFETCH_LEVELS
        .iter()
        .map(|level| level.value)
        .collect();

    install_signal_handler();

    let cfg = Arc::new(cfg);
    let pool = dptune::worker::WorkerPool::spawn::<DevMsrTransport>(
        Arc::clone(&cfg),
        oracle,
        arms,
        DynamicSdMode::Off,
    )?;

    while !QUIT_REQUESTED.load(Ordering::Acquire) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    tracing::info!("shutdown requested, restoring prefetcher MSRs");
    pool.request_shutdown();
    pool.join()?;
    tracing::info!("shutdown complete");

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("dptune: {e}");
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(e: &DpfError) -> i32 {
    e.exit_code()
}
