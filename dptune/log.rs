//! Thin shim over `tracing` mapping the CLI's numeric log-level flag onto
//! `verbose`/`info`/`warn`/`error`. The control loop itself
//! calls `tracing::{debug,info,warn,error}!` directly; this module exists
//! for the one piece of runtime-configurable behavior the CLI exposes —
//! mapping `--log 1..5` onto a `tracing` filter.

use tracing_subscriber::EnvFilter;

/// Maps the CLI's `1..5` log-level scale onto `tracing` levels: `1` is the
/// quietest (errors only), `5` the most verbose (trace).
pub fn set_level(level: u8) {
    let directive = match level.clamp(1, 5) {
        1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Level 4 messages — extra detail beyond `info`, gated by `--log 4`.
pub fn verbose(msg: &str) {
    tracing::debug!("{msg}");
}

pub fn info(msg: &str) {
    tracing::info!("{msg}");
}

pub fn warn(msg: &str) {
    tracing::warn!("{msg}");
}

pub fn error(msg: &str) {
    tracing::error!("{msg}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_level_does_not_panic_across_the_full_range() {
        for level in 0..=6 {
            set_level(level);
        }
    }

    #[test]
    fn wrappers_do_not_panic() {
        verbose("v");
        info("i");
        warn("w");
        error("e");
    }
}
