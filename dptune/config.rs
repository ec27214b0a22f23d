//! CLI surface and the construction of the immutable
//! [`crate::state::GlobalConfig`] the control loop runs with.

use clap::Parser;

use crate::error::{DpfError, Result};
use crate::state::{GlobalConfig, TuneAlg};

const DEFAULT_PRIORITY: u8 = 50;
const DEFAULT_UTILIZATION_FACTOR: f64 = 0.70;
const MIN_TICK_INTERVAL: f64 = 0.0001;
const MAX_TICK_INTERVAL: f64 = 60.0;
const MIN_AGGRESSIVENESS: f64 = 0.1;
const MAX_AGGRESSIVENESS: f64 = 5.0;

#[derive(Parser, Debug, Clone)]
#[command(name = "dptune", about = "Dynamic hardware prefetcher tuner")]
pub struct Cli {
    /// Inclusive core range, `a` or `a-b`. Auto-detected from E-core
    /// topology when omitted.
    #[arg(short = 'c', long = "core")]
    pub core: Option<String>,

    /// Use DMI theoretical bandwidth times this factor as the target.
    #[arg(short = 'd', long = "ddrbw-auto")]
    pub ddrbw_auto: Option<f64>,

    /// Measure peak bandwidth via a self-test burst.
    #[arg(short = 't', long = "ddrbw-test")]
    pub ddrbw_test: bool,

    /// Use this bandwidth target directly (MB/s).
    #[arg(short = 'D', long = "ddrbw-set")]
    pub ddrbw_set: Option<i64>,

    /// Tick interval in seconds, clamped to [0.0001, 60].
    #[arg(short = 'i', long = "intervall", default_value_t = 1.0)]
    pub intervall: f64,

    /// 0/1 = basic variants, 2 = MAB.
    #[arg(short = 'A', long = "alg", default_value_t = 0)]
    pub alg: u8,

    /// Aggressiveness, clamped to [0.1, 5.0].
    #[arg(short = 'a', long = "aggr", default_value_t = 1.0)]
    pub aggr: f64,

    /// CSV of per-core priorities (0..99), short lists padded with 50.
    #[arg(short = 'w', long = "weight")]
    pub weight: Option<String>,

    /// Log level, 1..5.
    #[arg(short = 'l', long = "log", default_value_t = 3)]
    pub log: u8,
}

/// Parses `--core a` or `--core a-b` into an inclusive `(first, last)`.
pub fn parse_core_range(s: &str) -> Result<(i32, i32)> {
    if let Some((lo, hi)) = s.split_once('-') {
        let lo: i32 = lo
            .trim()
            .parse()
            .map_err(|_| DpfError::ConfigurationError(format!("invalid core range: {s}")))?;
        let hi: i32 = hi
            .trim()
            .parse()
            .map_err(|_| DpfError::ConfigurationError(format!("invalid core range: {s}")))?;
        if hi < lo {
            return Err(DpfError::ConfigurationError(format!(
                "core range end before start: {s}"
            )));
        }
        Ok((lo, hi))
    } else {
        let v: i32 = s
            .trim()
            .parse()
            .map_err(|_| DpfError::ConfigurationError(format!("invalid core: {s}")))?;
        Ok((v, v))
    }
}

/// Parses a CSV priority list, clamping each value to `0..99` and padding
/// short lists with the default priority of 50 up to `active_threads`
/// for a config with more active cores than supplied weights.
pub fn parse_weights(csv: &str, active_threads: usize) -> Result<Vec<u8>> {
    let mut values = Vec::with_capacity(active_threads);
    for part in csv.split(',') {
        if values.len() == active_threads {
            break;
        }
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let v: i64 = part
            .parse()
            .map_err(|_| DpfError::ConfigurationError(format!("invalid weight: {part}")))?;
        values.push(v.clamp(0, 99) as u8);
    }
    while values.len() < active_threads {
        values.push(DEFAULT_PRIORITY);
    }
    values.truncate(active_threads);
    Ok(values)
}

fn clamp_tick_interval(v: f64) -> std::time::Duration {
    std::time::Duration::from_secs_f64(v.clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL))
}

fn clamp_aggressiveness(v: f64) -> f64 {
    v.clamp(MIN_AGGRESSIVENESS, MAX_AGGRESSIVENESS)
}

/// Builds the immutable [`GlobalConfig`] the control loop runs with,
/// resolving the core range (explicit flag or topology auto-detection)
/// and the per-core priority vector. Bandwidth-target resolution happens
/// separately in `crate::ddr`, since it needs the DDR oracle.
pub fn build_global_config(cli: &Cli) -> Result<GlobalConfig> {
    let (core_first, core_last) = match &cli.core {
        Some(s) => parse_core_range(s)?,
        None => crate::topology::efficient_cores()?,
    };

    let active_threads = (core_last - core_first + 1) as usize;
    let priority = match &cli.weight {
        Some(csv) => parse_weights(csv, active_threads)?,
        None => vec![DEFAULT_PRIORITY; active_threads],
    };

    let tune_alg = TuneAlg::from_flag(cli.alg)
        .ok_or_else(|| DpfError::ConfigurationError(format!("invalid --alg value: {}", cli.alg)))?;

    Ok(GlobalConfig {
        core_first,
        core_last,
        tick_interval: clamp_tick_interval(cli.intervall),
        aggressiveness: clamp_aggressiveness(cli.aggr),
        ddr_bw_target: 0.0, // resolved by crate::ddr::resolve_ddr_bw_target after oracle init
        tune_alg,
        priority,
    })
}

pub fn utilization_factor(cli: &Cli) -> f64 {
    cli.ddrbw_auto.unwrap_or(DEFAULT_UTILIZATION_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_core_range() {
        assert_eq!(parse_core_range("8-11").unwrap(), (8, 11));
    }

    #[test]
    fn parses_single_core() {
        assert_eq!(parse_core_range("8").unwrap(), (8, 8));
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(parse_core_range("11-8").is_err());
    }

    #[test]
    fn weight_list_padded_to_four_cores() {
        assert_eq!(parse_weights("10,20,30,40", 4).unwrap(), vec![10, 20, 30, 40]);
        assert_eq!(parse_weights("10,20,30", 4).unwrap(), vec![10, 20, 30, 50]);
        assert_eq!(
            parse_weights("10,20,30,40", 6).unwrap(),
            vec![10, 20, 30, 40, 50, 50]
        );
    }

    #[test]
    fn weight_short_list_padding_matches_s6() {
        assert_eq!(parse_weights("99,10", 4).unwrap(), vec![99, 10, 50, 50]);
    }

    #[test]
    fn tick_interval_clamps_both_ends() {
        assert_eq!(clamp_tick_interval(0.0).as_secs_f64(), MIN_TICK_INTERVAL);
        assert_eq!(clamp_tick_interval(100.0).as_secs_f64(), MAX_TICK_INTERVAL);
    }

    #[test]
    fn aggressiveness_clamps_both_ends() {
        assert_eq!(clamp_aggressiveness(0.0), MIN_AGGRESSIVENESS);
        assert_eq!(clamp_aggressiveness(10.0), MAX_AGGRESSIVENESS);
    }
}
