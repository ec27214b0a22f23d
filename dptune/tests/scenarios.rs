//! End-to-end scenario tests for the basic and MAB tuners, driven
//! directly against the tuner types. The full control loop — barrier,
//! gateway, and worker pool wired together over a fake MSR transport — is
//! exercised separately in `worker_pool.rs`.

use dptune::config::parse_weights;
use dptune_hw::prefetch::MAX_LEVEL;

// S1 — Basic tuner converges downward under overload.
#[test]
fn s1_basic_tuner_converges_downward_under_overload() {
    let mut tuner = dptune::tuner::basic::BasicTuner::new(1);
    for _ in 0..=(MAX_LEVEL + 1) {
        tuner.decide(0, 40000.0, 20000.0, 1.0, 0.0, false);
    }
    assert_eq!(tuner.level(0), 0);
}

// S2 — Basic tuner climbs under slack.
#[test]
fn s2_basic_tuner_climbs_under_slack() {
    let mut tuner = dptune::tuner::basic::BasicTuner::new(1);
    for _ in 0..=(MAX_LEVEL + 1) {
        tuner.decide(0, 5000.0, 20000.0, 1.0, 0.0, false);
    }
    assert_eq!(tuner.level(0), MAX_LEVEL);
}

// S3 — MAB explores then exploits: arm 2 yields IPC 2.0, others 1.0.
#[test]
fn s3_mab_explores_then_exploits() {
    let mut mab = dptune::tuner::mab::MabTuner::new(
        vec![1, 2, 3, 4],
        1.0,
        dptune::tuner::mab::DynamicSdMode::Off,
        4,
    );

    // Initial round-robin sweep of 4 ticks.
    for _ in 0..4 {
        mab.decide(1000, 1000, 0.0, 1_000_000.0);
    }

    let mut arm2_hits = 0;
    for _ in 0..100 {
        let instr = if mab.chosen_arm() == 2 { 2000 } else { 1000 };
        mab.decide(instr, 1000, 0.0, 1_000_000.0);
        if mab.chosen_arm() == 2 {
            arm2_hits += 1;
        }
    }
    assert!(arm2_hits >= 80, "arm2_hits={arm2_hits}");
}

// S4 — Bandwidth cap penalizes a high-reward arm that also blows the cap.
#[test]
fn s4_bandwidth_cap_penalizes_high_reward_arm() {
    let mut mab = dptune::tuner::mab::MabTuner::new(
        vec![1, 2, 3, 4],
        1.0,
        dptune::tuner::mab::DynamicSdMode::Off,
        4,
    );

    for _ in 0..4 {
        mab.decide(1000, 1000, 0.0, 20000.0);
    }

    let mut arm2_hits = 0;
    for _ in 0..50 {
        let chosen = mab.chosen_arm();
        let (instr, bw) = if chosen == 2 {
            (2000, 60000.0)
        } else {
            (1000, 5000.0)
        };
        mab.decide(instr, 1000, bw, 20000.0);
        if mab.chosen_arm() == 2 {
            arm2_hits += 1;
        }
    }
    assert!(arm2_hits as f64 <= 50.0 * 0.5, "arm2_hits={arm2_hits}");
}

// S6 — Weight short-list padding.
#[test]
fn s6_weight_short_list_padding() {
    let priorities = parse_weights("99,10", 4).unwrap();
    assert_eq!(priorities, vec![99, 10, 50, 50]);
}

// Round-trip / idempotence checks for weight-list parsing.
#[test]
fn weight_round_trip_four_active_cores() {
    assert_eq!(
        parse_weights("10,20,30,40", 4).unwrap(),
        vec![10, 20, 30, 40]
    );
}

#[test]
fn weight_round_trip_three_active_cores() {
    assert_eq!(parse_weights("10,20,30,40", 3).unwrap(), vec![10, 20, 30]);
}

#[test]
fn weight_round_trip_six_active_cores() {
    assert_eq!(
        parse_weights("10,20,30,40", 6).unwrap(),
        vec![10, 20, 30, 40, 50, 50]
    );
}

#[test]
fn core_range_round_trip() {
    let (first, last) = dptune::config::parse_core_range("8-11").unwrap();
    assert_eq!((first, last), (8, 11));
    assert_eq!((last - first + 1) as usize, 4);
}
