//! MSR gateway: the per-core channel through which a worker
//! programs performance events, enables fixed counters, and reads/writes
//! the shared prefetcher MSR. Generic over [`MsrTransport`] so tests can
//! substitute an in-memory fake for `/dev/cpu/*/msr`.

use dptune_hw::msr::MsrTransport;
use dptune_hw::pmu_events::{PmuEvent, EVENTS, PERFEVTSEL_ADDRS};
use dptune_hw::prefetch::PREFETCH_MSR;
use dptune_hw::register::RegisterLayout;

use crate::error::{DpfError, Result};

/// Architectural "enable all fixed counters" MSR (IA32_PERF_GLOBAL_CTRL is
/// 0x38F; the fixed-counter enable bits live in IA32_FIXED_CTR_CTRL, 0x38D).
const IA32_FIXED_CTR_CTRL: u64 = 0x38D;
const IA32_PERF_GLOBAL_CTRL: u64 = 0x38F;

/// Enable bits for both fixed counters (instructions, unhalted cycles) in
/// OS+USR mode, plus the seven programmable PMCs, in the global control MSR.
const FIXED_CTR0_ENABLE: u64 = 0b0011;
const FIXED_CTR1_ENABLE: u64 = 0b0011 << 4;
const GLOBAL_CTRL_ENABLE_ALL: u64 = 0x7F | (0b11 << 32);

pub struct MsrGateway<T: MsrTransport> {
    transport: T,
}

impl<T: MsrTransport> MsrGateway<T> {
    pub fn open(core_id: u32) -> Result<Self> {
        let transport = T::open(core_id).map_err(|e| {
            DpfError::PermissionDenied(format!("opening MSR channel for core {core_id}: {e}"))
        })?;
        Ok(Self { transport })
    }

    pub fn core_id(&self) -> u32 {
        self.transport.cpu()
    }

    pub fn read(&mut self, msr_addr: u64) -> Result<u64> {
        Ok(self.transport.read(msr_addr)?)
    }

    pub fn write(&mut self, msr_addr: u64, value: u64) -> Result<()> {
        Ok(self.transport.write(msr_addr, value)?)
    }

    pub fn read_prefetch_msr(&mut self) -> Result<u64> {
        self.read(PREFETCH_MSR)
    }

    pub fn write_prefetch_msr(&mut self, value: u64) -> Result<()> {
        self.write(PREFETCH_MSR, value)
    }

    /// Sets the architectural bit that lets the two fixed counters
    /// (instructions retired, unhalted core cycles) tick.
    pub fn enable_fixed_counters(&mut self) -> Result<()> {
        self.write(IA32_FIXED_CTR_CTRL, FIXED_CTR0_ENABLE | FIXED_CTR1_ENABLE)?;
        self.write(IA32_PERF_GLOBAL_CTRL, GLOBAL_CTRL_ENABLE_ALL)?;
        Ok(())
    }

    /// Programs the seven event-select MSRs (0x186..0x18C) with the fixed
    /// event table.
    pub fn configure_programmable_events(&mut self) -> Result<()> {
        self.configure_events(&EVENTS)
    }

    fn configure_events(&mut self, events: &[PmuEvent]) -> Result<()> {
        for (i, event) in events.iter().enumerate() {
            let value = event.evtsel().to_msr_value();
            self.write(PERFEVTSEL_ADDRS[i], value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dptune_hw::msr::{MsrError, Result as MsrResult};
    use std::collections::HashMap;

    struct FakeTransport {
        cpu: u32,
        regs: HashMap<u64, u64>,
    }

    impl MsrTransport for FakeTransport {
        fn open(cpu: u32) -> MsrResult<Self> {
            Ok(Self {
                cpu,
                regs: HashMap::new(),
            })
        }

        fn read(&mut self, addr: u64) -> MsrResult<u64> {
            Ok(*self.regs.get(&addr).unwrap_or(&0))
        }

        fn write(&mut self, addr: u64, value: u64) -> MsrResult<()> {
            self.regs.insert(addr, value);
            Ok(())
        }

        fn cpu(&self) -> u32 {
            self.cpu
        }
    }

    #[allow(dead_code)]
    fn unused(_: MsrError) {}

    #[test]
    fn write_then_read_prefetch_msr_round_trips() {
        let mut gw = MsrGateway::<FakeTransport>::open(8).unwrap();
        gw.write_prefetch_msr(0x3F).unwrap();
        assert_eq!(gw.read_prefetch_msr().unwrap(), 0x3F);
    }

    #[test]
    fn configure_programmable_events_writes_seven_registers() {
        let mut gw = MsrGateway::<FakeTransport>::open(0).unwrap();
        gw.configure_programmable_events().unwrap();
        for addr in PERFEVTSEL_ADDRS {
            assert_ne!(gw.read(addr).unwrap(), 0);
        }
    }

    #[test]
    fn enable_fixed_counters_sets_global_ctrl() {
        let mut gw = MsrGateway::<FakeTransport>::open(0).unwrap();
        gw.enable_fixed_counters().unwrap();
        assert_eq!(
            gw.read(IA32_PERF_GLOBAL_CTRL).unwrap(),
            GLOBAL_CTRL_ENABLE_ALL
        );
    }
}
