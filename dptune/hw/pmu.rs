//! PMU sampler: a stateless read of the seven programmed
//! counters plus the two architectural fixed counters. Delta computation is
//! the worker's job (`CoreState::apply_sample`), not the sampler's.

use dptune_hw::msr::MsrTransport;
use dptune_hw::pmu_events::{PMC_ADDRS, PMU_COUNTERS};

use crate::error::Result;
use crate::hw::gateway::MsrGateway;

/// IA32_FIXED_CTR0 (instructions retired), IA32_FIXED_CTR1 (unhalted core
/// cycles) — architectural, fixed addresses across Intel generations.
const IA32_FIXED_CTR0: u64 = 0x309;
const IA32_FIXED_CTR1: u64 = 0x30A;

pub struct PmuSample {
    pub counters: [u64; PMU_COUNTERS],
    pub instr_retired: u64,
    pub cpu_cycles: u64,
}

/// Reads the seven programmable counters (0xC1..0xC7 region) and the two
/// fixed counters. 64-bit wrap is not handled here.
pub fn sample<T: MsrTransport>(gateway: &mut MsrGateway<T>) -> Result<PmuSample> {
    let mut counters = [0u64; PMU_COUNTERS];
    for (i, addr) in PMC_ADDRS.iter().enumerate() {
        counters[i] = gateway.read(*addr)?;
    }
    let instr_retired = gateway.read(IA32_FIXED_CTR0)?;
    let cpu_cycles = gateway.read(IA32_FIXED_CTR1)?;

    Ok(PmuSample {
        counters,
        instr_retired,
        cpu_cycles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dptune_hw::msr::{MsrError, MsrTransport as _, Result as MsrResult};
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
    fn sample_reads_all_programmable_and_fixed_counters() {
        let mut gw = MsrGateway::<FakeTransport>::open(8).unwrap();
        for (i, addr) in PMC_ADDRS.iter().enumerate() {
            gw.write(*addr, (i as u64) + 1).unwrap();
        }
        gw.write(IA32_FIXED_CTR0, 1000).unwrap();
        gw.write(IA32_FIXED_CTR1, 2000).unwrap();

        let s = sample(&mut gw).unwrap();
        assert_eq!(s.counters[3], 4);
        assert_eq!(s.instr_retired, 1000);
        assert_eq!(s.cpu_cycles, 2000);
    }
}
