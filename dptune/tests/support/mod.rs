//! In-memory MSR fake shared by integration tests that need to drive the
//! real worker pool without `/dev/cpu/*/msr`. Backed by a process-wide
//! table keyed by `(cpu, msr address)` so a test can seed or inspect a
//! register after the worker threads that touched it have exited.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use dptune_hw::msr::{MsrError, MsrTransport, Result as MsrResult};
use once_cell::sync::Lazy;

static REGISTERS: Lazy<Mutex<HashMap<(u32, u64), u64>>> = Lazy::new(|| Mutex::new(HashMap::new()));

pub struct FakeTransport {
    cpu: u32,
}

impl MsrTransport for FakeTransport {
    fn open(cpu: u32) -> MsrResult<Self> {
        Ok(Self { cpu })
    }

    fn read(&mut self, addr: u64) -> MsrResult<u64> {
        Ok(*REGISTERS.lock().unwrap().get(&(self.cpu, addr)).unwrap_or(&0))
    }

    fn write(&mut self, addr: u64, value: u64) -> MsrResult<()> {
        REGISTERS.lock().unwrap().insert((self.cpu, addr), value);
        Ok(())
    }

    fn cpu(&self) -> u32 {
        self.cpu
    }
}

pub fn set_register(cpu: u32, addr: u64, value: u64) {
    REGISTERS.lock().unwrap().insert((cpu, addr), value);
}

pub fn read_register(cpu: u32, addr: u64) -> u64 {
    *REGISTERS.lock().unwrap().get(&(cpu, addr)).unwrap_or(&0)
}

static POISONED_CPU: AtomicU32 = AtomicU32::new(u32::MAX);

/// Same register table as [`FakeTransport`], except `open()` fails for
/// whichever CPU [`poison_cpu`] last named — lets a test exercise the
/// MSR-open failure path without real hardware.
pub struct FaultyTransport {
    inner: FakeTransport,
}

impl MsrTransport for FaultyTransport {
    fn open(cpu: u32) -> MsrResult<Self> {
        if POISONED_CPU.load(Ordering::Acquire) == cpu {
            return Err(MsrError::OpenFailed {
                cpu,
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        Ok(Self {
            inner: FakeTransport { cpu },
        })
    }

    fn read(&mut self, addr: u64) -> MsrResult<u64> {
        self.inner.read(addr)
    }

    fn write(&mut self, addr: u64, value: u64) -> MsrResult<()> {
        self.inner.write(addr, value)
    }

    fn cpu(&self) -> u32 {
        self.inner.cpu()
    }
}

pub fn poison_cpu(cpu: u32) {
    POISONED_CPU.store(cpu, Ordering::Release);
}
