//! MSR (Model-Specific Register) read/write primitives.
//!
//! Two layers are provided: free functions (`read_msr`/`write_msr`) that
//! open `/dev/cpu/*/msr` fresh on every call, for one-off reads (topology
//! probing, the DMI/CPUID-adjacent helpers); and the [`MsrTransport`] trait,
//! which keeps one open file handle per core for the hot per-tick path in
//! the gateway (`dptune::hw::gateway::MsrGateway`). Tests substitute
//! [`MsrTransport`] with an in-memory fake; nothing above this layer talks
//! to `/dev/cpu/*/msr` directly.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;

pub type Result<T> = std::result::Result<T, MsrError>;

/// Errors that can occur during MSR operations
#[derive(Debug, thiserror::Error)]
pub enum MsrError {
    #[error("Failed to open MSR device for CPU {cpu}: {source}")]
    OpenFailed { cpu: u32, source: std::io::Error },

    #[error("Failed to read MSR 0x{msr:X} on CPU {cpu}: {source}")]
    ReadFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },

    #[error("Failed to write MSR 0x{msr:X} on CPU {cpu}: {source}")]
    WriteFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },

    #[error("Failed to seek to MSR 0x{msr:X} on CPU {cpu}: {source}")]
    SeekFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },
}

/// Read a 64-bit value from an MSR, opening the device file for this call only.
///
/// # Example
///
/// ```ignore
/// use dptune_hw::read_msr;
///
/// let value = read_msr(0, 0xCE)?;
/// println!("MSR 0xCE = 0x{:016X}", value);
/// ```
pub fn read_msr(cpu: u32, msr: u64) -> Result<u64> {
    let path = format!("/dev/cpu/{cpu}/msr");
    let mut file = File::open(&path).map_err(|e| MsrError::OpenFailed { cpu, source: e })?;

    file.seek(SeekFrom::Start(msr))
        .map_err(|e| MsrError::SeekFailed {
            cpu,
            msr,
            source: e,
        })?;

    let mut buffer = [0u8; 8];
    file.read_exact(&mut buffer)
        .map_err(|e| MsrError::ReadFailed {
            cpu,
            msr,
            source: e,
        })?;

    Ok(u64::from_le_bytes(buffer))
}

/// Write a 64-bit value to an MSR, opening the device file for this call only.
///
/// # Safety
///
/// Writing incorrect values to MSRs can cause system instability or crashes.
/// Prefer a typed [`crate::register::RegisterLayout`] and validate it before
/// converting to a raw value.
pub fn write_msr(cpu: u32, msr: u64, value: u64) -> Result<()> {
    let path = format!("/dev/cpu/{cpu}/msr");
    let mut file = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_SYNC)
        .open(&path)
        .map_err(|e| MsrError::OpenFailed { cpu, source: e })?;

    file.seek(SeekFrom::Start(msr))
        .map_err(|e| MsrError::SeekFailed {
            cpu,
            msr,
            source: e,
        })?;

    file.write_all(&value.to_le_bytes())
        .map_err(|e| MsrError::WriteFailed {
            cpu,
            msr,
            source: e,
        })?;

    Ok(())
}

/// A per-core channel for repeated MSR reads/writes, held open for the
/// lifetime of the owning worker thread.
///
/// Implementors own exactly one logical CPU's channel; nothing in this
/// crate shares an `MsrTransport` across threads.
pub trait MsrTransport: Sized {
    /// Acquire the channel for `cpu`. Should fail with a permission/
    /// availability error rather than panicking.
    fn open(cpu: u32) -> Result<Self>;

    fn read(&mut self, addr: u64) -> Result<u64>;

    fn write(&mut self, addr: u64, value: u64) -> Result<()>;

    fn cpu(&self) -> u32;
}

/// Production [`MsrTransport`] backed by `/dev/cpu/{cpu}/msr`.
pub struct DevMsrTransport {
    file: File,
    cpu: u32,
}

impl MsrTransport for DevMsrTransport {
    fn open(cpu: u32) -> Result<Self> {
        let path = format!("/dev/cpu/{cpu}/msr");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&path)
            .map_err(|e| MsrError::OpenFailed { cpu, source: e })?;
        Ok(Self { file, cpu })
    }

    fn read(&mut self, addr: u64) -> Result<u64> {
        self.file
            .seek(SeekFrom::Start(addr))
            .map_err(|e| MsrError::SeekFailed {
                cpu: self.cpu,
                msr: addr,
                source: e,
            })?;
        let mut buffer = [0u8; 8];
        self.file
            .read_exact(&mut buffer)
            .map_err(|e| MsrError::ReadFailed {
                cpu: self.cpu,
                msr: addr,
                source: e,
            })?;
        Ok(u64::from_le_bytes(buffer))
    }

    fn write(&mut self, addr: u64, value: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(addr))
            .map_err(|e| MsrError::SeekFailed {
                cpu: self.cpu,
                msr: addr,
                source: e,
            })?;
        self.file
            .write_all(&value.to_le_bytes())
            .map_err(|e| MsrError::WriteFailed {
                cpu: self.cpu,
                msr: addr,
                source: e,
            })?;
        Ok(())
    }

    fn cpu(&self) -> u32 {
        self.cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msr_error_display() {
        let err = MsrError::OpenFailed {
            cpu: 0,
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("Failed to open MSR device"));
    }
}
