use std::io;
use thiserror::Error;

/// The five error kinds named by the control loop's failure semantics.
///
/// `ConfigurationError` and `PermissionDenied` are startup-fatal.
/// `NotAvailable` is raised by a DDR bandwidth source that cannot be used on
/// this platform. `TransientIO` is caught per-tick and masked by reusing the
/// previous sample. `Fatal` means an invariant broke and the process must
/// restore MSRs and exit.
#[derive(Error, Debug)]
pub enum DpfError {
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not available: {0}")]
    NotAvailable(String),

    #[error("transient I/O error: {0}")]
    TransientIO(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("MSR error: {0}")]
    Msr(#[from] dptune_hw::MsrError),
}

pub type Result<T> = std::result::Result<T, DpfError>;

impl DpfError {
    /// Process exit code per §6: 0 ok, non-zero on startup/fatal failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            DpfError::ConfigurationError(_) => 2,
            DpfError::PermissionDenied(_) => 77,
            DpfError::NotAvailable(_) => 69,
            DpfError::Fatal(_) => 1,
            DpfError::TransientIO(_) => 1,
            DpfError::Io(_) | DpfError::Nix(_) | DpfError::Msr(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_exit_code_is_two() {
        let err = DpfError::ConfigurationError("no E-cores found".into());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn permission_denied_display() {
        let err = DpfError::PermissionDenied("/dev/cpu/0/msr".into());
        assert!(err.to_string().contains("permission denied"));
    }
}
