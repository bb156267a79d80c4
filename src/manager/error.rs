use std::time::Duration;

use nix::errno::Errno;
use procfs::ProcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Process not found (PID {pid})")]
    NotFound { pid: u32 },

    #[error("Access denied (PID {pid})")]
    AccessDenied { pid: u32 },

    #[error("Process {pid} did not exit within {timeout:?}")]
    TimeoutExpired { pid: u32, timeout: Duration },

    /// The process exited between being listed and being read.
    #[error("Process {pid} vanished during enumeration")]
    Vanished { pid: u32 },

    #[error("Failed to read process list: {0}")]
    Enumeration(#[source] ProcError),

    #[error("Failed to read PID {pid}: {source}")]
    Read {
        pid: u32,
        #[source]
        source: ProcError,
    },

    #[error("Failed to signal PID {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: Errno,
    },
}

/// True when `err` means the process exited while its `/proc` entry was being read.
pub fn is_vanished(err: &ProcError) -> bool {
    match err {
        ProcError::NotFound(_) => true,
        ProcError::Io(e, _) => e.raw_os_error() == Some(libc::ESRCH),
        _ => false,
    }
}

impl ProcessError {
    /// Classifies a failed `/proc/<pid>` read.
    pub fn from_proc(pid: u32, err: ProcError) -> Self {
        if is_vanished(&err) {
            return ProcessError::Vanished { pid };
        }
        match err {
            ProcError::PermissionDenied(_) => ProcessError::AccessDenied { pid },
            source => ProcessError::Read { pid, source },
        }
    }

    pub fn from_errno(pid: u32, errno: Errno) -> Self {
        match errno {
            Errno::ESRCH => ProcessError::NotFound { pid },
            Errno::EPERM => ProcessError::AccessDenied { pid },
            source => ProcessError::Signal { pid, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_maps_to_taxonomy() {
        assert!(matches!(
            ProcessError::from_errno(7, Errno::ESRCH),
            ProcessError::NotFound { pid: 7 }
        ));
        assert!(matches!(
            ProcessError::from_errno(7, Errno::EPERM),
            ProcessError::AccessDenied { pid: 7 }
        ));
        assert!(matches!(
            ProcessError::from_errno(7, Errno::EINVAL),
            ProcessError::Signal { pid: 7, .. }
        ));
    }

    #[test]
    fn missing_proc_entry_is_vanished() {
        let err = ProcessError::from_proc(9, ProcError::NotFound(None));
        assert!(matches!(err, ProcessError::Vanished { pid: 9 }));
        let err = ProcessError::from_proc(9, ProcError::PermissionDenied(None));
        assert!(matches!(err, ProcessError::AccessDenied { pid: 9 }));
    }

    #[test]
    fn esrch_while_reading_is_vanished() {
        let io = std::io::Error::from_raw_os_error(libc::ESRCH);
        let err = ProcessError::from_proc(9, ProcError::Io(io, None));
        assert!(matches!(err, ProcessError::Vanished { pid: 9 }));

        let io = std::io::Error::from_raw_os_error(libc::EIO);
        let err = ProcessError::from_proc(9, ProcError::Io(io, None));
        assert!(matches!(err, ProcessError::Read { pid: 9, .. }));
        assert!(!is_vanished(&ProcError::Other("bad stat".to_string())));
    }
}
