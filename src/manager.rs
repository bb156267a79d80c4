use std::collections::HashMap;
use std::time::Duration;

use crate::process::ProcessRecord;

pub mod error;
pub mod monitoring;
pub mod operations;

pub use error::ProcessError;
pub use monitoring::{CpuSample, Snapshot};

/// How long `terminate` waits for the process to exit after SIGTERM.
pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(3);

/// The operations the process table needs from the operating system.
pub trait ProcessControl {
    type Snapshot<'a>: Iterator<Item = ProcessRecord>
    where
        Self: 'a;

    /// Starts a new enumeration pass. Processes that exit while it runs are skipped.
    fn list_processes(&mut self) -> Result<Self::Snapshot<'_>, ProcessError>;

    fn terminate(&mut self, pid: u32) -> Result<(), ProcessError>;

    fn suspend(&mut self, pid: u32) -> Result<(), ProcessError>;

    fn resume(&mut self, pid: u32) -> Result<(), ProcessError>;

    /// Number of online logical CPUs, if it could be determined.
    fn logical_cores(&self) -> Option<usize>;
}

//Manager struct declaration
#[derive(Debug)]
pub struct Manager {
    /// Last CPU reading per (pid, start time), used to turn CPU ticks into a percentage.
    cpu_samples: HashMap<(u32, u64), CpuSample>,
    ticks_per_second: f64,
    logical_cores: Option<usize>,
    terminate_timeout: Duration,
}

impl Manager {
    pub fn new() -> Self {
        Manager {
            cpu_samples: HashMap::new(),
            ticks_per_second: procfs::ticks_per_second() as f64,
            logical_cores: monitoring::logical_cores(),
            terminate_timeout: TERMINATE_TIMEOUT,
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for Manager {
    type Snapshot<'a> = Snapshot<'a>;

    fn list_processes(&mut self) -> Result<Snapshot<'_>, ProcessError> {
        Snapshot::new(&mut self.cpu_samples, self.ticks_per_second)
    }

    fn terminate(&mut self, pid: u32) -> Result<(), ProcessError> {
        operations::terminate_process(pid, self.terminate_timeout)
    }

    fn suspend(&mut self, pid: u32) -> Result<(), ProcessError> {
        operations::suspend_process(pid)
    }

    fn resume(&mut self, pid: u32) -> Result<(), ProcessError> {
        operations::resume_process(pid)
    }

    fn logical_cores(&self) -> Option<usize> {
        self.logical_cores
    }
}
