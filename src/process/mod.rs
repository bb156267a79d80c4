use procfs::{
    process::Process as ProcfsProcess,
    ProcError,
};
use std::convert::TryFrom;
use std::path::Path;

mod status;

pub use status::ProcessStatus;

/// The kernel truncates `comm` to this many bytes.
const COMM_LEN: usize = 15;

/// One row of a process snapshot. Rebuilt from scratch on every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    /// Raw usage where one fully busy core is 100.
    pub cpu_percent: f32,
    /// Resident set size.
    pub memory_bytes: u64,
    pub status: ProcessStatus,
}

/// A single read of `/proc/<pid>`, before CPU usage is derived from the previous sample.
#[derive(Debug, Clone)]
pub struct ProcessReading {
    pub record: ProcessRecord,
    /// utime + stime, in clock ticks.
    pub cpu_ticks: u64,
    /// Start time after boot, in clock ticks. Together with the pid this identifies a process.
    pub start_time: u64,
}

impl TryFrom<&ProcfsProcess> for ProcessReading {
    type Error = ProcError;

    fn try_from(procfs_proc: &ProcfsProcess) -> Result<Self, Self::Error> {
        let stat = procfs_proc.stat()?;
        let page_size: u64 = procfs::page_size();

        let name = if stat.comm.len() >= COMM_LEN {
            // cmdline is unreadable for some kernel threads and foreign processes; comm is enough
            match procfs_proc.cmdline() {
                Ok(cmdline) => full_name(&stat.comm, &cmdline),
                Err(_) => stat.comm.clone(),
            }
        } else {
            stat.comm.clone()
        };

        Ok(ProcessReading {
            record: ProcessRecord {
                pid: stat.pid as u32,
                name,
                cpu_percent: 0.0,
                memory_bytes: stat.rss as u64 * page_size,
                status: ProcessStatus::from(stat.state),
            },
            cpu_ticks: stat.utime + stat.stime,
            start_time: stat.starttime,
        })
    }
}

/// Recovers the untruncated executable name from `argv[0]` when `comm` was cut short.
fn full_name(comm: &str, cmdline: &[String]) -> String {
    let Some(argv0) = cmdline.first() else {
        return comm.to_string();
    };
    match Path::new(argv0).file_name().and_then(|n| n.to_str()) {
        Some(base) if base.starts_with(comm) => base.to_string(),
        _ => comm.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_extends_truncated_comm() {
        let cmdline = vec![
            "/usr/lib/gnome-settings-daemon".to_string(),
            "--replace".to_string(),
        ];
        assert_eq!(full_name("gnome-settings-", &cmdline), "gnome-settings-daemon");
    }

    #[test]
    fn full_name_keeps_comm_when_argv0_differs() {
        let cmdline = vec!["/usr/bin/python3".to_string()];
        assert_eq!(full_name("my-long-worker-", &cmdline), "my-long-worker-");
        assert_eq!(full_name("my-long-worker-", &[]), "my-long-worker-");
    }

    #[test]
    fn reads_own_process() {
        let pid = std::process::id();
        let reading = ProcessReading::try_from(&ProcfsProcess::myself().unwrap()).unwrap();
        assert_eq!(reading.record.pid, pid);
        assert!(reading.record.memory_bytes > 0);
        assert!(!reading.record.name.is_empty());
    }
}
