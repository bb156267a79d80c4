use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use std::time::Instant;

use procfs::process::ProcessesIter;
use tracing::{debug, trace};

use crate::manager::error::is_vanished;
use crate::manager::ProcessError;
use crate::process::{ProcessReading, ProcessRecord};

/// CPU time a process had consumed at a given moment.
#[derive(Debug, Clone, Copy)]
pub struct CpuSample {
    pub cpu_ticks: u64,
    pub taken_at: Instant,
}

/// Number of online logical CPUs.
pub fn logical_cores() -> Option<usize> {
    let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if count > 0 { Some(count as usize) } else { None }
}

/// CPU usage between two samples, where one fully busy core is 100.
pub fn cpu_percent(previous: &CpuSample, current: &CpuSample, ticks_per_second: f64) -> f32 {
    let delta_ticks = current.cpu_ticks.saturating_sub(previous.cpu_ticks);
    let delta_wall = current
        .taken_at
        .saturating_duration_since(previous.taken_at)
        .as_secs_f64();

    if delta_wall > 0.0 && ticks_per_second > 0.0 {
        ((delta_ticks as f64 / ticks_per_second) / delta_wall * 100.0) as f32
    } else {
        0.0
    }
}

/// One enumeration pass over `/proc`.
///
/// The iterator is lazy: each process is read when it is yielded, so a process that exits
/// before its turn is simply not part of the snapshot. Once exhausted, samples of processes
/// that were not seen are dropped from the CPU sample table. A snapshot dropped early prunes
/// nothing, since the processes it never reached may still be alive; the next fully drained
/// snapshot removes whatever is stale.
pub struct Snapshot<'a> {
    processes: ProcessesIter,
    cpu_samples: &'a mut HashMap<(u32, u64), CpuSample>,
    seen: HashSet<(u32, u64)>,
    ticks_per_second: f64,
    taken_at: Instant,
    finished: bool,
}

impl<'a> Snapshot<'a> {
    pub fn new(
        cpu_samples: &'a mut HashMap<(u32, u64), CpuSample>,
        ticks_per_second: f64,
    ) -> Result<Self, ProcessError> {
        let processes = procfs::process::all_processes().map_err(ProcessError::Enumeration)?;
        Ok(Snapshot {
            processes,
            cpu_samples,
            seen: HashSet::new(),
            ticks_per_second,
            taken_at: Instant::now(),
            finished: false,
        })
    }

    fn sample(&mut self, reading: ProcessReading) -> ProcessRecord {
        let key = (reading.record.pid, reading.start_time);
        let current = CpuSample {
            cpu_ticks: reading.cpu_ticks,
            taken_at: self.taken_at,
        };

        let mut record = reading.record;
        // First time seeing this process: no usage until the next snapshot
        record.cpu_percent = match self.cpu_samples.insert(key, current) {
            Some(previous) => cpu_percent(&previous, &current, self.ticks_per_second),
            None => 0.0,
        };
        self.seen.insert(key);
        record
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            let seen = &self.seen;
            self.cpu_samples.retain(|key, _| seen.contains(key));
        }
    }
}

impl Iterator for Snapshot<'_> {
    type Item = ProcessRecord;

    fn next(&mut self) -> Option<ProcessRecord> {
        if self.finished {
            return None;
        }
        loop {
            let procfs_proc = match self.processes.next() {
                Some(Ok(p)) => p,
                Some(Err(e)) => {
                    if is_vanished(&e) {
                        trace!(error = %e, "process vanished during enumeration");
                    } else {
                        debug!(error = %e, "skipping unreadable /proc entry");
                    }
                    continue;
                }
                None => {
                    self.finish();
                    return None;
                }
            };

            let pid = procfs_proc.pid as u32;
            match ProcessReading::try_from(&procfs_proc) {
                Ok(reading) => return Some(self.sample(reading)),
                Err(e) => match ProcessError::from_proc(pid, e) {
                    ProcessError::Vanished { .. } => {
                        trace!(pid, "process vanished during enumeration")
                    }
                    err => debug!(pid, error = %err, "skipping process"),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cpu_percent_is_relative_to_one_core() {
        let start = Instant::now();
        let previous = CpuSample { cpu_ticks: 100, taken_at: start };
        // 200 ticks at 100 Hz over one second: two cores fully busy
        let current = CpuSample {
            cpu_ticks: 300,
            taken_at: start + Duration::from_secs(1),
        };
        let percent = cpu_percent(&previous, &current, 100.0);
        assert!((percent - 200.0).abs() < 1e-3);
    }

    #[test]
    fn cpu_percent_without_elapsed_time_is_zero() {
        let now = Instant::now();
        let previous = CpuSample { cpu_ticks: 10, taken_at: now };
        let current = CpuSample { cpu_ticks: 50, taken_at: now };
        assert_eq!(cpu_percent(&previous, &current, 100.0), 0.0);
    }

    #[test]
    fn snapshot_contains_own_pid() {
        let mut samples = HashMap::new();
        let own = std::process::id();
        let records: Vec<ProcessRecord> = Snapshot::new(&mut samples, 100.0).unwrap().collect();
        let me = records.iter().find(|r| r.pid == own).expect("own process listed");
        assert_eq!(me.cpu_percent, 0.0);
        assert!(samples.keys().any(|(pid, _)| *pid == own));
    }

    #[test]
    fn second_snapshot_drops_exited_processes_from_samples() {
        let mut samples = HashMap::new();
        samples.insert(
            (u32::MAX, 0),
            CpuSample { cpu_ticks: 0, taken_at: Instant::now() },
        );
        let _ = Snapshot::new(&mut samples, 100.0).unwrap().count();
        assert!(!samples.contains_key(&(u32::MAX, 0)));
    }

    #[test]
    fn partially_read_snapshot_keeps_samples_until_next_full_pass() {
        let mut samples = HashMap::new();
        samples.insert(
            (u32::MAX, 0),
            CpuSample { cpu_ticks: 0, taken_at: Instant::now() },
        );
        let first = Snapshot::new(&mut samples, 100.0).unwrap().next();
        assert!(first.is_some());
        assert!(samples.contains_key(&(u32::MAX, 0)));

        let _ = Snapshot::new(&mut samples, 100.0).unwrap().count();
        assert!(!samples.contains_key(&(u32::MAX, 0)));
    }

    #[test]
    fn logical_cores_is_positive() {
        assert!(logical_cores().unwrap_or(1) >= 1);
    }
}
