use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use procfs::process::Process as ProcfsProcess;
use tracing::{info, warn};

use crate::manager::ProcessError;
use crate::process::ProcessStatus;

const INITIAL_POLL: Duration = Duration::from_micros(100);
const MAX_POLL: Duration = Duration::from_millis(40);

/// Resolves `pid` to a single live process.
///
/// Pid 0 and values past `i32::MAX` would address process groups in kill(2), so they never
/// name a process here.
fn target(pid: u32) -> Result<Pid, ProcessError> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(ProcessError::NotFound { pid });
    }
    match ProcfsProcess::new(pid as i32) {
        Ok(_) => Ok(Pid::from_raw(pid as i32)),
        Err(e) => Err(match ProcessError::from_proc(pid, e) {
            ProcessError::Vanished { pid } => ProcessError::NotFound { pid },
            err => err,
        }),
    }
}

fn send(pid: u32, sig: Signal) -> Result<(), ProcessError> {
    let nix_pid = target(pid)?;
    signal::kill(nix_pid, sig).map_err(|e| ProcessError::from_errno(pid, e))
}

fn logged(op: &str, pid: u32, result: Result<(), ProcessError>) -> Result<(), ProcessError> {
    match &result {
        Ok(()) => info!(pid, op, "process operation succeeded"),
        Err(e) => warn!(pid, op, error = %e, "process operation failed"),
    }
    result
}

//Terminate (Graceful stop)
//Sends SIGTERM, then waits up to `timeout` for the process to go away
pub fn terminate_process(pid: u32, timeout: Duration) -> Result<(), ProcessError> {
    let result = send(pid, Signal::SIGTERM)
        .and_then(|()| wait_for_exit(Pid::from_raw(pid as i32), timeout));
    logged("terminate", pid, result)
}

//Suspend (SIGSTOP)
//Fully pauses a process without killing it
pub fn suspend_process(pid: u32) -> Result<(), ProcessError> {
    logged("suspend", pid, send(pid, Signal::SIGSTOP))
}

//Resume (SIGCONT)
//Resumes a suspended process
pub fn resume_process(pid: u32) -> Result<(), ProcessError> {
    logged("resume", pid, send(pid, Signal::SIGCONT))
}

/// Blocks until `pid` has exited or `timeout` elapses.
///
/// Our own children are reaped with waitpid; anything else is polled. A zombie counts as
/// exited since only its parent can reap it.
pub fn wait_for_exit(pid: Pid, timeout: Duration) -> Result<(), ProcessError> {
    let deadline = Instant::now() + timeout;
    let mut delay = INITIAL_POLL;

    loop {
        if has_exited(pid) {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ProcessError::TimeoutExpired {
                pid: pid.as_raw() as u32,
                timeout,
            });
        }
        thread::sleep(delay.min(deadline - now));
        delay = (delay * 2).min(MAX_POLL);
    }
}

fn has_exited(pid: Pid) -> bool {
    match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => false,
        Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => true,
        Ok(_) => false,
        Err(Errno::ECHILD) => !is_alive(pid),
        Err(_) => false,
    }
}

fn is_alive(pid: Pid) -> bool {
    match signal::kill(pid, None) {
        Err(Errno::ESRCH) => false,
        _ => match procfs::process::Process::new(pid.as_raw()).and_then(|p| p.stat()) {
            Ok(stat) => ProcessStatus::from(stat.state) != ProcessStatus::Zombie,
            Err(_) => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Child, Command};

    fn spawn_sleeper() -> Child {
        Command::new("sleep").arg("30").spawn().expect("spawn sleep")
    }

    fn status_of(pid: u32) -> Option<ProcessStatus> {
        let stat = ProcfsProcess::new(pid as i32).ok()?.stat().ok()?;
        Some(ProcessStatus::from(stat.state))
    }

    fn wait_for_status(pid: u32, wanted: ProcessStatus) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if status_of(pid) == Some(wanted) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn terminate_missing_pid_is_not_found() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(matches!(
            terminate_process(pid, Duration::from_millis(100)),
            Err(ProcessError::NotFound { .. })
        ));
    }

    #[test]
    fn group_addressing_pids_are_not_found() {
        assert!(matches!(suspend_process(0), Err(ProcessError::NotFound { pid: 0 })));
        assert!(matches!(
            resume_process(u32::MAX),
            Err(ProcessError::NotFound { .. })
        ));
    }

    #[test]
    fn terminate_reaps_child() {
        let child = spawn_sleeper();
        let pid = child.id();
        terminate_process(pid, Duration::from_secs(3)).unwrap();
        assert_eq!(status_of(pid), None);
    }

    #[test]
    fn terminate_times_out_on_stopped_process() {
        let mut child = spawn_sleeper();
        let pid = child.id();
        suspend_process(pid).unwrap();
        assert!(wait_for_status(pid, ProcessStatus::Stopped));

        // SIGTERM stays pending while the process is stopped
        let result = terminate_process(pid, Duration::from_millis(200));
        assert!(matches!(result, Err(ProcessError::TimeoutExpired { .. })));

        resume_process(pid).unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn suspend_then_resume_restores_status() {
        let mut child = spawn_sleeper();
        let pid = child.id();
        assert!(wait_for_status(pid, ProcessStatus::Sleeping));

        suspend_process(pid).unwrap();
        assert!(wait_for_status(pid, ProcessStatus::Stopped));

        resume_process(pid).unwrap();
        assert!(wait_for_status(pid, ProcessStatus::Sleeping));

        child.kill().unwrap();
        child.wait().unwrap();
    }
}
