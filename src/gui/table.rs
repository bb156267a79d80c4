use std::time::Instant;

use tracing::debug;

use crate::manager::{ProcessControl, ProcessError};
use crate::process::ProcessRecord;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Case-insensitive substring match on the process name. The empty filter matches everything.
pub fn matches_filter(name: &str, filter: &str) -> bool {
    filter.is_empty() || name.to_lowercase().contains(&filter.to_lowercase())
}

/// Formats raw CPU usage (one busy core = 100) as a share of the whole machine.
pub fn format_cpu(cpu_percent: f32, logical_cores: Option<usize>) -> String {
    let percent = match logical_cores {
        Some(cores) if cores > 0 => cpu_percent as f64 / cores as f64,
        _ => cpu_percent as f64,
    };
    format!("{:.2}%", percent)
}

/// Formats a resident set size in MiB.
pub fn format_memory(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_MIB)
}

/// A formatted table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: String,
    pub cpu: String,
    pub memory: String,
    pub status: String,
}

impl ProcessRow {
    pub fn new(record: &ProcessRecord, logical_cores: Option<usize>) -> Self {
        ProcessRow {
            pid: record.pid,
            name: record.name.clone(),
            cpu: format_cpu(record.cpu_percent, logical_cores),
            memory: format_memory(record.memory_bytes),
            status: record.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Terminate,
    Suspend,
    Resume,
}

impl Action {
    fn dispatch<C: ProcessControl>(self, control: &mut C, pid: u32) -> Result<(), ProcessError> {
        match self {
            Action::Terminate => control.terminate(pid),
            Action::Suspend => control.suspend(pid),
            Action::Resume => control.resume(pid),
        }
    }

    fn done(self) -> &'static str {
        match self {
            Action::Terminate => "terminated",
            Action::Suspend => "suspended",
            Action::Resume => "resumed",
        }
    }

    fn doing(self) -> &'static str {
        match self {
            Action::Terminate => "terminating",
            Action::Suspend => "suspending",
            Action::Resume => "resuming",
        }
    }

    fn failure_message(self, err: &ProcessError) -> String {
        match err {
            ProcessError::NotFound { .. } | ProcessError::Vanished { .. } => {
                "The process no longer exists.".to_string()
            }
            ProcessError::AccessDenied { .. } => {
                format!("Access denied while {} the process.", self.doing())
            }
            ProcessError::TimeoutExpired { .. } => {
                "The process did not terminate in time.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
}

/// A message the user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    fn new(kind: NotificationKind, title: &str, message: impl Into<String>) -> Self {
        Notification {
            kind,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// Idle → Refreshing → Idle. A refresh is one synchronous call, so outside of
/// `ProcessTable::refresh` the phase is always `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Refreshing,
}

/// Table state behind the window: the filtered rows of the last snapshot, the filter text,
/// the selected pid and the pending notification.
#[derive(Debug)]
pub struct ProcessTable {
    rows: Vec<ProcessRow>,
    filter: String,
    selected: Option<u32>,
    notification: Option<Notification>,
    phase: Phase,
    last_refresh: Option<Instant>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            filter: String::new(),
            selected: None,
            notification: None,
            phase: Phase::Idle,
            last_refresh: None,
        }
    }
}

impl ProcessTable {
    pub fn rows(&self) -> &[ProcessRow] {
        &self.rows
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    pub fn select(&mut self, pid: u32) {
        self.selected = Some(pid);
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    /// Replaces the filter text and re-enumerates.
    pub fn set_filter<C: ProcessControl>(&mut self, filter: impl Into<String>, control: &mut C) {
        self.filter = filter.into();
        self.refresh(control);
    }

    /// Re-enumerates processes and rebuilds the rows that pass the filter.
    ///
    /// If the process list cannot be read the previous rows stay and an error is raised.
    pub fn refresh<C: ProcessControl>(&mut self, control: &mut C) {
        self.phase = Phase::Refreshing;
        let cores = control.logical_cores();

        match control.list_processes() {
            Ok(snapshot) => {
                let filter = &self.filter;
                self.rows = snapshot
                    .filter(|record| matches_filter(&record.name, filter))
                    .map(|record| ProcessRow::new(&record, cores))
                    .collect();
                if let Some(pid) = self.selected {
                    if !self.rows.iter().any(|row| row.pid == pid) {
                        self.selected = None;
                    }
                }
                self.last_refresh = Some(Instant::now());
                debug!(rows = self.rows.len(), filter = %self.filter, "process table refreshed");
            }
            Err(e) => {
                self.notification = Some(Notification::new(
                    NotificationKind::Error,
                    "Error",
                    e.to_string(),
                ));
            }
        }

        self.phase = Phase::Idle;
    }

    /// Runs `action` on the selected process, records the outcome and refreshes.
    pub fn apply<C: ProcessControl>(&mut self, action: Action, control: &mut C) {
        let Some(pid) = self.selected else {
            self.notification = Some(Notification::new(
                NotificationKind::Warning,
                "Selection",
                "Select a process from the list.",
            ));
            return;
        };

        self.notification = Some(match action.dispatch(control, pid) {
            Ok(()) => Notification::new(
                NotificationKind::Info,
                "Success",
                format!("Process {} {}.", pid, action.done()),
            ),
            Err(e) => {
                Notification::new(NotificationKind::Error, "Error", action.failure_message(&e))
            }
        });

        self.refresh(control);
    }
}
