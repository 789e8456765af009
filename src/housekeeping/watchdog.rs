//! Runtime anomaly watchdog.
//!
//! Purely observational: looks at the number of live tokio tasks and the
//! resident memory of the process, logs warnings when they look wrong and
//! a periodic heartbeat otherwise.

use byte_unit::Byte;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{info, warn};

/// A single reading of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeSample {
    pub tasks: usize,
    pub memory_bytes: u64,
}

/// Source of [`RuntimeSample`]s.
pub trait RuntimeProbe: Send + Sync {
    fn sample(&self) -> RuntimeSample;
}

/// Reads live task count from the current tokio runtime and resident memory
/// of this process from the OS.
pub struct ProcessProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl ProcessProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Cannot determine own pid, memory readings disabled: {}", e);
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }

    fn resident_memory(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeProbe for ProcessProbe {
    fn sample(&self) -> RuntimeSample {
        let tasks = tokio::runtime::Handle::try_current()
            .map(|handle| handle.metrics().num_alive_tasks())
            .unwrap_or(0);
        RuntimeSample {
            tasks,
            memory_bytes: self.resident_memory(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Growth in task count between two checks that counts as a leak.
    pub leak_delta: usize,
    pub max_tasks: usize,
    pub max_memory_bytes: u64,
    pub heartbeat_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            leak_delta: 300,
            max_tasks: 2000,
            max_memory_bytes: 600 * 1024 * 1024,
            heartbeat_interval: Duration::from_secs(6 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogWarning {
    PossibleTaskLeak { previous: usize, current: usize },
    HighConcurrency { tasks: usize },
    HighMemory { bytes: u64 },
}

impl fmt::Display for WatchdogWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchdogWarning::PossibleTaskLeak { previous, current } => write!(
                f,
                "possible task leak: {} -> {} live tasks",
                previous, current
            ),
            WatchdogWarning::HighConcurrency { tasks } => {
                write!(f, "high concurrency: {} live tasks", tasks)
            }
            WatchdogWarning::HighMemory { bytes } => {
                write!(f, "high memory usage: {:#}", Byte::from(*bytes))
            }
        }
    }
}

/// Outcome of one watchdog check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogReport {
    pub sample: RuntimeSample,
    pub warnings: Vec<WatchdogWarning>,
    pub heartbeat: bool,
}

struct WatchdogState {
    last_task_count: usize,
    last_heartbeat: Option<Instant>,
}

pub struct RuntimeWatchdog {
    probe: Box<dyn RuntimeProbe>,
    config: WatchdogConfig,
    state: Mutex<WatchdogState>,
    started_at: Instant,
}

impl RuntimeWatchdog {
    pub fn new(probe: Box<dyn RuntimeProbe>, config: WatchdogConfig) -> Self {
        Self {
            probe,
            config,
            state: Mutex::new(WatchdogState {
                last_task_count: 0,
                last_heartbeat: None,
            }),
            started_at: Instant::now(),
        }
    }

    fn state(&self) -> MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Current reading, without touching the watchdog state.
    pub fn sample(&self) -> RuntimeSample {
        self.probe.sample()
    }

    pub fn last_task_count(&self) -> usize {
        self.state().last_task_count
    }

    /// Take a sample, evaluate it and log the result.
    pub fn check(&self) -> WatchdogReport {
        let report = self.evaluate(self.probe.sample(), Instant::now());
        for warning in &report.warnings {
            warn!("Watchdog: {}", warning);
        }
        if report.heartbeat {
            info!(
                "Watchdog heartbeat: uptime {}, {} live tasks, {:#} resident",
                format_duration(self.uptime()),
                report.sample.tasks,
                Byte::from(report.sample.memory_bytes)
            );
        }
        report
    }

    /// Apply the watchdog rules to `sample` taken at `now`.
    pub fn evaluate(&self, sample: RuntimeSample, now: Instant) -> WatchdogReport {
        let mut state = self.state();
        let mut warnings = Vec::new();

        let previous = state.last_task_count;
        if previous > 0 && sample.tasks > previous.saturating_add(self.config.leak_delta) {
            warnings.push(WatchdogWarning::PossibleTaskLeak {
                previous,
                current: sample.tasks,
            });
        }
        if sample.tasks > self.config.max_tasks {
            warnings.push(WatchdogWarning::HighConcurrency {
                tasks: sample.tasks,
            });
        }
        if sample.memory_bytes > self.config.max_memory_bytes {
            warnings.push(WatchdogWarning::HighMemory {
                bytes: sample.memory_bytes,
            });
        }

        let heartbeat = match state.last_heartbeat {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.config.heartbeat_interval,
        };
        if heartbeat {
            state.last_heartbeat = Some(now);
        }
        state.last_task_count = sample.tasks;

        WatchdogReport {
            sample,
            warnings,
            heartbeat,
        }
    }
}

/// `1d 02:03:04`
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}
