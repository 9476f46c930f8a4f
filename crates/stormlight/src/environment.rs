//! Run configuration

use std::time::Duration;

use crate::error::{Result, StormError};
use crate::task::Task;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between two rendered snapshots
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Everything a run needs, fixed before the run starts.
///
/// A single `Arc<Environment>` is handed to every virtual user; nothing in it
/// changes while users are running.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Base URL every template path is appended to
    pub host: String,

    /// Templates users pick from uniformly at random
    pub tasks: Vec<Task>,

    /// Number of virtual users to spawn
    pub user_count: usize,

    /// Users spawned per second during ramp-up
    pub spawn_rate: f64,

    /// Wall-clock length of the run
    pub duration: Duration,

    /// Per-request timeout applied by the HTTP session
    pub request_timeout: Duration,

    /// How often a snapshot is rendered while the run is in progress
    pub report_interval: Duration,
}

impl Environment {
    pub fn new(host: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            host: host.into(),
            tasks,
            user_count: 1,
            spawn_rate: 1.0,
            duration: Duration::from_secs(60),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }

    pub fn with_users(mut self, user_count: usize) -> Self {
        self.user_count = user_count;
        self
    }

    pub fn with_spawn_rate(mut self, spawn_rate: f64) -> Self {
        self.spawn_rate = spawn_rate;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Delay between two successive user spawns
    pub fn spawn_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.spawn_rate)
    }

    /// Reject configurations that would fault mid-run
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(StormError::EmptyTaskList);
        }

        if !(self.spawn_rate.is_finite() && self.spawn_rate > 0.0) {
            return Err(StormError::InvalidSpawnRate(self.spawn_rate));
        }

        for (name, value) in [
            ("duration", self.duration),
            ("request timeout", self.request_timeout),
            ("report interval", self.report_interval),
        ] {
            if value.is_zero() {
                return Err(StormError::InvalidDuration {
                    name,
                    value: value.as_secs_f64(),
                });
            }
        }

        match reqwest::Url::parse(&self.host) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(StormError::InvalidHost(self.host.clone())),
        }

        for task in &self.tasks {
            if reqwest::Method::from_bytes(task.method().as_bytes()).is_err() {
                return Err(StormError::InvalidMethod {
                    method: task.method().to_string(),
                    path: task.path().to_string(),
                });
            }

            for (name, value) in task.headers() {
                let valid = reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_ok()
                    && reqwest::header::HeaderValue::from_str(value).is_ok();
                if !valid {
                    return Err(StormError::InvalidHeader {
                        name: name.clone(),
                        path: task.path().to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Convert a user-supplied number of seconds into a `Duration`
pub fn seconds(name: &'static str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or(StormError::InvalidDuration { name, value })
}
