use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum steps in flight per run. `None` means unbounded.
    pub max_parallelism: Option<usize>,
    /// Applied to steps whose own `timeout` is zero.
    pub default_step_timeout: Option<Duration>,
    /// Budget for a single event sink call.
    pub event_timeout: Duration,
    /// How long a finished run waits for queued events before returning.
    pub event_flush_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallelism: None,
            default_step_timeout: None,
            event_timeout: Duration::from_secs(2),
            event_flush_timeout: Duration::from_secs(1),
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_parallelism(mut self, limit: usize) -> Self {
        self.max_parallelism = Some(limit);
        self
    }

    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = Some(timeout);
        self
    }

    pub fn with_event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = timeout;
        self
    }

    pub fn with_event_flush_timeout(mut self, timeout: Duration) -> Self {
        self.event_flush_timeout = timeout;
        self
    }
}
