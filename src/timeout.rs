//! Timeout utilities for bounding external work.
//!
//! The only blocking call in motemem is running the configured parse
//! command; it is always driven through [`with_timeout`] so that a stuck
//! tool turns into an error instead of a hang.

use crate::error::{MoteError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error};

/// Default timeout for the external parse command in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECONDS: u64 = 30;

/// Timeout configuration for a bounded operation
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum duration for the operation
    pub duration: Duration,
    /// Whether to log timeout errors
    pub log_warnings: bool,
    /// Operation name for logging
    pub operation_name: String,
}

impl TimeoutConfig {
    /// Create a new timeout configuration
    pub fn new(seconds: u64, operation: impl Into<String>) -> Self {
        Self {
            duration: Duration::from_secs(seconds),
            log_warnings: true,
            operation_name: operation.into(),
        }
    }

    /// Create a timeout configuration with a sub-second budget
    pub fn from_duration(duration: Duration, operation: impl Into<String>) -> Self {
        Self {
            duration,
            log_warnings: true,
            operation_name: operation.into(),
        }
    }
}

/// Execute an async operation with a timeout
pub async fn with_timeout<T, F>(config: TimeoutConfig, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    debug!(
        "Starting operation '{}' with timeout of {:?}",
        config.operation_name, config.duration
    );

    match tokio::time::timeout(config.duration, future).await {
        Ok(result) => {
            debug!("Operation '{}' completed", config.operation_name);
            result
        }
        Err(_) => {
            if config.log_warnings {
                error!(
                    "Operation '{}' timed out after {:?}",
                    config.operation_name, config.duration
                );
            }

            Err(MoteError::Timeout {
                seconds: config.duration.as_secs(),
            })
        }
    }
}

/// Drive `future` to completion on a fresh current-thread runtime, bounded
/// by `config`.
///
/// Callable from synchronous code and from inside a host's runtime. In the
/// latter case the fresh runtime runs on a scoped thread, since a runtime
/// cannot be started on a thread that is already driving one.
pub fn block_on_with_timeout<T, F>(config: TimeoutConfig, future: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
    T: Send,
{
    if Handle::try_current().is_err() {
        return run_on_fresh_runtime(config, future);
    }

    debug!(
        "Operation '{}' called inside a runtime; running on a helper thread",
        config.operation_name
    );
    std::thread::scope(|scope| {
        scope
            .spawn(move || run_on_fresh_runtime(config, future))
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

fn run_on_fresh_runtime<T, F>(config: TimeoutConfig, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(with_timeout(config, future))
}
