//! Bounded, cancellable polling.
//!
//! Used where a remote system applies a change asynchronously and the
//! caller has to wait until a read reflects it.

use std::time::{Duration, Instant};

use crate::context::CancelToken;

/// Configuration for [`wait_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between checks.
    pub interval: Duration,
    /// Total time allowed before giving up.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

impl PollConfig {
    /// Create a poll configuration.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Why polling stopped without the condition becoming true.
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    /// The condition did not hold within the timeout.
    #[error("condition not met after {}s", .waited.as_secs_f64())]
    Timeout { waited: Duration },

    /// The caller cancelled the wait.
    #[error("wait cancelled")]
    Cancelled,

    /// A check failed.
    #[error(transparent)]
    Failed(E),
}

/// Run `check` until it returns `Ok(true)`.
///
/// The check runs immediately, then once per `interval`. Fails with
/// [`PollError::Timeout`] once `timeout` has elapsed without success, with
/// [`PollError::Cancelled`] as soon as `cancel` fires, and with
/// [`PollError::Failed`] on the first failing check. Returns the time
/// spent waiting.
pub fn wait_until<E, F>(
    cancel: &CancelToken,
    config: &PollConfig,
    mut check: F,
) -> Result<Duration, PollError<E>>
where
    F: FnMut() -> Result<bool, E>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            log::debug!("poll cancelled after {attempt} attempts");
            return Err(PollError::Cancelled);
        }

        attempt += 1;
        let done = check().map_err(PollError::Failed)?;
        let waited = start.elapsed();
        log::trace!("poll attempt {attempt}: done={done} after {waited:?}");
        if done {
            log::debug!("poll succeeded after {attempt} attempts ({waited:?})");
            return Ok(waited);
        }

        if waited >= config.timeout {
            log::debug!("poll timed out after {attempt} attempts ({waited:?})");
            return Err(PollError::Timeout { waited });
        }

        let remaining = config.timeout - waited;
        if cancel.wait_timeout(config.interval.min(remaining)) {
            log::debug!("poll cancelled after {attempt} attempts");
            return Err(PollError::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn scaled() -> PollConfig {
        PollConfig::new(Duration::from_millis(10), Duration::from_millis(200))
    }

    #[test]
    fn test_default_bounds() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_immediate_success() {
        let mut calls = 0;
        let result = wait_until::<(), _>(&CancelToken::new(), &scaled(), || {
            calls += 1;
            Ok(true)
        });
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_success_after_some_attempts() {
        let mut calls = 0;
        let result = wait_until::<(), _>(&CancelToken::new(), &scaled(), || {
            calls += 1;
            Ok(calls == 4)
        });
        assert!(result.is_ok());
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_timeout_is_honoured() {
        let config = scaled();
        let start = Instant::now();
        let result = wait_until::<(), _>(&CancelToken::new(), &config, || Ok(false));
        let elapsed = start.elapsed();

        let Err(PollError::Timeout { waited }) = result else {
            panic!("expected timeout, got {result:?}");
        };
        assert!(waited >= config.timeout);
        assert!(elapsed >= config.timeout);
        assert!(elapsed < config.timeout * 3);
    }

    #[test]
    fn test_check_error_stops_polling() {
        let mut calls = 0;
        let result = wait_until(&CancelToken::new(), &scaled(), || {
            calls += 1;
            if calls == 2 { Err("boom") } else { Ok(false) }
        });
        assert!(matches!(result, Err(PollError::Failed("boom"))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_cancel_interrupts_wait() {
        let token = CancelToken::new();
        let remote = token.clone();
        let config = PollConfig::new(Duration::from_secs(1), Duration::from_secs(60));
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        let start = Instant::now();
        let result = wait_until::<(), _>(&token, &config, || Ok(false));
        assert!(matches!(result, Err(PollError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }
}
