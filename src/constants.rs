//! Global constants used throughout the formulary codebase.
//!
//! Timeout durations and retry parameters shared across modules. Defining
//! them centrally keeps the deadlines imposed on external I/O (git
//! subprocesses, verification commands) discoverable in one place.

use std::time::Duration;

/// Timeout for `git clone` operations (120 seconds).
///
/// Clone operations may take longer than fetch, especially for
/// repositories with deep history.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for `git fetch` operations (60 seconds).
///
/// Prevents hung network connections from blocking an install
/// indefinitely.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for `git ls-remote` during source resolution (30 seconds).
pub const GIT_LS_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a formula's verification command (60 seconds).
///
/// Verification runs an arbitrary installed binary; the deadline is owned
/// by the caller since the stage itself imposes none of its own.
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// Number of fetch attempts before the pipeline gives up on a source.
pub const FETCH_ATTEMPTS: u32 = 3;

/// Starting delay for exponential backoff between fetch attempts (250ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 250;

/// Maximum backoff delay between fetch attempts (2 seconds).
pub const MAX_BACKOFF_DELAY_MS: u64 = 2000;

/// Sleeps for the backoff delay appropriate to `attempt` and returns the
/// next attempt number.
///
/// Delays double per attempt starting at [`STARTING_BACKOFF_DELAY_MS`],
/// capped at [`MAX_BACKOFF_DELAY_MS`].
pub async fn backoff_with_delay(attempt: u32) -> u32 {
    let delay = std::cmp::min(STARTING_BACKOFF_DELAY_MS * (1 << attempt), MAX_BACKOFF_DELAY_MS);
    tokio::time::sleep(Duration::from_millis(delay)).await;
    attempt.saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn backoff_increments_attempt() {
        let next = backoff_with_delay(0).await;
        assert_eq!(next, 1);
    }

    #[test]
    fn backoff_delay_is_capped() {
        // 250 << 5 = 8000, which must clamp to the maximum.
        let delay =
            std::cmp::min(STARTING_BACKOFF_DELAY_MS * (1 << 5), MAX_BACKOFF_DELAY_MS);
        assert_eq!(delay, MAX_BACKOFF_DELAY_MS);
    }
}
