//! Reconnect backoff schedule.

use std::time::Duration;

/// Attempts past this count all wait the maximum delay.
pub const MAX_ATTEMPT: u32 = 6;

const BASE_MS: u64 = 1000;
const MAX_DELAY_MS: u64 = 30_000;

/// Delay before reconnect attempt `attempt` (1-based after the first
/// failure). Doubles each time and saturates at 30 seconds.
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let shifted = BASE_MS.saturating_mul(1u64 << attempt.min(MAX_ATTEMPT));
    Duration::from_millis(shifted.min(MAX_DELAY_MS))
}

/// Advance the attempt counter after a failure. Capped so the shift above
/// never grows and the delay stays pinned at the maximum.
pub fn next_attempt(attempt: u32) -> u32 {
    (attempt + 1).min(MAX_ATTEMPT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_schedule() {
        let delays: Vec<u64> = (1..=6)
            .map(|a| delay_for_attempt(a).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_attempt_counter_caps() {
        let mut attempt = 0;
        for _ in 0..20 {
            attempt = next_attempt(attempt);
        }
        assert_eq!(attempt, MAX_ATTEMPT);
        assert_eq!(delay_for_attempt(attempt), Duration::from_secs(30));
    }

    #[test]
    fn test_oversized_attempt_stays_at_max() {
        assert_eq!(delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }
}
