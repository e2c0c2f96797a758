//! Reconnect policy
//!
//! The reconnect decision is a pure function of the closure classification,
//! the number of reconnects already attempted, and the policy. The connection
//! actor calls it on every unexpected closure and never decides inline.

use std::time::Duration;

/// WebSocket close code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal closure, never followed by a reconnect
    pub const NORMAL: CloseCode = CloseCode(1000);
    /// Peer closed without sending a status code
    pub const NO_STATUS: CloseCode = CloseCode(1005);
    /// Connection dropped without a close frame
    pub const ABNORMAL: CloseCode = CloseCode(1006);

    pub fn kind(self) -> CloseKind {
        if self == Self::NORMAL {
            CloseKind::Normal
        } else {
            CloseKind::Abnormal(self)
        }
    }
}

/// Classification of a closure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    Normal,
    Abnormal(CloseCode),
}

/// Linear backoff settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects
    pub fn never() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_attempts: 0,
        }
    }

    /// Delay before reconnect number `attempt` (1-based): `base_delay * attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Outcome of [`reconnect_decision`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Closure was normal; stay closed
    Stop,
    /// Schedule reconnect number `attempt` after `delay`
    Retry { attempt: u32, delay: Duration },
    /// The attempt cap is exhausted
    GiveUp { attempts: u32 },
}

/// Decide what follows a closure, given `attempts_made` reconnects since the
/// last successful open
pub fn reconnect_decision(
    close: CloseKind,
    attempts_made: u32,
    policy: &ReconnectPolicy,
) -> ReconnectDecision {
    match close {
        CloseKind::Normal => ReconnectDecision::Stop,
        CloseKind::Abnormal(_) if attempts_made < policy.max_attempts => {
            let attempt = attempts_made + 1;
            ReconnectDecision::Retry {
                attempt,
                delay: policy.delay_for(attempt),
            }
        }
        CloseKind::Abnormal(_) => ReconnectDecision::GiveUp {
            attempts: attempts_made,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(500),
            max_attempts,
        }
    }

    #[test]
    fn test_normal_closure_never_reconnects() {
        for cap in 0..8 {
            for attempts in 0..8 {
                assert_eq!(
                    reconnect_decision(CloseCode::NORMAL.kind(), attempts, &policy(cap)),
                    ReconnectDecision::Stop
                );
            }
        }
    }

    #[test]
    fn test_abnormal_closure_below_cap_retries() {
        let decision = reconnect_decision(CloseCode::ABNORMAL.kind(), 0, &policy(5));
        assert_eq!(
            decision,
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(500),
            }
        );

        let decision = reconnect_decision(CloseCode(4001).kind(), 4, &policy(5));
        assert_eq!(
            decision,
            ReconnectDecision::Retry {
                attempt: 5,
                delay: Duration::from_millis(2500),
            }
        );
    }

    #[test]
    fn test_cap_exhausted_gives_up() {
        assert_eq!(
            reconnect_decision(CloseCode::ABNORMAL.kind(), 5, &policy(5)),
            ReconnectDecision::GiveUp { attempts: 5 }
        );
        assert_eq!(
            reconnect_decision(CloseCode::ABNORMAL.kind(), 0, &ReconnectPolicy::never()),
            ReconnectDecision::GiveUp { attempts: 0 }
        );
    }

    #[test]
    fn test_backoff_is_non_decreasing_up_to_cap() {
        let policy = policy(5);
        let mut attempts = 0;
        let mut last = Duration::ZERO;
        while let ReconnectDecision::Retry { attempt, delay } =
            reconnect_decision(CloseCode::ABNORMAL.kind(), attempts, &policy)
        {
            assert!(delay >= last);
            last = delay;
            attempts = attempt;
        }
        assert_eq!(attempts, 5);
    }

    #[test]
    fn test_only_1000_is_normal() {
        assert_eq!(CloseCode(1000).kind(), CloseKind::Normal);
        assert!(matches!(CloseCode(1001).kind(), CloseKind::Abnormal(_)));
        assert!(matches!(CloseCode(1008).kind(), CloseKind::Abnormal(_)));
    }
}
