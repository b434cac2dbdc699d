use std::error::Error as _;
use std::io::ErrorKind;
use std::time::Duration;

use tokio_retry::strategy::FixedInterval;

/// Classified transport failure, decided per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Peer dropped the connection mid-request.
    ConnectionReset,
    /// TLS handshake or certificate verification failed.
    TlsHandshake,
    /// Connect or read deadline elapsed.
    Timeout,
    /// Generic interrupted I/O, timeout family.
    InterruptedIo,
    /// Target host unreachable or unresolvable.
    HostUnreachable,
    /// Secure channel broke after the handshake.
    TlsChannel,
    /// Response body ended before the announced length.
    TruncatedBody,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Best-effort mapping of a `reqwest` failure onto a kind.
    ///
    /// reqwest hides the underlying I/O error behind its source chain, so we
    /// walk it looking for an `io::Error` first and fall back to message
    /// heuristics for the DNS and TLS cases rustls keeps opaque.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }

        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                match io.kind() {
                    ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe => return Self::ConnectionReset,
                    ErrorKind::TimedOut | ErrorKind::WouldBlock => return Self::Timeout,
                    ErrorKind::Interrupted => return Self::InterruptedIo,
                    ErrorKind::UnexpectedEof => return Self::TruncatedBody,
                    ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable => {
                        return Self::HostUnreachable
                    }
                    _ => break,
                }
            }
            source = cause.source();
        }

        let text = chain_text(err);
        if text.contains("dns error") || text.contains("failed to lookup address") {
            Self::HostUnreachable
        } else if text.contains("handshake") || text.contains("certificate") {
            Self::TlsHandshake
        } else if text.contains("tls") || text.contains("ssl") {
            Self::TlsChannel
        } else if err.is_body() || err.is_decode() {
            Self::TruncatedBody
        } else {
            Self::Other
        }
    }
}

fn chain_text(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text.to_ascii_lowercase()
}

/// Per-attempt retry decision.
///
/// The rule table mirrors a long-lived production policy: transient socket
/// failures retry, TLS and DNS failures do not, and a request carrying a body
/// is never retried on an unclassified failure so a write cannot be applied
/// twice. The attempt cap and inter-attempt backoff are data, not constants.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no retries. Used by the snapshot admin paths.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn get_max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay sequence between attempts, fed by `tokio-retry`.
    pub fn delays(&self) -> FixedInterval {
        FixedInterval::new(self.backoff)
    }

    /// Decide whether the attempt that just failed should be repeated.
    ///
    /// `attempts_made` counts completed attempts including the failed one;
    /// `has_body` marks the request as a potential write.
    pub fn should_retry(&self, kind: FailureKind, attempts_made: u32, has_body: bool) -> bool {
        if attempts_made >= self.max_attempts {
            return false;
        }
        match kind {
            FailureKind::ConnectionReset => true,
            FailureKind::TlsHandshake => false,
            FailureKind::Timeout => true,
            FailureKind::InterruptedIo => true,
            FailureKind::HostUnreachable => false,
            FailureKind::TlsChannel => false,
            FailureKind::TruncatedBody => true,
            FailureKind::Other => !has_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETRYABLE: [FailureKind; 4] = [
        FailureKind::ConnectionReset,
        FailureKind::Timeout,
        FailureKind::InterruptedIo,
        FailureKind::TruncatedBody,
    ];

    const FATAL: [FailureKind; 3] = [
        FailureKind::TlsHandshake,
        FailureKind::HostUnreachable,
        FailureKind::TlsChannel,
    ];

    #[test]
    fn retryable_kinds_retry_below_the_cap() {
        let policy = RetryPolicy::default();
        for kind in RETRYABLE {
            for attempts in 1..5 {
                assert!(policy.should_retry(kind, attempts, true), "{kind:?}/{attempts}");
                assert!(policy.should_retry(kind, attempts, false), "{kind:?}/{attempts}");
            }
        }
    }

    #[test]
    fn the_fifth_attempt_is_the_last_regardless_of_kind() {
        let policy = RetryPolicy::default();
        for kind in RETRYABLE.iter().chain(FATAL.iter()).chain([FailureKind::Other].iter()) {
            assert!(!policy.should_retry(*kind, 5, false), "{kind:?}");
            assert!(!policy.should_retry(*kind, 7, false), "{kind:?}");
        }
    }

    #[test]
    fn non_transient_kinds_never_retry() {
        let policy = RetryPolicy::default();
        for kind in FATAL {
            assert!(!policy.should_retry(kind, 1, false), "{kind:?}");
        }
    }

    #[test]
    fn unclassified_failures_retry_only_without_a_body() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(FailureKind::Other, 1, false));
        assert!(!policy.should_retry(FailureKind::Other, 1, true));
    }

    #[test]
    fn the_cap_is_configurable() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        assert!(policy.should_retry(FailureKind::Timeout, 1, false));
        assert!(!policy.should_retry(FailureKind::Timeout, 2, false));
    }
}
