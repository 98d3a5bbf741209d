//! A timeout expressed in microseconds, with the two sentinels the
//! source's blocking I/O calls recognize (§5).

use std::time::Duration;

/// A per-call timeout in microseconds. `NO_WAIT` polls once without
/// blocking; `WAIT_FOREVER` blocks with no deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout(i64);

impl Timeout {
    pub const NO_WAIT: Timeout = Timeout(0);
    pub const WAIT_FOREVER: Timeout = Timeout(-1);

    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// `None` means block with no deadline (`set_read_timeout(None)`'s
    /// meaning on a `TcpStream`). `NO_WAIT` maps to the smallest positive
    /// duration rather than a literal zero, since the standard socket
    /// APIs reject a zero timeout outright.
    pub(super) fn to_duration(self) -> Option<Duration> {
        match self.0 {
            -1 => None,
            0 => Some(Duration::from_nanos(1)),
            us => Some(Duration::from_micros(us as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_forever_has_no_deadline() {
        assert_eq!(Timeout::WAIT_FOREVER.to_duration(), None);
    }

    #[test]
    fn no_wait_is_a_minimal_positive_duration() {
        assert_eq!(Timeout::NO_WAIT.to_duration(), Some(Duration::from_nanos(1)));
    }

    #[test]
    fn an_explicit_timeout_converts_exactly() {
        assert_eq!(Timeout::from_micros(5_000).to_duration(), Some(Duration::from_micros(5_000)));
    }
}
