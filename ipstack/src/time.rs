/*! Time structures.

Cache bookkeeping in this crate never reads the clock itself. The caller passes an [Instant] into
every operation that depends on time, which keeps expiry logic deterministic under test. Only the
layers that run on real threads call [Instant::now].

[Instant]: struct.Instant.html
[Instant::now]: struct.Instant.html#method.now
*/
use core::{cmp, fmt, ops};
use std::sync::OnceLock;
pub use core::time::Duration;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that represents a number of
/// milliseconds since an arbitrary origin. [`Instant::now`] counts from the first time it is
/// called in the process and is monotonic.
///
/// [`Instant::now`]: #method.now
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    /// Milliseconds since the origin.
    pub millis: i64,
}

/// An expiration time, inversion of `Option`.
///
/// Orders `Never` after every point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expires at the given instant.
    When(Instant),
    /// Never expires.
    Never,
}

use Expiration::{When, Never};

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// The current time of the monotonic clock.
    ///
    /// Unaffected by changes of the wall clock.
    pub fn now() -> Instant {
        static ORIGIN: OnceLock<::std::time::Instant> = OnceLock::new();
        let origin = *ORIGIN.get_or_init(::std::time::Instant::now);
        Self::from_millis(origin.elapsed().as_millis() as i64)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.millis / 1000, self.millis % 1000)
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis + rhs.as_millis() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis((self.millis - rhs.millis).abs() as u64)
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl From<Option<Instant>> for Expiration {
    fn from(opt: Option<Instant>) -> Self {
        match opt {
            Some(instant) => When(instant),
            None => Never,
        }
    }
}

impl cmp::PartialOrd<Self> for Expiration {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Expiration {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (*self, *other) {
            (Never, Never) => cmp::Ordering::Equal,
            (Never, When(_)) => cmp::Ordering::Greater,
            (When(_), Never) => cmp::Ordering::Less,
            (When(ref a), When(ref b)) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instant_ops() {
        assert_eq!(Instant::from_millis(4) + Duration::from_millis(6), Instant::from_millis(10));
        assert_eq!(Instant::from_millis(7) - Instant::from_millis(5), Duration::from_millis(2));
    }

    #[test]
    fn instant_display() {
        assert_eq!(format!("{}", Instant::from_millis(5674)), "5.674s");
        assert_eq!(format!("{}", Instant::from_millis(5000)), "5.000s");
    }

    #[test]
    fn now_is_monotonic() {
        let earlier = Instant::now();
        std::thread::sleep(Duration::from_millis(5));
        let later = Instant::now();
        assert!(earlier < later);
        assert!(later - earlier >= Duration::from_millis(5));
    }

    #[test]
    fn expiration_order() {
        let early = Expiration::When(Instant::from_secs(1));
        let late = Expiration::When(Instant::from_secs(2));
        assert!(early < late);
        assert!(late < Expiration::Never);
        assert!(Expiration::When(Instant::from_secs(1)) >= early);
    }
}
