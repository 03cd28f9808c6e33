//! Packet timestamps.
//!
//! A `Timestamp` is a signed microsecond count. The extremes of the `i64`
//! range are reserved for sentinel values that order around every regular
//! timestamp:
//!
//! ```text
//! Unset < Unstarted < PreStream < Min ... Max < PostStream < OneOverPostStream < Done
//! ```
//!
//! Only `Min..=Max`, `PreStream` and `PostStream` may be attached to a packet
//! that travels on a stream.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const UNSET: Timestamp = Timestamp(i64::MIN);
    pub const UNSTARTED: Timestamp = Timestamp(i64::MIN + 1);
    pub const PRE_STREAM: Timestamp = Timestamp(i64::MIN + 2);
    pub const MIN: Timestamp = Timestamp(i64::MIN + 3);
    pub const MAX: Timestamp = Timestamp(i64::MAX - 3);
    pub const POST_STREAM: Timestamp = Timestamp(i64::MAX - 2);
    pub const ONE_OVER_POST_STREAM: Timestamp = Timestamp(i64::MAX - 1);
    pub const DONE: Timestamp = Timestamp(i64::MAX);

    /// Create a regular timestamp, clamped into `MIN..=MAX`.
    pub fn new(micros: i64) -> Self {
        Self(micros.clamp(Self::MIN.0, Self::MAX.0))
    }

    #[inline]
    pub fn value(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn is_special(self) -> bool {
        self < Self::MIN || self > Self::MAX
    }

    #[inline]
    pub fn is_range_value(self) -> bool {
        !self.is_special()
    }

    /// Whether a packet carrying this timestamp may be added to a stream.
    pub fn is_allowed_in_stream(self) -> bool {
        self.is_range_value() || self == Self::PRE_STREAM || self == Self::POST_STREAM
    }

    /// Smallest timestamp a stream may carry after a packet at `self`.
    pub fn next_allowed_in_stream(self) -> Timestamp {
        if self >= Self::MAX || self == Self::PRE_STREAM {
            // Nothing may follow PreStream, Max or PostStream.
            Self::ONE_OVER_POST_STREAM
        } else if self < Self::MIN {
            Self::MIN
        } else {
            Timestamp(self.0 + 1)
        }
    }

    /// Largest timestamp a stream could have carried before a bound at `self`.
    pub fn previous_allowed_in_stream(self) -> Timestamp {
        if self <= Self::MIN || self == Self::POST_STREAM {
            Self::UNSTARTED
        } else if self > Self::MAX {
            Self::MAX
        } else {
            Timestamp(self.0 - 1)
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::UNSET
    }
}

impl From<i64> for Timestamp {
    fn from(micros: i64) -> Self {
        Self::new(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNSET => write!(f, "Timestamp::Unset"),
            Self::UNSTARTED => write!(f, "Timestamp::Unstarted"),
            Self::PRE_STREAM => write!(f, "Timestamp::PreStream"),
            Self::MIN => write!(f, "Timestamp::Min"),
            Self::MAX => write!(f, "Timestamp::Max"),
            Self::POST_STREAM => write!(f, "Timestamp::PostStream"),
            Self::ONE_OVER_POST_STREAM => write!(f, "Timestamp::OneOverPostStream"),
            Self::DONE => write!(f, "Timestamp::Done"),
            Timestamp(v) => write!(f, "Timestamp({})", v),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_special() {
            fmt::Debug::fmt(self, f)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_ordering() {
        let order = [
            Timestamp::UNSET,
            Timestamp::UNSTARTED,
            Timestamp::PRE_STREAM,
            Timestamp::MIN,
            Timestamp::new(0),
            Timestamp::MAX,
            Timestamp::POST_STREAM,
            Timestamp::ONE_OVER_POST_STREAM,
            Timestamp::DONE,
        ];
        for pair in order.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should sort before {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_allowed_in_stream() {
        assert!(Timestamp::new(5).is_allowed_in_stream());
        assert!(Timestamp::PRE_STREAM.is_allowed_in_stream());
        assert!(Timestamp::POST_STREAM.is_allowed_in_stream());
        assert!(!Timestamp::UNSET.is_allowed_in_stream());
        assert!(!Timestamp::UNSTARTED.is_allowed_in_stream());
        assert!(!Timestamp::DONE.is_allowed_in_stream());
    }

    #[test]
    fn test_new_clamps_into_range() {
        assert_eq!(Timestamp::new(i64::MAX), Timestamp::MAX);
        assert_eq!(Timestamp::new(i64::MIN), Timestamp::MIN);
    }

    #[test]
    fn test_next_and_previous() {
        assert_eq!(Timestamp::new(3).next_allowed_in_stream(), Timestamp::new(4));
        assert_eq!(
            Timestamp::PRE_STREAM.next_allowed_in_stream(),
            Timestamp::ONE_OVER_POST_STREAM
        );
        assert_eq!(Timestamp::UNSTARTED.next_allowed_in_stream(), Timestamp::MIN);
        assert_eq!(Timestamp::new(3).previous_allowed_in_stream(), Timestamp::new(2));
        assert_eq!(Timestamp::DONE.previous_allowed_in_stream(), Timestamp::MAX);
        assert_eq!(
            Timestamp::MIN.previous_allowed_in_stream(),
            Timestamp::UNSTARTED
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::new(42).to_string(), "42");
        assert_eq!(Timestamp::PRE_STREAM.to_string(), "Timestamp::PreStream");
    }
}
