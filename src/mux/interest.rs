//! Readiness interest flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Which readiness conditions a registration cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interest(pub u8);

impl Interest {
    /// No interest.
    pub const NONE: Self = Self(0);
    /// Read readiness.
    pub const READABLE: Self = Self(1 << 0);
    /// Write readiness.
    pub const WRITABLE: Self = Self(1 << 1);

    /// Read-only interest.
    #[must_use]
    pub const fn readable() -> Self {
        Self::READABLE
    }

    /// Write-only interest.
    #[must_use]
    pub const fn writable() -> Self {
        Self::WRITABLE
    }

    /// Both read and write interest.
    #[must_use]
    pub const fn both() -> Self {
        Self(Self::READABLE.0 | Self::WRITABLE.0)
    }

    /// Whether all flags in `other` are set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Whether read interest is set.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        self.contains(Self::READABLE)
    }

    /// Whether write interest is set.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.contains(Self::WRITABLE)
    }

    /// Whether no flags are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Adds the flags in `other`.
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Removes the flags in `other`.
    #[must_use]
    pub const fn remove(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Reconstructs from raw bits, ignoring unknown flags.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::both().0)
    }
}

impl BitOr for Interest {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.add(rhs)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.add(rhs);
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_readable(), self.is_writable()) {
            (true, true) => write!(f, "readable|writable"),
            (true, false) => write!(f, "readable"),
            (false, true) => write!(f, "writable"),
            (false, false) => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_composition() {
        let both = Interest::readable() | Interest::writable();
        assert_eq!(both, Interest::both());
        assert!(both.is_readable());
        assert!(both.is_writable());
        assert!(both.contains(Interest::READABLE));

        let read_only = both.remove(Interest::WRITABLE);
        assert!(read_only.is_readable());
        assert!(!read_only.is_writable());
    }

    #[test]
    fn empty_interest() {
        assert!(Interest::NONE.is_empty());
        assert!(!Interest::NONE.is_readable());
        assert!(!Interest::readable().is_empty());
    }

    #[test]
    fn bits_round_trip() {
        let interest = Interest::both();
        assert_eq!(Interest::from_bits(interest.bits()), interest);
        // Unknown bits are dropped.
        assert_eq!(Interest::from_bits(0xFF), Interest::both());
    }

    #[test]
    fn display() {
        assert_eq!(Interest::readable().to_string(), "readable");
        assert_eq!(Interest::writable().to_string(), "writable");
        assert_eq!(Interest::both().to_string(), "readable|writable");
        assert_eq!(Interest::NONE.to_string(), "none");
    }
}
