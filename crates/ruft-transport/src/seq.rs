//! # Modular Sequence Arithmetic
//!
//! Sequence and acknowledgement numbers live in a 16-bit space and wrap at
//! 2^16. Every ordering decision in the protocol goes through the half-space
//! rule here; raw integer comparison is wrong as soon as a transfer crosses
//! the wrap point.

use rand::Rng;
use serde::Serialize;
use std::fmt;

/// Size of the sequence space.
pub const SEQ_SPACE: u32 = 1 << 16;

/// A 16-bit sequence number with modular arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SeqNum(u16);

impl SeqNum {
    #[inline]
    pub fn new(val: u16) -> Self {
        SeqNum(val)
    }

    /// Pick an initial sequence number uniformly in `[0, 2^16)`.
    pub fn random(rng: &mut impl Rng) -> Self {
        SeqNum(rng.random_range(0..=u16::MAX))
    }

    #[inline]
    pub fn value(self) -> u16 {
        self.0
    }

    /// Advance by `n` sequence numbers, wrapping at 2^16.
    #[inline]
    pub fn step(self, n: u16) -> Self {
        SeqNum(self.0.wrapping_add(n))
    }

    /// Forward distance from `from` to `self`: `(self − from) mod 2^16`.
    #[inline]
    pub fn distance_from(self, from: SeqNum) -> u16 {
        self.0.wrapping_sub(from.0)
    }

    /// Half-space ordering: `self` is ahead of `other` iff
    /// `(self − other) mod 2^16` lies in `(0, 2^15)`.
    #[inline]
    pub fn is_after(self, other: SeqNum) -> bool {
        let d = self.distance_from(other);
        d != 0 && d < (SEQ_SPACE / 2) as u16
    }

    /// `self` is strictly behind `other` in the window sense.
    #[inline]
    pub fn is_before(self, other: SeqNum) -> bool {
        other.is_after(self)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u16> for SeqNum {
    fn from(v: u16) -> Self {
        SeqNum(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn step_wraps_at_space_boundary() {
        assert_eq!(SeqNum::new(65530).step(10).value(), 4);
        assert_eq!(SeqNum::new(65535).step(1).value(), 0);
        assert_eq!(SeqNum::new(0).step(0).value(), 0);
    }

    #[test]
    fn ordering_without_wrap() {
        assert!(SeqNum::new(2000).is_after(SeqNum::new(1000)));
        assert!(SeqNum::new(1000).is_before(SeqNum::new(2000)));
        assert!(!SeqNum::new(1000).is_after(SeqNum::new(1000)));
    }

    #[test]
    fn ordering_across_wrap() {
        // 5 is just past 65531 once the space wraps.
        assert!(SeqNum::new(5).is_after(SeqNum::new(65531)));
        assert!(SeqNum::new(65531).is_before(SeqNum::new(5)));
        assert!(!SeqNum::new(65531).is_after(SeqNum::new(5)));
    }

    #[test]
    fn opposite_half_is_behind() {
        // Exactly 2^15 away is not "ahead".
        assert!(!SeqNum::new(32768).is_after(SeqNum::new(0)));
    }

    #[test]
    fn distance_across_wrap() {
        assert_eq!(SeqNum::new(4).distance_from(SeqNum::new(65530)), 10);
        assert_eq!(SeqNum::new(10).distance_from(SeqNum::new(10)), 0);
    }

    proptest! {
        #[test]
        fn proptest_step_then_distance(start in any::<u16>(), n in 0u16..32768) {
            let s = SeqNum::new(start);
            prop_assert_eq!(s.step(n).distance_from(s), n);
        }

        #[test]
        fn proptest_ahead_is_antisymmetric(a in any::<u16>(), b in any::<u16>()) {
            let (a, b) = (SeqNum::new(a), SeqNum::new(b));
            // Two distinct numbers are never each ahead of the other.
            prop_assert!(!(a.is_after(b) && b.is_after(a)));
        }

        #[test]
        fn proptest_small_advance_is_ahead(start in any::<u16>(), n in 1u16..32768) {
            let s = SeqNum::new(start);
            prop_assert!(s.step(n).is_after(s));
        }
    }
}
