// libdivide.h - Optimized integer division
// https://libdivide.com
//
// Copyright (C) 2010 - 2021 ridiculous_fish, <libdivide@ridiculousfish.com>
// Copyright (C) 2016 - 2021 Kim Walisch, <kim.walisch@gmail.com>
//
// libdivide is dual-licensed under the Boost or zlib licenses.
// You may use libdivide under the terms of either of these.
// See LICENSE.txt for more details.

//! Branch-free division of `i64` numerators by a divisor fixed at runtime.
//!
//! A [`BranchFreeDivider`] is generated once per divisor and then replaces
//! every `n / d` with a multiply-high, a shift and a few bit operations:
//!
//! ```
//! use libdivide_s64::BranchFreeDivider;
//!
//! let seven = BranchFreeDivider::new(7)?;
//! assert_eq!(100i64 / &seven, 14);
//! assert_eq!(-100i64 / &seven, -14);
//! assert_eq!(seven.divide_all(&[21, -22, 6]), vec![3, -3, 0]);
//! # Ok::<(), libdivide_s64::DividerError>(())
//! ```
//!
//! Division follows two's-complement wrapping semantics, so `i64::MIN / -1`
//! evaluates to `i64::MIN` exactly like [`i64::wrapping_div`].

use num_integer::Integer;
use std::fmt;
use std::hash::{Hash, Hasher};

mod batch;

pub use batch::{default_partitions, Quotients};

/// Precomputed form of a nonzero `i64` divisor.
///
/// The layout matches libdivide's `libdivide_s64_branchfree_t`.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct BranchFreeDivider {
    magic: i64,
    more: u8,
}

// Explanation of the "more" field:
//
// * Bits 0-5 is the shift value (for shift path or mult path).
// * Bit 6 is the add indicator for mult path.
// * Bit 7 is set if the divisor is negative. We use bit 7 as the negative
//   divisor indicator so that we can efficiently use sign extension to
//   create a bitmask with all bits set to 1 (if the divisor is negative)
//   or 0 (if the divisor is positive).
//
// A magic number of 0 indicates the shift path. The magic number is never
// negated for negative divisors; the sign is applied after the shift.

const SHIFT_MASK: u8 = 0x3F;
const ADD_MARKER: u8 = 0x40;
const NEGATIVE_DIVISOR: u8 = 0x80;

const BITS: u32 = 64;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DividerError {
    #[error("divider must be != 0")]
    InvalidDivisor,
    #[error("malformed branchfree encoding: magic={magic:#x}, more={more:#04x}")]
    MalformedEncoding { magic: i64, more: u8 },
}

#[inline]
fn mullhi(x: i64, y: i64) -> i64 {
    ((i128::from(x) * i128::from(y)) >> BITS) as i64
}

impl BranchFreeDivider {
    /// Generates the divider for `d`.
    ///
    /// Fails with [`DividerError::InvalidDivisor`] if `d` is 0.
    pub fn new(d: i64) -> Result<Self, DividerError> {
        if d == 0 {
            return Err(DividerError::InvalidDivisor);
        }

        // This works even for i64::MIN, whose absolute value 2**63 is a power
        // of 2 and has exactly one bit set.
        let abs_d = d.unsigned_abs();
        let floor_log_2_d = (BITS - 1) - abs_d.leading_zeros();
        let negative = if d < 0 { NEGATIVE_DIVISOR } else { 0 };

        let divider = if (abs_d & (abs_d - 1)) == 0 {
            BranchFreeDivider {
                magic: 0,
                more: floor_log_2_d as u8 | negative,
            }
        } else {
            debug_assert!((1..=62).contains(&floor_log_2_d));

            // the dividend here is 2**(floor_log_2_d + 63), so the low 64 bit
            // word is 0 and the high word is 2**(floor_log_2_d - 1)
            let (proposed_m, rem) =
                (1u128 << (floor_log_2_d - 1 + BITS)).div_rem(&u128::from(abs_d));
            let mut proposed_m = proposed_m as u64;
            let rem = rem as u64;

            // Always go one power higher. This does not overflow proposed_m,
            // but makes it negative when interpreted as an i64.
            proposed_m = proposed_m.wrapping_add(proposed_m);
            let twice_rem = rem.wrapping_add(rem);
            if twice_rem >= abs_d || twice_rem < rem {
                proposed_m += 1;
            }

            BranchFreeDivider {
                magic: (proposed_m + 1) as i64,
                more: floor_log_2_d as u8 | ADD_MARKER | negative,
            }
        };

        let (magic, more) = divider.to_raw_parts();
        log::trace!(
            "branchfree divider for {}: magic={:#x}, more={:#04x}",
            d,
            magic,
            more
        );
        Ok(divider)
    }

    /// Rebuilds a divider from the fields of a native
    /// `libdivide_s64_branchfree_t`.
    ///
    /// The pair must be exactly what [`BranchFreeDivider::new`] produces for
    /// some divisor; anything else is rejected rather than silently dividing
    /// wrong.
    pub fn from_raw_parts(magic: i64, more: u8) -> Result<Self, DividerError> {
        let candidate = BranchFreeDivider { magic, more };
        match BranchFreeDivider::new(candidate.recover()) {
            Ok(canonical) if canonical == candidate => Ok(candidate),
            _ => Err(DividerError::MalformedEncoding { magic, more }),
        }
    }

    pub fn to_raw_parts(&self) -> (i64, u8) {
        (self.magic, self.more)
    }

    pub fn magic(&self) -> i64 {
        self.magic
    }

    pub fn more(&self) -> u8 {
        self.more
    }

    pub fn shift(&self) -> u32 {
        u32::from(self.more & SHIFT_MASK)
    }

    /// Whether the divisor is `±2**shift`, in which case no multiplication
    /// is performed.
    pub fn is_power_of_two(&self) -> bool {
        self.magic == 0
    }

    pub fn is_negative(&self) -> bool {
        (self.more & NEGATIVE_DIVISOR) != 0
    }

    /// Returns the divisor this divider was generated from.
    pub fn recover(&self) -> i64 {
        let magic = self.magic;
        let shift = self.shift();

        let abs_d = if magic == 0 {
            1u64 << shift
        } else {
            // We compute q = n/d = n*m / 2^(64 + shift)
            // Therefore we have d = 2^(64 + shift) / m
            // m is never negated in branchfree mode, so its unsigned bit
            // pattern is the full magic number. We rounded down in new
            // (hence +1).
            let (q, _) = (1u128 << (shift + BITS)).div_rem(&u128::from(magic as u64));
            (q as u64).wrapping_add(1)
        };

        let d = abs_d as i64;
        if self.is_negative() {
            d.wrapping_neg()
        } else {
            d
        }
    }

    /// Returns `numer / d` rounded toward zero. `i64::MIN / -1` wraps to
    /// `i64::MIN`, as [`i64::wrapping_div`] does.
    ///
    /// ```
    /// # use libdivide_s64::BranchFreeDivider;
    /// let minus_one = BranchFreeDivider::new(-1)?;
    /// assert_eq!(minus_one.divide(i64::MIN), i64::MIN);
    /// # Ok::<(), libdivide_s64::DividerError>(())
    /// ```
    #[inline]
    pub fn divide(&self, numer: i64) -> i64 {
        let more = self.more;
        let magic = self.magic;
        let shift = u32::from(more & SHIFT_MASK);
        // must be arithmetic shift and then sign extend
        let sign = i64::from((more as i8) >> 7);

        let mut q = mullhi(magic, numer).wrapping_add(numer);

        // If q is non-negative, we have nothing to do
        // If q is negative, we want to add either (2**shift)-1 if d is a power of
        // 2, or (2**shift) if it is not a power of 2
        let is_power_of_2 = u64::from(magic == 0);
        let q_sign = (q >> 63) as u64;
        q += (q_sign & ((1u64 << shift) - is_power_of_2)) as i64;

        // Now arithmetic right shift
        q >>= shift;
        // Negate if needed
        (q ^ sign).wrapping_sub(sign)
    }
}

impl TryFrom<i64> for BranchFreeDivider {
    type Error = DividerError;

    fn try_from(d: i64) -> Result<Self, Self::Error> {
        BranchFreeDivider::new(d)
    }
}

impl PartialEq for BranchFreeDivider {
    fn eq(&self, other: &Self) -> bool {
        self.to_raw_parts() == other.to_raw_parts()
    }
}

impl Eq for BranchFreeDivider {}

impl Hash for BranchFreeDivider {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_raw_parts().hash(state);
    }
}

impl fmt::Debug for BranchFreeDivider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // fields of a packed struct cannot be borrowed
        let (magic, more) = self.to_raw_parts();
        f.debug_struct("BranchFreeDivider")
            .field("magic", &magic)
            .field("more", &more)
            .finish()
    }
}

impl std::ops::Div<&BranchFreeDivider> for i64 {
    type Output = Self;

    fn div(self, denom: &BranchFreeDivider) -> Self::Output {
        denom.divide(self)
    }
}

impl std::ops::Div<BranchFreeDivider> for i64 {
    type Output = Self;

    fn div(self, denom: BranchFreeDivider) -> Self::Output {
        denom.divide(self)
    }
}

impl std::ops::DivAssign<&BranchFreeDivider> for i64 {
    fn div_assign(&mut self, denom: &BranchFreeDivider) {
        *self = denom.divide(*self);
    }
}
