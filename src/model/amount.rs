use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Decimal places carried by [`Fin`]. Matches the on-chain token's precision.
pub const FIN_DECIMALS: u32 = 9;
const FIN_SCALE: u64 = 1_000_000_000;

/// A non-negative FIN amount, fixed-point with [`FIN_DECIMALS`] decimal
/// places, stored as whole nano-FIN units.
///
/// Intermediate accrual math is done in `f64` (see `engine::mining`); the
/// result is quantised back to `Fin` only at cap/claim boundaries, so
/// replicas never drift from re-deriving floating point sums independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Fin(u64);

impl Fin {
    pub const ZERO: Fin = Fin(0);

    /// Construct from whole nano-FIN units (no scaling).
    pub const fn from_units(units: u64) -> Self {
        Fin(units)
    }

    /// Construct from a whole-token amount, e.g. `Fin::from_whole(1)` == 1.0 FIN.
    pub const fn from_whole(whole: u64) -> Self {
        Fin(whole * FIN_SCALE)
    }

    /// Quantise a non-negative floating point FIN amount down to the nearest
    /// nano-FIN unit. Negative or non-finite inputs clamp to zero.
    pub fn from_f64_floor(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Fin::ZERO;
        }
        Fin((value * FIN_SCALE as f64).floor() as u64)
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    /// Lossy conversion back to floating point, for use as a composition
    /// input (e.g. whale regression reads lifetime mined FIN as whole tokens).
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / FIN_SCALE as f64
    }

    /// Whole-token truncation, used by the whale regression factor which is
    /// defined in terms of whole lifetime-mined tokens.
    pub fn whole_tokens(self) -> u64 {
        self.0 / FIN_SCALE
    }

    pub fn checked_add(self, rhs: Fin) -> Option<Fin> {
        self.0.checked_add(rhs.0).map(Fin)
    }

    pub fn saturating_sub(self, rhs: Fin) -> Fin {
        Fin(self.0.saturating_sub(rhs.0))
    }

    pub fn saturating_add(self, rhs: Fin) -> Fin {
        Fin(self.0.saturating_add(rhs.0))
    }

    pub fn min(self, rhs: Fin) -> Fin {
        std::cmp::min(self, rhs)
    }
}

impl Add for Fin {
    type Output = Fin;
    fn add(self, rhs: Fin) -> Fin {
        self.checked_add(rhs).expect("Fin addition overflow")
    }
}

impl AddAssign for Fin {
    fn add_assign(&mut self, rhs: Fin) {
        *self = *self + rhs;
    }
}

impl Sub for Fin {
    type Output = Fin;
    fn sub(self, rhs: Fin) -> Fin {
        self.saturating_sub(rhs)
    }
}

impl SubAssign for Fin {
    fn sub_assign(&mut self, rhs: Fin) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Fin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}", self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_round_trips() {
        assert_eq!(Fin::from_whole(5).units(), 5 * FIN_SCALE);
        assert_eq!(Fin::from_whole(5).whole_tokens(), 5);
    }

    #[test]
    fn floor_quantises_down() {
        let f = Fin::from_f64_floor(0.238_800_000_9);
        assert_eq!(f.units(), 238_800_000);
    }

    #[test]
    fn negative_and_nan_clamp_to_zero() {
        assert_eq!(Fin::from_f64_floor(-1.0), Fin::ZERO);
        assert_eq!(Fin::from_f64_floor(f64::NAN), Fin::ZERO);
    }

    #[test]
    fn saturating_sub_never_underflows() {
        assert_eq!(Fin::from_whole(1).saturating_sub(Fin::from_whole(2)), Fin::ZERO);
    }
}
