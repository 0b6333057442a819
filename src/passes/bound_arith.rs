//! Sentinel arithmetic over [`Bound`]/[`Modulus`], carried over unchanged
//! (arithmetically) from `compiler/front_end/expression_bounds.py`'s
//! `_add`/`_sub`/`_mul`/`_max`/`_min`/`_greatest_common_divisor`/
//! `_shared_modular_value` helpers, expressed over a proper sum type
//! instead of the string sentinels `"infinity"` / `"-infinity"` the
//! original used. Per §9 "Integer arithmetic with sentinels", every helper
//! here is total: there is no combination of arguments it panics on.

use crate::ir::expr::{Bound, Modulus};

/// `a + b`, propagating the two infinities the obvious way
/// (`infinity + x = infinity` unless `x` is the opposite infinity, which
/// never arises in this pipeline since mixed finite bounds never combine
/// with both infinities at once).
#[must_use] pub fn add(a: Bound, b: Bound) -> Bound {
  match (a, b) {
    (Bound::PosInfinity, Bound::NegInfinity) | (Bound::NegInfinity, Bound::PosInfinity) => {
      // Not reachable by any expression this pipeline constructs (it would
      // mean e.g. adding a lower bound of -infinity to an upper bound of
      // +infinity within the same operand), but defined for totality.
      Bound::PosInfinity
    }
    (Bound::PosInfinity, _) | (_, Bound::PosInfinity) => Bound::PosInfinity,
    (Bound::NegInfinity, _) | (_, Bound::NegInfinity) => Bound::NegInfinity,
    (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x + y),
  }
}

/// `a - b`, i.e. `add(a, negate(b))`.
#[must_use] pub fn sub(a: Bound, b: Bound) -> Bound {
  add(a, negate(b))
}

#[must_use] pub fn negate(a: Bound) -> Bound {
  match a {
    Bound::PosInfinity => Bound::NegInfinity,
    Bound::NegInfinity => Bound::PosInfinity,
    Bound::Finite(x) => Bound::Finite(-x),
  }
}

#[must_use] fn sign(a: Bound) -> i32 {
  match a {
    Bound::PosInfinity => 1,
    Bound::NegInfinity => -1,
    Bound::Finite(x) if x > 0 => 1,
    Bound::Finite(x) if x < 0 => -1,
    Bound::Finite(_) => 0,
  }
}

/// `a * b`.
#[must_use] pub fn mul(a: Bound, b: Bound) -> Bound {
  match (a, b) {
    (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x * y),
    _ => match sign(a) * sign(b) {
      s if s > 0 => Bound::PosInfinity,
      s if s < 0 => Bound::NegInfinity,
      _ => Bound::Finite(0),
    },
  }
}

/// The maximum of a nonempty slice of bounds.
#[must_use] pub fn max(values: &[Bound]) -> Bound {
  if values.iter().any(|&v| v == Bound::PosInfinity) {
    return Bound::PosInfinity;
  }
  if values.iter().all(|&v| v == Bound::NegInfinity) {
    return Bound::NegInfinity;
  }
  values.iter().copied().filter(|v| !v.is_infinite()).max().unwrap_or(Bound::NegInfinity)
}

/// The minimum of a nonempty slice of bounds.
#[must_use] pub fn min(values: &[Bound]) -> Bound {
  if values.iter().any(|&v| v == Bound::NegInfinity) {
    return Bound::NegInfinity;
  }
  if values.iter().all(|&v| v == Bound::PosInfinity) {
    return Bound::PosInfinity;
  }
  values.iter().copied().filter(|v| !v.is_infinite()).min().unwrap_or(Bound::PosInfinity)
}

#[must_use] fn gcd_u128(mut a: u128, mut b: u128) -> u128 {
  while b != 0 {
    (a, b) = (b, a % b);
  }
  a
}

/// `gcd(a, b)`, where `Modulus::Infinity` acts as the identity
/// (`gcd(infinity, x) == x`), matching `_greatest_common_divisor`.
#[must_use] pub fn gcd(a: Modulus, b: Modulus) -> Modulus {
  match (a, b) {
    (Modulus::Infinity, Modulus::Infinity) => Modulus::Infinity,
    (Modulus::Infinity, Modulus::Finite(x)) | (Modulus::Finite(x), Modulus::Infinity) => Modulus::Finite(x),
    (Modulus::Finite(x), Modulus::Finite(y)) => {
      let g = gcd_u128(x, y);
      if g == 0 { Modulus::Infinity } else { Modulus::Finite(g) }
    }
  }
}

/// `gcd` over a plain (signed) magnitude, used when combining a modulus
/// with a modular value (e.g. `_greatest_common_divisor(bound.modulus,
/// bound.modular_value)` in the multiplication rule).
#[must_use] pub fn gcd_with_value(modulus: Modulus, value: i128) -> Modulus {
  gcd(modulus, Modulus::Finite(value.unsigned_abs()))
}

/// Combines two `(modulus, modular_value)` pairs into the least-restrictive
/// pair both are congruent to, i.e. `_shared_modular_value`. Used by the
/// choice operator and by `$max`.
#[must_use] pub fn shared_modular_value(left: (Modulus, i128), right: (Modulus, i128)) -> (Modulus, i128) {
  let (left_modulus, left_value) = left;
  let (right_modulus, right_value) = right;
  let common_modulus = gcd(left_modulus, right_modulus);
  let diff = (left_value - right_value).unsigned_abs();
  let new_modulus = gcd(common_modulus, Modulus::Finite(diff));
  match new_modulus {
    Modulus::Infinity => (Modulus::Infinity, left_value),
    Modulus::Finite(m) => (Modulus::Finite(m), left_value.rem_euclid(m as i128)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gcd_treats_infinity_as_identity() {
    assert_eq!(gcd(Modulus::Infinity, Modulus::Finite(12)), Modulus::Finite(12));
    assert_eq!(gcd(Modulus::Finite(12), Modulus::Infinity), Modulus::Finite(12));
  }

  #[test]
  fn add_propagates_infinity() {
    assert_eq!(add(Bound::PosInfinity, Bound::Finite(5)), Bound::PosInfinity);
    assert_eq!(add(Bound::Finite(3), Bound::Finite(4)), Bound::Finite(7));
  }

  #[test]
  fn mul_by_zero_constant_is_zero_even_with_infinite_other_side() {
    assert_eq!(mul(Bound::PosInfinity, Bound::Finite(0)), Bound::Finite(0));
  }

  #[test]
  fn shared_modular_value_matches_documented_example() {
    // l % 12 == 7, r % 20 == 15  =>  res % 4 == 3
    let (m, v) = shared_modular_value((Modulus::Finite(12), 7), (Modulus::Finite(20), 15));
    assert_eq!(m, Modulus::Finite(4));
    assert_eq!(v, 3);
  }

  #[test]
  fn shared_modular_value_of_two_equal_constants() {
    let (m, v) = shared_modular_value((Modulus::Infinity, 4), (Modulus::Infinity, 4));
    assert_eq!(m, Modulus::Infinity);
    assert_eq!(v, 4);
  }
}
