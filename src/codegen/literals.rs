//! Integer literal rendering (§4.H.3), ported from
//! `compiler/back_end/cpp/header_generator.py`'s `_render_integer` and
//! `_cpp_integer_type_for_range`.

const I32_MIN: i128 = -(1i128 << 31);
const I32_MAX: i128 = (1i128 << 31) - 1;
const U32_MAX: i128 = (1i128 << 32) - 1;
const I64_MIN: i128 = -(1i128 << 63);
const I64_MAX: i128 = (1i128 << 63) - 1;
const U64_MAX: i128 = (1i128 << 64) - 1;

/// The narrowest of `int32_t, uint32_t, int64_t, uint64_t` that holds
/// `value`, or `None` if `value` is outside `[-2^63, 2^64)`.
#[must_use] pub fn cpp_integer_type_for_value(value: i128) -> Option<&'static str> {
  cpp_integer_type_for_range(value, value)
}

/// As [`cpp_integer_type_for_value`], but for the whole `[min, max]`
/// range an expression's bounds cover -- used to pick the type of an
/// intermediate subexpression, not just a single literal.
#[must_use] pub fn cpp_integer_type_for_range(min: i128, max: i128) -> Option<&'static str> {
  if min >= I32_MIN && max <= I32_MAX {
    Some("::std::int32_t")
  } else if min >= 0 && max <= U32_MAX {
    Some("::std::uint32_t")
  } else if min >= I64_MIN && max <= I64_MAX {
    Some("::std::int64_t")
  } else if min >= 0 && max <= U64_MAX {
    Some("::std::uint64_t")
  } else {
    None
  }
}

/// Renders `value` as `static_cast<TypeName>(VALUE_LL)` (or `...ULL` for
/// an unsigned type), special-casing `-2^63` to avoid a unary-minus
/// warning on the literal `-9223372036854775808`.
#[must_use] pub fn render_integer(value: i128) -> String {
  let integer_type = cpp_integer_type_for_value(value).expect("value must be in [-2^63, 2^64)");
  if value == I64_MIN {
    format!("static_cast<{integer_type}>(-9223372036854775807LL - 1)")
  } else {
    let suffix = if integer_type.contains("uint") { "ULL" } else { "LL" };
    format!("static_cast<{integer_type}>({value}{suffix})")
  }
}

/// As [`cpp_integer_type_for_range`], but for an enum's underlying type:
/// the smallest of `{int,uint}{8,16,32,64}_t` that holds `maximum_bits`
/// with the declared sign (§4.H.4).
#[must_use] pub fn cpp_integer_type_for_enum(maximum_bits: u32, is_signed: bool) -> &'static str {
  for size in [8, 16, 32, 64] {
    if maximum_bits <= size {
      return match (size, is_signed) {
        (8, true) => "::std::int8_t",
        (8, false) => "::std::uint8_t",
        (16, true) => "::std::int16_t",
        (16, false) => "::std::uint16_t",
        (32, true) => "::std::int32_t",
        (32, false) => "::std::uint32_t",
        (64, true) => "::std::int64_t",
        (64, false) => "::std::uint64_t",
        _ => unreachable!(),
      };
    }
  }
  unreachable!("maximum_bits {maximum_bits} exceeds 64")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn small_positive_values_use_int32() {
    assert_eq!(render_integer(42), "static_cast<::std::int32_t>(42LL)");
  }

  #[test]
  fn values_above_int32_use_uint32() {
    assert_eq!(render_integer(3_000_000_000), "static_cast<::std::uint32_t>(3000000000ULL)");
  }

  #[test]
  fn minimum_i64_avoids_unary_minus_on_literal() {
    assert_eq!(render_integer(I64_MIN), "static_cast<::std::int64_t>(-9223372036854775807LL - 1)");
  }

  #[test]
  fn enum_underlying_type_picks_smallest_size() {
    assert_eq!(cpp_integer_type_for_enum(3, false), "::std::uint8_t");
    assert_eq!(cpp_integer_type_for_enum(40, true), "::std::int64_t");
  }
}
