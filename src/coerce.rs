//! Tolerant text-to-integer coercion.
//!
//! Source tables spell "no value" several ways (empty field, whitespace,
//! `NaN`, a missing column). All of them collapse to the caller's default,
//! which means a missing value and a reported zero become indistinguishable
//! once the default is `0`.

/// Convert `value` to an integer, falling back to `default`.
///
/// The text is parsed as a floating-point number and truncated toward zero,
/// so `"1234.0"` and `"42.9"` become `1234` and `42`. Absent, blank, and
/// non-numeric input (including `NaN` and infinities) yields `default`.
/// Magnitudes beyond `i64` saturate.
#[must_use]
pub fn coerce_int(value: Option<&str>, default: i64) -> i64 {
    let Some(text) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    match text.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        Ok(v) if v.is_finite() => v.trunc() as i64,
        _ => default,
    }
}
