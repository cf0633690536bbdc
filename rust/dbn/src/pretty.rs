//! New types for pretty-printing the fixed-precision prices and nanosecond
//! timestamps found in DBN records.

use std::fmt::{self, Write};

use time::format_description::BorrowedFormatItem;

use crate::{FIXED_PRICE_SCALE, UNDEF_PRICE};

/// A [new type](https://doc.rust-lang.org/rust-by-example/generics/new_types.html) for
/// the fixed-precision prices used in DBN, where every 1 unit corresponds to 1e-9.
///
/// The sentinel [`UNDEF_PRICE`] renders as `UNDEF_PRICE`, never as a number.
///
/// Supports
/// - sign `{:+}` to always print the sign
/// - width `{:N}` to specify a minimum width of `N` characters
/// - fill and alignment
/// - precision `{:.N}` to print `N` decimal places. By default all 9 are printed
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FixedPrice(pub i64);

/// A [new type](https://doc.rust-lang.org/rust-by-example/generics/new_types.html)
/// for formatting nanosecond UNIX timestamps to the canonical ISO 8601 format used
/// by Databento.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Ts(pub u64);

impl FixedPrice {
    /// Returns `true` if the price is the null sentinel [`UNDEF_PRICE`].
    pub const fn is_undefined(self) -> bool {
        self.0 == UNDEF_PRICE
    }

    /// Converts the price to a float, returning `None` for [`UNDEF_PRICE`]. May lose
    /// precision for large magnitudes.
    pub fn to_f64(self) -> Option<f64> {
        if self.is_undefined() {
            None
        } else {
            Some(self.0 as f64 / FIXED_PRICE_SCALE as f64)
        }
    }
}

impl From<i64> for FixedPrice {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<u64> for Ts {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for FixedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

impl fmt::Display for FixedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            return f.write_str("UNDEF_PRICE");
        }
        let is_nonnegative = self.0 >= 0;
        // `unsigned_abs` handles `i64::MIN`
        let px_abs = self.0.unsigned_abs();
        let scale = FIXED_PRICE_SCALE as u64;
        let integer = px_abs / scale;
        let fraction = px_abs % scale;
        let mut buf = String::with_capacity(24);
        buf.push_str(itoa::Buffer::new().format(integer));
        match f.precision() {
            Some(0) => {}
            Some(precision @ 1..=8) => {
                let truncated = fraction / 10u64.pow(9 - precision as u32);
                write!(buf, ".{truncated:0precision$}")?;
            }
            _ => write!(buf, ".{fraction:09}")?,
        }
        f.pad_integral(is_nonnegative, "", &buf)
    }
}

impl fmt::Debug for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const TS_FORMAT: &[BorrowedFormatItem<'static>] = time::macros::format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
        );
        if self.0 == crate::UNDEF_TIMESTAMP {
            return f.pad("UNDEF_TIMESTAMP");
        }
        match time::OffsetDateTime::from_unix_timestamp_nanos(self.0 as i128)
            .ok()
            .and_then(|dt| dt.format(TS_FORMAT).ok())
        {
            Some(dt_str) => f.pad(&dt_str),
            // Fall back to regular int formatting
            None => fmt::Display::fmt(&self.0, f),
        }
    }
}

/// Converts a fixed-precision price to a decimal string with all 9 decimal places
/// printed. Use [`FixedPrice`] to customize the number of printed decimal places,
/// alignment, fill, and other formatting options.
pub fn fmt_px(px: i64) -> String {
    FixedPrice(px).to_string()
}

/// Converts a nanosecond UNIX timestamp to a human-readable string in the format
/// `[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z`.
pub fn fmt_ts(ts: u64) -> String {
    Ts(ts).to_string()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, "0.000000000")]
    #[case(1, "0.000000001")]
    #[case(1_000_000_000, "1.000000000")]
    #[case(-1_000_000_000, "-1.000000000")]
    #[case(372_025_000_000_000, "372025.000000000")]
    #[case(-5_250_000_000, "-5.250000000")]
    #[case(UNDEF_PRICE, "UNDEF_PRICE")]
    fn test_fmt_px(#[case] px: i64, #[case] exp: &str) {
        assert_eq!(fmt_px(px), exp);
        assert_eq!(format!("{}", FixedPrice(px)), exp);
    }

    #[rstest]
    #[case(1_250_000_000, 0, "1")]
    #[case(1_250_000_000, 2, "1.25")]
    #[case(-1_256_000_000, 3, "-1.256")]
    #[case(99_999_999, 4, "0.0999")]
    fn test_fmt_px_precision(#[case] px: i64, #[case] precision: usize, #[case] exp: &str) {
        assert_eq!(format!("{:.precision$}", FixedPrice(px)), exp);
    }

    #[test]
    fn test_fmt_px_sign_and_width() {
        assert_eq!(format!("{:+.1}", FixedPrice(2_500_000_000)), "+2.5");
        assert_eq!(format!("{:>8.2}", FixedPrice(2_500_000_000)), "    2.50");
        assert_eq!(format!("{:.2}", FixedPrice(UNDEF_PRICE)), "UNDEF_PRICE");
    }

    #[test]
    fn test_undef_distinct_from_zero() {
        assert_ne!(fmt_px(UNDEF_PRICE), fmt_px(0));
        assert!(FixedPrice(UNDEF_PRICE).to_f64().is_none());
        assert_eq!(FixedPrice(0).to_f64(), Some(0.0));
        assert_eq!(FixedPrice(1_500_000_000).to_f64(), Some(1.5));
    }

    #[test]
    fn test_fmt_i64_min() {
        assert_eq!(fmt_px(i64::MIN), "-9223372036.854775808");
    }

    #[rstest]
    #[case(0, "1970-01-01T00:00:00.000000000Z")]
    #[case(1_658_441_851_000_000_000, "2022-07-21T22:17:31.000000000Z")]
    #[case(crate::UNDEF_TIMESTAMP, "UNDEF_TIMESTAMP")]
    fn test_fmt_ts(#[case] ts: u64, #[case] exp: &str) {
        assert_eq!(fmt_ts(ts), exp);
    }
}
