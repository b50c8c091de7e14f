//! Integer-micros money representation.
//!
//! # Design invariant
//!
//! Every price stored or compared by the storefront is an `i64` count of
//! micros (1 unit = 1_000_000 micros). Decimal strings are parsed and rendered
//! only at the wire boundary; no `f64` is involved in parsing, margin or
//! discount arithmetic, so `199.99` always stays `199_990_000`.

use std::fmt;

/// Scale factor: 1 price unit = 1_000_000 micros (6 decimal places).
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// Currencies a supplier may declare a price in.
pub const CURRENCIES: &[&str] = &["INR", "USD", "EUR", "RMB"];

pub const DEFAULT_CURRENCY: &str = "INR";

// ---------------------------------------------------------------------------
// PricingError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Input was empty or whitespace.
    Empty,
    /// Input is not a plain non-negative decimal (`"12"`, `"12.5"`, `".5"`).
    Malformed(String),
    /// More than six fractional digits; not representable in micros.
    TooPrecise(String),
    /// Would overflow `i64` after scaling by [`MICROS_PER_UNIT`].
    OutOfRange(String),
}

impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingError::Empty => write!(f, "price is empty"),
            PricingError::Malformed(s) => write!(f, "price is not a decimal number: {s:?}"),
            PricingError::TooPrecise(s) => {
                write!(f, "price has more than 6 decimal places: {s:?}")
            }
            PricingError::OutOfRange(s) => write!(f, "price out of range: {s:?}"),
        }
    }
}

impl std::error::Error for PricingError {}

// ---------------------------------------------------------------------------
// Wire-boundary conversion
// ---------------------------------------------------------------------------

/// Parse a decimal price string into micros without going through `f64`.
pub fn parse_price_micros(raw: &str) -> Result<i64, PricingError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(PricingError::Empty);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(PricingError::Malformed(s.to_string()));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PricingError::Malformed(s.to_string()));
    }
    if frac.len() > 6 {
        return Err(PricingError::TooPrecise(s.to_string()));
    }

    let whole_units: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| PricingError::OutOfRange(s.to_string()))?
    };
    let mut frac_micros: i64 = 0;
    for (i, b) in frac.bytes().enumerate() {
        frac_micros += i64::from(b - b'0') * 10_i64.pow(5 - i as u32);
    }

    whole_units
        .checked_mul(MICROS_PER_UNIT)
        .and_then(|m| m.checked_add(frac_micros))
        .ok_or_else(|| PricingError::OutOfRange(s.to_string()))
}

/// Render micros as a two-decimal string, rounding half away from zero.
pub fn format_price(micros: i64) -> String {
    let cents = round_div(i128::from(micros) * 100, i128::from(MICROS_PER_UNIT));
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Symbol for a currency code. Unknown codes fall back to the rupee sign.
pub fn currency_symbol(currency: &str) -> &'static str {
    match currency {
        "INR" => "₹",
        "USD" => "$",
        "EUR" => "€",
        "RMB" => "¥",
        _ => "₹",
    }
}

pub fn format_money(micros: i64, currency: &str) -> String {
    format!("{}{}", currency_symbol(currency), format_price(micros))
}

// ---------------------------------------------------------------------------
// Margin (finance operator feedback; never persisted)
// ---------------------------------------------------------------------------

/// Margin of `price` over `supplier_price` in hundredths of a percent.
///
/// `(price - supplier) / supplier * 100`, so 100 → 130 yields `3000` (30.00%).
/// Returns `None` when the supplier price is not positive.
pub fn margin_bps(supplier_price_micros: i64, price_micros: i64) -> Option<i64> {
    if supplier_price_micros <= 0 {
        return None;
    }
    let num = (i128::from(price_micros) - i128::from(supplier_price_micros)) * 10_000;
    let bps = round_div(num, i128::from(supplier_price_micros));
    i64::try_from(bps).ok()
}

/// Render a margin in hundredths of a percent as `"30.00"` / `"-20.00"`.
pub fn format_margin(bps: i64) -> String {
    let sign = if bps < 0 { "-" } else { "" };
    let abs = bps.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Margin text for a raw operator input, recomputed on every keystroke.
///
/// Empty or unparsable input yields `None` (nothing to display).
pub fn margin_preview(supplier_price_micros: i64, input: &str) -> Option<String> {
    let price = parse_price_micros(input).ok()?;
    margin_bps(supplier_price_micros, price).map(format_margin)
}

// ---------------------------------------------------------------------------
// Discount (display time only)
// ---------------------------------------------------------------------------

/// Customer-facing unit price after applying `discount_percent`.
///
/// The stored price is never mutated; callers apply this when rendering or
/// when freezing an order line.
pub fn discounted_price(price_micros: i64, discount_percent: i32) -> i64 {
    let pct = i128::from(discount_percent.clamp(0, 100));
    let off = round_div(i128::from(price_micros) * pct, 100);
    (i128::from(price_micros) - off) as i64
}

/// Integer division rounding half away from zero. `den` must be positive.
fn round_div(num: i128, den: i128) -> i128 {
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_prices() {
        assert_eq!(parse_price_micros("200").unwrap(), 200 * MICROS_PER_UNIT);
        assert_eq!(parse_price_micros("199.99").unwrap(), 199_990_000);
        assert_eq!(parse_price_micros(" 0.5 ").unwrap(), 500_000);
        assert_eq!(parse_price_micros(".25").unwrap(), 250_000);
        assert_eq!(parse_price_micros("12.").unwrap(), 12 * MICROS_PER_UNIT);
    }

    #[test]
    fn rejects_garbage_prices() {
        assert_eq!(parse_price_micros(""), Err(PricingError::Empty));
        assert!(matches!(
            parse_price_micros("-5"),
            Err(PricingError::Malformed(_))
        ));
        assert!(matches!(
            parse_price_micros("1e3"),
            Err(PricingError::Malformed(_))
        ));
        assert!(matches!(
            parse_price_micros("."),
            Err(PricingError::Malformed(_))
        ));
        assert!(matches!(
            parse_price_micros("1.0000001"),
            Err(PricingError::TooPrecise(_))
        ));
        assert!(matches!(
            parse_price_micros("99999999999999999999"),
            Err(PricingError::OutOfRange(_))
        ));
    }

    #[test]
    fn margin_matches_operator_examples() {
        let sup = 100 * MICROS_PER_UNIT;
        assert_eq!(
            margin_bps(sup, 130 * MICROS_PER_UNIT).map(format_margin),
            Some("30.00".to_string())
        );
        assert_eq!(
            margin_bps(sup, 80 * MICROS_PER_UNIT).map(format_margin),
            Some("-20.00".to_string())
        );
    }

    #[test]
    fn margin_undefined_for_zero_supplier_price() {
        assert_eq!(margin_bps(0, 10 * MICROS_PER_UNIT), None);
    }

    #[test]
    fn margin_preview_tracks_input() {
        let sup = 200 * MICROS_PER_UNIT;
        assert_eq!(margin_preview(sup, ""), None);
        assert_eq!(margin_preview(sup, "2"), Some("-99.00".to_string()));
        assert_eq!(margin_preview(sup, "26"), Some("-87.00".to_string()));
        assert_eq!(margin_preview(sup, "260"), Some("30.00".to_string()));
        assert_eq!(margin_preview(sup, "abc"), None);
    }

    #[test]
    fn margin_rounds_to_hundredths() {
        // 3 -> 4 is 33.333...%
        assert_eq!(
            margin_bps(3 * MICROS_PER_UNIT, 4 * MICROS_PER_UNIT),
            Some(3333)
        );
        // 3 -> 2 is -33.333...%
        assert_eq!(
            margin_bps(3 * MICROS_PER_UNIT, 2 * MICROS_PER_UNIT),
            Some(-3333)
        );
    }

    #[test]
    fn discount_does_not_touch_undiscounted_price() {
        let p = 260 * MICROS_PER_UNIT;
        assert_eq!(discounted_price(p, 0), p);
        assert_eq!(discounted_price(p, 10), 234 * MICROS_PER_UNIT);
        assert_eq!(discounted_price(p, 100), 0);
        assert_eq!(discounted_price(p, 250), 0, "out-of-range discount clamps");
    }

    #[test]
    fn money_formatting_uses_currency_symbol() {
        assert_eq!(format_money(260 * MICROS_PER_UNIT, "INR"), "₹260.00");
        assert_eq!(format_money(1_995_000, "USD"), "$2.00");
        assert_eq!(format_money(1_994_999, "EUR"), "€1.99");
        assert_eq!(format_money(5 * MICROS_PER_UNIT, "XYZ"), "₹5.00");
    }
}
