//! Price text parsing, handling regional number formats.

use crate::platform::Region;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses a displayed price such as `$1,234.56` or `1.234,56 €`.
///
/// Currency symbols and words are ignored. For ranges like `$10 - $20` the
/// lower bound is returned. Returns `None` when no positive number can be
/// read, including negative amounts such as `-$5.00`.
pub fn parse_price(text: &str, region: Region) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter_map(|c| match c {
            '0'..='9' | '.' | ',' => Some(c),
            '-' | '\u{2013}' | '\u{2212}' => Some('-'),
            _ => None,
        })
        .collect();

    // A dash before any digit is a sign, not a range separator.
    if cleaned.trim_start_matches(['.', ',']).starts_with('-') {
        return None;
    }

    // Ranges: keep the lower bound.
    let first = cleaned.split('-').next()?;

    let value = parse_number(first, region)?;
    if value > Decimal::ZERO {
        Some(value)
    } else {
        None
    }
}

fn parse_number(text: &str, region: Region) -> Option<Decimal> {
    let text = text.trim_matches(|c| c == '.' || c == ',');
    if text.is_empty() || !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = if region.uses_comma_decimal() {
        // EU format: 1.234,56 -> 1234.56
        text.replace('.', "").replace(',', ".")
    } else {
        // US format: 1,234.56 -> 1234.56
        text.replace(',', "")
    };

    // Stray thousands dots ("1.234.56"): only the last one is decimal.
    let normalized = match normalized.rfind('.') {
        Some(idx) if normalized.matches('.').count() > 1 => {
            let (whole, frac) = normalized.split_at(idx);
            format!("{}{}", whole.replace('.', ""), frac)
        }
        _ => normalized,
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_price_us() {
        assert_eq!(parse_price("$19.99", Region::Us), Some(dec("19.99")));
        assert_eq!(parse_price("$1,234.56", Region::Us), Some(dec("1234.56")));
        assert_eq!(parse_price("US $0.99", Region::Us), Some(dec("0.99")));
        assert_eq!(parse_price("$10", Region::Us), Some(dec("10")));
    }

    #[test]
    fn test_parse_price_eu() {
        assert_eq!(parse_price("29,99 €", Region::De), Some(dec("29.99")));
        assert_eq!(parse_price("1.234,56 €", Region::De), Some(dec("1234.56")));
        assert_eq!(parse_price("EUR 0,99", Region::Fr), Some(dec("0.99")));
    }

    #[test]
    fn test_parse_price_other_regions() {
        assert_eq!(parse_price("£29.99", Region::Uk), Some(dec("29.99")));
        assert_eq!(parse_price("¥2,999", Region::Jp), Some(dec("2999")));
    }

    #[test]
    fn test_parse_price_range_takes_lower_bound() {
        assert_eq!(parse_price("$10 - $20", Region::Us), Some(dec("10")));
        assert_eq!(parse_price("10-20", Region::Us), Some(dec("10")));
    }

    #[test]
    fn test_parse_price_en_dash_range() {
        assert_eq!(parse_price("$10.00 \u{2013} $25.00", Region::Us), Some(dec("10.00")));
    }

    #[test]
    fn test_parse_price_rejects_negative_amounts() {
        assert_eq!(parse_price("-$5.00", Region::Us), None);
        assert_eq!(parse_price("Save: -$5.00", Region::Us), None);
        assert_eq!(parse_price("-12,50 €", Region::De), None);
        assert_eq!(parse_price("\u{2212}3.00", Region::Us), None);
        assert_eq!(parse_price("-5", Region::Us), None);
    }

    #[test]
    fn test_parse_price_multiple_dots() {
        assert_eq!(parse_price("1.234.56", Region::Us), Some(dec("1234.56")));
    }

    #[test]
    fn test_parse_price_trailing_separator() {
        assert_eq!(parse_price("$12.", Region::Us), Some(dec("12")));
    }

    #[test]
    fn test_parse_price_rejects_non_prices() {
        assert_eq!(parse_price("", Region::Us), None);
        assert_eq!(parse_price("   ", Region::Us), None);
        assert_eq!(parse_price("N/A", Region::Us), None);
        assert_eq!(parse_price("See price in cart", Region::Us), None);
        assert_eq!(parse_price("$0.00", Region::Us), None);
        assert_eq!(parse_price("...", Region::Us), None);
    }
}
