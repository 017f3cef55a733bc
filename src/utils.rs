use crate::types::{AggregatorError, Result};
use ethers::types::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parse a human token amount into the token's smallest unit
/// Examples: "1.0", "0.5", "1000"
pub fn parse_token_amount(amount_str: &str, decimals: u8) -> Result<U256> {
    let parts: Vec<&str> = amount_str.trim().split('.').collect();

    if parts.is_empty() || parts.len() > 2 {
        return Err(AggregatorError::ParseError(format!(
            "Invalid amount format: {}",
            amount_str
        )));
    }

    if parts[0].is_empty() || !parts[0].bytes().all(|b| b.is_ascii_digit()) {
        return Err(AggregatorError::ParseError(format!(
            "Invalid integer part: {}",
            parts[0]
        )));
    }

    let integer_part = parts[0]
        .parse::<u128>()
        .map_err(|_| AggregatorError::ParseError(format!("Invalid integer part: {}", parts[0])))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.is_empty() || !dec_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AggregatorError::ParseError(format!(
                "Invalid decimal part: {}",
                dec_str
            )));
        }
        if dec_str.len() > decimals as usize {
            return Err(AggregatorError::ParseError(format!(
                "Too many decimal places. Max: {}",
                decimals
            )));
        }
        // Pad with zeros to reach full decimals
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| AggregatorError::ParseError(format!("Invalid decimal part: {}", dec_str)))?
    } else {
        0
    };

    let multiplier = 10u128
        .checked_pow(decimals as u32)
        .ok_or(AggregatorError::MathError)?;
    let total = integer_part
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(decimal_part))
        .ok_or(AggregatorError::MathError)?;

    Ok(U256::from(total))
}

/// Format a smallest-unit amount with decimals, trimming trailing zeros
pub fn format_token_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::exp10(decimals as usize);
    let integer_part = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        return format!("{}", integer_part);
    }

    let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
    let trimmed = decimal_str.trim_end_matches('0');

    if trimmed.is_empty() {
        format!("{}", integer_part)
    } else {
        format!("{}.{}", integer_part, trimmed)
    }
}

/// Smallest-unit amount as a Decimal in human units.
/// None when the amount does not fit a 96-bit mantissa.
pub fn to_decimal(amount: U256, decimals: u8) -> Option<Decimal> {
    if amount.bits() > 96 {
        return None;
    }
    let mantissa = i128::try_from(amount.as_u128()).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, decimals as u32).ok()
}

/// Smallest-unit amount in human units as f64, for amounts of any size
pub fn to_f64(amount: U256, decimals: u8) -> f64 {
    let divisor = U256::exp10(decimals as usize);
    let whole = (amount / divisor).to_string().parse::<f64>().unwrap_or(f64::MAX);
    let fraction = (amount % divisor).to_string().parse::<f64>().unwrap_or(0.0);
    whole + fraction / 10f64.powi(decimals as i32)
}

/// Fixed-place display of a smallest-unit amount, e.g. "9.994000 USDC"
pub fn format_display_amount(amount: U256, decimals: u8, places: u32, symbol: &str) -> String {
    match to_decimal(amount, decimals) {
        Some(value) => {
            let rounded = value.round_dp_with_strategy(places, RoundingStrategy::ToZero);
            format!("{:.*} {}", places as usize, rounded, symbol.to_uppercase())
        }
        None => format!("{} {}", format_token_amount(amount, decimals), symbol.to_uppercase()),
    }
}

/// (sent - received) / sent * 100, rounded to two places
pub fn bridge_loss_percentage(sent: U256, received: U256, decimals: u8) -> Decimal {
    if sent.is_zero() {
        return Decimal::ZERO;
    }
    match (to_decimal(sent, decimals), to_decimal(received, decimals)) {
        (Some(sent), Some(received)) => {
            ((sent - received) / sent * Decimal::ONE_HUNDRED).round_dp(2)
        }
        _ => wide_loss_percentage(sent, received),
    }
}

/// Loss in hundredths of a percent with U256 arithmetic, truncated toward zero
fn wide_loss_percentage(sent: U256, received: U256) -> Decimal {
    let (diff, negative) = if received > sent {
        (received - sent, true)
    } else {
        (sent - received, false)
    };
    let hundredths = match diff.checked_mul(U256::from(10_000u64)) {
        Some(scaled) => scaled / sent,
        None => match sent / U256::from(10_000u64) {
            unit if unit.is_zero() => U256::MAX,
            unit => diff / unit,
        },
    };
    let hundredths = if hundredths.bits() > 63 {
        i64::MAX
    } else {
        hundredths.low_u64() as i64
    };
    let loss = Decimal::new(hundredths, 2);
    if negative {
        -loss
    } else {
        loss
    }
}

/// Parse a USD figure as reported by provider APIs ("3.5", "0.106", "1e-3")
pub fn parse_usd(value: &str) -> Option<Decimal> {
    let value = value.trim();
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// Sum of USD figures, skipping entries that do not parse
pub fn sum_usd<'a>(values: impl IntoIterator<Item = &'a str>) -> Decimal {
    values.into_iter().filter_map(parse_usd).sum()
}

/// Parse a smallest-unit integer string from a provider response
pub fn parse_units(value: &str) -> Option<U256> {
    U256::from_dec_str(value.trim()).ok()
}

/// Serialize U256 as a decimal integer string
pub mod u256_dec {
    use ethers::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_amount() {
        let amount = parse_token_amount("1.0", 18).unwrap();
        assert_eq!(amount, U256::from(1_000_000_000_000_000_000u128));

        let amount = parse_token_amount("0.5", 18).unwrap();
        assert_eq!(amount, U256::from(500_000_000_000_000_000u128));

        let amount = parse_token_amount("10", 6).unwrap();
        assert_eq!(amount, U256::from(10_000_000u64));

        let amount = parse_token_amount("1.23456", 6).unwrap();
        assert_eq!(amount, U256::from(1_234_560u64));
    }

    #[test]
    fn test_parse_token_amount_rejects_bad_input() {
        assert!(parse_token_amount("1.1234567", 6).is_err());
        assert!(parse_token_amount("1.2.3", 6).is_err());
        assert!(parse_token_amount("abc", 6).is_err());
        assert!(parse_token_amount("1.", 6).is_err());
        assert!(parse_token_amount("-1", 6).is_err());
        assert!(parse_token_amount("+10", 6).is_err());
        assert!(parse_token_amount(".5", 6).is_err());
    }

    #[test]
    fn test_format_token_amount() {
        assert_eq!(format_token_amount(U256::from(1_000_000u64), 6), "1");
        assert_eq!(format_token_amount(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_token_amount(U256::from(9_994_000u64), 6), "9.994");
        assert_eq!(format_token_amount(U256::zero(), 6), "0");
    }

    #[test]
    fn test_format_display_amount() {
        assert_eq!(
            format_display_amount(U256::from(9_994_000u64), 6, 6, "usdc"),
            "9.994000 USDC"
        );
        assert_eq!(
            format_display_amount(U256::from(9_999_999u64), 6, 2, "usdc"),
            "9.99 USDC"
        );
    }

    #[test]
    fn test_bridge_loss_percentage() {
        let sent = U256::from(10_000_000u64);
        assert_eq!(
            bridge_loss_percentage(sent, U256::from(9_980_000u64), 6),
            Decimal::new(20, 2)
        );
        assert_eq!(bridge_loss_percentage(sent, sent, 6), Decimal::ZERO);
        assert_eq!(bridge_loss_percentage(U256::zero(), sent, 6), Decimal::ZERO);
    }

    #[test]
    fn test_parse_usd() {
        assert_eq!(parse_usd("3.50"), Some(Decimal::new(350, 2)));
        assert_eq!(parse_usd("1e-3"), Some(Decimal::new(1, 3)));
        assert_eq!(parse_usd("n/a"), None);
        assert_eq!(sum_usd(["0.1", "0.006", "junk"]), Decimal::new(106, 3));
    }

    #[test]
    fn test_to_f64_beyond_decimal_range() {
        assert_eq!(to_f64(U256::from(1_500_000u64), 6), 1.5);
        assert_eq!(to_f64(U256::zero(), 18), 0.0);

        let small = U256::one() << 95;
        let large = U256::one() << 97;
        assert!(to_decimal(large, 18).is_none());
        assert!((to_f64(large, 18) / to_f64(small, 18) - 4.0).abs() < 1e-9);

        // 1e11 ETH in wei
        let wei = U256::exp10(29);
        assert!((to_f64(wei, 18) - 1e11).abs() < 1.0);
    }

    #[test]
    fn test_bridge_loss_percentage_beyond_decimal_range() {
        let sent = U256::exp10(29);
        let received = sent - sent / U256::from(200u64);
        assert_eq!(bridge_loss_percentage(sent, received, 18), Decimal::new(50, 2));
        assert_eq!(bridge_loss_percentage(sent, sent, 18), Decimal::ZERO);

        let gained = sent + sent / U256::from(100u64);
        assert_eq!(bridge_loss_percentage(sent, gained, 18), Decimal::new(-100, 2));
    }

    #[test]
    fn test_to_decimal_bounds() {
        assert_eq!(to_decimal(U256::from(1_500_000u64), 6), Some(Decimal::new(15, 1)));
        assert_eq!(to_decimal(U256::MAX, 18), None);
    }
}
