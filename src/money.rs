// Money helpers. Amounts are f64 dollars throughout; cents are only used
// where exact comparison matters (ranking ties).

/// Round to the nearest cent
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Whole cents, for exact comparisons
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// "$1,234.56", or "—" for zero
pub fn format_money(amount: f64) -> String {
    if amount == 0.0 {
        return "—".to_string();
    }

    let cents = to_cents(amount.abs());
    let dollars = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "—");
        assert_eq!(format_money(99.9), "$99.90");
        assert_eq!(format_money(302_611.7), "$302,611.70");
        assert_eq!(format_money(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_money(-45.99), "-$45.99");
    }

    #[test]
    fn test_cents() {
        assert_eq!(to_cents(6_069.52), 606_952);
        assert_eq!(round_cents(100.2456), 100.25);
    }
}
