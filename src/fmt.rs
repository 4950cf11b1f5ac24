/// Format with thousands separators and two decimals: 1,234.56
pub fn grouped(val: f64) -> String {
    let negative = val < 0.0;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((&cents, "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Dollar amounts get a `$` prefix; anything else is suffixed with its code.
pub fn money(val: f64, currency: &str) -> String {
    if currency.eq_ignore_ascii_case("USD") {
        match grouped(val).strip_prefix('-') {
            Some(abs) => format!("-${abs}"),
            None => format!("${}", grouped(val)),
        }
    } else {
        format!("{} {}", grouped(val), currency.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56, "USD"), "$1,234.56");
        assert_eq!(money(-500.00, "usd"), "-$500.00");
        assert_eq!(money(0.0, "USD"), "$0.00");
        assert_eq!(money(1000000.99, "USD"), "$1,000,000.99");
        assert_eq!(money(42.10, "USD"), "$42.10");
    }

    #[test]
    fn test_money_other_currencies() {
        assert_eq!(money(1234.5, "eur"), "1,234.50 EUR");
        assert_eq!(money(-80.0, "ARS"), "-80.00 ARS");
        assert_eq!(grouped(999.999), "1,000.00");
    }
}
