//! Brazilian-locale validators and formatters (CPF, phone, currency, dates).
//! All pure functions; the handlers call these before touching the database.

use chrono::NaiveDate;

/// Strips every non-digit character (`"529.982.247-25"` → `"52998224725"`).
pub fn unformat_cpf(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Formats an 11-digit CPF as `000.000.000-00`. Returns `None` when the
/// input does not contain exactly 11 digits.
pub fn format_cpf(input: &str) -> Option<String> {
    let digits = unformat_cpf(input);
    if digits.len() != 11 {
        return None;
    }
    Some(format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    ))
}

/// Validates a CPF checksum. Accepts formatted or bare input.
///
/// Rejects anything that is not 11 digits, the repeated-digit sequences
/// (`111.111.111-11` passes the arithmetic but is not a valid CPF), and
/// values whose check digits do not match.
pub fn validate_cpf(input: &str) -> bool {
    let digits = unformat_cpf(input);
    if digits.len() != 11 {
        return false;
    }
    let d: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if d.iter().all(|&x| x == d[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let weight = (len + 1) as u32;
        let sum: u32 = d[..len]
            .iter()
            .enumerate()
            .map(|(i, &digit)| digit * (weight - i as u32))
            .sum();
        let rem = sum % 11;
        if rem < 2 {
            0
        } else {
            11 - rem
        }
    };

    check(9) == d[9] && check(10) == d[10]
}

/// Validates a Brazilian phone number: optional `+55` country code, a two
/// digit DDD, then 8 (landline) or 9 (mobile, leading `9`) digits.
pub fn validate_phone(input: &str) -> bool {
    let mut digits: &str = &input.chars().filter(|c| c.is_ascii_digit()).collect::<String>();
    let owned;
    if digits.len() > 11 {
        match digits.strip_prefix("55") {
            Some(rest) => {
                owned = rest.to_string();
                digits = &owned;
            }
            None => return false,
        }
    }
    match digits.len() {
        10 => !digits.starts_with('0') && &digits[1..2] != "0",
        11 => !digits.starts_with('0') && &digits[1..2] != "0" && &digits[2..3] == "9",
        _ => false,
    }
}

/// Formats integer centavos as BRL display text: `123456` → `"R$ 1.234,56"`.
pub fn format_currency(centavos: i64) -> String {
    let negative = centavos < 0;
    let abs = centavos.unsigned_abs();
    let reais = abs / 100;
    let cents = abs % 100;

    let digits = reais.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}R$ {grouped},{cents:02}")
}

/// Parses a `dd/MM/yyyy` display date.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, "%d/%m/%Y").ok()
}

/// Formats a date in the `dd/MM/yyyy` display convention.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// A range is valid when the start does not come after the end.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> bool {
    start <= end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_rejects_repeated_digits() {
        assert!(!validate_cpf("111.111.111-11"));
        assert!(!validate_cpf("00000000000"));
    }

    #[test]
    fn cpf_rejects_wrong_check_digits() {
        // Correct length, last two digits corrupted.
        assert!(!validate_cpf("529.982.247-26"));
        assert!(!validate_cpf("52998224715"));
    }

    #[test]
    fn cpf_rejects_wrong_length() {
        assert!(!validate_cpf("5299822472"));
        assert!(!validate_cpf(""));
        assert!(!validate_cpf("529.982.247-255"));
    }

    #[test]
    fn cpf_accepts_known_valid_value() {
        assert!(validate_cpf("529.982.247-25"));
        assert!(validate_cpf("52998224725"));
    }

    #[test]
    fn cpf_format_and_unformat_are_inverses() {
        let bare = "52998224725";
        let formatted = format_cpf(bare).unwrap();
        assert_eq!(formatted, "529.982.247-25");
        assert_eq!(unformat_cpf(&formatted), bare);
        assert_eq!(format_cpf(&unformat_cpf("529.982.247-25")).unwrap(), formatted);
    }

    #[test]
    fn format_cpf_requires_eleven_digits() {
        assert!(format_cpf("12345").is_none());
    }

    #[test]
    fn phone_accepts_mobile_and_landline() {
        assert!(validate_phone("(11) 98765-4321"));
        assert!(validate_phone("11987654321"));
        assert!(validate_phone("1133334444"));
        assert!(validate_phone("+55 11 98765-4321"));
    }

    #[test]
    fn phone_rejects_bad_shapes() {
        assert!(!validate_phone("987654321")); // missing DDD
        assert!(!validate_phone("11887654321")); // 11 digits but not mobile 9
        assert!(!validate_phone("01987654321")); // DDD cannot start with 0
        assert!(!validate_phone(""));
    }

    #[test]
    fn currency_grouping_and_cents() {
        assert_eq!(format_currency(0), "R$ 0,00");
        assert_eq!(format_currency(5), "R$ 0,05");
        assert_eq!(format_currency(123456), "R$ 1.234,56");
        assert_eq!(format_currency(100000000), "R$ 1.000.000,00");
        assert_eq!(format_currency(-987654321), "-R$ 9.876.543,21");
    }

    #[test]
    fn date_roundtrip_and_range() {
        let d = parse_date("03/02/2025").unwrap();
        assert_eq!(format_date(d), "03/02/2025");
        assert!(parse_date("31/02/2025").is_none());

        let start = parse_date("01/01/2025").unwrap();
        let end = parse_date("31/12/2025").unwrap();
        assert!(validate_date_range(start, end));
        assert!(validate_date_range(start, start));
        assert!(!validate_date_range(end, start));
    }
}
