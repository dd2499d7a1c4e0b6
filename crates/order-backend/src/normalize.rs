//! Phone number normalization (§8 "Laws").
//!
//! `normalize("+81" + rest) == "0" + rest`; `normalize("81" + rest) == "0" +
//! rest` when the input length ≥ 11; dashes are removed; `normalize` is
//! idempotent.

/// Normalize a raw dialed-number string to the backend's expected
/// domestic `0…` form.
pub fn normalize_phone(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| *c != '-').collect();

    if let Some(rest) = stripped.strip_prefix("+81") {
        return format!("0{rest}");
    }
    if stripped.starts_with("81") && stripped.len() >= 11 {
        let rest = &stripped[2..];
        return format!("0{rest}");
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_country_code_becomes_domestic() {
        assert_eq!(normalize_phone("+818012345678"), "08012345678");
    }

    #[test]
    fn bare_country_code_becomes_domestic_when_long_enough() {
        assert_eq!(normalize_phone("818012345678"), "08012345678");
    }

    #[test]
    fn short_number_starting_with_81_is_left_alone() {
        // length < 11, not a country-code prefix in practice.
        assert_eq!(normalize_phone("8112345"), "8112345");
    }

    #[test]
    fn dashes_are_stripped() {
        assert_eq!(normalize_phone("080-1234-5678"), "08012345678");
        assert_eq!(normalize_phone("+81-80-1234-5678"), "08012345678");
    }

    #[test]
    fn already_domestic_number_is_unchanged() {
        assert_eq!(normalize_phone("08012345678"), "08012345678");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "+818012345678",
            "818012345678",
            "080-1234-5678",
            "08012345678",
            "8112345",
        ];
        for input in inputs {
            let once = normalize_phone(input);
            let twice = normalize_phone(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }
}
