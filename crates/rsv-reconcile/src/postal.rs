//! Postal code normalization.

/// Normalize to the hyphenated `NNN-NNNN` form used for storage and guest
/// matching. Values that already contain a hyphen are returned unchanged,
/// which makes the function idempotent. Values of three characters or fewer
/// are returned unchanged.
pub fn normalize(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains('-') {
        return raw.to_string();
    }
    match raw.char_indices().nth(3) {
        Some((split, _)) => format!("{}-{}", &raw[..split], &raw[split..]),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn inserts_hyphen_after_three_chars() {
        assert_eq!(normalize("1234567"), "123-4567");
        assert_eq!(normalize(" 1000001 "), "100-0001");
    }

    #[test]
    fn already_hyphenated_is_untouched() {
        assert_eq!(normalize("123-4567"), "123-4567");
        assert_eq!(normalize("12-34567"), "12-34567");
    }

    #[test]
    fn idempotent() {
        for raw in ["1234567", "123-4567", "", "12", "123", "1234", "１２３４５６７"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "raw={raw:?}");
        }
    }

    #[test]
    fn short_values_pass_through() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("123"), "123");
        assert_eq!(normalize("1234"), "123-4");
    }
}
