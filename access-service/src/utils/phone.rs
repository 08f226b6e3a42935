/// Normalize a phone number to E.164 (`+` followed by 8 to 15 digits).
///
/// Spaces, dashes, dots and parentheses are ignored and a leading `00`
/// international prefix is accepted in place of `+`. Numbers without a
/// country code are rejected since no default region is assumed.
pub fn normalize_e164(raw: &str) -> Option<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let digits = if let Some(rest) = compact.strip_prefix('+') {
        rest
    } else if let Some(rest) = compact.strip_prefix("00") {
        rest
    } else {
        return None;
    };

    if !(8..=15).contains(&digits.len())
        || !digits.chars().all(|c| c.is_ascii_digit())
        || digits.starts_with('0')
    {
        return None;
    }

    Some(format!("+{}", digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting() {
        assert_eq!(
            normalize_e164("+234 (801) 234-5678").as_deref(),
            Some("+2348012345678")
        );
        assert_eq!(
            normalize_e164("0044 20 7946 0958").as_deref(),
            Some("+442079460958")
        );
    }

    #[test]
    fn rejects_local_and_malformed_numbers() {
        assert_eq!(normalize_e164("08012345678"), None);
        assert_eq!(normalize_e164("+12"), None);
        assert_eq!(normalize_e164("+1555abc0100"), None);
        assert_eq!(normalize_e164("+0123456789"), None);
    }
}
