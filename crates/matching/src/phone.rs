use crate::config::MatchingConfig;

/// Reduce a free-form phone number to a comparison key.
///
/// Strips every non-digit, rejects numbers shorter than `min_digits` and keeps the
/// last `significant_digits`, so `+1 (555) 010-0123` and `555.010.0123` share a key.
pub fn normalize_phone(raw: &str, config: &MatchingConfig) -> Option<String> {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < config.min_digits {
        return None;
    }
    let keep = config.significant_digits.min(digits.len());
    Some(digits[digits.len() - keep..].iter().collect())
}
