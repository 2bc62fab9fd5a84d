use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating class codes
    /// Must be lowercase alphanumeric with hyphens
    /// - Valid: "fast-food", "atm", "gas-station-24h"
    /// - Invalid: "-food", "food-", "fast--food", "Food", "fast_food"
    pub static ref CODE_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_regex_valid() {
        assert!(CODE_REGEX.is_match("fast-food"));
        assert!(CODE_REGEX.is_match("atm"));
        assert!(CODE_REGEX.is_match("gas-station-24h"));
        assert!(CODE_REGEX.is_match("a"));
        assert!(CODE_REGEX.is_match("abc123"));
    }

    #[test]
    fn test_code_regex_invalid() {
        assert!(!CODE_REGEX.is_match("-food")); // starts with hyphen
        assert!(!CODE_REGEX.is_match("food-")); // ends with hyphen
        assert!(!CODE_REGEX.is_match("fast--food")); // double hyphen
        assert!(!CODE_REGEX.is_match("Food")); // uppercase
        assert!(!CODE_REGEX.is_match("fast_food")); // underscore
        assert!(!CODE_REGEX.is_match("")); // empty
        assert!(!CODE_REGEX.is_match("fast food")); // space
    }
}
