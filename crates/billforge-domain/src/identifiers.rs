//! Synthetic provider and tax identifiers
//!
//! Provider identifiers follow the 10-digit NPI layout: a leading `1` or
//! `2`, eight more digits, and a Luhn check digit computed over the card
//! issuer prefix `80840` followed by the first nine digits.

/// Issuer prefix the NPI check digit is computed over
pub const NPI_PREFIX: &str = "80840";

/// Known placeholder values that must never reach a published bill
const PLACEHOLDERS: &[&str] = &[
    "1234567890",
    "0123456789",
    "123456789",
    "9876543210",
    "12-3456789",
    "00-0000000",
];

/// Compute the Luhn check digit for a numeric payload
///
/// Returns `None` if the payload contains a non-digit.
pub fn luhn_check_digit(payload: &str) -> Option<u32> {
    let mut sum = 0;
    for (position, ch) in payload.chars().rev().enumerate() {
        let digit = ch.to_digit(10)?;
        // The check digit will sit to the right, so the rightmost payload
        // digit is doubled.
        let value = if position % 2 == 0 {
            let doubled = digit * 2;
            if doubled > 9 { doubled - 9 } else { doubled }
        } else {
            digit
        };
        sum += value;
    }
    Some((10 - sum % 10) % 10)
}

/// Compute the NPI check digit for the first nine digits
pub fn npi_check_digit(first_nine: &str) -> Option<u32> {
    if first_nine.len() != 9 {
        return None;
    }
    luhn_check_digit(&format!("{}{}", NPI_PREFIX, first_nine))
}

/// Validate a 10-digit NPI
///
/// # Examples
///
/// ```
/// use billforge_domain::identifiers::is_valid_npi;
///
/// assert!(is_valid_npi("1234567893"));
/// assert!(!is_valid_npi("1234567890"));
/// ```
pub fn is_valid_npi(npi: &str) -> bool {
    if npi.len() != 10 || !npi.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if !npi.starts_with('1') && !npi.starts_with('2') {
        return false;
    }
    let (body, check) = npi.split_at(9);
    match (npi_check_digit(body), check.chars().next().and_then(|c| c.to_digit(10))) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

/// Build a valid NPI from an arbitrary seed
pub fn npi_from_seed(seed: u64) -> String {
    let body = format!("1{:08}", seed % 100_000_000);
    // Body is always nine ASCII digits, so the check digit exists.
    let check = npi_check_digit(&body).unwrap_or(0);
    format!("{}{}", body, check)
}

/// Build an NPI whose check digit is deliberately wrong
pub fn invalid_npi_from_seed(seed: u64) -> String {
    let valid = npi_from_seed(seed);
    let (body, check) = valid.split_at(9);
    let digit = check.chars().next().and_then(|c| c.to_digit(10)).unwrap_or(0);
    format!("{}{}", body, (digit + 1) % 10)
}

/// Validate an employer identification number (`NN-NNNNNNN`)
pub fn is_valid_ein(ein: &str) -> bool {
    let parts: Vec<&str> = ein.split('-').collect();
    if parts.len() != 2 || parts[0].len() != 2 || parts[1].len() != 7 {
        return false;
    }
    if !parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return false;
    }
    parts[0] != "00" && !is_placeholder(ein)
}

/// Build a well-formed EIN from an arbitrary seed
pub fn ein_from_seed(seed: u64) -> String {
    let prefix = 10 + (seed % 89);
    let serial = (seed / 89) % 10_000_000;
    format!("{:02}-{:07}", prefix, serial)
}

/// Whether an identifier looks like a stand-in rather than a real value
pub fn is_placeholder(id: &str) -> bool {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return true;
    }
    let upper = trimmed.to_uppercase();
    if upper.contains("XXX") || upper == "N/A" || upper == "TBD" || upper == "UNKNOWN" {
        return true;
    }
    if PLACEHOLDERS.contains(&trimmed) {
        return true;
    }
    let digits: Vec<char> = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.len() > 1 && digits.iter().all(|d| *d == digits[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_valid_npi() {
        assert!(is_valid_npi("1234567893"));
        assert_eq!(npi_check_digit("123456789"), Some(3));
    }

    #[test]
    fn test_rejects_wrong_length_and_prefix() {
        assert!(!is_valid_npi("123456789"));
        assert!(!is_valid_npi("3234567893"));
        assert!(!is_valid_npi("12345678a3"));
    }

    #[test]
    fn test_seeded_npis_are_valid() {
        for seed in [0, 1, 42, 99_999_999, 123_456_789_012] {
            assert!(is_valid_npi(&npi_from_seed(seed)), "seed {}", seed);
        }
    }

    #[test]
    fn test_invalid_npi_fails_checksum() {
        for seed in [0, 7, 31_337] {
            let npi = invalid_npi_from_seed(seed);
            assert_eq!(npi.len(), 10);
            assert!(!is_valid_npi(&npi));
        }
    }

    #[test]
    fn test_ein() {
        assert!(is_valid_ein(&ein_from_seed(12345)));
        assert!(!is_valid_ein("00-1234567"));
        assert!(!is_valid_ein("123456789"));
        assert!(!is_valid_ein("12-3456789"));
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("0000000000"));
        assert!(is_placeholder("1234567890"));
        assert!(is_placeholder("XXX-XX-XXXX"));
        assert!(!is_placeholder(&npi_from_seed(4242)));
    }
}
