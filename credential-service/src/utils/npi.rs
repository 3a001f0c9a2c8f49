//! National Provider Identifier generation and Luhn validation.

use rand::Rng;
use thiserror::Error;

/// Issuer prefix prepended before the random body.
pub const NPI_PREFIX: &str = "808403";

const GENERATED_LENGTH: usize = 14;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum NpiError {
    #[error("identifier must contain only digits")]
    InvalidFormat,
}

/// Luhn-validate a candidate identifier: the last digit must equal the
/// check digit computed over the rest.
pub fn valid_npi(candidate: &str) -> bool {
    let Ok(digits) = digits_of(candidate) else {
        return false;
    };
    if digits.len() < 2 {
        return false;
    }

    let (body, check) = digits.split_at(digits.len() - 1);
    luhn_check_digit(body) == check[0]
}

/// Generate an identifier: the prefix padded with random digits to
/// fourteen, plus the Luhn check digit. Callers slice the final ten
/// digits as the issuable NPI and retry on collision.
pub fn generate_npi(prefix: &str) -> Result<String, NpiError> {
    let mut digits = digits_of(prefix)?;

    let mut rng = rand::thread_rng();
    while digits.len() < GENERATED_LENGTH {
        digits.push(rng.gen_range(0..10));
    }
    digits.truncate(GENERATED_LENGTH);

    let check = luhn_check_digit(&digits);
    digits.push(check);

    Ok(digits.iter().map(|d| char::from(b'0' + d)).collect())
}

/// Issuable ten-digit NPI from a freshly generated identifier.
pub fn issuable_npi() -> Result<String, NpiError> {
    let full = generate_npi(NPI_PREFIX)?;
    Ok(full[full.len() - 10..].to_string())
}

fn digits_of(s: &str) -> Result<Vec<u8>, NpiError> {
    s.chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or(NpiError::InvalidFormat)
        })
        .collect()
}

/// Luhn check digit over `body`: walking right to left, double every
/// second digit (subtracting nine when doubling overflows), sum, and
/// take the amount needed to reach the next multiple of ten.
fn luhn_check_digit(body: &[u8]) -> u8 {
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = d as u32;
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    ((10 - (sum % 10)) % 10) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identifiers_validate() {
        for _ in 0..100 {
            let npi = generate_npi(NPI_PREFIX).unwrap();
            assert_eq!(npi.len(), 15);
            assert!(valid_npi(&npi), "generated NPI failed validation: {}", npi);
        }
    }

    #[test]
    fn issuable_npis_are_ten_digits_and_valid() {
        for _ in 0..100 {
            let npi = issuable_npi().unwrap();
            assert_eq!(npi.len(), 10);
            assert!(npi.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn single_digit_corruption_is_detected() {
        for _ in 0..20 {
            let npi = generate_npi(NPI_PREFIX).unwrap();
            let digits: Vec<u8> = npi.bytes().map(|b| b - b'0').collect();

            for position in 0..digits.len() {
                for replacement in 0..10u8 {
                    if replacement == digits[position] {
                        continue;
                    }
                    let mut corrupted = digits.clone();
                    corrupted[position] = replacement;
                    let corrupted: String =
                        corrupted.iter().map(|d| char::from(b'0' + d)).collect();
                    assert!(
                        !valid_npi(&corrupted),
                        "corruption at {} undetected: {} -> {}",
                        position,
                        npi,
                        corrupted
                    );
                }
            }
        }
    }

    #[test]
    fn non_digit_input_is_invalid() {
        assert!(!valid_npi("12345abcde"));
        assert!(!valid_npi(""));
        assert_eq!(generate_npi("80840x"), Err(NpiError::InvalidFormat));
    }

    #[test]
    fn known_luhn_example_validates() {
        // 79927398713 is the canonical Luhn test number.
        assert!(valid_npi("79927398713"));
        assert!(!valid_npi("79927398714"));
    }
}
