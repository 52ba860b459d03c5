//! Container number validation and repair.
//!
//! A container number is a three-letter owner code, a category letter, a
//! six-digit serial, and a check digit computed over the first ten
//! characters (weighted sum mod 11). A shape match is always valid; a
//! wrong check digit only lowers confidence, since hand-copied numbers
//! with a bad check digit still name the intended container.

use std::sync::LazyLock;

use boxtrack_normalize_models::{IdentifierParts, IdentifierValidationResult};
use boxtrack_reference::OwnerRegistry;
use regex::Regex;

use crate::config::IdentifierScoring;

static FULL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{4}[0-9]{7}$").expect("valid regex"));

static SHORT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{4}[0-9]{6}$").expect("valid regex"));

/// Digit-to-letter repairs applied within the owner/category prefix.
const PREFIX_REPAIRS: &[(char, char)] = &[('0', 'O'), ('1', 'I'), ('5', 'S'), ('8', 'B')];

/// Letter-to-digit repairs applied within the serial and check digit.
const SERIAL_REPAIRS: &[(char, char)] = &[
    ('O', '0'),
    ('I', '1'),
    ('L', '1'),
    ('S', '5'),
    ('B', '8'),
];

/// Check-digit values of `A..=Z`: counting from 10 and skipping multiples
/// of 11.
const LETTER_VALUES: [u32; 26] = [
    10, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 34, 35, 36,
    37, 38,
];

const VALID_CATEGORIES: &[char] = &['U', 'J', 'Z'];

fn char_value(c: char) -> Option<u32> {
    if let Some(digit) = c.to_digit(10) {
        return Some(digit);
    }
    if c.is_ascii_uppercase() {
        return Some(LETTER_VALUES[(c as u8 - b'A') as usize]);
    }
    None
}

/// Computes the check digit of the first ten characters of `number`.
///
/// Returns `None` if fewer than ten characters are supplied or any of them
/// is not an uppercase ASCII letter or digit.
#[must_use]
pub fn compute_check_digit(number: &str) -> Option<u8> {
    let mut sum = 0u32;
    let mut count = 0;
    for (position, c) in number.chars().take(10).enumerate() {
        sum += char_value(c)? << position;
        count += 1;
    }
    if count < 10 {
        return None;
    }
    let remainder = sum % 11;
    u8::try_from(if remainder == 10 { 0 } else { remainder }).ok()
}

fn repair(cleaned: &str, corrections: &mut Vec<String>) -> String {
    cleaned
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let table = if i < 4 { PREFIX_REPAIRS } else { SERIAL_REPAIRS };
            match table.iter().find(|&&(from, _)| from == c) {
                Some(&(from, to)) => {
                    corrections.push(format!(
                        "Replaced '{from}' with '{to}' at position {}",
                        i + 1
                    ));
                    to
                }
                None => c,
            }
        })
        .collect()
}

/// Validates container numbers against the check-digit standard and an
/// owner registry.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierValidator<'a> {
    owners: &'a OwnerRegistry,
    scoring: &'a IdentifierScoring,
}

impl<'a> IdentifierValidator<'a> {
    #[must_use]
    pub const fn new(owners: &'a OwnerRegistry, scoring: &'a IdentifierScoring) -> Self {
        Self { owners, scoring }
    }

    /// Cleans, repairs, and scores a candidate container number.
    #[must_use]
    pub fn validate(&self, candidate: &str) -> IdentifierValidationResult {
        let cleaned: String = candidate
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if cleaned.is_empty() {
            return failure(cleaned, "Empty container number".to_string());
        }

        let mut corrections = Vec::new();
        let mut number = repair(&cleaned, &mut corrections);

        if !FULL_SHAPE.is_match(&number) {
            if !SHORT_SHAPE.is_match(&number) {
                return failure(
                    cleaned.clone(),
                    format!("'{cleaned}' does not match the 4 letters + 7 digits shape"),
                );
            }
            let Some(digit) = compute_check_digit(&number) else {
                return failure(cleaned, "Could not compute check digit".to_string());
            };
            corrections.push(format!("Appended computed check digit {digit}"));
            number.push(char::from(b'0' + digit));
        }

        let Some(computed) = compute_check_digit(&number) else {
            return failure(cleaned, "Could not compute check digit".to_string());
        };
        let check_digit = number
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .and_then(|d| u8::try_from(d).ok())
            .unwrap_or_default();

        let category = number.chars().nth(3).unwrap_or_default();
        let prefix = &number[..4];
        let owner_known = self.owners.contains(prefix);
        let check_digit_valid = check_digit == computed;

        let mut confidence = self.scoring.shape_match;
        if check_digit_valid {
            confidence += self.scoring.check_digit_bonus;
        }
        if owner_known {
            confidence += self.scoring.known_owner_bonus;
        }
        if corrections.is_empty() {
            confidence += self.scoring.uncorrected_bonus;
        }

        log::trace!(
            "identifier {candidate:?} -> {number} (check {check_digit}/{computed}, owner_known={owner_known})"
        );

        IdentifierValidationResult {
            is_valid: true,
            parts: Some(IdentifierParts {
                owner_code: number[..3].to_string(),
                category,
                serial: number[4..10].to_string(),
                check_digit,
                computed_check_digit: computed,
                owner_known,
                check_digit_valid,
                category_valid: VALID_CATEGORIES.contains(&category),
            }),
            container_number: number,
            confidence: confidence.clamp(0.0, 1.0),
            corrections,
            error: None,
        }
    }
}

fn failure(container_number: String, error: String) -> IdentifierValidationResult {
    IdentifierValidationResult {
        is_valid: false,
        container_number,
        confidence: 0.0,
        parts: None,
        corrections: Vec::new(),
        error: Some(error),
    }
}
