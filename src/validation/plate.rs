use lazy_static::lazy_static;
use regex::Regex;

use crate::models::rules::{DIGIT_CORRECTIONS, LETTER_CORRECTIONS};
use crate::models::{PlateFormat, PlatePatterns, PositionClass};
use crate::utils::PlateError;

lazy_static! {
    static ref NOISE_CHARS: Regex = Regex::new(r"[^A-Z0-9\s]").unwrap();
    static ref WHITESPACE_RUNS: Regex = Regex::new(r"\s+").unwrap();
}

/// Message returned to manual and voice entry callers for unparseable plates.
pub const INVALID_PLATE_MESSAGE: &str = "Invalid number plate. Please double-check.";

/// PlateValidator turns noisy OCR or typed text into a canonically spaced plate.
///
/// OCR reads and manual entries go through the same rules here, so a plate
/// accepted on one path is accepted on the other.
pub struct PlateValidator;

impl PlateValidator {
    /// Trim, uppercase, drop everything outside `[A-Z0-9 ]` and collapse whitespace.
    ///
    /// Trimming happens before noise is dropped, so `"- 5"` cleans to `" 5"`.
    pub fn clean_text(text: &str) -> String {
        let upper = text.trim().to_uppercase();
        let stripped = NOISE_CHARS.replace_all(&upper, "");
        WHITESPACE_RUNS.replace_all(&stripped, " ").into_owned()
    }

    /// Repair common misreads assuming the text is a `format` plate.
    ///
    /// Spaces are removed and a leading `0` becomes `U`. Each character whose
    /// class contradicts the grammar is then swapped through the confusion
    /// tables; characters already of the right class are never touched.
    /// With `Unknown` the characters pass through unchanged.
    pub fn apply_corrections(text: &str, format: PlateFormat) -> String {
        let mut compact: String = text.chars().filter(|c| *c != ' ').collect();

        if !compact.starts_with('U') && compact.starts_with('0') {
            compact.replace_range(..1, "U");
        }

        let rule = match PlatePatterns::rule(format) {
            Some(rule) => rule,
            None => return compact,
        };

        let len = compact.chars().count();
        compact
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let table = match rule.class_at(i, len) {
                    PositionClass::Letter => &*LETTER_CORRECTIONS,
                    PositionClass::Digit => &*DIGIT_CORRECTIONS,
                };
                table.get(&c).copied().unwrap_or(c)
            })
            .collect()
    }

    /// Detect the plate format from cleaned text
    pub fn detect_format(text: &str) -> PlateFormat {
        let compact: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        PlatePatterns::detect(&compact)
    }

    /// Insert the canonical space for `format`. Unknown formats come back compact.
    pub fn format_plate(text: &str, format: PlateFormat) -> String {
        let compact: Vec<char> = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase()
            .chars()
            .collect();

        if let Some(rule) = PlatePatterns::rule(format) {
            if compact.len() > rule.separator_at {
                let head: String = compact[..rule.separator_at].iter().collect();
                let tail: String = compact[rule.separator_at..].iter().collect();
                return format!("{} {}", head, tail);
            }
        }

        compact.into_iter().collect()
    }

    /// Validate and format plate text.
    ///
    /// Each known format is tried as the correction target, in catalog order.
    /// The first corrected string that matches any grammar wins, even if it
    /// matches a different format than the one hypothesized. Returns
    /// `(formatted, format, true)` on success and `(cleaned, Unknown, false)`
    /// when no hypothesis validates.
    pub fn validate_and_format(text: &str) -> (String, PlateFormat, bool) {
        let clean = Self::clean_text(text);

        for hypothesis in PlateFormat::KNOWN {
            let corrected = Self::apply_corrections(&clean, hypothesis);
            let detected = Self::detect_format(&corrected);

            if detected.is_known() {
                let formatted = Self::format_plate(&corrected, detected);
                return (formatted, detected, true);
            }
        }

        (clean, PlateFormat::Unknown, false)
    }

    /// Entry point for typed or spoken plates, where a bad value is a field error.
    pub fn validate_manual_entry(text: &str) -> Result<(String, PlateFormat), PlateError> {
        match Self::validate_and_format(text) {
            (formatted, format, true) => Ok((formatted, format)),
            _ => Err(PlateError::InvalidPlate(INVALID_PLATE_MESSAGE.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(input: &str, expected: &str, format: PlateFormat) {
        let (formatted, fmt, is_valid) = PlateValidator::validate_and_format(input);
        assert!(is_valid, "{} should validate", input);
        assert_eq!(fmt, format, "format of {}", input);
        assert_eq!(formatted, expected, "formatting of {}", input);
    }

    #[test]
    fn test_known_formats() {
        check("UAX123Y", "UAX 123Y", PlateFormat::Legacy);
        check("UDS1234M", "UDS 1234M", PlateFormat::Legacy);
        check("UA077AK", "UA 077AK", PlateFormat::NewStandard);
        check("UMA055AF", "UMA 055AF", PlateFormat::Motorcycle);
        check("UP6633", "UP 6633", PlateFormat::Government);
        check("UG0793", "UG 0793", PlateFormat::Government);
    }

    #[test]
    fn test_leading_zero_read_as_u() {
        check("0A077AK", "UA 077AK", PlateFormat::NewStandard);
    }

    #[test]
    fn test_spacing_and_case_are_normalized() {
        check("ua 077 ak", "UA 077AK", PlateFormat::NewStandard);
        check("UA 077 AK", "UA 077AK", PlateFormat::NewStandard);
        check("  u-a-0-7-7-a-k\n", "UA 077AK", PlateFormat::NewStandard);
    }

    #[test]
    fn test_misreads_repaired_by_position() {
        // O read for 0 in a digit slot, 8 read for B in a letter slot
        check("UAX1O3Y", "UAX 103Y", PlateFormat::Legacy);
        check("UA077A8", "UA 077AB", PlateFormat::NewStandard);
        check("UPG633", "UP 6633", PlateFormat::Government);
    }

    #[test]
    fn test_invalid_text() {
        assert_eq!(
            PlateValidator::validate_and_format("ABC123"),
            ("ABC123".to_string(), PlateFormat::Unknown, false)
        );
        assert_eq!(
            PlateValidator::validate_and_format(""),
            (String::new(), PlateFormat::Unknown, false)
        );
        assert!(!PlateValidator::validate_and_format("UABC12").2);
    }

    #[test]
    fn test_clean_text_keeps_space_left_by_noise() {
        assert_eq!(PlateValidator::clean_text("- 5"), " 5");
        assert_eq!(PlateValidator::clean_text("  ab-c  "), "ABC");
        assert_eq!(
            PlateValidator::validate_and_format("5 ?"),
            ("5 ".to_string(), PlateFormat::Unknown, false)
        );
        check("- UAX123Y", "UAX 123Y", PlateFormat::Legacy);
    }

    #[test]
    fn test_validation_is_idempotent() {
        for plate in ["UAX123Y", "UDS1234M", "0A077AK", "ua 077 ak", "UMA055AF", "UP6633"] {
            let first = PlateValidator::validate_and_format(plate);
            let second = PlateValidator::validate_and_format(&first.0);
            assert_eq!(first, second, "re-validating {}", plate);
        }
    }

    #[test]
    fn test_format_round_trip_from_spacing_variants() {
        for (variant, canonical) in [
            ("uax123y", "UAX 123Y"),
            ("UDS 12 34M", "UDS 1234M"),
            ("u a 0 7 7 a k", "UA 077AK"),
            ("UMA055 AF", "UMA 055AF"),
            ("up  6633", "UP 6633"),
        ] {
            let clean = PlateValidator::clean_text(variant);
            let format = PlateValidator::detect_format(&clean);
            assert_eq!(PlateValidator::format_plate(&clean, format), canonical);
        }
    }

    #[test]
    fn test_corrections_only_touch_wrong_class_characters() {
        let inputs = ["UAX123Y", "U8X1O3Y", "0A0Z7AK", "UMA055AF", "UP66S3", "QQQQQQQQ"];
        for input in inputs {
            for format in PlateFormat::KNOWN {
                let compact: String = input.chars().collect();
                let corrected = PlateValidator::apply_corrections(&compact, format);
                let rule = PlatePatterns::rule(format).unwrap();
                let len = compact.len();
                for (i, (before, after)) in compact.chars().zip(corrected.chars()).enumerate() {
                    if i == 0 && before == '0' {
                        continue;
                    }
                    let fits = match rule.class_at(i, len) {
                        PositionClass::Letter => before.is_ascii_alphabetic(),
                        PositionClass::Digit => before.is_ascii_digit(),
                    };
                    if fits {
                        assert_eq!(before, after, "{} under {:?} changed index {}", input, format, i);
                    }
                }
            }
        }
    }

    #[test]
    fn test_corrections_without_target_pass_through() {
        assert_eq!(
            PlateValidator::apply_corrections("UA 0O7 AK", PlateFormat::Unknown),
            "UA0O7AK"
        );
    }

    #[test]
    fn test_manual_entry_errors_are_structured() {
        assert_eq!(
            PlateValidator::validate_manual_entry("ua077ak").unwrap(),
            ("UA 077AK".to_string(), PlateFormat::NewStandard)
        );
        match PlateValidator::validate_manual_entry("hello") {
            Err(PlateError::InvalidPlate(msg)) => assert_eq!(msg, INVALID_PLATE_MESSAGE),
            other => panic!("expected InvalidPlate, got {:?}", other),
        }
    }
}
