// Plate grammars and the OCR confusion tables used to repair them.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::PlateFormat;

/// What a grammar expects at one character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionClass {
    Letter,
    Digit,
}

/// Declarative description of one plate format.
#[derive(Debug)]
pub struct FormatRule {
    pub format: PlateFormat,
    pub pattern: Regex,
    pub min_len: usize,
    pub max_len: usize,
    /// Index at which the canonical space is inserted.
    pub separator_at: usize,
    /// Leading characters that are letters.
    prefix_letters: usize,
    /// Trailing characters that are letters.
    suffix_letters: usize,
}

impl FormatRule {
    fn new(
        format: PlateFormat,
        pattern: &str,
        len: (usize, usize),
        separator_at: usize,
        prefix_letters: usize,
        suffix_letters: usize,
    ) -> Self {
        FormatRule {
            format,
            pattern: Regex::new(pattern).expect("plate grammar must compile"),
            min_len: len.0,
            max_len: len.1,
            separator_at,
            prefix_letters,
            suffix_letters,
        }
    }

    /// Class expected at `index` in a space-free string of length `len`.
    ///
    /// Letters sit in the prefix and in the suffix; everything between is a
    /// digit. Legacy plates anchor their single suffix letter to the end, so
    /// the rule also holds for their 3- and 4-digit variants.
    pub fn class_at(&self, index: usize, len: usize) -> PositionClass {
        let in_prefix = index < self.prefix_letters;
        let in_suffix = match self.format {
            PlateFormat::Legacy => index + self.suffix_letters >= len,
            _ => index >= self.max_len - self.suffix_letters,
        };
        if in_prefix || (self.suffix_letters > 0 && in_suffix) {
            PositionClass::Letter
        } else {
            PositionClass::Digit
        }
    }

    pub fn matches(&self, compact: &str) -> bool {
        (self.min_len..=self.max_len).contains(&compact.len()) && self.pattern.is_match(compact)
    }
}

lazy_static! {
    /// Grammars in matching order. Every plate starts with a literal `U`.
    pub static ref PLATE_RULES: Vec<FormatRule> = vec![
        FormatRule::new(PlateFormat::Legacy, r"^U[A-Z]{2}[0-9]{3,4}[A-Z]$", (7, 8), 3, 3, 1),
        FormatRule::new(PlateFormat::NewStandard, r"^U[A-Z][0-9]{3}[A-Z]{2}$", (7, 7), 2, 2, 2),
        FormatRule::new(PlateFormat::Motorcycle, r"^U[A-Z]{2}[0-9]{3}[A-Z]{2}$", (8, 8), 3, 3, 2),
        FormatRule::new(PlateFormat::Government, r"^U[A-Z][0-9]{4}$", (6, 6), 2, 2, 0),
    ];

    /// Digit misreads to undo where a letter is expected.
    pub static ref LETTER_CORRECTIONS: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('0', 'O');
        m.insert('1', 'I');
        m.insert('5', 'S');
        m.insert('8', 'B');
        m.insert('6', 'G');
        m.insert('2', 'Z');
        m
    };

    /// Letter misreads to undo where a digit is expected.
    pub static ref DIGIT_CORRECTIONS: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('O', '0');
        m.insert('Q', '0');
        m.insert('D', '0');
        m.insert('I', '1');
        m.insert('L', '1');
        m.insert('Z', '2');
        m.insert('S', '5');
        m.insert('B', '8');
        m.insert('G', '6');
        m
    };
}

/// Registry of the known plate grammars.
pub struct PlatePatterns;

impl PlatePatterns {
    /// Format matched by space-free uppercase text, or `Unknown`.
    pub fn detect(compact: &str) -> PlateFormat {
        PLATE_RULES
            .iter()
            .find(|rule| rule.matches(compact))
            .map(|rule| rule.format)
            .unwrap_or(PlateFormat::Unknown)
    }

    pub fn rule(format: PlateFormat) -> Option<&'static FormatRule> {
        PLATE_RULES.iter().find(|rule| rule.format == format)
    }
}
