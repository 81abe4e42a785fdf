// Turns a speech transcript ("U A R one two three four L") into plate text.

const NUMBER_WORDS: [(&str, char); 10] = [
    ("ZERO", '0'),
    ("ONE", '1'),
    ("TWO", '2'),
    ("THREE", '3'),
    ("FOUR", '4'),
    ("FIVE", '5'),
    ("SIX", '6'),
    ("SEVEN", '7'),
    ("EIGHT", '8'),
    ("NINE", '9'),
];

const FILLER_WORDS: [&str; 4] = ["THE", "AND", "SPACE", "DASH"];

/// Map number words to digits, drop fillers and keep only `[A-Z0-9]`.
///
/// Words are matched whole, so "NONE" stays letters.
pub fn spoken_to_plate_text(transcript: &str) -> String {
    let upper = transcript.to_uppercase();
    let mut plate = String::with_capacity(upper.len());

    for word in upper.split(|c: char| !c.is_ascii_alphanumeric()) {
        if word.is_empty() || FILLER_WORDS.contains(&word) {
            continue;
        }
        match NUMBER_WORDS.iter().find(|(name, _)| *name == word) {
            Some((_, digit)) => plate.push(*digit),
            None => plate.push_str(word),
        }
    }

    plate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlateFormat;
    use crate::validation::PlateValidator;

    #[test]
    fn test_number_words_become_digits() {
        assert_eq!(spoken_to_plate_text("U A R one two three four L"), "UAR1234L");
        assert_eq!(spoken_to_plate_text("u a zero seven seven a k"), "UA077AK");
    }

    #[test]
    fn test_fillers_and_punctuation_dropped() {
        assert_eq!(spoken_to_plate_text("U P space six, six - three dash 3"), "UP6633");
        assert_eq!(spoken_to_plate_text("the U M A and 055 AF."), "UMA055AF");
    }

    #[test]
    fn test_whole_words_only() {
        assert_eq!(spoken_to_plate_text("NONE"), "NONE");
        assert_eq!(spoken_to_plate_text("THEN"), "THEN");
    }

    #[test]
    fn test_spoken_plate_goes_through_shared_validator() {
        let text = spoken_to_plate_text("U A X one two three Y");
        assert_eq!(
            PlateValidator::validate_manual_entry(&text).unwrap(),
            ("UAX 123Y".to_string(), PlateFormat::Legacy)
        );
    }
}
