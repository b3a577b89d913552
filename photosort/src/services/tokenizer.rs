//! Filename tokenization
//!
//! Splits a file's base name into candidate identifier substrings for the
//! match resolver. A run is a maximal sequence of decimal digits, ASCII
//! letters, or CJK ideographs; everything else (separators, punctuation)
//! breaks runs. The full base name is appended as a final fallback token so
//! identifiers spanning separators can still match.
//!
//! Tokens keep their original casing; case folding happens at the matching
//! layer.

/// Character classes that form token runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Digit,
    AsciiLetter,
    Cjk,
    Other,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_digit() {
        CharClass::Digit
    } else if c.is_ascii_alphabetic() {
        CharClass::AsciiLetter
    } else if ('\u{4e00}'..='\u{9fff}').contains(&c) {
        CharClass::Cjk
    } else {
        CharClass::Other
    }
}

/// Extract candidate tokens from a filename's base name
///
/// Runs appear in left-to-right scan order, followed by the whole base name
/// as a fallback token. An empty base name yields only the empty fallback.
pub fn tokenize(base_name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_class = CharClass::Other;

    for c in base_name.chars() {
        let class = classify(c);
        if class == current_class && class != CharClass::Other {
            current.push(c);
            continue;
        }

        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if class != CharClass::Other {
            current.push(c);
        }
        current_class = class;
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens.push(base_name.to_string());
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_and_letters_split() {
        let tokens = tokenize("img_1234");
        assert_eq!(tokens, vec!["img", "1234", "img_1234"]);
    }

    #[test]
    fn test_adjacent_runs_without_separator() {
        let tokens = tokenize("holiday1234");
        assert_eq!(tokens, vec!["holiday", "1234", "holiday1234"]);
    }

    #[test]
    fn test_cjk_runs() {
        let tokens = tokenize("北京2024trip");
        assert_eq!(tokens, vec!["北京", "2024", "trip", "北京2024trip"]);
    }

    #[test]
    fn test_case_preserved() {
        let tokens = tokenize("IMG_Beijing");
        assert_eq!(tokens, vec!["IMG", "Beijing", "IMG_Beijing"]);
    }

    #[test]
    fn test_separators_only() {
        let tokens = tokenize("--__--");
        assert_eq!(tokens, vec!["--__--"]);
    }

    #[test]
    fn test_empty_base_name() {
        let tokens = tokenize("");
        assert_eq!(tokens, vec![""]);
    }

    #[test]
    fn test_mixed_punctuation() {
        let tokens = tokenize("a-b.c 1");
        assert_eq!(tokens, vec!["a", "b", "c", "1", "a-b.c 1"]);
    }
}
