//! Name normalization
//!
//! Vocabulary lookups are case-sensitive, so the casing applied here must
//! match what the models saw at training time exactly: title case for the
//! sequence models, upper case for census lookups.

/// Casing applied to a name before it is encoded or joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Casing {
    /// First cased letter of every word upper, the rest lower ("O'Neil")
    Title,
    /// Everything upper ("O'NEIL")
    Upper,
}

/// Trim surrounding whitespace and apply the casing
pub fn normalize(name: &str, casing: Casing) -> String {
    let trimmed = name.trim();
    match casing {
        Casing::Title => title_case(trimmed),
        Casing::Upper => trimmed.to_uppercase(),
    }
}

/// Word-initial title casing.
///
/// A letter starts a word when the previous character is not a cased
/// letter, so digits and punctuation split words: "mary-ann" -> "Mary-Ann",
/// "o'neil" -> "O'Neil", "x2y" -> "X2Y".
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_cased = false;
    for ch in text.chars() {
        let cased = ch.is_lowercase() || ch.is_uppercase() || is_titlecase_letter(ch);
        if cased {
            if prev_cased {
                out.extend(ch.to_lowercase());
            } else {
                push_titlecase(&mut out, ch);
            }
        } else {
            out.push(ch);
        }
        prev_cased = cased;
    }
    out
}

/// The four Unicode titlecase digraphs (category Lt)
fn is_titlecase_letter(ch: char) -> bool {
    matches!(ch, '\u{01C5}' | '\u{01C8}' | '\u{01CB}' | '\u{01F2}')
}

/// Titlecase mapping of one char; differs from uppercase for digraphs and some ligatures
fn push_titlecase(out: &mut String, ch: char) {
    let mapped = match ch {
        'ß' => "Ss",
        '\u{01C4}'..='\u{01C6}' => "\u{01C5}",
        '\u{01C7}'..='\u{01C9}' => "\u{01C8}",
        '\u{01CA}'..='\u{01CC}' => "\u{01CB}",
        '\u{01F1}'..='\u{01F3}' => "\u{01F2}",
        'ﬀ' => "Ff",
        'ﬁ' => "Fi",
        'ﬂ' => "Fl",
        'ﬃ' => "Ffi",
        'ﬄ' => "Ffl",
        'ﬅ' | 'ﬆ' => "St",
        'և' => "Եւ",
        _ => {
            out.extend(ch.to_uppercase());
            return;
        }
    };
    out.push_str(mapped);
}

/// "last first", each part trimmed, then title-cased.
///
/// A missing or blank part makes the whole name missing.
pub fn full_name(last: Option<&str>, first: Option<&str>) -> Option<String> {
    let last = last?.trim();
    let first = first?.trim();
    if last.is_empty() || first.is_empty() {
        return None;
    }
    Some(title_case(&format!("{} {}", last, first)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case_simple() {
        assert_eq!(title_case("smith"), "Smith");
        assert_eq!(title_case("ZHANG"), "Zhang");
        assert_eq!(title_case("mcDonald"), "Mcdonald");
    }

    #[test]
    fn test_title_case_word_boundaries() {
        assert_eq!(title_case("mary-ann"), "Mary-Ann");
        assert_eq!(title_case("o'neil"), "O'Neil");
        assert_eq!(title_case("x2y"), "X2Y");
        assert_eq!(title_case("de la cruz"), "De La Cruz");
    }

    #[test]
    fn test_title_case_non_ascii() {
        assert_eq!(title_case("ñúñez"), "Ñúñez");
        assert_eq!(title_case("MÜLLER"), "Müller");
    }

    #[test]
    fn test_title_case_uses_titlecase_mapping() {
        assert_eq!(title_case("ßa"), "Ssa");
        assert_eq!(title_case("straße"), "Straße");
        assert_eq!(title_case("\u{01C6}emal"), "\u{01C5}emal");
        assert_eq!(title_case("\u{01C4}EMAL"), "\u{01C5}emal");
        assert_eq!(title_case("\u{01C9}ubica"), "\u{01C8}ubica");
        assert_eq!(title_case("ﬁsher"), "Fisher");
    }

    #[test]
    fn test_title_case_treats_digraphs_as_cased() {
        // a titlecase digraph mid-word is lowered like any other letter
        assert_eq!(title_case("a\u{01C5}"), "A\u{01C6}");
        assert_eq!(title_case("\u{01C5}a b"), "\u{01C5}a B");
    }

    #[test]
    fn test_normalize_trims() {
        assert_eq!(normalize("  smith ", Casing::Title), "Smith");
        assert_eq!(normalize("  smith ", Casing::Upper), "SMITH");
    }

    #[test]
    fn test_full_name() {
        assert_eq!(full_name(Some(" smith"), Some("john ")), Some("Smith John".into()));
        assert_eq!(full_name(None, Some("john")), None);
        assert_eq!(full_name(Some("smith"), None), None);
        assert_eq!(full_name(Some("smith"), Some("  ")), None);
    }
}
