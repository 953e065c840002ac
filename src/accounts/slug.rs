use deunicode::deunicode;
use lazy_static::lazy_static;
use regex::Regex;

/// Lowercase, hyphenated, ASCII-only form of `value`, safe for URLs.
pub fn slugify(value: &str) -> String {
    lazy_static! {
        static ref DISALLOWED: Regex = Regex::new(r"[^\w\s-]").unwrap();
        static ref SEPARATORS: Regex = Regex::new(r"[-\s]+").unwrap();
    }
    let ascii = deunicode(value).to_lowercase();
    let cleaned = DISALLOWED.replace_all(&ascii, "");
    SEPARATORS
        .replace_all(&cleaned, "-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}
