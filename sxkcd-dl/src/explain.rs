//! Explanation extraction from explainxkcd wikitext
//!
//! The wiki API is queried for the "Explanation" section, but the returned
//! wikitext still carries the heading and may run on into later sections.
//! Only the text between the first and second `==Heading==` is kept, with
//! URLs, wikitables, math blocks and the `{{incomplete|...}}` banner removed.

use regex::Regex;
use std::sync::OnceLock;

fn heading_re() -> &'static Regex {
    static HEADING_RE: OnceLock<Regex> = OnceLock::new();
    HEADING_RE.get_or_init(|| Regex::new(r"\n==[^=\n]+==").expect("valid heading regex"))
}

fn url_re() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| {
        Regex::new(
            r"https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*",
        )
        .expect("valid url regex")
    })
}

fn table_re() -> &'static Regex {
    static TABLE_RE: OnceLock<Regex> = OnceLock::new();
    TABLE_RE.get_or_init(|| Regex::new(r"(?s)\{\|.*?\|\}").expect("valid wikitable regex"))
}

fn math_re() -> &'static Regex {
    static MATH_RE: OnceLock<Regex> = OnceLock::new();
    MATH_RE.get_or_init(|| Regex::new(r"(?s):*<math>.*?</math>").expect("valid math regex"))
}

fn incomplete_re() -> &'static Regex {
    static INCOMPLETE_RE: OnceLock<Regex> = OnceLock::new();
    INCOMPLETE_RE
        .get_or_init(|| Regex::new(r"\{\{incomplete\|.*\}\}").expect("valid incomplete regex"))
}

/// Reduce raw wikitext to the plain explanation paragraph(s).
///
/// Returns an empty string for empty input or when no section heading is
/// present at all.
pub fn extract_explanation(wikitext: &str) -> String {
    if wikitext.is_empty() {
        return String::new();
    }

    // Text before the first heading is preamble; the section we want is the
    // one that heading opens.
    let Some(section) = heading_re().split(wikitext).nth(1) else {
        return String::new();
    };

    let text = url_re().replace_all(section, "");
    let text = table_re().replace_all(&text, "");
    let text = math_re().replace_all(&text, "");
    let text = incomplete_re().replace_all(&text, "");

    text.trim().to_string()
}
