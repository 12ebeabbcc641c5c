//! Cleanup of generated text before it is shown, and of rendered log text
//! before it is put into a prompt.
//!
//! Both functions are total: malformed markup is left as it is and whatever
//! could be cleaned is cleaned.

use regex::Regex;
use std::sync::OnceLock;

fn less_than_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)&#0*60;|&#x0*3c;|\\u003c").expect("less-than escape regex must compile")
    })
}

fn greater_than_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)&#0*62;|&#x0*3e;|\\u003e").expect("greater-than escape regex must compile")
    })
}

fn color_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<color\s*=\s*[^<>]*>|</color\s*>").expect("color tag regex must compile")
    })
}

fn rich_text_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)</?(?:b|i|color|size|material|quad|sprite)(?:\s*=\s*[^<>]*)?\s*>")
            .expect("rich text tag regex must compile")
    })
}

/// Single cleanup pass: decode angle-bracket escapes, then drop color tags.
fn sanitize_pass(text: &str) -> String {
    let decoded = less_than_re().replace_all(text, "<");
    let decoded = greater_than_re().replace_all(&decoded, ">");
    color_tag_re().replace_all(&decoded, "").into_owned()
}

/// Clean generated text for display.
///
/// Decodes the numeric escapes the backend emits for `<` and `>`, removes
/// `<color=...>` / `</color>` tags and trims the result. Passes repeat until
/// nothing changes, so `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        // Every pass that changes the text makes it shorter.
        let next = sanitize_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}

/// Remove rich-text markup (`<b>`, `<i>`, `<color=..>`, `<size=..>`, ...)
/// from rendered log text.
pub fn strip_markup(text: &str) -> String {
    rich_text_tag_re().replace_all(text, "").trim().to_string()
}
