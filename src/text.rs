// src/text.rs
use once_cell::sync::OnceCell;
use regex::Regex;

/// Plain text from upstream markup: entities decoded, tags stripped,
/// typographic quotes flattened, whitespace collapsed.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("valid tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// First `max_chars` characters of the normalized text (char-safe).
pub fn excerpt(s: &str, max_chars: usize) -> String {
    normalize_text(s).chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_collapses_ws() {
        let s = "  <p>BTC&nbsp;&nbsp;breaks</p>\n\n<b>“ATH”</b>  ";
        assert_eq!(normalize_text(s), "BTC breaks \"ATH\"");
    }

    #[test]
    fn excerpt_counts_chars_not_bytes() {
        assert_eq!(excerpt("ééééé", 3), "ééé");
        assert_eq!(excerpt("short", 100), "short");
    }
}
