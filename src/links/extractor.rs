//! Hyperlink extraction from one cell / Trích xuất liên kết
//!
//! Every candidate goes through the same clean-up: trim quotes and closing
//! brackets, keep only `http...`, dedupe by base URL (first occurrence wins).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::source::CellAnnotation;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)https?://[^\s)>\]"']+"#).expect("static regex"));
static HYPERLINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)HYPERLINK\s*\(\s*"([^"]+)""#).expect("static regex"));

/// Hosts whose scheme-less HYPERLINK targets get `https://` prepended
const KNOWN_DOC_HOSTS: [&str; 2] = ["docs.google.com", "drive.google.com"];

const TRIM_START: &[char] = &['"', '\'', '(', '[', '{', '<'];
const TRIM_END: &[char] = &['"', '\'', ')', ']', '}', '>', '.', ',', ';'];

/// Where in a cell a link was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSource {
    /// Literal URL in the display value
    CellText,
    /// Literal URL in the formula text
    Formula,
    /// First argument of `HYPERLINK("...", ...)`
    HyperlinkFormula,
    /// Cell-level hyperlink attribute
    CellHyperlink,
    /// Link on a rich-text sub-span
    RichTextSpan,
    /// Literal URL in the formatted value
    FormattedValue,
    /// Literal URL in an attached note
    Note,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub url: String,
    pub source: LinkSource,
}

/// Links in a cell's raw value and formula / Liên kết trong ô
pub fn extract_from_cell(value: &str, formula: &str) -> Vec<DiscoveredLink> {
    let mut candidates = Vec::new();

    push_literal_urls(&mut candidates, value, LinkSource::CellText);

    if !formula.is_empty() {
        if let Some(caps) = HYPERLINK_RE.captures(formula) {
            candidates.push((with_known_scheme(caps[1].trim()), LinkSource::HyperlinkFormula));
        }
        push_literal_urls(&mut candidates, formula, LinkSource::Formula);
    }

    clean_urls(candidates)
}

/// Links in a cell's rich annotations (deep pass)
pub fn extract_from_rich_cell(cell: &CellAnnotation) -> Vec<DiscoveredLink> {
    let mut candidates = Vec::new();

    if let Some(hyperlink) = cell.hyperlink.as_deref() {
        candidates.push((hyperlink.to_string(), LinkSource::CellHyperlink));
    }
    for span in &cell.rich_text_spans {
        if let Some(link) = span.link.as_deref() {
            candidates.push((link.to_string(), LinkSource::RichTextSpan));
        }
    }
    if let Some(formatted) = cell.formatted_value.as_deref() {
        push_literal_urls(&mut candidates, formatted, LinkSource::FormattedValue);
    }
    if let Some(note) = cell.note.as_deref() {
        push_literal_urls(&mut candidates, note, LinkSource::Note);
    }

    clean_urls(candidates)
}

/// All URL-shaped substrings of `text`
pub fn find_urls(text: &str) -> impl Iterator<Item = &str> {
    URL_RE.find_iter(text).map(|m| m.as_str())
}

fn push_literal_urls(out: &mut Vec<(String, LinkSource)>, text: &str, source: LinkSource) {
    out.extend(find_urls(text).map(|url| (url.to_string(), source)));
}

fn with_known_scheme(target: &str) -> String {
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return target.to_string();
    }
    if KNOWN_DOC_HOSTS.iter().any(|host| lower.starts_with(host)) {
        return format!("https://{}", target);
    }
    target.to_string()
}

/// Trim, keep `http...` candidates and dedupe by base URL, keeping the first
pub fn clean_urls(candidates: Vec<(String, LinkSource)>) -> Vec<DiscoveredLink> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (raw, source) in candidates {
        let url = raw
            .trim()
            .trim_start_matches(TRIM_START)
            .trim_end_matches(TRIM_END)
            .trim();
        if !url.starts_with("http") {
            continue;
        }
        if seen.insert(base_url(url).to_string()) {
            out.push(DiscoveredLink {
                url: url.to_string(),
                source,
            });
        }
    }

    out
}

/// URL without fragment and query
pub fn base_url(url: &str) -> &str {
    let end = url.find(['#', '?']).unwrap_or(url.len());
    &url[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RichTextSpan;

    fn urls(links: &[DiscoveredLink]) -> Vec<&str> {
        links.iter().map(|l| l.url.as_str()).collect()
    }

    #[test]
    fn test_same_base_keeps_first() {
        let links = extract_from_cell("http://x.com/a?x=1 http://x.com/a?y=2", "");
        assert_eq!(urls(&links), vec!["http://x.com/a?x=1"]);
        assert_eq!(links[0].source, LinkSource::CellText);
    }

    #[test]
    fn test_trailing_punctuation_trimmed() {
        let links = extract_from_cell("xem (https://example.com/tai-lieu), hoặc https://b.vn/x.", "");
        assert_eq!(urls(&links), vec!["https://example.com/tai-lieu", "https://b.vn/x"]);
    }

    #[test]
    fn test_hyperlink_formula() {
        let formula = r#"=HYPERLINK("https://docs.google.com/document/d/abc/edit", "Đề cương")"#;
        let links = extract_from_cell("Đề cương", formula);
        assert_eq!(urls(&links), vec!["https://docs.google.com/document/d/abc/edit"]);
        assert_eq!(links[0].source, LinkSource::HyperlinkFormula);
    }

    #[test]
    fn test_hyperlink_without_scheme() {
        let links = extract_from_cell("", r#"=hyperlink( "docs.google.com/document/d/abc" ; "x")"#);
        assert_eq!(urls(&links), vec!["https://docs.google.com/document/d/abc"]);

        // unknown host without a scheme is dropped
        assert!(extract_from_cell("", r#"=HYPERLINK("example.com/a", "x")"#).is_empty());
    }

    #[test]
    fn test_value_before_formula() {
        let links = extract_from_cell("https://a.vn/1", r#"=HYPERLINK("https://b.vn/2","x")&"https://a.vn/1#top""#);
        assert_eq!(urls(&links), vec!["https://a.vn/1", "https://b.vn/2"]);
    }

    #[test]
    fn test_no_links() {
        assert!(extract_from_cell("", "").is_empty());
        assert!(extract_from_cell("Nguyễn Văn An", "=A1&B1").is_empty());
        assert!(extract_from_cell("ftp://x.com/file", "").is_empty());
    }

    #[test]
    fn test_rich_cell_sources_in_order() {
        let cell = CellAnnotation {
            hyperlink: Some("https://a.vn/cell".to_string()),
            rich_text_spans: vec![
                RichTextSpan { start: 0, link: None },
                RichTextSpan {
                    start: 5,
                    link: Some("https://a.vn/span".to_string()),
                },
            ],
            formatted_value: Some("bấm vào https://a.vn/cell?ref=2 đây".to_string()),
            note: Some("ghi chú: https://a.vn/note".to_string()),
        };
        let links = extract_from_rich_cell(&cell);
        assert_eq!(urls(&links), vec!["https://a.vn/cell", "https://a.vn/span", "https://a.vn/note"]);
        let sources: Vec<LinkSource> = links.iter().map(|l| l.source).collect();
        assert_eq!(
            sources,
            vec![LinkSource::CellHyperlink, LinkSource::RichTextSpan, LinkSource::Note]
        );
    }

    #[test]
    fn test_rich_cell_ignores_non_http() {
        let cell = CellAnnotation {
            hyperlink: Some("#gid=123".to_string()),
            ..Default::default()
        };
        assert!(extract_from_rich_cell(&cell).is_empty());
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("https://x.com/a?b=1#c"), "https://x.com/a");
        assert_eq!(base_url("https://x.com/a#c?d"), "https://x.com/a");
        assert_eq!(base_url("https://x.com/a"), "https://x.com/a");
    }
}
