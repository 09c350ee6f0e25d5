//! URL classification for hosted documents and spreadsheets

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

static DOCS_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"docs\.google\.com/document/d/([a-zA-Z0-9_-]+)").expect("static regex"));
static SHEETS_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"docs\.google\.com/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("static regex"));
static GID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#?&]gid=(\d+)").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Document,
    Spreadsheet,
    Unknown,
}

/// Result of `classify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkClass {
    pub kind: LinkKind,
    /// Stable file identifier, `None` for unknown shapes
    pub file_id: Option<String>,
    /// Sub-sheet (`gid`) of a spreadsheet link
    pub subsheet_id: Option<String>,
}

impl LinkClass {
    fn unknown() -> Self {
        Self {
            kind: LinkKind::Unknown,
            file_id: None,
            subsheet_id: None,
        }
    }
}

/// Classify a URL as document / spreadsheet / unknown / Phân loại liên kết
pub fn classify(url: &str) -> LinkClass {
    if let Some(caps) = DOCS_ID_RE.captures(url) {
        return LinkClass {
            kind: LinkKind::Document,
            file_id: Some(caps[1].to_string()),
            subsheet_id: None,
        };
    }

    if let Some(caps) = SHEETS_ID_RE.captures(url) {
        return LinkClass {
            kind: LinkKind::Spreadsheet,
            file_id: Some(caps[1].to_string()),
            subsheet_id: extract_gid(url),
        };
    }

    LinkClass::unknown()
}

/// `gid` from the query string first, then from the fragment
fn extract_gid(raw: &str) -> Option<String> {
    if let Ok(parsed) = Url::parse(raw) {
        let from_query = parsed
            .query_pairs()
            .find(|(key, value)| key == "gid" && is_digits(value))
            .map(|(_, value)| value.into_owned());
        if from_query.is_some() {
            return from_query;
        }

        // Fragments look like "gid=123" or "gid=123&range=A1"
        if let Some(fragment) = parsed.fragment() {
            let from_fragment = fragment
                .split('&')
                .filter_map(|pair| pair.strip_prefix("gid="))
                .find(|value| is_digits(value))
                .map(str::to_string);
            if from_fragment.is_some() {
                return from_fragment;
            }
        }
    }

    GID_RE.captures(raw).map(|caps| caps[1].to_string())
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document() {
        let class = classify("https://docs.google.com/document/d/1AbC-d_9/edit?usp=sharing");
        assert_eq!(class.kind, LinkKind::Document);
        assert_eq!(class.file_id.as_deref(), Some("1AbC-d_9"));
        assert_eq!(class.subsheet_id, None);
    }

    #[test]
    fn test_spreadsheet_gid_in_fragment() {
        let class = classify("https://docs.google.com/spreadsheets/d/XYZ123/edit#gid=456789");
        assert_eq!(class.kind, LinkKind::Spreadsheet);
        assert_eq!(class.file_id.as_deref(), Some("XYZ123"));
        assert_eq!(class.subsheet_id.as_deref(), Some("456789"));
    }

    #[test]
    fn test_query_gid_wins_over_fragment() {
        let class = classify("https://docs.google.com/spreadsheets/d/XYZ/edit?gid=1#gid=2");
        assert_eq!(class.subsheet_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_spreadsheet_without_gid() {
        let class = classify("https://docs.google.com/spreadsheets/d/XYZ/view");
        assert_eq!(class.kind, LinkKind::Spreadsheet);
        assert_eq!(class.subsheet_id, None);
    }

    #[test]
    fn test_unknown() {
        let class = classify("https://example.com/a?gid=3");
        assert_eq!(class, LinkClass::unknown());
        assert_eq!(classify("not a url").kind, LinkKind::Unknown);
    }
}
