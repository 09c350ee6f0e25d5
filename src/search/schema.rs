//! Search record and hit definitions / Cấu trúc dữ liệu tìm kiếm

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::normalizer::{normalize_query, NormalizedText};

/// One non-blank row of a sheet, ready for text search
#[derive(Debug, Clone, Serialize)]
pub struct RowRecord {
    /// Owning sheet title
    pub sheet_name: String,
    /// 1-based row number within the sheet
    pub row_number: u32,
    /// Display values in column order (ragged rows kept as read)
    pub cell_values: Vec<String>,
    /// Space-joined non-blank values, in column order
    pub concatenated_text: String,
    /// URLs discovered in this row, in discovery order
    pub associated_link_urls: Vec<String>,
    /// Comparison forms of `concatenated_text`, derived once per rebuild
    #[serde(skip)]
    normalized: NormalizedText,
    /// Lowercased `normalized.fixed`, for the substring tier of fuzzy scoring
    #[serde(skip)]
    fixed_lower: String,
}

impl RowRecord {
    /// Build a record from one row of display values. Returns `None` for a fully
    /// blank row.
    pub fn from_cells(sheet_name: &str, row_number: u32, cell_values: Vec<String>) -> Option<Self> {
        let concatenated_text = cell_values
            .iter()
            .filter(|v| !v.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if concatenated_text.is_empty() {
            return None;
        }

        let normalized = normalize_query(&concatenated_text);
        let fixed_lower = normalized.fixed.to_lowercase();
        Some(Self {
            sheet_name: sheet_name.to_string(),
            row_number,
            cell_values,
            concatenated_text,
            associated_link_urls: Vec::new(),
            normalized,
            fixed_lower,
        })
    }

    /// `(fixed, folded)` forms of the row text
    pub fn normalized(&self) -> &NormalizedText {
        &self.normalized
    }

    pub fn fixed_lower(&self) -> &str {
        &self.fixed_lower
    }

    /// Distinct associated links, sorted
    pub fn distinct_links(&self) -> Vec<String> {
        self.associated_link_urls
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Ranked search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub sheet_name: String,
    pub row_number: u32,
    /// Window of the readable (diacritic-preserving) row text around the match
    pub snippet: String,
    /// Same window taken from the folded row text
    pub snippet_folded: String,
    pub links: Vec<String>,
    /// 0..=100
    pub score: u8,
}

/// Search query options / Tuỳ chọn tìm kiếm
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Raw user query
    pub query: String,
    /// Maximum number of hits
    pub top_k: usize,
    /// Minimum fuzzy score (0..=100), ignored in exact mode
    pub fuzz_threshold: u8,
    /// Require every query token as a whole word
    pub exact: bool,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: 20,
            fuzz_threshold: 85,
            exact: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.fuzz_threshold = threshold.min(100);
        self
    }

    pub fn exact(mut self, enabled: bool) -> Self {
        self.exact = enabled;
        self
    }

    /// Score a row must reach to be kept
    pub fn min_score(&self) -> u8 {
        if self.exact {
            100
        } else {
            self.fuzz_threshold
        }
    }
}
