//! Search engine - scores a query against indexed rows / Bộ máy tìm kiếm
//!
//! Two modes:
//! - exact: every folded query token (>= 2 chars) must occur as a whole word
//! - fuzzy (default): substring hit on either form scores 100, otherwise the best
//!   partial-substring similarity over the (fixed, fixed) and (folded, folded) pairs

use std::collections::HashSet;

use rayon::prelude::*;
use regex::Regex;

use super::normalizer::{fold, fold_with_offsets, normalize_query, repair, NormalizedText};
use super::schema::{RowRecord, SearchHit, SearchOptions};

/// Characters kept on each side of the match in a snippet
pub const DEFAULT_SNIPPET_WINDOW: usize = 60;

/// Stateless scorer over a row set; the rows themselves live in the index snapshot
#[derive(Debug, Clone)]
pub struct SearchEngine {
    snippet_window: usize,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            snippet_window: DEFAULT_SNIPPET_WINDOW,
        }
    }

    pub fn with_snippet_window(mut self, window: usize) -> Self {
        self.snippet_window = window;
        self
    }

    /// Rank `rows` against the query, best first, at most `top_k` hits.
    /// Never fails: blank queries and unmatched queries give an empty list.
    pub fn search(&self, rows: &[RowRecord], options: &SearchOptions) -> Vec<SearchHit> {
        if options.query.trim().is_empty() || options.top_k == 0 {
            return Vec::new();
        }

        let query = normalize_query(&options.query);
        if query.fixed.is_empty() {
            return Vec::new();
        }

        let scorer = if options.exact {
            match TokenMatcher::new(&query.folded) {
                Some(matcher) => Scorer::Exact(matcher),
                None => {
                    tracing::warn!("Cannot build token matcher for query {:?}", options.query);
                    return Vec::new();
                }
            }
        } else {
            Scorer::Fuzzy {
                fixed_lower: query.fixed.to_lowercase(),
            }
        };

        let min_score = options.min_score();

        // Collecting an indexed parallel iterator keeps row order
        let mut scored: Vec<(usize, u8)> = rows
            .par_iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                if row.normalized().fixed.is_empty() {
                    return None;
                }
                let score = scorer.score(&query, row);
                (score >= min_score).then_some((idx, score))
            })
            .collect();

        // Stable: ties keep row order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(options.top_k);

        scored
            .into_iter()
            .map(|(idx, score)| {
                let row = &rows[idx];
                let text = row.normalized();
                SearchHit {
                    sheet_name: row.sheet_name.clone(),
                    row_number: row.row_number,
                    snippet: snippet(&text.fixed, &query.fixed, self.snippet_window),
                    snippet_folded: snippet(&text.folded, &query.folded, self.snippet_window),
                    links: row.distinct_links(),
                    score,
                }
            })
            .collect()
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

enum Scorer {
    Exact(TokenMatcher),
    Fuzzy { fixed_lower: String },
}

impl Scorer {
    fn score(&self, query: &NormalizedText, record: &RowRecord) -> u8 {
        let row = record.normalized();
        match self {
            Scorer::Exact(matcher) => {
                if matcher.matches(&row.folded) {
                    100
                } else {
                    0
                }
            }
            Scorer::Fuzzy { fixed_lower } => {
                if record.fixed_lower().contains(fixed_lower.as_str())
                    || (!query.folded.is_empty() && row.folded.contains(&query.folded))
                {
                    return 100;
                }
                partial_ratio(&query.fixed, &row.fixed).max(partial_ratio(&query.folded, &row.folded))
            }
        }
    }
}

/// Whole-word matcher over folded query tokens
struct TokenMatcher {
    patterns: Vec<Regex>,
}

impl TokenMatcher {
    fn new(folded_query: &str) -> Option<Self> {
        let patterns = tokens(folded_query)
            .map(|token| Regex::new(&format!(r"\b{}\b", regex::escape(token))))
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        Some(Self { patterns })
    }

    fn matches(&self, folded_text: &str) -> bool {
        self.patterns.iter().all(|re| re.is_match(folded_text))
    }
}

/// Query tokens used by exact mode: whitespace split, shorter than 2 chars dropped
pub fn tokens(folded_query: &str) -> impl Iterator<Item = &str> {
    folded_query
        .split_whitespace()
        .filter(|token| token.chars().count() >= 2)
}

/// Partial-substring similarity in 0..=100: how well the best-aligned window of
/// the longer string matches the shorter one, scored with the Indel ratio.
///
/// Windows are only tried where they start or end on a char the needle contains,
/// plus the partial windows hanging over either edge.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() || b_chars.is_empty() {
        return 0;
    }

    let (needle, haystack) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };
    let m = needle.len();
    let n = haystack.len();

    if m == n {
        return to_score(similarity(&needle, &haystack));
    }

    let wanted: HashSet<char> = needle.iter().copied().collect();
    let mut best = 0.0f64;

    for start in 0..=(n - m) {
        let window = &haystack[start..start + m];
        if wanted.contains(&window[0]) || wanted.contains(&window[m - 1]) {
            best = best.max(similarity(&needle, window));
            if best >= 1.0 {
                return 100;
            }
        }
    }

    for len in 1..m {
        let head = &haystack[..len];
        if wanted.contains(&head[len - 1]) {
            best = best.max(similarity(&needle, head));
        }
        let tail = &haystack[n - len..];
        if wanted.contains(&tail[0]) {
            best = best.max(similarity(&needle, tail));
        }
    }

    to_score(best)
}

/// Indel similarity: `1 - indel / (|a| + |b|)`, i.e. `2 * lcs / (|a| + |b|)`.
/// A dropped or transposed letter costs one or two edits out of the combined
/// length rather than out of the longer string.
fn similarity(needle: &[char], window: &[char]) -> f64 {
    let total = needle.len() + window.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(needle, window)) as f64 / total as f64
}

/// Longest common subsequence length, two-row DP
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

fn to_score(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Cut a readable window of `text` around `query`. The match is located in folded
/// space but the returned text is always taken from the repaired, un-folded text,
/// so diacritics and casing survive. Falls back to the first `2 * window` chars.
pub fn snippet(text: &str, query: &str, window: usize) -> String {
    let fixed = repair(text);
    let needle = fold(query);
    let fixed_chars: Vec<char> = fixed.chars().collect();
    let head = || fixed_chars.iter().take(window * 2).collect::<String>();

    if needle.is_empty() {
        return head();
    }

    let (folded, offsets) = fold_with_offsets(&fixed);
    let Some(byte_idx) = folded.find(&needle) else {
        return head();
    };

    let start = folded[..byte_idx].chars().count();
    let end = start + needle.chars().count();
    let Some(&src_start) = offsets.get(start) else {
        return head();
    };
    let src_end = offsets.get(end).copied().unwrap_or(fixed_chars.len());

    let left = src_start.saturating_sub(window);
    let right = (src_end + window).min(fixed_chars.len());
    fixed_chars[left..right].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sheet: &str, number: u32, cells: &[&str]) -> RowRecord {
        RowRecord::from_cells(sheet, number, cells.iter().map(|c| c.to_string()).collect()).unwrap()
    }

    fn sample_rows() -> Vec<RowRecord> {
        vec![
            row("DS", 2, &["Nguyễn Văn An", "MSSV 123456"]),
            row("DS", 3, &["Trần Thị Bình", "MSSV 654321"]),
            row("DS", 4, &["Truongnguyen Van", "lớp K64"]),
            row("Khác", 2, &["Văn Nguyễn", "Đà Nẵng"]),
        ]
    }

    #[test]
    fn test_blank_query_returns_nothing() {
        let engine = SearchEngine::new();
        let rows = sample_rows();
        assert!(engine.search(&rows, &SearchOptions::new("")).is_empty());
        assert!(engine.search(&rows, &SearchOptions::new("   \t")).is_empty());
        assert!(engine.search(&[], &SearchOptions::new("an")).is_empty());
    }

    #[test]
    fn test_fuzzy_matches_folded_form() {
        let engine = SearchEngine::new();
        let rows = vec![row("DS", 5, &["Nguyễn Văn An - MSSV 123456"])];
        let hits = engine.search(&rows, &SearchOptions::new("van an"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 100);
        assert_eq!(hits[0].row_number, 5);
        assert!(hits[0].snippet.contains("Văn An"));
        assert!(hits[0].snippet_folded.contains("van an"));
    }

    #[test]
    fn test_fuzzy_case_insensitive_fixed_substring() {
        let engine = SearchEngine::new();
        let hits = engine.search(&sample_rows(), &SearchOptions::new("TRẦN THỊ"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].row_number, 3);
        assert_eq!(hits[0].score, 100);
    }

    #[test]
    fn test_fuzzy_typo_scores_below_full() {
        let engine = SearchEngine::new();
        let rows = vec![row("DS", 2, &["Nguyễn Văn An", "MSSV 123456"])];
        let hits = engine.search(&rows, &SearchOptions::new("nguyen vam").with_threshold(80));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 90);

        let strict = engine.search(&rows, &SearchOptions::new("nguyen vam").with_threshold(95));
        assert!(strict.is_empty());
    }

    #[test]
    fn test_exact_whole_words_any_order() {
        let engine = SearchEngine::new();
        let hits = engine.search(&sample_rows(), &SearchOptions::new("nguyen van").exact(true));
        let matched: Vec<(&str, u32)> = hits.iter().map(|h| (h.sheet_name.as_str(), h.row_number)).collect();
        assert_eq!(matched, vec![("DS", 2), ("Khác", 2)]);
        assert!(hits.iter().all(|h| h.score == 100));
    }

    #[test]
    fn test_exact_rejects_partial_word() {
        let engine = SearchEngine::new();
        let rows = vec![row("DS", 4, &["Truongnguyen Van"])];
        assert!(engine.search(&rows, &SearchOptions::new("nguyen").exact(true)).is_empty());
    }

    #[test]
    fn test_exact_ignores_short_tokens() {
        let matcher = TokenMatcher::new("a nguyen").unwrap();
        assert_eq!(matcher.patterns.len(), 1);
        assert!(matcher.matches("tran nguyen"));
    }

    #[test]
    fn test_ranking_and_top_k() {
        let engine = SearchEngine::new();
        let rows = vec![
            row("DS", 1, &["Nguyễn Văn Anh"]),
            row("DS", 2, &["Nguyen Van Bao"]),
            row("DS", 3, &["Nguyễn Văn An"]),
            row("DS", 4, &["Hoàng Minh"]),
        ];
        let hits = engine.search(&rows, &SearchOptions::new("nguyen van an").with_threshold(60));
        let order: Vec<u32> = hits.iter().map(|h| h.row_number).collect();
        // rows 1 and 3 both contain the folded query; row order breaks the tie
        assert_eq!(order[..2], [1, 3]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(!order.contains(&4));

        let top1 = engine.search(&rows, &SearchOptions::new("nguyen van an").with_threshold(60).with_top_k(1));
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].row_number, 1);
    }

    #[test]
    fn test_threshold_filters_unrelated_rows() {
        let engine = SearchEngine::new();
        let hits = engine.search(&sample_rows(), &SearchOptions::new("xyzw qk"));
        assert!(hits.is_empty());
    }

    #[test]
    fn test_hit_links_are_distinct_and_sorted() {
        let engine = SearchEngine::new();
        let mut record = row("DS", 2, &["Nguyễn Văn An"]);
        record.associated_link_urls = vec![
            "https://docs.google.com/document/d/b".to_string(),
            "https://docs.google.com/document/d/a".to_string(),
            "https://docs.google.com/document/d/b".to_string(),
        ];
        let hits = engine.search(&[record], &SearchOptions::new("an"));
        assert_eq!(
            hits[0].links,
            vec![
                "https://docs.google.com/document/d/a".to_string(),
                "https://docs.google.com/document/d/b".to_string(),
            ]
        );
    }

    #[test]
    fn test_partial_ratio() {
        assert_eq!(partial_ratio("abc", "xxabcxx"), 100);
        assert_eq!(partial_ratio("xxabcxx", "abc"), 100);
        assert_eq!(partial_ratio("", "abc"), 0);
        assert_eq!(partial_ratio("abc", ""), 0);
        assert_eq!(partial_ratio("nguyen vam", "nguyen van an"), 90);
        assert_eq!(partial_ratio("abcd", "abcd"), 100);
        assert!(partial_ratio("qqqq", "abcdefgh") < 30);
    }

    #[test]
    fn test_partial_ratio_dropped_and_transposed_letters() {
        // one letter dropped: 11 of 12 chars align with "nguyen van a"
        assert_eq!(partial_ratio("nguyen vn an", "sinh vien nguyen van an k64"), 92);
        // adjacent letters swapped
        assert_eq!(partial_ratio("abcdef", "xx abdcef yy"), 83);
        assert_eq!(lcs_len(&['a', 'b', 'c'], &['a', 'c', 'b']), 2);
    }

    #[test]
    fn test_dropped_letter_matches_at_default_threshold() {
        let engine = SearchEngine::new();
        let rows = vec![row("DS", 7, &["Sinh viên Nguyễn Văn An", "K64"])];
        let hits = engine.search(&rows, &SearchOptions::new("nguyen vn an"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].row_number, 7);
        assert!(hits[0].score >= 85);
    }

    #[test]
    fn test_snippet_centered_on_match() {
        let text = "aaaaaaaaaa MSSV 123456 bbbbbbbbbb";
        let snip = snippet(text, "mssv", 10);
        assert_eq!(snip, "aaaaaaaaa MSSV 123456 bb");
    }

    #[test]
    fn test_snippet_keeps_diacritics() {
        let snip = snippet("Sinh viên Nguyễn Văn An, lớp K64", "van an", 5);
        assert_eq!(snip, "uyễn Văn An, lớp");
    }

    #[test]
    fn test_snippet_fallback_to_head() {
        assert_eq!(snippet("abcdefghij", "zzz", 3), "abcdef");
        assert_eq!(snippet("abcdefghij", "", 2), "abcd");
        assert_eq!(snippet("", "abc", 5), "");
    }
}
