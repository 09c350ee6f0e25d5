//! Vietnamese text normalizer / Chuẩn hoá văn bản tiếng Việt
//!
//! Two primitives, both total (they never fail, worst case they hand back the
//! best string obtained so far):
//! - `repair`: undo mojibake (UTF-8 bytes decoded under a single-byte code page),
//!   clean up invisible characters, NFC, collapse whitespace
//! - `fold`: diacritic-free lowercase form used for "không dấu" matching

use std::borrow::Cow;

use encoding_rs::{UTF_8, WINDOWS_1252};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::{decompose_compatible, is_combining_mark};
use unicode_normalization::UnicodeNormalization;

/// Sequences left behind when UTF-8 text is decoded under Latin-1 / Windows-1252
const MOJIBAKE_SIGNS: [&str; 10] = ["Ã", "Â", "Æ°", "Ä'", "áº", "á»", "â€", "Ê", "Ð", "Þ"];

static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("static regex"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// A `(fixed, folded)` pair computed from one raw string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    /// Repaired, human-readable form (keeps diacritics)
    pub fixed: String,
    /// Folded form: no diacritics, lowercase
    pub folded: String,
}

/// One step of the repair cascade. `applies` is the precondition checked against
/// the current best string; `apply` returns `None` when the strategy cannot help.
struct RepairStrategy {
    name: &'static str,
    applies: fn(&str) -> bool,
    apply: fn(&str) -> Option<String>,
}

/// Evaluated in order, each against the output of the previous one
const REPAIR_CASCADE: [RepairStrategy; 3] = [
    RepairStrategy {
        name: "redecode_segments",
        applies: has_single_byte_chars,
        apply: redecode_segments,
    },
    RepairStrategy {
        name: "latin1_to_utf8",
        applies: looks_mojibake,
        apply: latin1_to_utf8,
    },
    RepairStrategy {
        name: "cp1252_to_utf8",
        applies: looks_mojibake,
        apply: cp1252_to_utf8,
    },
];

/// Repair likely-corrupted text / Sửa lỗi mã hoá
pub fn repair(text: &str) -> String {
    let mut current = Cow::Borrowed(text);

    for strategy in &REPAIR_CASCADE {
        if !(strategy.applies)(current.as_ref()) {
            continue;
        }
        if let Some(fixed) = (strategy.apply)(current.as_ref()) {
            tracing::trace!(strategy = strategy.name, "text repaired");
            current = Cow::Owned(fixed);
        }
    }

    collapse_whitespace(&clean_up(&current))
}

/// Diacritic-insensitive comparison form / Dạng không dấu
///
/// `fold("Đà Nẵng") == "da nang"`
pub fn fold(text: &str) -> String {
    let (folded, _) = fold_with_offsets(&repair(text));
    // compatibility decomposition can surface new spaces (e.g. '¨' -> ' ' + mark)
    collapse_whitespace(&folded)
}

/// Fold already-repaired text, keeping for every folded char the index of the
/// source char it came from. Used to map a match found in folded space back onto
/// the readable text.
pub fn fold_with_offsets(fixed: &str) -> (String, Vec<usize>) {
    let mut folded = String::with_capacity(fixed.len());
    let mut offsets = Vec::with_capacity(fixed.len());

    for (idx, c) in fixed.chars().enumerate() {
        // the stroke of đ/Đ is not a combining mark, NFKD keeps it
        let base = match c {
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        };
        decompose_compatible(base, |part| {
            for lower in part.to_lowercase() {
                if !is_combining_mark(lower) {
                    folded.push(lower);
                    offsets.push(idx);
                }
            }
        });
    }

    (folded, offsets)
}

/// Normalize an incoming query (or row text) into both comparison forms
pub fn normalize_query(query: &str) -> NormalizedText {
    let fixed = repair(query);
    let folded = fold(&fixed);
    NormalizedText { fixed, folded }
}

/// Check whether text still carries a known corruption signature
pub fn looks_mojibake(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    text.contains('\u{FFFD}') || MOJIBAKE_SIGNS.iter().any(|sign| text.contains(sign))
}

/// Byte a char had before being decoded under Latin-1 or Windows-1252, if it
/// lives in the upper half of either code page
fn single_byte(c: char) -> Option<u8> {
    let code = u32::from(c);
    if code < 0x80 {
        return None;
    }
    if code <= 0xFF {
        return Some(code as u8);
    }
    let mut buf = [0u8; 4];
    let (bytes, _, had_errors) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
    match bytes.as_ref() {
        [b] if !had_errors && *b >= 0x80 => Some(*b),
        _ => None,
    }
}

fn has_single_byte_chars(text: &str) -> bool {
    text.chars().any(|c| single_byte(c).is_some())
}

/// Whether a char produced by re-decoding is something Vietnamese text would
/// contain. Clean text such as "CHÚ Ý…" or "“CÔ”" happens to form valid UTF-8
/// byte pairs, but those decode to Arabic, Syriac or Cyrillic letters.
fn plausible_repair_char(c: char) -> bool {
    matches!(
        c,
        '\u{A0}'..='\u{BF}'
            | 'À' | 'Á' | 'Â' | 'Ã' | 'È' | 'É' | 'Ê' | 'Ì' | 'Í' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ù' | 'Ú' | 'Ý'
            | 'à' | 'á' | 'â' | 'ã' | 'è' | 'é' | 'ê' | 'ì' | 'í' | 'ò' | 'ó' | 'ô' | 'õ' | 'ù' | 'ú' | 'ý'
            | 'Ă' | 'ă' | 'Đ' | 'đ' | 'Ĩ' | 'ĩ' | 'Ũ' | 'ũ' | 'Ơ' | 'ơ' | 'Ư' | 'ư'
            // combining tone and vowel marks of decomposed text
            | '\u{0300}'..='\u{0303}' | '\u{0306}' | '\u{0309}' | '\u{031B}' | '\u{0323}'
            | '\u{1EA0}'..='\u{1EF9}'
            | '\u{2010}'..='\u{2027}' | '\u{2030}'..='\u{203A}' | '€' | '™'
    ) || c.is_ascii()
}

/// General mis-decoding fixer: every maximal run of upper-half chars is mapped
/// back to bytes and the valid UTF-8 sequences inside it are decoded. Runs that
/// do not form UTF-8 (legitimate "café", "Âu") are left alone, and so are
/// sequences that decode to anything outside the Vietnamese repertoire.
fn redecode_segments(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut run: Vec<(char, u8)> = Vec::new();
    let mut changed = false;

    for c in text.chars() {
        match single_byte(c) {
            Some(b) => run.push((c, b)),
            None => {
                changed |= flush_run(&mut run, &mut out);
                out.push(c);
            }
        }
    }
    changed |= flush_run(&mut run, &mut out);

    changed.then_some(out)
}

fn flush_run(run: &mut Vec<(char, u8)>, out: &mut String) -> bool {
    if run.len() < 2 {
        out.extend(run.drain(..).map(|(c, _)| c));
        return false;
    }

    let bytes: Vec<u8> = run.iter().map(|(_, b)| *b).collect();
    let mut changed = false;
    let mut pos = 0;

    while pos < bytes.len() {
        let (valid, bad) = match std::str::from_utf8(&bytes[pos..]) {
            Ok(_) => (bytes.len() - pos, None),
            Err(err) => (err.valid_up_to(), Some(pos + err.valid_up_to())),
        };
        // each run entry is exactly one byte, so byte ranges index `run` too
        for (decoded, chunk) in decoded_chars(&bytes[pos..pos + valid], &run[pos..pos + valid]) {
            match decoded {
                Some(c) => {
                    out.push(c);
                    changed = true;
                }
                None => out.extend(chunk.iter().map(|(c, _)| *c)),
            }
        }
        match bad {
            Some(idx) => {
                out.push(run[idx].0);
                pos = idx + 1;
            }
            None => pos = bytes.len(),
        }
    }

    run.clear();
    changed
}

/// Split valid UTF-8 `bytes` per decoded char, pairing each with the run
/// entries it came from. A multi-byte char outside the Vietnamese repertoire
/// comes back as `None` so the caller keeps the original entries.
fn decoded_chars<'a>(
    bytes: &'a [u8],
    run: &'a [(char, u8)],
) -> impl Iterator<Item = (Option<char>, &'a [(char, u8)])> {
    let text = std::str::from_utf8(bytes).unwrap_or_default();
    text.char_indices().map(move |(start, c)| {
        let chunk = &run[start..start + c.len_utf8()];
        let keep = chunk.len() > 1 && plausible_repair_char(c);
        (keep.then_some(c), chunk)
    })
}

/// Re-read the whole string as Latin-1 bytes, then decode strictly as UTF-8
fn latin1_to_utf8(text: &str) -> Option<String> {
    let bytes = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()?;
    decode_plausible(&bytes)
}

/// Re-read the whole string as Windows-1252 bytes, then decode strictly as UTF-8
fn cp1252_to_utf8(text: &str) -> Option<String> {
    let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
    if had_errors {
        return None;
    }
    decode_plausible(&bytes)
}

/// Strict UTF-8 decode, rejected when it yields chars no Vietnamese text has
fn decode_plausible(bytes: &[u8]) -> Option<String> {
    UTF_8
        .decode_without_bom_handling_and_without_replacement(bytes)
        .filter(|text| text.chars().all(plausible_repair_char))
        .map(Cow::into_owned)
}

/// Drop invisible characters, unify line endings, compose to NFC
fn clean_up(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .filter_map(|c| match c {
            '\u{00A0}' => Some(' '),
            '\u{200B}' | '\u{FEFF}' => None,
            '\r' => Some('\n'),
            '\n' | '\t' => Some(c),
            c if c.is_control() => None,
            c => Some(c),
        })
        .nfc()
        .collect()
}

/// Collapse horizontal whitespace runs, cap blank lines at one, trim
fn collapse_whitespace(text: &str) -> String {
    let spaced = HORIZONTAL_SPACE.replace_all(text, " ");
    let paragraphs = EXCESS_NEWLINES.replace_all(&spaced, "\n\n");
    paragraphs.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simulate UTF-8 bytes being decoded under Windows-1252
    fn garble_cp1252(text: &str) -> String {
        let (decoded, _) = WINDOWS_1252.decode_without_bom_handling(text.as_bytes());
        decoded.into_owned()
    }

    /// Simulate UTF-8 bytes being decoded under Latin-1
    fn garble_latin1(text: &str) -> String {
        text.bytes().map(char::from).collect()
    }

    #[test]
    fn test_fold_vietnamese() {
        assert_eq!(fold("Đà Nẵng"), "da nang");
        assert_eq!(fold("Nguyễn Văn An"), "nguyen van an");
        assert_eq!(fold("TRƯỜNG ĐẠI HỌC"), "truong dai hoc");
        assert_eq!(fold("không dấu"), "khong dau");
    }

    #[test]
    fn test_fold_idempotent() {
        let samples = [
            "Đà Nẵng",
            "  Nguyễn   Văn\tAn - MSSV 123456 ",
            "Nguyá»…n VÄƒn An",
            "ﬁle ½ ¨ x",
            "İstanbul",
            "",
            "\u{FFFD}abc",
        ];
        for sample in samples {
            let once = fold(sample);
            assert_eq!(fold(&once), once, "fold not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_repair_cp1252_mojibake() {
        let original = "Nguyễn Văn An";
        let garbled = garble_cp1252(original);
        assert_ne!(garbled, original);
        assert!(looks_mojibake(&garbled));
        assert_eq!(repair(&garbled), original);
    }

    #[test]
    fn test_repair_latin1_mojibake() {
        let original = "Tiếng Việt có dấu";
        let garbled = garble_latin1(original);
        assert_eq!(repair(&garbled), original);
    }

    #[test]
    fn test_latin1_strategy_strict() {
        assert_eq!(latin1_to_utf8(&garble_latin1("Hà Nội")).as_deref(), Some("Hà Nội"));
        // chars above U+00FF cannot be Latin-1 bytes
        assert_eq!(latin1_to_utf8("Hà Nội"), None);
    }

    #[test]
    fn test_cp1252_strategy_strict() {
        assert_eq!(cp1252_to_utf8(&garble_cp1252("Đồng Tháp")).as_deref(), Some("Đồng Tháp"));
        assert_eq!(cp1252_to_utf8("Đồng Tháp"), None);
    }

    #[test]
    fn test_repair_keeps_clean_vietnamese() {
        for text in [
            "Trường Đại học Bách khoa",
            "Âu Cơ",
            "Ê-đê",
            "café crème",
            "CHÚ Ý…",
            "“CHÚ”",
            "Tên: “CÔ”",
            "CHÊ…",
            "Í…",
            "NGÀY “HỘI”",
        ] {
            assert_eq!(repair(text), text);
        }
    }

    #[test]
    fn test_clean_capitals_before_punctuation_still_fold() {
        assert_eq!(fold("CHÚ Ý…"), "chu y...");
        assert_eq!(fold("“CÔ”"), "“co”");
    }

    #[test]
    fn test_redecode_rejects_foreign_scripts() {
        // Ú + ” forms the UTF-8 bytes of an Arabic letter
        assert_eq!(redecode_segments("“CHÚ”"), None);
        assert_eq!(redecode_segments(&garble_cp1252("Việt")).as_deref(), Some("Việt"));
    }

    #[test]
    fn test_repair_mixed_text() {
        let garbled = format!("Lớp {}", garble_cp1252("Kỹ thuật"));
        assert_eq!(repair(&garbled), "Lớp Kỹ thuật");
    }

    #[test]
    fn test_repair_whitespace() {
        assert_eq!(repair("  a \t  b\n\n\n\nc  "), "a b\n\nc");
        assert_eq!(repair("a\u{00A0}b\u{200B}c"), "a bc");
        assert_eq!(repair("x\r\ny"), "x\ny");
    }

    #[test]
    fn test_repair_composes_nfc() {
        let decomposed = "Vie\u{0302}\u{0323}t";
        assert_eq!(repair(decomposed), "Việt");
    }

    #[test]
    fn test_repair_never_panics_on_odd_input() {
        assert_eq!(repair(""), "");
        assert_eq!(repair("\u{FFFD}"), "\u{FFFD}");
        let _ = repair("Ã\u{0081}Ã");
        let _ = repair("\u{0000}\u{0085}Ê");
    }

    #[test]
    fn test_fold_with_offsets_maps_back() {
        let (folded, offsets) = fold_with_offsets("Đà ﬁ");
        assert_eq!(folded, "da fi");
        assert_eq!(offsets, vec![0, 1, 2, 3, 3]);
    }

    #[test]
    fn test_normalize_query() {
        let normalized = normalize_query("  Nguyễn  Văn ");
        assert_eq!(normalized.fixed, "Nguyễn Văn");
        assert_eq!(normalized.folded, "nguyen van");
    }
}
