//! Hyperlink registry - every discovered link and where it was found
//!
//! Keyed by the full URL. An occurrence is recorded at most once per
//! `(url, sheet, address)` within one rebuild, whichever pass finds it first.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Position of a cell inside the workbook
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellLocation {
    pub sheet_name: String,
    /// 1-based
    pub row: u32,
    /// 1-based
    pub col: u32,
    /// A1-style label, e.g. "B12"
    pub address: String,
}

impl CellLocation {
    pub fn new(sheet_name: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            row,
            col,
            address: a1_address(row, col),
        }
    }
}

/// Column letters for a 1-based column (1 = A, 26 = Z, 27 = AA).
/// Column 0 has no letters.
pub fn column_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    letters.iter().rev().collect()
}

/// A1-style address for 1-based row / column
pub fn a1_address(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRegistryEntry {
    pub url: String,
    /// In discovery order
    pub occurrences: Vec<CellLocation>,
    /// Sub-sheet the URL points at, when it is a spreadsheet link with a gid
    pub subsheet_id: Option<String>,
    /// Title of that sub-sheet in the indexed workbook, if known
    pub resolved_sheet_name: Option<String>,
}

/// One `(url, cell)` pair, flattened for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOccurrence {
    pub url: String,
    #[serde(flatten)]
    pub location: CellLocation,
}

/// Link registry for one index generation / Sổ đăng ký liên kết
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct LinkRegistry {
    entries: BTreeMap<String, LinkRegistryEntry>,
    #[serde(skip)]
    seen: HashSet<(String, String, String)>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence. Returns `false` when the same url was already
    /// recorded at this sheet/address.
    pub fn record(
        &mut self,
        url: &str,
        location: CellLocation,
        subsheet_id: Option<&str>,
        resolved_sheet_name: Option<&str>,
    ) -> bool {
        let key = (url.to_string(), location.sheet_name.clone(), location.address.clone());
        if !self.seen.insert(key) {
            return false;
        }

        let entry = self
            .entries
            .entry(url.to_string())
            .or_insert_with(|| LinkRegistryEntry {
                url: url.to_string(),
                occurrences: Vec::new(),
                subsheet_id: None,
                resolved_sheet_name: None,
            });
        if entry.subsheet_id.is_none() {
            entry.subsheet_id = subsheet_id.map(str::to_string);
        }
        if entry.resolved_sheet_name.is_none() {
            entry.resolved_sheet_name = resolved_sheet_name.map(str::to_string);
        }
        entry.occurrences.push(location);
        true
    }

    /// Number of distinct URLs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total occurrences across all URLs
    pub fn occurrence_count(&self) -> usize {
        self.seen.len()
    }

    pub fn get(&self, url: &str) -> Option<&LinkRegistryEntry> {
        self.entries.get(url)
    }

    /// Entries ordered by URL
    pub fn iter(&self) -> impl Iterator<Item = &LinkRegistryEntry> {
        self.entries.values()
    }

    /// Every occurrence, URL order first, then discovery order
    pub fn occurrences(&self) -> impl Iterator<Item = LinkOccurrence> + '_ {
        self.entries.values().flat_map(|entry| {
            entry.occurrences.iter().map(move |location| LinkOccurrence {
                url: entry.url.clone(),
                location: location.clone(),
            })
        })
    }

    /// `url -> occurrences`
    pub fn to_location_map(&self) -> BTreeMap<String, Vec<CellLocation>> {
        self.entries
            .iter()
            .map(|(url, entry)| (url.clone(), entry.occurrences.clone()))
            .collect()
    }
}
