//! Grid indexer - turns raw sheets into row records and registry occurrences
//!
//! Two phases:
//! - scan: each sheet is walked independently (rayon), producing rows and the
//!   ordered link discoveries of both passes. No shared state.
//! - merge: discoveries are written into the single registry one sheet at a
//!   time, in sheet order, skipping `(url, address)` pairs already present.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::links::{
    classify, extract_from_cell, extract_from_rich_cell, CellLocation, DiscoveredLink, LinkRegistry, LinkSource,
};
use crate::search::RowRecord;
use crate::source::{Annotations, Grid, SheetInfo};

/// Per-sheet diagnostic counters / Thống kê từng trang tính
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetStats {
    pub sheet: String,
    /// "{nrows}x{ncols}"
    pub size: String,
    pub non_empty_cells: usize,
    /// Cells whose display value mentions "http"
    pub value_http_cells: usize,
    /// Cells whose formula mentions "http" or HYPERLINK
    pub formula_http_cells: usize,
    /// Cells yielding at least one link in the primary pass
    pub cells_with_links: usize,
    pub primary_added: usize,
    pub deep_occurrences_seen: usize,
    pub deep_added: usize,
    /// Occurrences this sheet added to the registry, by where in the cell they were found
    pub added_by_source: BTreeMap<LinkSource, usize>,
    pub skipped: bool,
    pub error: Option<String>,
}

impl SheetStats {
    fn skipped(sheet: &str, error: String) -> Self {
        Self {
            sheet: sheet.to_string(),
            size: "0x0".to_string(),
            skipped: true,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Raw data of one sheet as fetched from the source
#[derive(Debug, Clone)]
pub enum SheetData {
    Loaded {
        grid: Grid,
        /// Present only for a deep rebuild on a source that has annotations
        annotations: Option<Annotations>,
    },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SheetInput {
    pub info: SheetInfo,
    pub data: SheetData,
}

/// Rows, registry and stats of one whole workbook
#[derive(Debug, Clone, Default)]
pub struct WorkbookIndex {
    pub rows: Vec<RowRecord>,
    pub registry: LinkRegistry,
    pub sheet_titles: Vec<String>,
    pub per_sheet: Vec<SheetStats>,
}

/// Links found in one cell, 1-based position
#[derive(Debug, Clone)]
struct CellLinks {
    row: u32,
    col: u32,
    links: Vec<DiscoveredLink>,
}

/// Result of walking one sheet, before registry merge
#[derive(Debug, Clone)]
pub struct SheetScan {
    title: String,
    rows: Vec<RowRecord>,
    /// row number -> index in `rows`
    row_slots: HashMap<u32, usize>,
    primary: Vec<CellLinks>,
    deep: Vec<CellLinks>,
    stats: SheetStats,
}

/// Walk one sheet: row records, primary pass, and the deep pass when
/// annotations are supplied
pub fn scan_sheet(title: &str, grid: &Grid, annotations: Option<&Annotations>) -> SheetScan {
    let (nrows, ncols) = grid.extents();
    let mut stats = SheetStats {
        sheet: title.to_string(),
        size: format!("{}x{}", nrows, ncols),
        ..Default::default()
    };

    let mut rows = Vec::new();
    let mut row_slots = HashMap::new();
    let mut primary = Vec::new();

    for r in 0..nrows {
        let row_number = (r + 1) as u32;
        let values: Vec<String> = grid.values.get(r).cloned().unwrap_or_default();

        for c in 0..ncols {
            let value = grid.value(r, c);
            let formula = grid.formula(r, c);
            if value.trim().is_empty() && formula.trim().is_empty() {
                continue;
            }
            stats.non_empty_cells += 1;
            if value.to_ascii_lowercase().contains("http") {
                stats.value_http_cells += 1;
            }
            let formula_lower = formula.to_ascii_lowercase();
            if formula_lower.contains("http") || formula_lower.contains("hyperlink") {
                stats.formula_http_cells += 1;
            }

            let links = extract_from_cell(value, formula);
            if !links.is_empty() {
                stats.cells_with_links += 1;
                primary.push(CellLinks {
                    row: row_number,
                    col: (c + 1) as u32,
                    links,
                });
            }
        }

        if let Some(record) = RowRecord::from_cells(title, row_number, values) {
            row_slots.insert(row_number, rows.len());
            rows.push(record);
        }
    }

    let mut deep = Vec::new();
    if let Some(annotations) = annotations {
        for (r, cells) in annotations.iter().enumerate() {
            for (c, cell) in cells.iter().enumerate() {
                let Some(cell) = cell else { continue };
                let links = extract_from_rich_cell(cell);
                if links.is_empty() {
                    continue;
                }
                stats.deep_occurrences_seen += links.len();
                deep.push(CellLinks {
                    row: (r + 1) as u32,
                    col: (c + 1) as u32,
                    links,
                });
            }
        }
    }

    SheetScan {
        title: title.to_string(),
        rows,
        row_slots,
        primary,
        deep,
        stats,
    }
}

impl SheetScan {
    /// Write this sheet's discoveries into `registry`. Primary links always
    /// attach to their row; deep links only when the pass added them.
    pub fn merge_into(
        mut self,
        registry: &mut LinkRegistry,
        gid_titles: &HashMap<String, String>,
    ) -> (Vec<RowRecord>, SheetStats) {
        for cell in std::mem::take(&mut self.primary) {
            for link in &cell.links {
                if self.record(registry, gid_titles, &cell, link) {
                    self.stats.primary_added += 1;
                    *self.stats.added_by_source.entry(link.source).or_default() += 1;
                }
                self.attach(cell.row, &link.url);
            }
        }

        for cell in std::mem::take(&mut self.deep) {
            for link in &cell.links {
                if self.record(registry, gid_titles, &cell, link) {
                    self.stats.deep_added += 1;
                    *self.stats.added_by_source.entry(link.source).or_default() += 1;
                    self.attach(cell.row, &link.url);
                }
            }
        }

        (self.rows, self.stats)
    }

    fn record(
        &self,
        registry: &mut LinkRegistry,
        gid_titles: &HashMap<String, String>,
        cell: &CellLinks,
        link: &DiscoveredLink,
    ) -> bool {
        let class = classify(&link.url);
        let resolved = class
            .subsheet_id
            .as_ref()
            .and_then(|gid| gid_titles.get(gid))
            .map(String::as_str);
        registry.record(
            &link.url,
            CellLocation::new(self.title.as_str(), cell.row, cell.col),
            class.subsheet_id.as_deref(),
            resolved,
        )
    }

    /// A link in a blank row only lands in the registry
    fn attach(&mut self, row_number: u32, url: &str) {
        if let Some(&slot) = self.row_slots.get(&row_number) {
            self.rows[slot].associated_link_urls.push(url.to_string());
        }
    }
}

/// Index a whole workbook. Failed sheets are skipped and reported in the stats;
/// the output is ordered by sheet, then row.
pub fn index_workbook(sheets: Vec<SheetInput>) -> WorkbookIndex {
    let gid_titles: HashMap<String, String> = sheets
        .iter()
        .map(|s| (s.info.subsheet_id.clone(), s.info.title.clone()))
        .collect();
    let sheet_titles: Vec<String> = sheets.iter().map(|s| s.info.title.clone()).collect();

    let scans: Vec<Result<SheetScan, SheetStats>> = sheets
        .par_iter()
        .map(|sheet| match &sheet.data {
            SheetData::Loaded { grid, annotations } => Ok(scan_sheet(&sheet.info.title, grid, annotations.as_ref())),
            SheetData::Failed(reason) => Err(SheetStats::skipped(&sheet.info.title, reason.clone())),
        })
        .collect();

    let mut index = WorkbookIndex {
        sheet_titles,
        ..Default::default()
    };

    for scan in scans {
        match scan {
            Ok(scan) => {
                let (rows, stats) = scan.merge_into(&mut index.registry, &gid_titles);
                tracing::debug!(
                    sheet = %stats.sheet,
                    size = %stats.size,
                    non_empty = stats.non_empty_cells,
                    value_http = stats.value_http_cells,
                    formula_http = stats.formula_http_cells,
                    cells_with_links = stats.cells_with_links,
                    primary_added = stats.primary_added,
                    deep_seen = stats.deep_occurrences_seen,
                    deep_added = stats.deep_added,
                    "Sheet indexed"
                );
                index.rows.extend(rows);
                index.per_sheet.push(stats);
            }
            Err(stats) => {
                tracing::warn!(
                    "Skipping sheet '{}': {}",
                    stats.sheet,
                    stats.error.as_deref().unwrap_or("unknown error")
                );
                index.per_sheet.push(stats);
            }
        }
    }

    index
}
