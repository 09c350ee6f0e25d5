//! Sheet source boundary / Nguồn dữ liệu bảng tính
//!
//! A source only materialises raw data: sheet list, value/formula grids and
//! optional rich annotations. Transport, auth and retry are its own business;
//! the indexer only sees success or a `SourceError` per call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{SourceConfig, SourceKind};
use crate::error::SourceResult;

pub mod csv_dir;
pub mod memory;
pub mod workbook;

pub use csv_dir::CsvDirSource;
pub use memory::InMemorySource;
pub use workbook::WorkbookFileSource;

/// One logical sheet of the workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub title: String,
    /// Sub-sheet identifier (gid)
    pub subsheet_id: String,
}

impl SheetInfo {
    pub fn new(title: impl Into<String>, subsheet_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subsheet_id: subsheet_id.into(),
        }
    }
}

/// Display values and formula text of one sheet. Both matrices are ragged:
/// rows may be shorter than the sheet width, and one may be shorter than the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub values: Vec<Vec<String>>,
    pub formulas: Vec<Vec<String>>,
}

impl Grid {
    /// `(nrows, ncols)` over both matrices
    pub fn extents(&self) -> (usize, usize) {
        let nrows = self.values.len().max(self.formulas.len());
        let ncols = self
            .values
            .iter()
            .chain(self.formulas.iter())
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        (nrows, ncols)
    }

    /// Display value at 0-based `(row, col)`, `""` outside the matrix
    pub fn value(&self, row: usize, col: usize) -> &str {
        cell(&self.values, row, col)
    }

    /// Formula text at 0-based `(row, col)`, `""` outside the matrix
    pub fn formula(&self, row: usize, col: usize) -> &str {
        cell(&self.formulas, row, col)
    }
}

fn cell(matrix: &[Vec<String>], row: usize, col: usize) -> &str {
    matrix
        .get(row)
        .and_then(|r| r.get(col))
        .map(String::as_str)
        .unwrap_or("")
}

/// A sub-range of cell text carrying its own link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextSpan {
    /// Start character index within the cell text
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub link: Option<String>,
}

/// Rich per-cell data used by the deep pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAnnotation {
    #[serde(default)]
    pub hyperlink: Option<String>,
    #[serde(default)]
    pub rich_text_spans: Vec<RichTextSpan>,
    #[serde(default)]
    pub formatted_value: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Ragged matrix of per-cell annotations, `None` for plain cells
pub type Annotations = Vec<Vec<Option<CellAnnotation>>>;

/// Sheet source interface / Giao diện nguồn dữ liệu
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Sheets in workbook order
    async fn list_sheets(&self) -> SourceResult<Vec<SheetInfo>>;

    /// Value and formula grids of one sheet
    async fn read_grid(&self, subsheet_id: &str) -> SourceResult<Grid>;

    /// Rich annotations of one sheet; `None` when the source has none
    async fn read_rich_annotations(&self, _subsheet_id: &str) -> SourceResult<Option<Annotations>> {
        Ok(None)
    }
}

/// Open the source described by `config`
pub fn from_config(config: &SourceConfig) -> Arc<dyn SheetSource> {
    match config.kind {
        SourceKind::Workbook => Arc::new(WorkbookFileSource::new(&config.path)),
        SourceKind::CsvDir => Arc::new(CsvDirSource::new(&config.path)),
    }
}
