//! Workbook exported as one JSON file / Bảng tính xuất ra JSON
//!
//! ```json
//! {"sheets": [{"title": "DS", "gid": 0,
//!              "values": [["Họ tên", "Link"]], "formulas": [["", "=HYPERLINK(...)"]],
//!              "annotations": [[null, {"hyperlink": "https://..."}]]}]}
//! ```
//!
//! Cells that are not text are coerced: numbers and booleans render as their
//! display form, everything else becomes an empty string.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use super::{Annotations, Grid, SheetInfo, SheetSource};
use crate::error::{SourceError, SourceResult};

#[derive(Debug, Deserialize)]
struct WorkbookFile {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    gid: Value,
    #[serde(default)]
    values: Vec<Value>,
    #[serde(default)]
    formulas: Vec<Value>,
    #[serde(default)]
    annotations: Option<Annotations>,
}

/// Parsed workbook, sheets in file order
#[derive(Debug)]
struct LoadedWorkbook {
    sheets: Vec<LoadedSheet>,
}

#[derive(Debug)]
struct LoadedSheet {
    info: SheetInfo,
    grid: Grid,
    annotations: Option<Annotations>,
}

pub struct WorkbookFileSource {
    path: PathBuf,
    cache: RwLock<Option<Arc<LoadedWorkbook>>>,
}

impl WorkbookFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: RwLock::new(None),
        }
    }

    /// Read and parse the file, replacing the cached copy
    async fn reload(&self) -> SourceResult<Arc<LoadedWorkbook>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::Unavailable(format!(
                    "workbook file not found: {}",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let file: WorkbookFile = serde_json::from_slice(&bytes)?;
        let workbook = Arc::new(load(file));
        tracing::debug!(
            "Loaded workbook {} ({} sheets)",
            self.path.display(),
            workbook.sheets.len()
        );

        *self.cache.write() = Some(workbook.clone());
        Ok(workbook)
    }

    async fn workbook(&self) -> SourceResult<Arc<LoadedWorkbook>> {
        let cached = self.cache.read().clone();
        match cached {
            Some(workbook) => Ok(workbook),
            None => self.reload().await,
        }
    }

    async fn sheet<T>(&self, subsheet_id: &str, f: impl FnOnce(&LoadedSheet) -> T) -> SourceResult<T> {
        let workbook = self.workbook().await?;
        workbook
            .sheets
            .iter()
            .find(|s| s.info.subsheet_id == subsheet_id)
            .map(f)
            .ok_or_else(|| SourceError::sheet_read(subsheet_id, "no such sheet"))
    }
}

fn load(file: WorkbookFile) -> LoadedWorkbook {
    let sheets = file
        .sheets
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let gid = match coerce_cell(&entry.gid) {
                gid if gid.is_empty() => idx.to_string(),
                gid => gid,
            };
            let title = entry
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Sheet{}", idx + 1));
            LoadedSheet {
                info: SheetInfo::new(title, gid),
                grid: Grid {
                    values: coerce_matrix(&entry.values),
                    formulas: coerce_matrix(&entry.formulas),
                },
                annotations: entry.annotations,
            }
        })
        .collect();
    LoadedWorkbook { sheets }
}

fn coerce_matrix(rows: &[Value]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(coerce_cell).collect(),
            // A scalar row is a one-cell row
            other => vec![coerce_cell(other)],
        })
        .collect()
}

/// Text-like cells keep their display form; anything else is blank
pub fn coerce_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

#[async_trait]
impl SheetSource for WorkbookFileSource {
    fn name(&self) -> &str {
        "workbook"
    }

    /// Always re-reads the file so a rebuild sees the latest export
    async fn list_sheets(&self) -> SourceResult<Vec<SheetInfo>> {
        let workbook = self.reload().await?;
        Ok(workbook.sheets.iter().map(|s| s.info.clone()).collect())
    }

    async fn read_grid(&self, subsheet_id: &str) -> SourceResult<Grid> {
        self.sheet(subsheet_id, |s| s.grid.clone()).await
    }

    async fn read_rich_annotations(&self, subsheet_id: &str) -> SourceResult<Option<Annotations>> {
        self.sheet(subsheet_id, |s| s.annotations.clone()).await
    }
}
