//! In-memory sheet source, built up with a builder

use async_trait::async_trait;

use super::{Annotations, Grid, SheetInfo, SheetSource};
use crate::error::{SourceError, SourceResult};

#[derive(Debug, Clone)]
struct MemorySheet {
    info: SheetInfo,
    grid: Grid,
    annotations: Option<Annotations>,
    grid_failure: Option<String>,
    annotation_failure: Option<String>,
}

/// Workbook held in memory / Bảng tính trong bộ nhớ
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    sheets: Vec<MemorySheet>,
    unavailable: Option<String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet; `formulas` may be empty
    pub fn sheet(mut self, title: &str, gid: &str, values: Vec<Vec<String>>, formulas: Vec<Vec<String>>) -> Self {
        self.sheets.push(MemorySheet {
            info: SheetInfo::new(title, gid),
            grid: Grid { values, formulas },
            annotations: None,
            grid_failure: None,
            annotation_failure: None,
        });
        self
    }

    /// Attach rich annotations to the sheet with `gid`
    pub fn annotations(mut self, gid: &str, annotations: Annotations) -> Self {
        if let Some(sheet) = self.find_mut(gid) {
            sheet.annotations = Some(annotations);
        }
        self
    }

    /// Add a listed sheet whose grid cannot be read
    pub fn failing_sheet(mut self, title: &str, gid: &str, reason: &str) -> Self {
        self.sheets.push(MemorySheet {
            info: SheetInfo::new(title, gid),
            grid: Grid::default(),
            annotations: None,
            grid_failure: Some(reason.to_string()),
            annotation_failure: None,
        });
        self
    }

    /// Make the annotation read of sheet `gid` fail
    pub fn failing_annotations(mut self, gid: &str, reason: &str) -> Self {
        if let Some(sheet) = self.find_mut(gid) {
            sheet.annotation_failure = Some(reason.to_string());
        }
        self
    }

    /// Make every call fail with `SourceError::Unavailable`
    pub fn unavailable(mut self, reason: &str) -> Self {
        self.unavailable = Some(reason.to_string());
        self
    }

    fn find_mut(&mut self, gid: &str) -> Option<&mut MemorySheet> {
        self.sheets.iter_mut().find(|s| s.info.subsheet_id == gid)
    }

    fn find(&self, gid: &str) -> SourceResult<&MemorySheet> {
        self.check_available()?;
        self.sheets
            .iter()
            .find(|s| s.info.subsheet_id == gid)
            .ok_or_else(|| SourceError::sheet_read(gid, "no such sheet"))
    }

    fn check_available(&self) -> SourceResult<()> {
        match &self.unavailable {
            Some(reason) => Err(SourceError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Build a matrix from string literals
pub fn matrix(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

#[async_trait]
impl SheetSource for InMemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_sheets(&self) -> SourceResult<Vec<SheetInfo>> {
        self.check_available()?;
        Ok(self.sheets.iter().map(|s| s.info.clone()).collect())
    }

    async fn read_grid(&self, subsheet_id: &str) -> SourceResult<Grid> {
        let sheet = self.find(subsheet_id)?;
        if let Some(reason) = &sheet.grid_failure {
            return Err(SourceError::sheet_read(&sheet.info.title, reason));
        }
        Ok(sheet.grid.clone())
    }

    async fn read_rich_annotations(&self, subsheet_id: &str) -> SourceResult<Option<Annotations>> {
        let sheet = self.find(subsheet_id)?;
        if let Some(reason) = &sheet.annotation_failure {
            return Err(SourceError::sheet_read(&sheet.info.title, reason));
        }
        Ok(sheet.annotations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_and_read() {
        let source = InMemorySource::new()
            .sheet("DS", "0", matrix(&[&["Họ tên"], &["An"]]), Vec::new())
            .sheet("Khác", "42", matrix(&[&["x"]]), matrix(&[&["=A1"]]));

        let sheets = source.list_sheets().await.unwrap();
        assert_eq!(sheets, vec![SheetInfo::new("DS", "0"), SheetInfo::new("Khác", "42")]);

        let grid = source.read_grid("42").await.unwrap();
        assert_eq!(grid.formula(0, 0), "=A1");
        assert!(source.read_rich_annotations("0").await.unwrap().is_none());
        assert!(source.read_grid("9").await.is_err());
    }

    #[tokio::test]
    async fn test_failures() {
        let source = InMemorySource::new()
            .sheet("DS", "0", matrix(&[&["x"]]), Vec::new())
            .failing_annotations("0", "quota")
            .failing_sheet("Hỏng", "1", "timeout");

        assert!(source.read_grid("0").await.is_ok());
        assert!(source.read_rich_annotations("0").await.is_err());
        let err = source.read_grid("1").await.unwrap_err();
        assert_eq!(err.to_string(), "cannot read sheet 'Hỏng': timeout");

        let down = InMemorySource::new().unavailable("no credentials");
        assert!(down.list_sheets().await.unwrap_err().is_unavailable());
    }
}
