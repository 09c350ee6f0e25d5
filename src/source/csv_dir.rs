//! Directory of CSV exports, one sheet per file
//!
//! Sheets are the `*.csv` files sorted by file name: title is the file stem and
//! the subsheet id is the position in that order. CSV carries no formulas or
//! rich annotations, so the formula matrix mirrors the values and the deep pass
//! finds nothing here.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use encoding_rs::WINDOWS_1252;
use parking_lot::RwLock;

use super::{Grid, SheetInfo, SheetSource};
use crate::error::{SourceError, SourceResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub struct CsvDirSource {
    dir: PathBuf,
    files: RwLock<Vec<(SheetInfo, PathBuf)>>,
}

impl CsvDirSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: RwLock::new(Vec::new()),
        }
    }

    async fn scan(&self) -> SourceResult<Vec<(SheetInfo, PathBuf)>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                return Err(SourceError::Unavailable(format!(
                    "cannot open CSV directory {}: {}",
                    self.dir.display(),
                    e
                )));
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_csv = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if is_csv && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let files: Vec<(SheetInfo, PathBuf)> = paths
            .into_iter()
            .enumerate()
            .map(|(idx, path)| {
                let title = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("Sheet{}", idx + 1));
                (SheetInfo::new(title, idx.to_string()), path)
            })
            .collect();

        *self.files.write() = files.clone();
        Ok(files)
    }

    async fn path_for(&self, subsheet_id: &str) -> SourceResult<(SheetInfo, PathBuf)> {
        let cached = find(&self.files.read(), subsheet_id);
        let found = match cached {
            Some(found) => Some(found),
            None => find(&self.scan().await?, subsheet_id),
        };
        found.ok_or_else(|| SourceError::sheet_read(subsheet_id, "no such sheet"))
    }
}

fn find(files: &[(SheetInfo, PathBuf)], subsheet_id: &str) -> Option<(SheetInfo, PathBuf)> {
    files.iter().find(|(info, _)| info.subsheet_id == subsheet_id).cloned()
}

/// UTF-8 (BOM stripped) first, Windows-1252 otherwise
pub fn decode_csv_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// Parse CSV text into a ragged matrix
pub fn parse_csv(text: &str) -> SourceResult<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[async_trait]
impl SheetSource for CsvDirSource {
    fn name(&self) -> &str {
        "csv_dir"
    }

    async fn list_sheets(&self) -> SourceResult<Vec<SheetInfo>> {
        let files = self.scan().await?;
        Ok(files.into_iter().map(|(info, _)| info).collect())
    }

    async fn read_grid(&self, subsheet_id: &str) -> SourceResult<Grid> {
        let (info, path) = self.path_for(subsheet_id).await?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::sheet_read(&info.title, e))?;
        let values = parse_csv(&decode_csv_bytes(&bytes))
            .map_err(|e| SourceError::sheet_read(&info.title, e))?;

        Ok(Grid {
            formulas: values.clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("Nguyễn Văn An".as_bytes());
        assert_eq!(decode_csv_bytes(&bytes), "Nguyễn Văn An");
    }

    #[test]
    fn test_decode_cp1252_fallback() {
        // "café" in Windows-1252
        assert_eq!(decode_csv_bytes(b"caf\xE9"), "café");
    }

    #[test]
    fn test_parse_ragged() {
        let rows = parse_csv("a,b,c\nd\n\"x, y\",z\n").unwrap();
        assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["d"], vec!["x, y", "z"]]);
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_lop.csv"), "Họ tên,Link\nAn,https://a.vn\n").unwrap();
        std::fs::write(dir.path().join("a_ds.CSV"), "x\n").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "skip").unwrap();

        let source = CsvDirSource::new(dir.path());
        let sheets = source.list_sheets().await.unwrap();
        assert_eq!(sheets, vec![SheetInfo::new("a_ds", "0"), SheetInfo::new("b_lop", "1")]);

        let grid = source.read_grid("1").await.unwrap();
        assert_eq!(grid.value(1, 1), "https://a.vn");
        assert_eq!(grid.values, grid.formulas);
        assert!(source.read_rich_annotations("1").await.unwrap().is_none());
        assert!(source.read_grid("7").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_dir_is_unavailable() {
        let source = CsvDirSource::new("/nonexistent/sheetdex/csv");
        assert!(source.list_sheets().await.unwrap_err().is_unavailable());
    }
}
