//! Error taxonomy for the sheet source boundary / Phân loại lỗi
//!
//! Only the source boundary produces errors. The rebuild turns every one of them
//! into an empty or partial index plus a log line, and search never fails.

use thiserror::Error;

/// Errors raised while materialising a workbook from a sheet source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source cannot be reached or authorised at all
    #[error("sheet source unavailable: {0}")]
    Unavailable(String),

    /// One sheet's grid or annotations cannot be read
    #[error("cannot read sheet '{sheet}': {reason}")]
    SheetRead { sheet: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid workbook JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
}

impl SourceError {
    pub fn sheet_read(sheet: impl Into<String>, reason: impl ToString) -> Self {
        Self::SheetRead {
            sheet: sheet.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the whole source is gone rather than one sheet
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_read_message() {
        let err = SourceError::sheet_read("Lớp A", "timeout");
        assert_eq!(err.to_string(), "cannot read sheet 'Lớp A': timeout");
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_unavailable() {
        let err = SourceError::Unavailable("no credentials".to_string());
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("no credentials"));
    }
}
