//! Index module - grid walk and the service publishing index generations

pub mod grid;
pub mod service;

pub use grid::{index_workbook, scan_sheet, SheetData, SheetInput, SheetStats, WorkbookIndex};
pub use service::{IndexService, IndexSnapshot, IndexStatus, LinksSummary, RebuildStats};
