//! Search module - text normalization and row ranking / Mô-đun tìm kiếm
//!
//! The module only exposes primitives; the index service owns the rows and
//! decides when they are rebuilt.
//! - `normalizer`: mojibake repair and Vietnamese diacritic folding
//! - `schema`: row records, hits, query options
//! - `engine`: exact / fuzzy scoring and snippets

pub mod engine;
pub mod normalizer;
pub mod schema;

pub use engine::{partial_ratio, snippet, SearchEngine, DEFAULT_SNIPPET_WINDOW};
pub use normalizer::{fold, normalize_query, repair, NormalizedText};
pub use schema::{RowRecord, SearchHit, SearchOptions};
