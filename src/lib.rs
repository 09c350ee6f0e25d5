pub mod config;
pub mod error;
pub mod index;
pub mod links;
pub mod search;
pub mod source;

pub use error::{SourceError, SourceResult};
pub use index::{IndexService, RebuildStats};
pub use search::{SearchHit, SearchOptions};
