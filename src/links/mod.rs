//! Link module - extraction, classification and the per-generation registry

pub mod classify;
pub mod extractor;
pub mod registry;

pub use classify::{classify, LinkClass, LinkKind};
pub use extractor::{base_url, extract_from_cell, extract_from_rich_cell, DiscoveredLink, LinkSource};
pub use registry::{a1_address, column_letters, CellLocation, LinkOccurrence, LinkRegistry, LinkRegistryEntry};
