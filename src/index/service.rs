//! Index service - owns the current index generation / Dịch vụ chỉ mục
//!
//! A rebuild fetches every sheet, builds a complete new snapshot off to the side
//! and publishes it with one pointer swap. Readers clone the `Arc` under a short
//! read lock, so they see either the old generation or the new one in full.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::grid::{index_workbook, SheetData, SheetInput, SheetStats, WorkbookIndex};
use crate::links::{CellLocation, LinkOccurrence, LinkRegistry};
use crate::search::{RowRecord, SearchEngine, SearchHit, SearchOptions};
use crate::source::{SheetInfo, SheetSource};

/// Outcome of one rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildStats {
    pub row_count: usize,
    /// Sheets listed by the source, including skipped ones
    pub sheet_count: usize,
    pub unique_link_count: usize,
    pub occurrence_count: usize,
    pub deep: bool,
    /// Set when the source could not be reached at all
    pub source_error: Option<String>,
    pub elapsed_ms: u64,
    pub per_sheet: Vec<SheetStats>,
}

/// One published index generation, immutable once built
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    /// 0 until the first rebuild completes
    pub generation: u64,
    pub rows: Vec<RowRecord>,
    pub registry: LinkRegistry,
    pub sheet_titles: Vec<String>,
    pub built_at: Option<DateTime<Utc>>,
    pub stats: RebuildStats,
}

/// Status of the current snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub generation: u64,
    pub built_at: Option<DateTime<Utc>>,
    pub row_count: usize,
    pub unique_link_count: usize,
    pub sheet_titles: Vec<String>,
    pub source_error: Option<String>,
    pub is_rebuilding: bool,
}

/// Totals of the current registry plus its first few occurrences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksSummary {
    pub total_links: usize,
    pub unique_urls: usize,
    pub sample_links: Vec<LinkOccurrence>,
}

pub struct IndexService {
    source: Arc<dyn SheetSource>,
    engine: SearchEngine,
    current: RwLock<Arc<IndexSnapshot>>,
    rebuild_lock: tokio::sync::Mutex<()>,
    running: AtomicBool,
    generation: AtomicU64,
}

/// Clears the running flag even if the rebuild future is dropped
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl IndexService {
    pub fn new(source: Arc<dyn SheetSource>) -> Self {
        Self {
            source,
            engine: SearchEngine::new(),
            current: RwLock::new(Arc::new(IndexSnapshot::default())),
            rebuild_lock: tokio::sync::Mutex::new(()),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_engine(mut self, engine: SearchEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Current generation
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.read().clone()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Full rebuild, waiting for any rebuild already in progress
    pub async fn rebuild_index(&self, deep: bool) -> RebuildStats {
        let _lock = self.rebuild_lock.lock().await;
        self.run_rebuild(deep).await
    }

    /// Full rebuild, or `None` if another rebuild is running
    pub async fn try_rebuild_index(&self, deep: bool) -> Option<RebuildStats> {
        let _lock = self.rebuild_lock.try_lock().ok()?;
        Some(self.run_rebuild(deep).await)
    }

    async fn run_rebuild(&self, deep: bool) -> RebuildStats {
        let _running = RunningGuard::start(&self.running);
        let started = Instant::now();
        tracing::info!("Index rebuild started (source: {}, deep: {})", self.source.name(), deep);

        let (index, source_error) = match self.source.list_sheets().await {
            Ok(sheets) => (self.build(sheets, deep).await, None),
            Err(e) => {
                tracing::warn!("Sheet source unavailable, publishing empty index: {}", e);
                (WorkbookIndex::default(), Some(e.to_string()))
            }
        };

        let stats = RebuildStats {
            row_count: index.rows.len(),
            sheet_count: index.sheet_titles.len(),
            unique_link_count: index.registry.len(),
            occurrence_count: index.registry.occurrence_count(),
            deep,
            source_error,
            elapsed_ms: started.elapsed().as_millis() as u64,
            per_sheet: index.per_sheet,
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(IndexSnapshot {
            generation,
            rows: index.rows,
            registry: index.registry,
            sheet_titles: index.sheet_titles,
            built_at: Some(Utc::now()),
            stats: stats.clone(),
        });
        *self.current.write() = snapshot;

        tracing::info!(
            "Index rebuild finished: generation {}, {} rows, {} sheets, {} links ({} occurrences) in {}ms",
            generation,
            stats.row_count,
            stats.sheet_count,
            stats.unique_link_count,
            stats.occurrence_count,
            stats.elapsed_ms
        );
        stats
    }

    async fn build(&self, sheets: Vec<SheetInfo>, deep: bool) -> WorkbookIndex {
        let inputs = join_all(sheets.into_iter().map(|info| self.fetch_sheet(info, deep))).await;

        match tokio::task::spawn_blocking(move || index_workbook(inputs)).await {
            Ok(index) => index,
            Err(e) => {
                tracing::error!("Indexing task failed, publishing empty index: {}", e);
                WorkbookIndex::default()
            }
        }
    }

    async fn fetch_sheet(&self, info: SheetInfo, deep: bool) -> SheetInput {
        let grid = match self.source.read_grid(&info.subsheet_id).await {
            Ok(grid) => grid,
            Err(e) => return failed(info, e.to_string()),
        };

        let annotations = if deep {
            match self.source.read_rich_annotations(&info.subsheet_id).await {
                Ok(annotations) => annotations,
                Err(e) => return failed(info, e.to_string()),
            }
        } else {
            None
        };

        SheetInput {
            info,
            data: SheetData::Loaded { grid, annotations },
        }
    }

    /// Ranked hits over the current generation. Runs rayon work on the caller
    /// thread; async callers should wrap it in `spawn_blocking`.
    pub fn search(&self, options: &SearchOptions) -> Vec<SearchHit> {
        let snapshot = self.snapshot();
        self.engine.search(&snapshot.rows, options)
    }

    /// `url -> occurrences` of the current generation
    pub fn link_registry(&self) -> BTreeMap<String, Vec<CellLocation>> {
        self.snapshot().registry.to_location_map()
    }

    /// Stats of the rebuild that produced the current generation
    pub fn last_stats(&self) -> RebuildStats {
        self.snapshot().stats.clone()
    }

    pub fn links_summary(&self, sample: usize) -> LinksSummary {
        let snapshot = self.snapshot();
        LinksSummary {
            total_links: snapshot.registry.occurrence_count(),
            unique_urls: snapshot.registry.len(),
            sample_links: snapshot.registry.occurrences().take(sample).collect(),
        }
    }

    pub fn status(&self) -> IndexStatus {
        let snapshot = self.snapshot();
        IndexStatus {
            generation: snapshot.generation,
            built_at: snapshot.built_at,
            row_count: snapshot.rows.len(),
            unique_link_count: snapshot.registry.len(),
            sheet_titles: snapshot.sheet_titles.clone(),
            source_error: snapshot.stats.source_error.clone(),
            is_rebuilding: self.is_rebuilding(),
        }
    }
}

fn failed(info: SheetInfo, reason: String) -> SheetInput {
    SheetInput {
        info,
        data: SheetData::Failed(reason),
    }
}
