//! The tiled resize pipeline.
//!
//! A run goes through three phases:
//!
//! 1. **Plan**: compute the grid and every tile's source and destination.
//! 2. **Stage**: for each descriptor, extract the source region, resize it and
//!    put it into the [`TileStore`]. Tiles are independent, so this fans out
//!    over a rayon pool when `parallel` is set.
//! 3. **Compose**: once every tile is staged, draw them into the canvas.
//!
//! Any failure aborts the run. Whatever was staged is deleted before the
//! original error is returned, so a failed run leaves nothing behind.

use crate::core::config::{StagingConfig, TilingConfig};
use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{PixelBuffer, RunId};
use crate::execution::progress::{CancelHandle, ProgressCallback, ProgressTracker, ProgressUpdate};
use crate::staging::{FileTileStore, MemoryTileStore, StagedTile, StagingGuard, TileStore};
use crate::tiling::compositor::TileCompositor;
use crate::tiling::extractor::TileExtractor;
use crate::tiling::planner::{TileDescriptor, TileGridPlanner};
use crate::tiling::transformer::{Resampler, TileTransformer};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Timing and shape of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Run the tiles were staged under.
    pub run_id: RunId,
    /// Grid columns.
    pub columns: u32,
    /// Grid rows.
    pub rows: u32,
    /// Tiles staged and composed.
    pub tiles: usize,
    /// Source size `(width, height)`.
    pub source: (u32, u32),
    /// Output size `(width, height)`.
    pub output: (u32, u32),
    /// Time spent extracting, resizing and staging tiles.
    pub stage_ms: u64,
    /// Time spent drawing the canvas.
    pub compose_ms: u64,
    /// Wall time of the whole run.
    pub total_ms: u64,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The composed canvas.
    pub image: PixelBuffer,
    /// Run statistics.
    pub stats: PipelineStats,
}

/// Resizes images tile by tile.
///
/// The pipeline owns its components and its store, so it can be reused for
/// many runs. Each run gets its own [`RunId`], which keeps concurrent runs on
/// a shared store apart.
pub struct TiledResizePipeline {
    config: TilingConfig,
    planner: TileGridPlanner,
    extractor: TileExtractor,
    transformer: TileTransformer,
    compositor: TileCompositor,
    store: Arc<dyn TileStore>,
    pool: Option<rayon::ThreadPool>,
    progress_callback: Option<ProgressCallback>,
    cancel: CancelHandle,
}

impl TiledResizePipeline {
    /// Create a pipeline staging into the medium named by `config.staging`.
    pub fn new(config: TilingConfig) -> TilingResult<Self> {
        let store = build_store(&config.staging)?;
        Self::with_store(config, store)
    }

    /// Create a pipeline staging into `store`.
    pub fn with_store(config: TilingConfig, store: Arc<dyn TileStore>) -> TilingResult<Self> {
        config.validate()?;

        let pool = if config.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .thread_name(|index| format!("tessella-worker-{}", index))
                .build()
                .map_err(|e| TilingError::WorkerPool {
                    error: e.to_string(),
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            planner: TileGridPlanner::new(config.split),
            extractor: TileExtractor::new(),
            transformer: TileTransformer::with_filter(config.filter),
            compositor: TileCompositor::new(),
            store,
            pool,
            progress_callback: None,
            cancel: CancelHandle::new(),
            config,
        })
    }

    /// Replace the resampler used for every tile.
    pub fn with_resampler(mut self, resampler: Box<dyn Resampler>) -> Self {
        self.transformer = TileTransformer::new(resampler);
        self
    }

    /// Set progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Handle that stops the current or next run.
    ///
    /// Cancellation sticks until [`CancelHandle::reset`] is called.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The store tiles are staged in.
    pub fn store(&self) -> &Arc<dyn TileStore> {
        &self.store
    }

    /// The configuration in use.
    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    /// Resize `source` to exactly `output_width x output_height`.
    pub fn run(
        &self,
        source: &PixelBuffer,
        output_width: u32,
        output_height: u32,
    ) -> TilingResult<PipelineOutput> {
        let start_time = Instant::now();
        let run_id = RunId::new();
        let (source_width, source_height) = source.dimensions();

        let grid = self.planner.plan(
            source_width,
            source_height,
            self.config.tile_width,
            self.config.tile_height,
            output_width,
            output_height,
        )?;
        info!(
            "Run {}: {}x{} -> {}x{} in {}x{} tiles of {}x{}",
            run_id,
            source_width,
            source_height,
            output_width,
            output_height,
            grid.x_tiles,
            grid.y_tiles,
            grid.tile_width,
            grid.tile_height
        );

        let mut tracker =
            ProgressTracker::new(grid.tile_count()).with_cancel_handle(self.cancel.clone());
        if let Some(callback) = &self.progress_callback {
            tracker = tracker.with_callback(callback.clone());
        }
        tracker.start();

        let guard = StagingGuard::new(self.store.as_ref());

        // Stage
        let stage_start = Instant::now();
        if let Err(e) = self.stage_all(source, grid.descriptors(), run_id, &guard, &tracker) {
            return Err(self.abort(run_id, &tracker, &guard, e));
        }
        let stage_ms = stage_start.elapsed().as_millis() as u64;
        info!("Run {}: staged {} tiles in {}ms", run_id, guard.tracked(), stage_ms);

        // Compose
        tracker.composing();
        let compose_start = Instant::now();
        let image = match self.compositor.compose(
            output_width,
            output_height,
            grid.descriptors(),
            self.store.as_ref(),
            run_id,
        ) {
            Ok(image) => image,
            Err(e) => return Err(self.abort(run_id, &tracker, &guard, e)),
        };
        let compose_ms = compose_start.elapsed().as_millis() as u64;
        info!("Run {}: composed canvas in {}ms", run_id, compose_ms);

        let leftover = guard.release();
        if leftover > 0 {
            warn!("Run {}: removed {} tiles left after composing", run_id, leftover);
        }
        tracker.complete();

        let stats = PipelineStats {
            run_id,
            columns: grid.x_tiles,
            rows: grid.y_tiles,
            tiles: grid.tile_count(),
            source: (source_width, source_height),
            output: (output_width, output_height),
            stage_ms,
            compose_ms,
            total_ms: start_time.elapsed().as_millis() as u64,
        };
        info!("Run {}: finished in {}ms", run_id, stats.total_ms);

        Ok(PipelineOutput { image, stats })
    }

    fn stage_all(
        &self,
        source: &PixelBuffer,
        descriptors: &[TileDescriptor],
        run: RunId,
        guard: &StagingGuard<'_>,
        tracker: &ProgressTracker,
    ) -> TilingResult<()> {
        match &self.pool {
            Some(pool) => pool.install(|| {
                descriptors
                    .par_iter()
                    .try_for_each(|d| self.stage_tile(source, d, run, guard, tracker))
            }),
            None => descriptors
                .iter()
                .try_for_each(|d| self.stage_tile(source, d, run, guard, tracker)),
        }
    }

    fn stage_tile(
        &self,
        source: &PixelBuffer,
        descriptor: &TileDescriptor,
        run: RunId,
        guard: &StagingGuard<'_>,
        tracker: &ProgressTracker,
    ) -> TilingResult<()> {
        if tracker.is_cancelled() {
            return Err(TilingError::Cancelled {
                completed: tracker.completed_tiles(),
                total: tracker.total_tiles(),
            });
        }

        let start = Instant::now();
        let tile = self.extractor.extract(source, descriptor.source)?;
        let (width, height) = descriptor.target_size();
        let resized = self.transformer.transform(&tile, width, height)?;
        guard.put(
            descriptor.key(run),
            StagedTile::new(resized, descriptor.dest.x, descriptor.dest.y),
        )?;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Staged tile {}: {} -> {} in {}ms",
            descriptor.coord, descriptor.source, descriptor.dest, duration_ms
        );
        tracker.tile_staged(descriptor.coord, duration_ms);
        Ok(())
    }

    /// Report `error`, delete everything staged so far and hand the error back.
    fn abort(
        &self,
        run: RunId,
        tracker: &ProgressTracker,
        guard: &StagingGuard<'_>,
        error: TilingError,
    ) -> TilingError {
        let removed = guard.release();
        match &error {
            TilingError::Cancelled { .. } => {
                tracker.report_cancelled();
                warn!("Run {} cancelled, removed {} staged tiles", run, removed);
            }
            _ => {
                tracker.report_error(error.coord(), error.to_string());
                error!(
                    "Run {} aborted during {}: {} (removed {} staged tiles)",
                    run,
                    error.phase(),
                    error,
                    removed
                );
            }
        }
        error
    }
}

impl std::fmt::Debug for TiledResizePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiledResizePipeline")
            .field("config", &self.config)
            .field("transformer", &self.transformer)
            .field("staged", &self.store.len())
            .field("progress_callback", &self.progress_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

fn build_store(staging: &StagingConfig) -> TilingResult<Arc<dyn TileStore>> {
    let store: Arc<dyn TileStore> = match staging {
        StagingConfig::Memory => Arc::new(MemoryTileStore::new()),
        StagingConfig::TempDir => Arc::new(FileTileStore::temporary()?),
        StagingConfig::Directory { path } => Arc::new(FileTileStore::new(path.clone())?),
    };
    Ok(store)
}

/// Resize `source` to `output_width x output_height` through
/// `tile_width x tile_height` tiles, with every other setting at its default.
pub fn resize_tiled(
    source: &PixelBuffer,
    tile_width: u32,
    tile_height: u32,
    output_width: u32,
    output_height: u32,
) -> TilingResult<PixelBuffer> {
    let config = TilingConfig::new().with_tile_size(tile_width, tile_height);
    let output = TiledResizePipeline::new(config)?.run(source, output_width, output_height)?;
    Ok(output.image)
}
