//! Thumbnail generation for a folder listing.
//!
//! Every navigation starts a new generation with its own cancellation token.
//! Workers render on the blocking pool, bounded by a semaphore, and publish
//! through a gate shared with [`TilePipeline::navigate`]: once a navigation
//! has bumped the generation no worker from an older one can publish.
//! Published renders reach the owner as [`TileEvent`]s, which it applies on
//! its own task via [`TilePipeline::pump`] or [`TilePipeline::wait_idle`].

mod listing;
mod tile;

pub use listing::{classify, list_folder};
pub use tile::{EntryKind, TileEntry, TileState};

use crate::map::RenderedTile;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Result of a default render
#[derive(Debug, Clone)]
pub struct DefaultRender {
    pub tile: RenderedTile,
    /// Whether a close-up is worth rendering on hover
    pub hover: bool,
}

/// Synchronous, CPU-bound rendering of one tile. Called from worker threads.
pub trait TileRenderer: Send + Sync + 'static {
    fn render_default(&self, entry: &TileEntry) -> DefaultRender;
    fn render_hover(&self, entry: &TileEntry) -> RenderedTile;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderKind {
    Default,
    Hover,
}

/// A render that was published for the current listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEvent {
    pub generation: u64,
    pub index: usize,
    pub kind: RenderKind,
}

/// Render work outstanding for the current listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Rendering { in_flight: usize },
}

/// What a tile shows right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visible {
    Placeholder,
    Default,
    Hover,
}

/// Half the processing units, but never fewer than two
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(2)
}

/// Presentation-side view of a tile, touched only by the pipeline owner
#[derive(Debug, Clone, Copy, Default)]
struct TileView {
    pointer_inside: bool,
    default_shown: bool,
    hover_shown: bool,
}

struct Generation {
    id: u64,
    token: CancellationToken,
    pending: Arc<AtomicUsize>,
}

impl Generation {
    fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct Job {
    generation: u64,
    token: CancellationToken,
    index: usize,
    kind: RenderKind,
    tile: Arc<TileState>,
}

enum Rendered {
    Default(DefaultRender),
    Hover(RenderedTile),
}

/// Decrements the generation's pending count however the job ends
struct Finished {
    pending: Arc<AtomicUsize>,
    done: Arc<Notify>,
}

impl Drop for Finished {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        self.done.notify_one();
    }
}

pub struct TilePipeline {
    renderer: Arc<dyn TileRenderer>,
    slots: Arc<Semaphore>,
    /// Current generation id; held while publishing and while cancelling
    gate: Arc<Mutex<u64>>,
    generation: Generation,
    jobs: JoinSet<()>,
    done: Arc<Notify>,
    events_tx: mpsc::UnboundedSender<TileEvent>,
    events_rx: mpsc::UnboundedReceiver<TileEvent>,
    folder: Option<PathBuf>,
    tiles: Vec<Arc<TileState>>,
    views: Vec<TileView>,
}

impl TilePipeline {
    pub fn new(renderer: Arc<dyn TileRenderer>, workers: usize) -> Self {
        let workers = workers.max(1);
        log::debug!("tile pipeline with {workers} render slots");
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            renderer,
            slots: Arc::new(Semaphore::new(workers)),
            gate: Arc::new(Mutex::new(0)),
            generation: Generation::new(0),
            jobs: JoinSet::new(),
            done: Arc::new(Notify::new()),
            events_tx,
            events_rx,
            folder: None,
            tiles: Vec::new(),
            views: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        match self.generation.pending.load(Ordering::Acquire) {
            0 => PipelineState::Idle,
            in_flight => PipelineState::Rendering { in_flight },
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.id
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn tiles(&self) -> &[Arc<TileState>] {
        &self.tiles
    }

    pub fn visible(&self, index: usize) -> Option<Visible> {
        let view = self.views.get(index)?;
        Some(if view.pointer_inside && view.hover_shown {
            Visible::Hover
        } else if view.default_shown {
            Visible::Default
        } else {
            Visible::Placeholder
        })
    }

    /// The raster a tile shows right now; `None` means draw a placeholder
    pub fn visible_raster(&self, index: usize) -> Option<Arc<RenderedTile>> {
        let tile = self.tiles.get(index)?;
        match self.visible(index)? {
            Visible::Placeholder => None,
            Visible::Default => tile.default_raster().cloned(),
            Visible::Hover => tile.hover_raster().cloned(),
        }
    }

    /// Cancel everything for the current folder, list `folder` and queue a
    /// default render per entry.
    pub async fn navigate(&mut self, folder: impl AsRef<Path>) -> anyhow::Result<()> {
        let folder = folder.as_ref().to_path_buf();
        self.begin_generation();

        let target = folder.clone();
        let listed = tokio::task::spawn_blocking(move || list_folder(&target)).await;

        let entries = listed
            .context("folder listing task failed")?
            .with_context(|| format!("cannot list {}", folder.display()))?;
        log::debug!(
            "generation {}: {} entries in {}",
            self.generation.id,
            entries.len(),
            folder.display()
        );

        self.folder = Some(folder);
        self.tiles = entries.into_iter().map(|e| Arc::new(TileState::new(e))).collect();
        self.views = vec![TileView::default(); self.tiles.len()];
        for index in 0..self.tiles.len() {
            self.spawn_render(index, RenderKind::Default);
        }
        Ok(())
    }

    pub fn pointer_enter(&mut self, index: usize) {
        let Some(view) = self.views.get_mut(index) else {
            return;
        };
        view.pointer_inside = true;
        self.start_hover(index);
    }

    pub fn pointer_leave(&mut self, index: usize) {
        if let Some(view) = self.views.get_mut(index) {
            view.pointer_inside = false;
        }
    }

    /// Clicking a folder tile navigates into it. Returns whether it did.
    pub async fn click(&mut self, index: usize) -> anyhow::Result<bool> {
        let Some(tile) = self.tiles.get(index) else {
            return Ok(false);
        };
        if !tile.entry().is_folder() {
            return Ok(false);
        }
        let path = tile.entry().path.clone();
        self.navigate(path).await?;
        Ok(true)
    }

    /// Apply every render published so far. Returns what was applied.
    pub fn pump(&mut self) -> Vec<TileEvent> {
        self.reap();
        let mut applied = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            if self.apply(event) {
                applied.push(event);
            }
        }
        applied
    }

    /// Apply renders until nothing is in flight for the current listing
    pub async fn wait_idle(&mut self) -> Vec<TileEvent> {
        let mut applied = Vec::new();
        loop {
            // Sample before pumping: events are sent before the count drops
            let idle = self.generation.pending.load(Ordering::Acquire) == 0;
            applied.extend(self.pump());
            if idle {
                // Pumping may have queued a hover render
                if self.generation.pending.load(Ordering::Acquire) == 0 {
                    return applied;
                }
                continue;
            }
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    if self.apply(event) {
                        applied.push(event);
                    }
                }
                _ = self.done.notified() => {}
            }
        }
    }

    /// Cancel outstanding work and wait for every worker to exit
    pub async fn shutdown(mut self) {
        self.begin_generation();
        while let Some(result) = self.jobs.join_next().await {
            if let Err(e) = result {
                log::error!("render task failed during shutdown: {e}");
            }
        }
        log::debug!("tile pipeline stopped");
    }

    fn begin_generation(&mut self) {
        {
            let mut current = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.generation.token.cancel();
            *current += 1;
            self.generation = Generation::new(*current);
        }

        // Nothing older can be sent past this point; drop what is queued
        let mut stale = 0;
        while self.events_rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            log::trace!("discarded {stale} stale tile events");
        }

        self.folder = None;
        self.tiles.clear();
        self.views.clear();
    }

    fn apply(&mut self, event: TileEvent) -> bool {
        if event.generation != self.generation.id {
            return false;
        }
        let Some(view) = self.views.get_mut(event.index) else {
            return false;
        };
        match event.kind {
            RenderKind::Default => {
                view.default_shown = true;
                if view.pointer_inside {
                    self.start_hover(event.index);
                }
            }
            RenderKind::Hover => view.hover_shown = true,
        }
        true
    }

    /// Hover renders wait for the default render, which decides whether
    /// a close-up is worthwhile
    fn start_hover(&mut self, index: usize) {
        let ready = self.views.get(index).is_some_and(|v| v.default_shown);
        if ready && self.tiles[index].try_begin_hover() {
            self.spawn_render(index, RenderKind::Hover);
        }
    }

    fn spawn_render(&mut self, index: usize, kind: RenderKind) {
        let job = Job {
            generation: self.generation.id,
            token: self.generation.token.clone(),
            index,
            kind,
            tile: Arc::clone(&self.tiles[index]),
        };
        self.generation.pending.fetch_add(1, Ordering::AcqRel);
        let finished = Finished {
            pending: Arc::clone(&self.generation.pending),
            done: Arc::clone(&self.done),
        };
        let renderer = Arc::clone(&self.renderer);
        let slots = Arc::clone(&self.slots);
        let gate = Arc::clone(&self.gate);
        let events = self.events_tx.clone();

        self.jobs.spawn(async move {
            let _finished = finished;
            run_job(job, renderer, slots, gate, events).await;
        });
    }

    fn reap(&mut self) {
        while let Some(result) = self.jobs.try_join_next() {
            if let Err(e) = result {
                log::error!("render task failed: {e}");
            }
        }
    }
}

async fn run_job(
    job: Job,
    renderer: Arc<dyn TileRenderer>,
    slots: Arc<Semaphore>,
    gate: Arc<Mutex<u64>>,
    events: mpsc::UnboundedSender<TileEvent>,
) {
    let path = job.tile.entry().path.clone();
    if job.token.is_cancelled() {
        log::trace!("{:?} render of {} cancelled before queueing", job.kind, path.display());
        return;
    }

    let permit = tokio::select! {
        _ = job.token.cancelled() => {
            log::trace!("{:?} render of {} cancelled while queued", job.kind, path.display());
            return;
        }
        permit = slots.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return,
        },
    };

    if job.token.is_cancelled() {
        log::trace!("{:?} render of {} cancelled before start", job.kind, path.display());
        return;
    }

    let tile = Arc::clone(&job.tile);
    let kind = job.kind;
    let work = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        match kind {
            RenderKind::Default => Rendered::Default(renderer.render_default(tile.entry())),
            RenderKind::Hover => Rendered::Hover(renderer.render_hover(tile.entry())),
        }
    });

    match work.await {
        Ok(rendered) => publish(&job, rendered, &gate, &events),
        Err(e) => log::error!("{kind:?} render of {} failed: {e}", path.display()),
    }
}

fn publish(job: &Job, rendered: Rendered, gate: &Mutex<u64>, events: &mpsc::UnboundedSender<TileEvent>) {
    let current = gate.lock().unwrap_or_else(PoisonError::into_inner);
    if job.token.is_cancelled() || *current != job.generation {
        log::trace!(
            "dropping {:?} render of {} from generation {}",
            job.kind,
            job.tile.entry().path.display(),
            job.generation
        );
        return;
    }

    match rendered {
        Rendered::Default(DefaultRender { tile, hover }) => {
            if !hover {
                job.tile.disable_hover();
            }
            job.tile.store_default(tile);
        }
        Rendered::Hover(tile) => job.tile.store_hover(tile),
    }

    // The receiver lives as long as the pipeline
    let _ = events.send(TileEvent {
        generation: job.generation,
        index: job.index,
        kind: job.kind,
    });
}
