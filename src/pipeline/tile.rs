use crate::map::RenderedTile;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Folder,
    Scenario,
    Bitmap,
}

/// One item of a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl TileEntry {
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Render cache for one on-screen tile.
///
/// Each raster slot is written once, by the worker that rendered it, and is
/// read-only afterwards. The hover flags are one-way switches.
#[derive(Debug)]
pub struct TileState {
    entry: TileEntry,
    default: OnceLock<Arc<RenderedTile>>,
    hover: OnceLock<Arc<RenderedTile>>,
    hover_started: AtomicBool,
    hover_disabled: AtomicBool,
}

impl TileState {
    pub fn new(entry: TileEntry) -> Self {
        Self {
            entry,
            default: OnceLock::new(),
            hover: OnceLock::new(),
            hover_started: AtomicBool::new(false),
            hover_disabled: AtomicBool::new(false),
        }
    }

    pub fn entry(&self) -> &TileEntry {
        &self.entry
    }

    pub fn default_raster(&self) -> Option<&Arc<RenderedTile>> {
        self.default.get()
    }

    pub fn hover_raster(&self) -> Option<&Arc<RenderedTile>> {
        self.hover.get()
    }

    pub fn hover_disabled(&self) -> bool {
        self.hover_disabled.load(Ordering::Acquire)
    }

    pub fn hover_started(&self) -> bool {
        self.hover_started.load(Ordering::Acquire)
    }

    /// Claim the one hover render this tile gets. True only for the first caller.
    pub fn try_begin_hover(&self) -> bool {
        if self.hover_disabled() {
            return false;
        }
        !self.hover_started.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn disable_hover(&self) {
        self.hover_disabled.store(true, Ordering::Release);
    }

    pub(crate) fn store_default(&self, tile: RenderedTile) {
        if self.default.set(Arc::new(tile)).is_err() {
            log::debug!("default raster for {} already set", self.entry.path.display());
        }
    }

    pub(crate) fn store_hover(&self, tile: RenderedTile) {
        if self.hover.set(Arc::new(tile)).is_err() {
            log::debug!("hover raster for {} already set", self.entry.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hover_claimed_once() {
        let tile = TileState::new(TileEntry::new("/x/a.xml", EntryKind::Scenario));
        assert!(tile.try_begin_hover());
        assert!(!tile.try_begin_hover());
        assert!(tile.hover_started());
    }

    #[test]
    fn test_disabled_hover_never_starts() {
        let tile = TileState::new(TileEntry::new("/x/a.xml", EntryKind::Scenario));
        tile.disable_hover();
        assert!(!tile.try_begin_hover());
        assert!(!tile.hover_started());
    }

    #[test]
    fn test_raster_written_once() {
        let tile = TileState::new(TileEntry::new("/x/a.xml", EntryKind::Scenario));
        tile.store_default(RenderedTile::placeholder(4, 4, "first"));
        tile.store_default(RenderedTile::placeholder(4, 4, "second"));
        assert_eq!(tile.default_raster().unwrap().diagnostic(), Some("first"));
        assert!(tile.hover_raster().is_none());
    }
}
