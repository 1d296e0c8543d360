use crate::pipeline::tile::{EntryKind, TileEntry};
use std::fs;
use std::io;
use std::path::Path;

const SCENARIO_EXTENSIONS: &[&str] = &["xml"];
const BITMAP_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Classify a file by extension; `None` for files that get no tile
pub fn classify(path: &Path) -> Option<EntryKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if SCENARIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(EntryKind::Scenario)
    } else if BITMAP_EXTENSIONS.contains(&ext.as_str()) {
        Some(EntryKind::Bitmap)
    } else {
        None
    }
}

/// Folders first, then scenarios and bitmaps, each sorted by name.
/// Hidden entries are skipped.
pub fn list_folder(folder: &Path) -> io::Result<Vec<TileEntry>> {
    let mut entries = Vec::new();

    for dir_entry in fs::read_dir(folder)? {
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }

        let path = dir_entry.path();
        let kind = if dir_entry.file_type()?.is_dir() {
            Some(EntryKind::Folder)
        } else {
            classify(&path)
        };

        if let Some(kind) = kind {
            entries.push(TileEntry::new(path, kind));
        }
    }

    entries.sort_by_cached_key(|e| {
        let name = e
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        (!e.is_folder(), name)
    });

    Ok(entries)
}
