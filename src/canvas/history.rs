//! Undo/redo history over marks snapshots.
//!
//! Each entry is a full capture of the marks buffer, LZ4-compressed. Sketch
//! layers are mostly transparent so whole-buffer captures compress well, and
//! restores are byte-exact. The history is linear: pushing after an undo
//! discards the redo tail, and the oldest entry is evicted past capacity.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use tracing::debug;

use super::raster::PixelBuffer;
use super::CanvasError;

/// Snapshots retained before the oldest is evicted.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// A compressed, immutable capture of the marks buffer.
#[derive(Debug, Clone)]
pub struct MarksSnapshot {
    width: u32,
    height: u32,
    compressed: Vec<u8>,
}

impl MarksSnapshot {
    pub fn capture(buffer: &PixelBuffer) -> Self {
        let raw_len = buffer.data().len();
        let compressed = compress_prepend_size(buffer.data());
        debug!(
            raw_len,
            compressed_len = compressed.len(),
            "captured marks snapshot"
        );
        Self {
            width: buffer.width(),
            height: buffer.height(),
            compressed,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn compressed_len(&self) -> usize {
        self.compressed.len()
    }

    /// Restore this capture into `buffer`. Dimensions must match.
    pub fn restore_into(&self, buffer: &mut PixelBuffer) -> Result<(), CanvasError> {
        if (self.width, self.height) != buffer.dimensions() {
            return Err(CanvasError::Snapshot(format!(
                "snapshot is {}x{}, buffer is {}x{}",
                self.width,
                self.height,
                buffer.width(),
                buffer.height()
            )));
        }
        let bytes = decompress_size_prepended(&self.compressed)
            .map_err(|e| CanvasError::Snapshot(e.to_string()))?;
        if bytes.len() != buffer.data().len() {
            return Err(CanvasError::Snapshot(format!(
                "decompressed {} bytes, expected {}",
                bytes.len(),
                buffer.data().len()
            )));
        }
        buffer.data_mut().copy_from_slice(&bytes);
        Ok(())
    }
}

/// Linear, bounded undo/redo cursor over snapshots.
///
/// The cursor always points at the entry describing the current buffer
/// contents. Index 0 is the pristine state captured right after a
/// (re)initialization, so `cursor > 0` means user marks exist.
#[derive(Debug)]
pub struct SnapshotHistory {
    entries: Vec<MarksSnapshot>,
    cursor: usize,
    capacity: usize,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            capacity: capacity.max(2),
        }
    }

    /// Drop all entries. The next push becomes the pristine baseline.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    /// Record a new state: truncates any redo tail, appends, and evicts the
    /// oldest entry once past capacity.
    pub fn push(&mut self, snapshot: MarksSnapshot) {
        let first = self.entries.is_empty();
        self.entries.truncate(self.cursor + 1);
        self.entries.push(snapshot);
        if !first {
            self.cursor += 1;
        }
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
            self.cursor -= 1;
        }
    }

    /// Step back one entry, returning the snapshot to restore.
    pub fn undo(&mut self) -> Option<&MarksSnapshot> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor])
    }

    /// Step forward one entry, returning the snapshot to restore.
    pub fn redo(&mut self) -> Option<&MarksSnapshot> {
        if self.entries.is_empty() || self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor])
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
