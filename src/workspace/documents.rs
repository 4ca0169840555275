//! Document text access.
//!
//! Buffers the editor has open shadow the file on disk. Everything else is
//! read on demand; nothing from disk is cached.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use ropey::Rope;

#[derive(Debug, Clone, Default)]
pub struct Documents {
    open: Arc<RwLock<HashMap<PathBuf, Rope>>>,
}

impl Documents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the editor buffer for `path`.
    pub fn open(&self, path: PathBuf, text: &str) {
        self.open.write().insert(path, Rope::from_str(text));
    }

    pub fn close(&self, path: &Path) {
        self.open.write().remove(path);
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.open.read().contains_key(path)
    }

    fn open_text(&self, path: &Path) -> Option<String> {
        self.open.read().get(path).map(|rope| rope.to_string())
    }

    /// Buffer text if open, otherwise the file's content.
    pub async fn read(&self, path: &Path) -> io::Result<String> {
        match self.open_text(path) {
            Some(text) => Ok(text),
            None => tokio::fs::read_to_string(path).await,
        }
    }

    /// Same as [`Documents::read`] for callers on a blocking thread (rayon scans).
    pub fn read_blocking(&self, path: &Path) -> io::Result<String> {
        match self.open_text(path) {
            Some(text) => Ok(text),
            None => std::fs::read_to_string(path),
        }
    }

    /// One line without its line terminator.
    ///
    /// Lines are split on `\n` (and `\r\n`) only, the same as the scanner,
    /// so line numbers agree with scanned ranges even when the text holds
    /// U+2028 or U+0085.
    pub fn line(&self, path: &Path, line: usize) -> Option<String> {
        if let Some(rope) = self.open.read().get(path) {
            let start = nth_line_start(rope.bytes(), line)?;
            if start >= rope.len_bytes() {
                return None;
            }
            let start = rope.try_byte_to_char(start).ok()?;
            let text: String = rope.chars_at(start).take_while(|ch| *ch != '\n').collect();
            return Some(text.trim_end_matches('\r').to_string());
        }

        let text = std::fs::read_to_string(path).ok()?;
        text.lines().nth(line).map(String::from)
    }
}

/// Byte offset where line `line` starts, counting `\n` terminators only.
fn nth_line_start(bytes: impl Iterator<Item = u8>, line: usize) -> Option<usize> {
    if line == 0 {
        return Some(0);
    }
    bytes
        .enumerate()
        .filter(|(_, byte)| *byte == b'\n')
        .nth(line - 1)
        .map(|(offset, _)| offset + 1)
}
