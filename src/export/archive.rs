//! In-memory ZIP assembly.
//!
//! Fetches complete in any order; the builder buffers their bytes and writes
//! the archive in plan order once the walk is over.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Mutex, PoisonError};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

#[derive(Debug)]
enum Entry {
    Content(Vec<u8>),
    Placeholder,
}

/// Collects file contents from concurrent fetches and writes one ZIP
#[derive(Debug)]
pub struct ArchiveBuilder {
    folders: Vec<String>,
    order: Vec<String>,
    entries: Mutex<HashMap<String, Entry>>,
    compress: bool,
}

impl ArchiveBuilder {
    /// Create a builder for the given directories and file paths
    ///
    /// `folders` and `order` fix the entry order of the finished archive. A
    /// path in `order` that never receives content is written as an empty
    /// placeholder.
    pub fn new(folders: Vec<String>, order: Vec<String>, compress: bool) -> Self {
        Self {
            folders,
            order,
            entries: Mutex::new(HashMap::new()),
            compress,
        }
    }

    /// Store the content of `path`; safe to call from concurrent tasks
    pub fn add_file(&self, path: &str, bytes: Vec<u8>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), Entry::Content(bytes));
    }

    /// Mark `path` as a zero-byte placeholder
    pub fn add_placeholder(&self, path: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_insert(Entry::Placeholder);
    }

    /// Number of paths that received real content
    pub fn content_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| matches!(e, Entry::Content(_)))
            .count()
    }

    /// Write directories, then files, into a ZIP and return its bytes
    pub fn finish(&self) -> Result<Vec<u8>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        let content_options = if self.compress {
            FileOptions::default().compression_method(CompressionMethod::Deflated)
        } else {
            stored
        };

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for folder in &self.folders {
            zip.add_directory(folder.as_str(), stored)?;
        }
        for path in &self.order {
            match entries.get(path) {
                Some(Entry::Content(bytes)) => {
                    zip.start_file(path.as_str(), content_options)?;
                    zip.write_all(bytes)?;
                }
                Some(Entry::Placeholder) | None => {
                    zip.start_file(path.as_str(), stored)?;
                }
            }
        }
        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}
