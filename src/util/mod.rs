//! Shared helpers: atomic file writes and character-aware string slicing.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{EtlError, Result};

fn temp_file_beside(path: &Path) -> Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !parent.exists() {
        std::fs::create_dir_all(&parent).map_err(|e| {
            EtlError::io(format!("Failed to create directory: {}", parent.display()), e)
        })?;
    }

    // Same directory as the target so the final rename stays on one filesystem
    NamedTempFile::new_in(&parent).map_err(|e| {
        EtlError::io(
            format!("Failed to create temporary file in: {}", parent.display()),
            e,
        )
    })
}

/// Atomically write content to a file.
///
/// The bytes go to a temporary file next to `path` which is then renamed
/// over the target. On failure the previous file (if any) is untouched.
///
/// ```rust,no_run
/// use chat_etl::util::atomic_write;
///
/// atomic_write("teams.json", b"{}").unwrap();
/// ```
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    atomic_write_with(path, |writer| writer.write_all(content))
}

/// Atomically write a file through a writer callback.
pub fn atomic_write_with<F>(path: impl AsRef<Path>, write_fn: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut file = AtomicFile::create(path)?;
    let target = file.target_path.clone();
    write_fn(file.writer())
        .map_err(|e| EtlError::io(format!("Failed to write content for: {}", target.display()), e))?;
    file.finish()
}

/// A file that replaces its target only when [`AtomicFile::finish`] is called.
///
/// Dropping it without finishing discards the temporary file.
pub struct AtomicFile {
    temp_file: NamedTempFile,
    target_path: PathBuf,
}

impl AtomicFile {
    /// Create a new atomic file writer for the given target path.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            temp_file: temp_file_beside(path)?,
            target_path: path.to_path_buf(),
        })
    }

    /// Get a mutable reference to the underlying writer.
    pub fn writer(&mut self) -> &mut NamedTempFile {
        &mut self.temp_file
    }

    /// Flush and rename the temporary file over the target.
    pub fn finish(mut self) -> Result<()> {
        self.temp_file.flush().map_err(|e| {
            EtlError::io(format!("Failed to flush file: {}", self.target_path.display()), e)
        })?;

        self.temp_file.persist(&self.target_path).map_err(|e| {
            EtlError::io(
                format!("Failed to atomically write: {}", self.target_path.display()),
                e.error,
            )
        })?;

        Ok(())
    }
}

/// Truncate `s` to at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Split `s` into chunks of at most `max_chars` characters each.
///
/// An empty string yields a single empty chunk.
#[must_use]
pub fn split_chars(s: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || s.is_empty() {
        return vec![s.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in s.chars() {
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    chunks.push(current);
    chunks
}
