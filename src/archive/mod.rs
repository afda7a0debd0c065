//! Archive access.
//!
//! Two seams live here:
//! - [`ExportSource`]: random access to the named entries of an export,
//!   whether it is still zipped, already extracted, or held in memory.
//! - [`ArchiveIo`]: the "extract archive to directory" and "archive directory
//!   to file" capabilities used by the pipeline and the team partitioner.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{EtlError, Result};

/// Emit a progress line every this many entries.
pub const PROGRESS_EVERY: usize = 1000;

/// Random access to the named entries of an export.
///
/// Entry names are relative, `/`-separated paths such as
/// `general/2024-01-01.json`.
pub trait ExportSource {
    /// All file entry names, sorted.
    fn entry_names(&self) -> Vec<String>;

    /// Read one entry fully.
    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Whether an entry exists.
    fn contains(&self, name: &str) -> bool {
        self.entry_names().iter().any(|n| n == name)
    }
}

/// An export that has been extracted to a directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Open an extracted export directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(EtlError::DirectoryNotFound { path: root });
        }
        Ok(Self { root })
    }

    /// The export root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ExportSource for DirSource {
    fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&self.root).ok()?;
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();
        names.sort();
        names
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::MissingEntry {
                    name: name.to_string(),
                }
            } else {
                EtlError::io(format!("Failed to read {}", path.display()), e)
            }
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

/// A zip archive read in place.
pub struct ZipSource {
    archive: ZipArchive<BufReader<File>>,
}

impl ZipSource {
    /// Open a zip archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                EtlError::io(format!("Failed to open {}", path.display()), e)
            }
        })?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| EtlError::archive(format!("Failed to read {}", path.display()), e))?;
        Ok(Self { archive })
    }
}

impl ExportSource for ZipSource {
    fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|n| !n.ends_with('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(name).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => EtlError::MissingEntry {
                name: name.to_string(),
            },
            other => EtlError::archive(format!("Failed to open entry {name}"), other),
        })?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| EtlError::io(format!("Failed to read entry {name}"), e))?;
        Ok(buf)
    }
}

/// An export held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an entry.
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), content.into());
    }
}

impl ExportSource for MemorySource {
    fn entry_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| EtlError::MissingEntry {
                name: name.to_string(),
            })
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

/// Result of an extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Entries were written to the destination.
    Extracted {
        /// Number of files written.
        files: usize,
    },
    /// The destination already had content and was reused as-is.
    AlreadyExtracted,
}

/// Archive extraction and re-packaging.
pub trait ArchiveIo {
    /// Extract `archive` into `dest`.
    ///
    /// A non-empty `dest` counts as already extracted and is left untouched.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<ExtractOutcome>;

    /// Package the contents of `dir` into a new archive at `archive`.
    fn compress(&self, dir: &Path, archive: &Path) -> Result<()>;
}

/// [`ArchiveIo`] backed by zip files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveIo;

impl ZipArchiveIo {
    /// Create a new zip archiver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Whether a directory exists and has at least one entry.
pub fn is_non_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Reject entry names that would escape the destination directory.
pub(crate) fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

impl ArchiveIo for ZipArchiveIo {
    #[instrument(skip(self), fields(archive = %archive.display(), dest = %dest.display()))]
    fn extract(&self, archive: &Path, dest: &Path) -> Result<ExtractOutcome> {
        if is_non_empty_dir(dest) {
            warn!("Destination is not empty, reusing previously extracted files");
            return Ok(ExtractOutcome::AlreadyExtracted);
        }

        let file = File::open(archive).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::FileNotFound {
                    path: archive.to_path_buf(),
                }
            } else {
                EtlError::io(format!("Failed to open {}", archive.display()), e)
            }
        })?;
        let mut zip = ZipArchive::new(BufReader::new(file))
            .map_err(|e| EtlError::archive(format!("Failed to read {}", archive.display()), e))?;

        std::fs::create_dir_all(dest)
            .map_err(|e| EtlError::io(format!("Failed to create {}", dest.display()), e))?;

        let total = zip.len();
        let mut written = 0;
        for index in 0..total {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| EtlError::archive(format!("Failed to read entry #{index}"), e))?;

            let Some(relative) = safe_relative_path(entry.name()) else {
                warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
                continue;
            };
            let target = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| {
                    EtlError::io(format!("Failed to create {}", target.display()), e)
                })?;
                continue;
            }

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EtlError::io(format!("Failed to create {}", parent.display()), e)
                })?;
            }
            let mut out = File::create(&target)
                .map_err(|e| EtlError::io(format!("Failed to create {}", target.display()), e))?;
            std::io::copy(&mut entry, &mut out)
                .map_err(|e| EtlError::io(format!("Failed to write {}", target.display()), e))?;

            written += 1;
            if written % PROGRESS_EVERY == 0 {
                info!(written, total, "Extracting archive");
            }
        }

        debug!(files = written, "Extraction complete");
        Ok(ExtractOutcome::Extracted { files: written })
    }

    #[instrument(skip(self), fields(dir = %dir.display(), archive = %archive.display()))]
    fn compress(&self, dir: &Path, archive: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(EtlError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }
        if let Some(parent) = archive.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EtlError::io(format!("Failed to create {}", parent.display()), e)
                })?;
            }
        }

        let file = File::create(archive)
            .map_err(|e| EtlError::io(format!("Failed to create {}", archive.display()), e))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let source = DirSource::open(dir)?;
        let names = source.entry_names();
        for (count, name) in names.iter().enumerate() {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| EtlError::archive(format!("Failed to add {name}"), e))?;
            let mut input = File::open(dir.join(name))
                .map_err(|e| EtlError::io(format!("Failed to open {name}"), e))?;
            std::io::copy(&mut input, &mut writer)
                .map_err(|e| EtlError::io(format!("Failed to compress {name}"), e))?;

            if (count + 1) % PROGRESS_EVERY == 0 {
                info!(written = count + 1, total = names.len(), "Compressing archive");
            }
        }

        writer
            .finish()
            .map_err(|e| EtlError::archive(format!("Failed to finish {}", archive.display()), e))?;
        debug!(files = names.len(), "Archive written");
        Ok(())
    }
}
