//! Attachment resolution.
//!
//! Attachment references are validated against the extracted export
//! directory. With an attachments directory configured, files are copied
//! under `bulk-export-attachments/` there and referenced relative to it.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header;
use tracing::{debug, warn};

use crate::archive::safe_relative_path;
use crate::error::{EtlError, Result};

/// Subdirectory of the attachments directory receiving copied files.
pub const ATTACHMENTS_SUBDIR: &str = "bulk-export-attachments";

/// Fetches a remote file.
pub trait Downloader {
    /// Download `url` into `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// [`Downloader`] over blocking HTTP.
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Create a downloader, optionally sending a bearer token.
    pub fn new(token: Option<&str>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                EtlError::InvalidArgument {
                    name: "token".into(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()
            .map_err(|e| EtlError::DownloadError {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let failed = |message: String| EtlError::DownloadError {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| failed(e.to_string()))?;

        let mut out = File::create(dest)
            .map_err(|e| EtlError::io(format!("Failed to create {}", dest.display()), e))?;
        response
            .copy_to(&mut out)
            .map_err(|e| failed(e.to_string()))?;
        Ok(())
    }
}

/// One attachment to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentRequest {
    /// Provider file ID, used to keep copied names unique.
    pub file_id: String,
    /// Original file name.
    pub name: String,
    /// Entry path inside the extracted export, if the export bundles it.
    pub entry: Option<String>,
    /// Remote URL to fall back to.
    pub url: Option<String>,
}

/// Resolves attachment requests to exported relative paths.
pub struct AttachmentStore {
    export_root: PathBuf,
    attachments_dir: Option<PathBuf>,
    skip: bool,
    downloader: Option<Box<dyn Downloader>>,
}

impl std::fmt::Debug for AttachmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentStore")
            .field("export_root", &self.export_root)
            .field("attachments_dir", &self.attachments_dir)
            .field("skip", &self.skip)
            .field("download", &self.downloader.is_some())
            .finish()
    }
}

fn file_name_component(name: &str) -> String {
    match name {
        "" | "." | ".." => "_".to_string(),
        _ => name
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
            .collect(),
    }
}

impl AttachmentStore {
    /// Create a store for an extracted export.
    pub fn new(export_root: impl Into<PathBuf>) -> Self {
        Self {
            export_root: export_root.into(),
            attachments_dir: None,
            skip: false,
            downloader: None,
        }
    }

    /// Builder: copy attachments into this directory.
    #[must_use]
    pub fn with_attachments_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.attachments_dir = dir;
        self
    }

    /// Builder: drop every attachment.
    #[must_use]
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Builder: fetch missing files with this downloader.
    #[must_use]
    pub fn with_downloader(mut self, downloader: Box<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    fn copy_target(&self, request: &AttachmentRequest) -> (PathBuf, String) {
        let base = self.attachments_dir.as_ref().unwrap_or(&self.export_root);
        let file_name = if request.file_id.is_empty() {
            file_name_component(&request.name)
        } else {
            format!("{}_{}", request.file_id, file_name_component(&request.name))
        };
        let relative = format!("{ATTACHMENTS_SUBDIR}/{file_name}");
        (base.join(ATTACHMENTS_SUBDIR).join(file_name), relative)
    }

    fn prepare_dir(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) => std::fs::create_dir_all(parent)
                .map_err(|e| EtlError::io(format!("Failed to create {}", parent.display()), e)),
            None => Ok(()),
        }
    }

    /// Resolve one attachment to the path written to the import file.
    ///
    /// Returns `Ok(None)` for attachments that are skipped or unavailable;
    /// I/O failures while copying are errors.
    pub fn resolve(&self, request: &AttachmentRequest) -> Result<Option<String>> {
        if self.skip {
            return Ok(None);
        }

        let mut source = None;
        if let Some(entry) = request.entry.as_deref() {
            let Some(relative) = safe_relative_path(entry) else {
                warn!(file = %request.name, entry, "Attachment path escapes the export directory, skipping");
                return Ok(None);
            };
            let path = self.export_root.join(relative);
            if path.is_file() {
                source = Some((entry, path));
            }
        }

        if let Some((entry, path)) = source {
            if self.attachments_dir.is_none() {
                return Ok(Some(entry.to_string()));
            }
            let (target, relative) = self.copy_target(request);
            Self::prepare_dir(&target)?;
            std::fs::copy(&path, &target).map_err(|e| {
                EtlError::io(format!("Failed to copy attachment {}", path.display()), e)
            })?;
            debug!(from = %path.display(), to = %target.display(), "Copied attachment");
            return Ok(Some(relative));
        }

        match (&self.downloader, request.url.as_deref()) {
            (Some(downloader), Some(url)) => {
                let (target, relative) = self.copy_target(request);
                Self::prepare_dir(&target)?;
                match downloader.download(url, &target) {
                    Ok(()) => {
                        debug!(url, to = %target.display(), "Downloaded attachment");
                        Ok(Some(relative))
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!(file = %request.name, error = %e, "Attachment download failed, skipping");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
            _ => {
                warn!(
                    file = %request.name,
                    entry = request.entry.as_deref().unwrap_or_default(),
                    "Attachment not found in export, skipping"
                );
                Ok(None)
            }
        }
    }
}
