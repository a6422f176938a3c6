//! Temp store for transient job artifacts
//!
//! A single directory holds every artifact. The request path and the
//! [`sweeper`] both operate by file name only, so no locking is needed as long
//! as names are unique per job.

pub mod sweeper;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::executor::MediaKind;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to prepare temp dir {path}: {source}")]
    Prepare { path: PathBuf, source: io::Error },

    #[error("Failed to list temp dir: {0}")]
    List(#[source] io::Error),

    #[error("Failed to open artifact {name}: {source}")]
    Open { name: String, source: io::Error },
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// A file slot in the temp store owned by one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: MediaKind,
    pub file_name: String,
    pub path: PathBuf,
}

impl Artifact {
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }

    /// `Content-Disposition` value announcing a download
    pub fn disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }

    /// File name without its extension
    pub fn stem(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map_or(self.file_name.as_str(), |(stem, _)| stem)
    }
}

/// One directory entry as seen by the sweeper
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Directory-scoped store for transient output files
#[derive(Debug, Clone)]
pub struct TempStore {
    root: PathBuf,
}

impl TempStore {
    /// Open (and create if missing) the temp directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| StorageError::Prepare {
                path: root.clone(),
                source,
            })?;

        // Children get absolute paths even if the process later changes dir
        let root = fs::canonicalize(&root)
            .await
            .map_err(|source| StorageError::Prepare {
                path: root.clone(),
                source,
            })?;

        info!(path = %root.display(), "Temp store ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a unique artifact name for a job.
    ///
    /// `<kind>_<unix-millis>_<random>.<ext>`: the timestamp keeps names
    /// sortable, the random suffix rules out collisions within a millisecond.
    pub fn allocate(&self, kind: MediaKind) -> Artifact {
        let millis = chrono::Utc::now().timestamp_millis();
        let token = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}_{}_{}.{}",
            kind.as_str(),
            millis,
            &token[..12],
            kind.extension()
        );

        Artifact {
            kind,
            path: self.root.join(&file_name),
            file_name,
        }
    }

    /// Whether the artifact file has materialised
    pub async fn exists(&self, artifact: &Artifact) -> bool {
        fs::try_exists(&artifact.path).await.unwrap_or(false)
    }

    /// Delete a file from the store. Already-gone files are not an error.
    ///
    /// Returns `true` if this call removed the file.
    pub async fn remove(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete the artifact and every file derived from its name
    /// (`<stem>.part`, `<stem>.f137.mp4`, `<stem>.temp.mp4`, ...).
    ///
    /// Returns how many files were removed. Failures are logged, not raised.
    pub async fn remove_related(&self, artifact: &Artifact) -> usize {
        let stem = artifact.stem();
        let prefix = format!("{stem}.");

        let entries = match self.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(file = %artifact.file_name, error = %e, "Failed to list partial output");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries {
            let Some(name) = entry.path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name != stem && !name.starts_with(&prefix) {
                continue;
            }

            match self.remove(&entry.path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(file = name, error = %e, "Failed to discard partial output"),
            }
        }

        removed
    }

    /// Every regular file in the store with its modification time
    pub async fn entries(&self) -> Result<Vec<StoredEntry>> {
        let mut dir = fs::read_dir(&self.root).await.map_err(StorageError::List)?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await.map_err(StorageError::List)? {
            // Entries can vanish between listing and stat
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "Skipping entry");
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }

            let Ok(modified) = metadata.modified() else {
                continue;
            };

            entries.push(StoredEntry {
                path: entry.path(),
                modified,
                size: metadata.len(),
            });
        }

        Ok(entries)
    }
}

/// Deletes the artifact when dropped.
///
/// Dropped when the response stream finishes or the client goes away, which
/// covers both completed and aborted sends.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
    file_name: String,
}

impl ArtifactGuard {
    pub fn new(artifact: &Artifact) -> Self {
        Self {
            path: artifact.path.clone(),
            file_name: artifact.file_name.clone(),
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(file = %self.file_name, "Cleaned artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %self.file_name, "Artifact already removed");
            }
            Err(e) => {
                warn!(
                    file = %self.file_name,
                    error = %e,
                    "Artifact cleanup failed, leaving it for the sweeper"
                );
            }
        }
    }
}

/// Opened artifact ready to be sent as a response body
pub struct ArtifactBody {
    pub len: u64,
    pub stream: BoxStream<'static, io::Result<Bytes>>,
}

/// Open an artifact as a byte stream that deletes the file once the stream
/// is dropped.
pub async fn stream_and_remove(artifact: &Artifact) -> Result<ArtifactBody> {
    // Guard first so a failed open still cleans up
    let guard = ArtifactGuard::new(artifact);

    let open_err = |source| StorageError::Open {
        name: artifact.file_name.clone(),
        source,
    };
    let file = fs::File::open(&artifact.path).await.map_err(open_err)?;
    let len = file.metadata().await.map_err(open_err)?.len();

    let stream = ReaderStream::new(file)
        .map(move |chunk| {
            let _owned = &guard;
            chunk
        })
        .boxed();

    Ok(ArtifactBody { len, stream })
}
