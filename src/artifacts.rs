//! Request-scoped temporary artifacts
//!
//! Every scratch file a request creates (saved uploads, OCR text files,
//! rasterized pages, filled outputs) is registered in that request's
//! [`ArtifactSet`]. The set releases everything it owns exactly once: on an
//! explicit [`ArtifactSet::release_all`], or when it is dropped. Dropping
//! covers early returns, panics and cancelled handler futures alike.
//!
//! On success the set is moved into the response body with
//! [`ReleasingStream`], so the filled workbook is deleted only after it has
//! been sent.

use crate::error::SheetfillResult;
use axum::body::Bytes;
use futures_util::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Live,
    Released,
}

#[derive(Debug)]
struct Artifact {
    path: PathBuf,
    state: ArtifactState,
}

/// Scratch paths owned by one request
#[derive(Debug)]
pub struct ArtifactSet {
    root: PathBuf,
    owner: String,
    artifacts: Vec<Artifact>,
    closed: Arc<AtomicBool>,
}

/// Observes whether an [`ArtifactSet`] has been dropped.
///
/// Blocking work that outlives a cancelled request uses this to clean up
/// files it creates after the set already released its paths.
#[derive(Debug, Clone)]
pub struct ClosedFlag(Arc<AtomicBool>);

impl ClosedFlag {
    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl ArtifactSet {
    /// New, empty set allocating under `root`
    pub fn new(root: impl Into<PathBuf>, owner: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            owner: owner.into(),
            artifacts: Vec::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set allocating under the system temp directory
    pub fn in_temp_dir(owner: impl Into<String>) -> Self {
        Self::new(std::env::temp_dir(), owner)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn closed_flag(&self) -> ClosedFlag {
        ClosedFlag(Arc::clone(&self.closed))
    }

    /// Persist `source` to a fresh unique path ending in `suffix`.
    ///
    /// The source is consumed and therefore closed on every exit path. A
    /// partially written file is registered before copying, so it is
    /// released with the rest of the set if the copy fails.
    pub async fn acquire<R>(&mut self, source: R, suffix: &str) -> SheetfillResult<PathBuf>
    where
        R: AsyncRead + Unpin,
    {
        let mut source = source;
        let path = self.allocate(suffix);
        self.register(&path);

        let mut file = tokio::fs::File::create(&path).await?;
        let bytes = tokio::io::copy(&mut source, &mut file).await?;
        file.flush().await?;

        debug!(owner = %self.owner, path = %path.display(), bytes, "Artifact acquired");
        Ok(path)
    }

    /// Reserve a unique path under the root without creating anything.
    ///
    /// The path is registered; whoever creates the file there can rely on
    /// the set to remove it.
    pub fn reserve(&mut self, suffix: &str) -> PathBuf {
        let path = self.allocate(suffix);
        self.register(&path);
        path
    }

    /// Create and register a unique scratch directory
    pub fn reserve_dir(&mut self, prefix: &str) -> SheetfillResult<PathBuf> {
        let path = self.root.join(format!("{}{}", prefix, Uuid::new_v4().simple()));
        std::fs::create_dir_all(&path)?;
        self.register(&path);
        Ok(path)
    }

    /// Take ownership of a path created elsewhere
    pub fn register(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if self.artifacts.iter().any(|a| a.path == path) {
            return;
        }
        self.artifacts.push(Artifact {
            path: path.to_path_buf(),
            state: ArtifactState::Live,
        });
    }

    pub fn state(&self, path: &Path) -> Option<ArtifactState> {
        self.artifacts
            .iter()
            .find(|a| a.path == path)
            .map(|a| a.state)
    }

    /// Paths not yet released
    pub fn live_paths(&self) -> Vec<&Path> {
        self.artifacts
            .iter()
            .filter(|a| a.state == ArtifactState::Live)
            .map(|a| a.path.as_path())
            .collect()
    }

    /// Release every live artifact; later calls are no-ops
    pub fn release_all(&mut self) {
        let live = self.live_paths().len();
        if live == 0 {
            return;
        }
        debug!(owner = %self.owner, count = live, "Releasing artifacts");
        for artifact in &mut self.artifacts {
            if artifact.state == ArtifactState::Live {
                release_path(&artifact.path);
                artifact.state = ArtifactState::Released;
            }
        }
    }

    fn allocate(&self, suffix: &str) -> PathBuf {
        self.root
            .join(format!("sheetfill-{}{}", Uuid::new_v4().simple(), suffix))
    }
}

impl Drop for ArtifactSet {
    fn drop(&mut self) {
        // Raised before deleting so late writers see it once their file exists
        self.closed.store(true, Ordering::SeqCst);
        self.release_all();
    }
}

/// Best-effort deletion of each path.
///
/// Empty or missing paths are ignored, as are deletion errors, so calling
/// this twice for the same path is harmless.
pub fn release<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        release_path(path.as_ref());
    }
}

fn release_path(path: &Path) {
    if path.as_os_str().is_empty() {
        return;
    }
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(_) => return,
    };
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Could not remove temporary artifact");
    }
}

/// File body stream that keeps an [`ArtifactSet`] alive until the stream
/// itself is dropped, i.e. after the last chunk has gone out.
pub struct ReleasingStream {
    inner: ReaderStream<tokio::fs::File>,
    _artifacts: ArtifactSet,
}

impl ReleasingStream {
    pub async fn open(path: &Path, artifacts: ArtifactSet) -> SheetfillResult<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            inner: ReaderStream::new(file),
            _artifacts: artifacts,
        })
    }
}

impl Stream for ReleasingStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
