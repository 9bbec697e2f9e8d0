use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::TransferError;
use crate::chunked::{ChunkPlan, FileSource};

/// A file handed to the upload queue.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Name sent to the server (no directory components).
    pub name: String,
    pub size: u64,
    pub source: FileSource,
}

impl UploadFile {
    /// Wraps an in-memory payload.
    pub fn from_memory(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Describes a file on disk; name and size come from the path and its
    /// metadata.
    pub async fn from_path(path: &Path) -> Result<Self, TransferError> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(TransferError::InvalidPath(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::InvalidPath(format!("no file name: {}", path.display())))?;
        Ok(Self {
            name,
            size: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }
}

/// Client-side state of one chunked upload session (thread-safe).
///
/// Created once the server has issued a session id; dropped after complete
/// or abort. Acknowledgement is index-keyed, so chunks may finish in any
/// order and a repeated success for the same index counts once.
pub struct UploadSession {
    id: String,
    file_name: String,
    destination: String,
    plan: ChunkPlan,
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    acknowledged: Vec<bool>,
    acknowledged_count: u32,
    uploaded_bytes: u64,
}

impl UploadSession {
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        destination: impl Into<String>,
        plan: ChunkPlan,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            destination: destination.into(),
            plan,
            inner: RwLock::new(SessionInner {
                acknowledged: vec![false; plan.total_chunks() as usize],
                acknowledged_count: 0,
                uploaded_bytes: 0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks chunk `index` as acknowledged.
    ///
    /// Returns the new uploaded byte total the first time an index flips, and
    /// `None` for duplicates or indices outside the plan.
    pub fn acknowledge(&self, index: u32) -> Option<u64> {
        let task = self.plan.task(index)?;
        let mut s = self.write();
        let slot = s.acknowledged.get_mut(index as usize)?;
        if *slot {
            return None;
        }
        *slot = true;
        s.acknowledged_count += 1;
        s.uploaded_bytes += task.len();
        Some(s.uploaded_bytes)
    }

    pub fn is_acknowledged(&self, index: u32) -> bool {
        self.read()
            .acknowledged
            .get(index as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Bytes covered by acknowledged chunks.
    pub fn uploaded_bytes(&self) -> u64 {
        self.read().uploaded_bytes
    }

    pub fn acknowledged_count(&self) -> u32 {
        self.read().acknowledged_count
    }

    /// Returns `true` once every chunk has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.read().acknowledged_count == self.plan.total_chunks()
    }

    /// Indices not yet acknowledged, in ascending order.
    pub fn missing_chunks(&self) -> Vec<u32> {
        let s = self.read();
        s.acknowledged
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Server-issued session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn file_size(&self) -> u64 {
        self.plan.file_size()
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }
}
