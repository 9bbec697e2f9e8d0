use std::io::SeekFrom;
use std::ops::Range;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// ChunkTask / ChunkPlan
// ---------------------------------------------------------------------------

/// One byte-range slice of a file: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTask {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

impl ChunkTask {
    /// Exact byte length of this chunk (the last one may be short).
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// Splits a file of `file_size` bytes into `chunk_size` slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
    total_chunks: u32,
}

impl ChunkPlan {
    /// Computes the plan.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used. An empty file has
    /// zero chunks.
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        let total = file_size.div_ceil(chunk_size);
        let total_chunks = u32::try_from(total).map_err(|_| TransferError::TooManyChunks {
            file_size,
            chunk_size,
        })?;
        Ok(Self {
            file_size,
            chunk_size,
            total_chunks,
        })
    }

    /// Returns the task for `index`, or `None` past the last chunk.
    pub fn task(&self, index: u32) -> Option<ChunkTask> {
        if index >= self.total_chunks {
            return None;
        }
        let start = u64::from(index) * self.chunk_size;
        let end = self.file_size.min(start + self.chunk_size);
        Some(ChunkTask { index, start, end })
    }

    /// Iterates every task in index order.
    pub fn tasks(&self) -> impl Iterator<Item = ChunkTask> + '_ {
        (0..self.total_chunks).filter_map(|i| self.task(i))
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// Where the bytes of a queued file come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on disk, opened per read so concurrent chunk reads never share
    /// a cursor.
    Path(PathBuf),
    /// An in-memory payload (drag-and-drop buffers, generated content).
    Memory(Bytes),
}

impl FileSource {
    /// Reads `[start, end)`. Short files are an `UnexpectedEof` I/O error.
    pub async fn read_range(&self, start: u64, end: u64) -> Result<Bytes, TransferError> {
        let len = usize::try_from(end.saturating_sub(start)).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "range too large")
        })?;

        match self {
            FileSource::Path(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(start)).await?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
            FileSource::Memory(data) => {
                let (start, end) = (start as usize, start as usize + len);
                if end > data.len() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("range {start}..{end} past end of {} bytes", data.len()),
                    )
                    .into());
                }
                Ok(data.slice(start..end))
            }
        }
    }

    /// Reads the bytes of one chunk.
    pub async fn read_chunk(&self, task: &ChunkTask) -> Result<Bytes, TransferError> {
        self.read_range(task.start, task.end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &std::path::Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn plan_with_short_last_chunk() {
        let plan = ChunkPlan::new(10, 4).unwrap();
        assert_eq!(plan.total_chunks(), 3);

        let tasks: Vec<_> = plan.tasks().collect();
        assert_eq!(tasks[0].range(), 0..4);
        assert_eq!(tasks[1].range(), 4..8);
        assert_eq!(tasks[2].range(), 8..10);
        assert_eq!(tasks[2].len(), 2);
        assert!(plan.task(3).is_none());
    }

    #[test]
    fn plan_exact_multiple() {
        let plan = ChunkPlan::new(12, 4).unwrap();
        assert_eq!(plan.total_chunks(), 3);
        assert_eq!(plan.task(2).unwrap().len(), 4);
    }

    #[test]
    fn plan_lengths_sum_to_file_size() {
        let plan = ChunkPlan::new(1_000_003, 65_536).unwrap();
        let sum: u64 = plan.tasks().map(|t| t.len()).sum();
        assert_eq!(sum, 1_000_003);
    }

    #[test]
    fn plan_empty_file_has_no_chunks() {
        let plan = ChunkPlan::new(0, 4).unwrap();
        assert_eq!(plan.total_chunks(), 0);
        assert!(plan.task(0).is_none());
    }

    #[test]
    fn plan_default_chunk_size() {
        let plan = ChunkPlan::new(1, 0).unwrap();
        assert_eq!(plan.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(plan.total_chunks(), 1);
    }

    #[test]
    fn plan_rejects_chunk_count_overflow() {
        let result = ChunkPlan::new(u64::MAX, 1);
        assert!(matches!(result, Err(TransferError::TooManyChunks { .. })));
    }

    #[tokio::test]
    async fn path_source_reads_ranges() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");
        let source = FileSource::Path(path);

        let plan = ChunkPlan::new(10, 4).unwrap();
        let c3 = source.read_chunk(&plan.task(2).unwrap()).await.unwrap();
        assert_eq!(&c3[..], b"EE");

        let mid = source.read_range(2, 6).await.unwrap();
        assert_eq!(&mid[..], b"BBCC");
    }

    #[tokio::test]
    async fn path_source_past_eof_fails() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "short.bin", b"abc");
        let source = FileSource::Path(path);
        let result = source.read_range(0, 10).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[tokio::test]
    async fn memory_source_bounds() {
        let source = FileSource::Memory(Bytes::from_static(b"0123456789"));
        assert_eq!(&source.read_range(6, 10).await.unwrap()[..], b"6789");
        assert!(source.read_range(8, 12).await.is_err());
    }

    #[tokio::test]
    async fn chunks_reassemble_to_original() {
        let dir = TempDir::new().unwrap();
        let original = b"The quick brown fox jumps over the lazy dog";
        let path = create_test_file(dir.path(), "fox.txt", original);
        let source = FileSource::Path(path);

        let plan = ChunkPlan::new(original.len() as u64, 10).unwrap();
        let mut rebuilt = Vec::new();
        for task in plan.tasks() {
            rebuilt.extend_from_slice(&source.read_chunk(&task).await.unwrap());
        }
        assert_eq!(&rebuilt, original);
    }
}
