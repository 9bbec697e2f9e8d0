//! In-memory upload service for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use lansend_protocol::constants::{PASSWORD_REQUIRED, WRONG_PASSWORD};
use lansend_protocol::messages::{
    ChunkAck, ChunkQuery, CompleteUploadResponse, InitUploadRequest, InitUploadResponse,
    UploadFileResponse, UploadIdRequest, VerifyPasswordResponse,
};
use lansend_upload_client::{
    ProtocolClient, SendProgress, TransportError, TransportFuture, UploadTransport,
    WholeFileRequest,
};

type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

struct PendingUpload {
    filename: String,
    path: String,
    size: u64,
    chunk_size: u64,
    total_chunks: u32,
    chunks: HashMap<u32, Bytes>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    sessions: HashMap<String, PendingUpload>,
    /// Stored files keyed by `path/name`.
    stored: BTreeMap<String, Bytes>,
    /// Every chunk request, in arrival order, failed ones included.
    chunk_calls: Vec<(String, u32)>,
    /// Remaining scripted failures per chunk index.
    chunk_failures: HashMap<u32, u32>,
    failing_inits: HashSet<String>,
    /// Files whose chunks are answered with "wrong password" after init.
    rejected_chunks: HashSet<String>,
    inits: Vec<String>,
    whole_uploads: Vec<String>,
    aborted: Vec<String>,
    verify_calls: usize,
}

/// Upload service double: reassembles chunks, renames on collision, and
/// checks an optional password.
pub(crate) struct FakeServer {
    password: Option<String>,
    state: Mutex<FakeState>,
    chunk_delay: Mutex<Option<DelayFn>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn remote(status: u16, message: &str) -> TransportError {
    TransportError::Remote {
        status,
        message: message.to_string(),
    }
}

/// `name.ext` -> `name (n).ext`.
fn numbered(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

impl FakeServer {
    pub(crate) fn new() -> Self {
        Self {
            password: None,
            state: Mutex::new(FakeState::default()),
            chunk_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_password(password: &str) -> Self {
        Self {
            password: Some(password.to_string()),
            ..Self::new()
        }
    }

    /// Protocol client over this server, default retry policy.
    pub(crate) fn client(self: &Arc<Self>) -> ProtocolClient {
        ProtocolClient::new(self.clone())
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_chunk_delay(&self, delay: impl Fn(u32) -> Duration + Send + Sync + 'static) {
        *self.chunk_delay.lock().unwrap() = Some(Arc::new(delay));
    }

    /// Makes the next `times` requests for chunk `index` fail with a 503.
    pub(crate) fn fail_chunk(&self, index: u32, times: u32) {
        self.state().chunk_failures.insert(index, times);
    }

    /// Makes every init for `filename` fail.
    pub(crate) fn fail_init(&self, filename: &str) {
        self.state().failing_inits.insert(filename.to_string());
    }

    /// Accepts the init for `filename`, then rejects its chunks as if the
    /// password had changed in between.
    pub(crate) fn reject_chunks_for(&self, filename: &str) {
        self.state().rejected_chunks.insert(filename.to_string());
    }

    pub(crate) fn chunk_indices(&self, upload_id: &str) -> Vec<u32> {
        self.state()
            .chunk_calls
            .iter()
            .filter(|(id, _)| id == upload_id)
            .map(|(_, index)| *index)
            .collect()
    }

    pub(crate) fn chunk_call_count(&self) -> usize {
        self.state().chunk_calls.len()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self, key: &str) -> Option<Bytes> {
        self.state().stored.get(key).cloned()
    }

    pub(crate) fn stored_names(&self) -> Vec<String> {
        self.state().stored.keys().cloned().collect()
    }

    pub(crate) fn inits(&self) -> Vec<String> {
        self.state().inits.clone()
    }

    pub(crate) fn whole_uploads(&self) -> Vec<String> {
        self.state().whole_uploads.clone()
    }

    pub(crate) fn aborted(&self) -> Vec<String> {
        self.state().aborted.clone()
    }

    pub(crate) fn verify_calls(&self) -> usize {
        self.state().verify_calls
    }

    fn check_password(&self, supplied: Option<&str>) -> Result<(), TransportError> {
        match (&self.password, supplied) {
            (None, _) => Ok(()),
            (Some(_), None) => Err(remote(401, PASSWORD_REQUIRED)),
            (Some(expected), Some(given)) if expected == given => Ok(()),
            (Some(_), Some(_)) => Err(remote(401, WRONG_PASSWORD)),
        }
    }

    /// Stores `data` under a free name in `path`.
    fn store(state: &mut FakeState, path: &str, filename: &str, data: Bytes) -> (String, bool) {
        let key = |name: &str| format!("{path}/{name}");
        let mut name = filename.to_string();
        let mut n = 1;
        while state.stored.contains_key(&key(&name)) {
            name = numbered(filename, n);
            n += 1;
        }
        state.stored.insert(key(&name), data);
        let renamed = name != filename;
        (name, renamed)
    }
}

impl UploadTransport for FakeServer {
    fn init_upload<'a>(
        &'a self,
        req: &'a InitUploadRequest,
    ) -> TransportFuture<'a, InitUploadResponse> {
        Box::pin(async move {
            self.check_password(req.password.as_deref())?;
            let mut state = self.state();
            state.inits.push(req.filename.clone());
            if state.failing_inits.contains(&req.filename) {
                return Err(remote(400, "disk full"));
            }
            state.next_id += 1;
            let id = format!("u{}", state.next_id);
            state.sessions.insert(
                id.clone(),
                PendingUpload {
                    filename: req.filename.clone(),
                    path: req.path.clone(),
                    size: req.size,
                    chunk_size: req.chunk_size,
                    total_chunks: req.total_chunks,
                    chunks: HashMap::new(),
                },
            );
            Ok(InitUploadResponse { upload_id: Some(id) })
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        query: &'a ChunkQuery,
        data: Bytes,
        password: Option<&'a str>,
    ) -> TransportFuture<'a, ChunkAck> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let scripted_failure = {
                let mut state = self.state();
                state.chunk_calls.push((query.upload_id.clone(), query.index));
                match state.chunk_failures.get_mut(&query.index) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => false,
                }
            };

            let delay = self.chunk_delay.lock().unwrap().clone();
            if let Some(delay) = delay {
                tokio::time::sleep(delay(query.index)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.check_password(password)?;
            if scripted_failure {
                return Err(TransportError::Api {
                    status: 503,
                    body: "busy".into(),
                });
            }

            let mut guard = self.state();
            let state = &mut *guard;
            let session = state
                .sessions
                .get_mut(&query.upload_id)
                .ok_or_else(|| remote(404, "upload session not found"))?;
            if state.rejected_chunks.contains(&session.filename) {
                return Err(remote(401, WRONG_PASSWORD));
            }
            if query.index >= session.total_chunks {
                return Err(remote(400, "chunk index out of range"));
            }
            session.chunks.insert(query.index, data);
            Ok(ChunkAck {})
        })
    }

    fn complete_upload<'a>(
        &'a self,
        req: &'a UploadIdRequest,
    ) -> TransportFuture<'a, CompleteUploadResponse> {
        Box::pin(async move {
            self.check_password(req.password.as_deref())?;
            let mut state = self.state();
            let session = state
                .sessions
                .remove(&req.upload_id)
                .ok_or_else(|| remote(404, "upload session not found"))?;

            let mut assembled = BytesMut::with_capacity(session.size as usize);
            for index in 0..session.total_chunks {
                let chunk = session
                    .chunks
                    .get(&index)
                    .ok_or_else(|| remote(400, "missing chunks"))?;
                let expected = session
                    .size
                    .min((u64::from(index) + 1) * session.chunk_size)
                    - u64::from(index) * session.chunk_size;
                if chunk.len() as u64 != expected {
                    return Err(remote(400, "chunk size mismatch"));
                }
                assembled.extend_from_slice(chunk);
            }

            let (filename, renamed) = Self::store(
                &mut state,
                &session.path,
                &session.filename,
                assembled.freeze(),
            );
            Ok(CompleteUploadResponse {
                filename,
                renamed,
                size: Some(session.size),
            })
        })
    }

    fn abort_upload<'a>(&'a self, req: &'a UploadIdRequest) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.sessions.remove(&req.upload_id);
            state.aborted.push(req.upload_id.clone());
            Ok(())
        })
    }

    fn upload_file<'a>(
        &'a self,
        req: WholeFileRequest,
        on_progress: SendProgress,
    ) -> TransportFuture<'a, UploadFileResponse> {
        Box::pin(async move {
            self.state().whole_uploads.push(req.filename.clone());
            let half = req.data.len() as u64 / 2;
            if half > 0 {
                on_progress(half);
            }
            on_progress(req.data.len() as u64);

            self.check_password(req.password.as_deref())?;
            let mut state = self.state();
            let (filename, renamed) = Self::store(&mut state, &req.path, &req.filename, req.data);
            Ok(UploadFileResponse {
                message: Some("file uploaded".into()),
                filename: Some(filename),
                renamed,
            })
        })
    }

    fn verify_password<'a>(
        &'a self,
        password: &'a str,
    ) -> TransportFuture<'a, VerifyPasswordResponse> {
        Box::pin(async move {
            self.state().verify_calls += 1;
            self.check_password(Some(password))?;
            Ok(VerifyPasswordResponse {
                message: Some("password ok".into()),
            })
        })
    }
}
