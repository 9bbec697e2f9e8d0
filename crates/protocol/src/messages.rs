use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens a chunked upload session (`POST /upload/init`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadRequest {
    pub filename: String,
    pub size: u64,
    /// Destination directory relative to the share root ("" is the root).
    pub path: String,
    pub chunk_size: u64,
    pub total_chunks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Query string of `POST /upload/chunk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkQuery {
    pub upload_id: String,
    pub index: u32,
}

/// Body of `POST /upload/complete` and `POST /upload/abort`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadIdRequest {
    pub upload_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Reply to `POST /upload/init`.
///
/// `upload_id` is optional on the wire: a reply without one is a failed init.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

impl InitUploadResponse {
    /// Returns the session id if the server issued a non-empty one.
    pub fn session_id(&self) -> Option<&str> {
        self.upload_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Reply to `POST /upload/chunk`. The server sends `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkAck {}

/// Final metadata returned by `POST /upload/complete`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteUploadResponse {
    /// Name the file was stored under.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,
    /// Set when the server picked another name to avoid a collision.
    #[serde(default, skip_serializing_if = "is_false")]
    pub renamed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Reply to the single-request multipart upload (`POST /upload`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadFileResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub renamed: bool,
}

/// Reply to a password-only `POST /upload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifyPasswordResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_false(v: &bool) -> bool {
    !v
}
