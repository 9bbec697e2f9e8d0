//! Upload error taxonomy.

use lansend_transfer::TransferError;

/// Errors produced while uploading one file.
///
/// Credential kinds halt the whole queue; every other kind only fails the
/// file it happened on.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("session init failed: {0}")]
    SessionInit(String),

    #[error("chunk {index} failed after {attempts} attempt(s): {message}")]
    ChunkTransfer {
        index: u32,
        attempts: u32,
        message: String,
    },

    #[error("session complete failed: {0}")]
    SessionComplete(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("wrong password")]
    CredentialRejected,

    #[error("upload password required")]
    CredentialRequired,

    #[error("cancelled")]
    Cancelled,

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

impl UploadError {
    /// Returns `true` for the kinds that must halt the queue.
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::CredentialRejected | Self::CredentialRequired)
    }
}
