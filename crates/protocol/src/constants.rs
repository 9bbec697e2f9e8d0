/// Starts a chunked upload session.
pub const INIT_UPLOAD_PATH: &str = "/upload/init";

/// Receives one chunk; `upload_id` and `index` travel in the query string.
pub const UPLOAD_CHUNK_PATH: &str = "/upload/chunk";

/// Reassembles the received chunks into the final file.
pub const COMPLETE_UPLOAD_PATH: &str = "/upload/complete";

/// Discards a session and whatever chunks it received.
pub const ABORT_UPLOAD_PATH: &str = "/upload/abort";

/// Single-request multipart upload. Also used, with only a `password`
/// field, to verify the upload password.
pub const UPLOAD_PATH: &str = "/upload";

/// Header carrying the upload password on raw chunk requests.
pub const PASSWORD_HEADER: &str = "X-Upload-Password";

/// Error string returned when the supplied password does not match.
pub const WRONG_PASSWORD: &str = "wrong password";

/// Error string returned when the share requires a password and none was sent.
pub const PASSWORD_REQUIRED: &str = "upload password required";

/// Classification of an `{ "error": ... }` reply from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorKind {
    /// The password was sent and rejected.
    WrongPassword,
    /// The share is password-protected and no password was sent.
    PasswordRequired,
    /// Anything else (quota, invalid path, missing chunks, ...).
    Other,
}

impl ServerErrorKind {
    /// Classifies a server error message.
    ///
    /// Matching is exact: the server emits these two strings verbatim and any
    /// other text is an ordinary per-file failure.
    pub fn classify(message: &str) -> Self {
        match message {
            WRONG_PASSWORD => Self::WrongPassword,
            PASSWORD_REQUIRED => Self::PasswordRequired,
            _ => Self::Other,
        }
    }

    /// Returns `true` for either password-related kind.
    pub fn is_credential(self) -> bool {
        matches!(self, Self::WrongPassword | Self::PasswordRequired)
    }
}
