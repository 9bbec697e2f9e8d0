use serde::{Deserialize, Serialize};

use crate::constants::ServerErrorKind;

/// Error body returned by every upload endpoint on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

impl ErrorReply {
    /// Classifies the error message.
    pub fn kind(&self) -> ServerErrorKind {
        ServerErrorKind::classify(&self.error)
    }
}

/// Envelope for a server reply: either `{ "error": ... }` or a success payload.
///
/// The error variant is tried first, so a success payload whose fields are
/// all optional still decodes as an error when an `error` key is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerReply<T> {
    Err(ErrorReply),
    Ok(T),
}

impl<T> ServerReply<T> {
    /// Converts the envelope into a `Result`.
    pub fn into_result(self) -> Result<T, ErrorReply> {
        match self {
            ServerReply::Ok(v) => Ok(v),
            ServerReply::Err(e) => Err(e),
        }
    }
}
