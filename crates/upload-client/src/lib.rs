//! Client side of the LanSend chunked upload protocol.
//!
//! - [`UploadTransport`] is the seam to the network: one method per wire
//!   operation, implemented over HTTP by [`HttpTransport`] and by in-memory
//!   fakes in tests.
//! - [`ProtocolClient`] sits on top of a transport, retries chunk uploads,
//!   and normalizes every failure into an [`UploadError`] kind.

pub mod client;
pub mod error;
pub mod http;
pub mod transport;

// Re-export primary types for convenience.
pub use client::{ProtocolClient, RetryPolicy, UploadReceipt};
pub use error::UploadError;
pub use http::HttpTransport;
pub use transport::{SendProgress, TransportError, TransportFuture, UploadTransport, WholeFileRequest};
