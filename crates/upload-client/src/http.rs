//! HTTP transport for the upload service.
//!
//! Async client using `reqwest`. Every reply body is parsed as
//! `{ "error": ... }` first, whatever the status code: the server answers
//! credential failures with 401 and a JSON error body.

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use lansend_protocol::constants::{
    ABORT_UPLOAD_PATH, COMPLETE_UPLOAD_PATH, INIT_UPLOAD_PATH, PASSWORD_HEADER, UPLOAD_CHUNK_PATH,
    UPLOAD_PATH,
};
use lansend_protocol::messages::{
    ChunkAck, ChunkQuery, CompleteUploadResponse, InitUploadRequest, InitUploadResponse,
    UploadFileResponse, UploadIdRequest, VerifyPasswordResponse,
};
use lansend_protocol::ServerReply;

use crate::transport::{SendProgress, TransportError, TransportFuture, UploadTransport, WholeFileRequest};

/// Size of the slices the multipart file body is streamed in. Progress is
/// reported once per slice.
const PROGRESS_STEP: usize = 64 * 1024;

/// Upload service client over HTTP.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for the service at `base_url` (e.g. `http://192.168.1.20:8080`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Creates a transport sharing an existing reqwest client.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Performs a JSON POST and decodes the reply.
    async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.http.post(self.url(endpoint)).json(body).send().await?;
        decode_reply(resp).await
    }
}

/// Decodes a reply body. An error body wins over the status code.
async fn decode_reply<T: DeserializeOwned>(resp: Response) -> Result<T, TransportError> {
    let status = resp.status();
    let body = resp.bytes().await?;

    match serde_json::from_slice::<ServerReply<T>>(&body) {
        Ok(ServerReply::Err(e)) => Err(TransportError::Remote {
            status: status.as_u16(),
            message: e.error,
        }),
        Ok(ServerReply::Ok(value)) if status.is_success() => Ok(value),
        Err(e) if status.is_success() => Err(TransportError::Json(e)),
        _ => Err(TransportError::Api {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        }),
    }
}

/// Splits `data` into slices and reports the running total as each one is
/// pulled by the HTTP body.
fn progress_stream(
    data: Bytes,
    on_progress: SendProgress,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = data.len();
    let pieces: Vec<Bytes> = (0..total)
        .step_by(PROGRESS_STEP)
        .map(|start| data.slice(start..total.min(start + PROGRESS_STEP)))
        .collect();

    let mut sent = 0u64;
    stream::iter(pieces).map(move |piece| {
        sent += piece.len() as u64;
        on_progress(sent);
        Ok::<_, std::io::Error>(piece)
    })
}

impl UploadTransport for HttpTransport {
    fn init_upload<'a>(
        &'a self,
        req: &'a InitUploadRequest,
    ) -> TransportFuture<'a, InitUploadResponse> {
        Box::pin(self.post_json(INIT_UPLOAD_PATH, req))
    }

    fn upload_chunk<'a>(
        &'a self,
        query: &'a ChunkQuery,
        data: Bytes,
        password: Option<&'a str>,
    ) -> TransportFuture<'a, ChunkAck> {
        Box::pin(async move {
            let mut req = self
                .http
                .post(self.url(UPLOAD_CHUNK_PATH))
                .query(query)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(data);
            if let Some(password) = password {
                req = req.header(PASSWORD_HEADER, password);
            }
            decode_reply(req.send().await?).await
        })
    }

    fn complete_upload<'a>(
        &'a self,
        req: &'a UploadIdRequest,
    ) -> TransportFuture<'a, CompleteUploadResponse> {
        Box::pin(self.post_json(COMPLETE_UPLOAD_PATH, req))
    }

    fn abort_upload<'a>(&'a self, req: &'a UploadIdRequest) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.http
                .post(self.url(ABORT_UPLOAD_PATH))
                .json(req)
                .send()
                .await?;
            Ok(())
        })
    }

    fn upload_file<'a>(
        &'a self,
        req: WholeFileRequest,
        on_progress: SendProgress,
    ) -> TransportFuture<'a, UploadFileResponse> {
        Box::pin(async move {
            let WholeFileRequest {
                filename,
                path,
                size,
                password,
                data,
            } = req;

            let length = data.len() as u64;
            let body = Body::wrap_stream(progress_stream(data, on_progress));
            let part = Part::stream_with_length(body, length)
                .file_name(filename)
                .mime_str("application/octet-stream")?;

            let mut form = Form::new()
                .part("file", part)
                .text("path", path)
                .text("size", size.to_string());
            if let Some(password) = password {
                form = form.text("password", password);
            }

            let resp = self
                .http
                .post(self.url(UPLOAD_PATH))
                .multipart(form)
                .send()
                .await?;
            decode_reply(resp).await
        })
    }

    fn verify_password<'a>(
        &'a self,
        password: &'a str,
    ) -> TransportFuture<'a, VerifyPasswordResponse> {
        Box::pin(async move {
            let resp = self
                .http
                .post(self.url(UPLOAD_PATH))
                .form(&[("password", password)])
                .send()
                .await?;
            decode_reply(resp).await
        })
    }
}
