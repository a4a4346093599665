use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;

use hoard_crypto::CHUNK_SIZE;
use hoard_store::{FsObjectStore, StoreError};
use hoard_types::ContentHash;

use crate::error::ApiError;
use crate::schema::{FileHash, HealthResponse};

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

const UPLOAD_FAILED: &str = "Failed to upload file.";
const NOT_EXISTS: &str = "File not exists.";

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Arc<FsObjectStore>,
}

impl AppState {
    pub fn new(store: Arc<FsObjectStore>) -> Self {
        Self { store }
    }
}

/// Reject anything that is not a hex string before it reaches the store.
fn parse_hash(raw: &str) -> Result<ContentHash, ApiError> {
    ContentHash::parse(raw).map_err(|_| ApiError::Validation(format!("The string '{raw}' isn't a hash.")))
}

/// Run a blocking store call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))
}

/// POST /upload/: store the multipart `file` field, answer with its hash.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileHash>), ApiError> {
    let mut spooled = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Validation("Field 'file' must carry a filename.".into()))?;

        // Spool to an anonymous temp file: the store reads its source twice.
        let spool = tempfile::tempfile().map_err(|e| upload_io_failure(&e))?;
        let mut spool = tokio::fs::File::from_std(spool);
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(multipart_error)?
        {
            spool.write_all(&chunk).await.map_err(|e| upload_io_failure(&e))?;
        }
        spool.flush().await.map_err(|e| upload_io_failure(&e))?;
        spooled = Some((spool.into_std().await, name));
        break;
    }

    let (mut file, name) =
        spooled.ok_or_else(|| ApiError::Validation("Field 'file' is required.".into()))?;

    let store = state.store.clone();
    match blocking(move || store.upload(&mut file, &name)).await? {
        Ok(hash) => Ok((StatusCode::CREATED, Json(FileHash { file_hash: hash }))),
        Err(StoreError::DuplicateObject(_)) => Err(ApiError::Conflict("File already exists.".into())),
        Err(StoreError::InvalidName(name)) => {
            Err(ApiError::Validation(format!("The file name {name:?} is not usable.")))
        }
        Err(e) => Err(upload_store_failure(&e)),
    }
}

/// 413 for a body over the limit, 422 for any other malformed form.
fn multipart_error(e: MultipartError) -> ApiError {
    let status = e.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::Validation(e.body_text())
    }
}

fn upload_io_failure(e: &std::io::Error) -> ApiError {
    warn!(error = %e, "upload spooling failed");
    ApiError::NotFound(UPLOAD_FAILED.into())
}

fn upload_store_failure(e: &StoreError) -> ApiError {
    warn!(error = %e, "upload failed");
    ApiError::NotFound(UPLOAD_FAILED.into())
}

/// GET /download/:file_hash: the stored bytes as an attachment named
/// `hash.extension`.
///
/// The file is opened under the hash lock and streamed in `CHUNK_SIZE`
/// pieces. A remove that lands mid-transfer does not cut the body short on
/// Unix.
pub async fn download_handler(
    State(state): State<AppState>,
    Path(file_hash): Path<String>,
) -> Result<Response, ApiError> {
    let hash = parse_hash(&file_hash)?;
    let store = state.store.clone();

    match blocking(move || store.open_object(&hash)).await? {
        Ok((stored, file)) => {
            let headers = [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::CONTENT_DISPOSITION, content_disposition(&stored.file_name())),
            ];
            let body = Body::from_stream(chunk_stream(tokio::fs::File::from_std(file)));
            Ok((StatusCode::OK, headers, body).into_response())
        }
        Err(StoreError::NotFound(_) | StoreError::InvalidHash { .. }) => {
            Err(ApiError::NotFound(NOT_EXISTS.into()))
        }
        Err(e) => Err(ApiError::Internal(format!("Failed to download file: {e}"))),
    }
}

/// Read `file` to its end as a stream of chunks of at most `CHUNK_SIZE`.
fn chunk_stream(
    file: tokio::fs::File,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        if file.read_buf(&mut buf).await? == 0 {
            return Ok(None);
        }
        Ok::<_, std::io::Error>(Some((buf.freeze(), file)))
    })
}

/// `attachment; filename="..."` with the name as a quoted-string.
///
/// Quotes and backslashes are escaped; control characters cannot appear in a
/// header value and are replaced with `_`.
fn content_disposition(file_name: &str) -> String {
    let mut quoted = String::with_capacity(file_name.len());
    for c in file_name.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            c if c.is_control() => quoted.push('_'),
            c => quoted.push(c),
        }
    }
    format!("attachment; filename=\"{quoted}\"")
}

/// DELETE /remove/:file_hash
pub async fn remove_handler(
    State(state): State<AppState>,
    Path(file_hash): Path<String>,
) -> Result<StatusCode, ApiError> {
    let hash = parse_hash(&file_hash)?;
    let store = state.store.clone();
    match blocking(move || store.remove(&hash)).await? {
        Ok(()) => Ok(StatusCode::OK),
        Err(StoreError::NotFound(_) | StoreError::InvalidHash { .. }) => {
            Err(ApiError::NotFound(NOT_EXISTS.into()))
        }
        Err(e) => {
            warn!(error = %e, "remove failed");
            Err(ApiError::Internal("Failed to remove file.".into()))
        }
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.store.config();
    Json(json!({
        "name": "hoard-server",
        "version": env!("CARGO_PKG_VERSION"),
        "algorithm": config.algorithm,
        "shard_len": config.shard_len,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_is_quoted() {
        assert_eq!(
            content_disposition("abc123.pdf"),
            "attachment; filename=\"abc123.pdf\""
        );
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(
            content_disposition("h.x\"; filename=\"evil"),
            r#"attachment; filename="h.x\"; filename=\"evil""#
        );
        assert_eq!(content_disposition("h.a\\b"), r#"attachment; filename="h.a\\b""#);
    }

    #[test]
    fn control_characters_are_replaced() {
        assert_eq!(
            content_disposition("h.x\u{1}y\n"),
            "attachment; filename=\"h.x_y_\""
        );
    }

    #[test]
    fn disposition_is_a_valid_header_value() {
        let value = content_disposition("h.\u{7f}caf\u{e9}\"\t");
        axum::http::HeaderValue::try_from(value).unwrap();
    }
}
