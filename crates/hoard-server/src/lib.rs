//! HTTP server for the Hoard file store.
//!
//! A thin adapter over [`hoard_store::FsObjectStore`]: it validates that
//! hashes look like hex, spools uploads to disk, runs store calls on the
//! blocking pool, and maps store outcomes to status codes.
//!
//! | route                      | success                | failures          |
//! |----------------------------|------------------------|-------------------|
//! | `POST /upload/`            | 201 `{"file_hash"}`    | 409, 404, 413, 422|
//! | `GET /download/:file_hash` | 200 streamed attachment| 404, 422, 500     |
//! | `DELETE /remove/:file_hash`| 200                    | 404, 422, 500     |

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod schema;
pub mod server;

pub use config::{HoardConfig, ServerConfig, DEFAULT_MOUNT_PREFIX};
pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use schema::{ErrorBody, FileHash, HealthResponse};
pub use server::HoardServer;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use hoard_crypto::ContentHasher;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "hoard-test-boundary";

    fn test_server_with(configure: impl FnOnce(&mut HoardConfig)) -> (tempfile::TempDir, HoardServer) {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = HoardConfig::default();
        config.store.root = temp.path().join("store");
        config.store.fsync = false;
        configure(&mut config);
        (temp, HoardServer::new(config).unwrap())
    }

    fn test_app() -> (tempfile::TempDir, Router) {
        let (temp, server) = test_server_with(|_| {});
        (temp, server.router())
    }

    fn disposition(response: &axum::response::Response) -> String {
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string()
    }

    fn upload_request(path: &str, field: &str, filename: Option<&str>, data: &[u8]) -> Request<Body> {
        let disposition = match filename {
            Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
            None => format!("form-data; name=\"{field}\""),
        };
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn upload(app: &Router, name: &str, data: &[u8]) -> String {
        let response = app
            .clone()
            .oneshot(upload_request("/upload/", "file", Some(name), data))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        json["file_hash"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (_temp, app) = test_app();
        let response = app.oneshot(request("GET", "/v1/health")).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn info_endpoint() {
        let (_temp, app) = test_app();
        let response = app.oneshot(request("GET", "/v1/info")).await.unwrap();
        assert_eq!(response.status(), 200);
        let json = body_json(response).await;
        assert_eq!(json["algorithm"], "sha1");
        assert_eq!(json["shard_len"], 2);
    }

    #[tokio::test]
    async fn upload_download_remove() {
        let (_temp, app) = test_app();
        let hash = upload(&app, "report.pdf", b"pdf bytes").await;
        assert_eq!(hash, ContentHasher::SHA1.hash_bytes(b"pdf bytes").as_str());

        let response = app
            .clone()
            .oneshot(request("GET", &format!("/download/{hash}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(disposition(&response), format!("attachment; filename=\"{hash}.pdf\""));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"pdf bytes");

        let response = app
            .clone()
            .oneshot(request("DELETE", &format!("/remove/{hash}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("GET", &format!("/download/{hash}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], "File not exists.");

        let response = app
            .oneshot(request("DELETE", &format!("/remove/{hash}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_upload_conflicts() {
        let (_temp, app) = test_app();
        upload(&app, "a.txt", b"same").await;
        let response = app
            .oneshot(upload_request("/upload/", "file", Some("a.txt"), b"same"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["detail"], "File already exists.");
    }

    #[tokio::test]
    async fn upload_without_file_field() {
        let (_temp, app) = test_app();
        let response = app
            .oneshot(upload_request("/upload/", "other", Some("a.txt"), b"x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn upload_without_filename() {
        let (_temp, app) = test_app();
        let response = app
            .oneshot(upload_request("/upload/", "file", None, b"x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn non_hex_hash_is_unprocessable() {
        let (_temp, app) = test_app();
        let response = app
            .clone()
            .oneshot(request("GET", "/download/not-a-hash"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body_json(response).await["detail"],
            "The string 'not-a-hash' isn't a hash."
        );

        let response = app.oneshot(request("DELETE", "/remove/zz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn short_hash_is_not_found() {
        let (_temp, app) = test_app();
        let response = app.oneshot(request("GET", "/download/a")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mounted_prefix_serves_same_store() {
        let (_temp, app) = test_app();
        let response = app
            .clone()
            .oneshot(upload_request(
                &format!("{DEFAULT_MOUNT_PREFIX}/upload/"),
                "file",
                Some("notes.md"),
                b"# notes",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let hash = body_json(response).await["file_hash"].as_str().unwrap().to_string();

        let response = app
            .oneshot(request("GET", &format!("/download/{hash}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn uppercase_hash_is_normalised() {
        let (_temp, app) = test_app();
        let hash = upload(&app, "case.txt", b"case").await;
        let response = app
            .oneshot(request("GET", &format!("/download/{}", hash.to_uppercase())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn download_streams_multi_chunk_object() {
        let (_temp, server) = test_server_with(|_| {});
        let body: Vec<u8> = (0..hoard_crypto::CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let hash = server.store().upload_bytes(&body, "big.bin").unwrap();

        let response = server
            .router()
            .oneshot(request("GET", &format!("/download/{hash}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), body.len());
        assert_eq!(&bytes[..], &body[..]);
    }

    #[tokio::test]
    async fn quote_in_extension_cannot_add_header_parameters() {
        let (_temp, server) = test_server_with(|_| {});
        let hash = server
            .store()
            .upload_bytes(b"q", "a.x\"; filename=\"evil")
            .unwrap();

        let response = server
            .router()
            .oneshot(request("GET", &format!("/download/{hash}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            disposition(&response),
            format!(r#"attachment; filename="{hash}.x\"; filename=\"evil""#)
        );
    }

    #[tokio::test]
    async fn control_character_on_disk_still_downloads() {
        let (_temp, server) = test_server_with(|_| {});
        let hash = ContentHasher::SHA1.hash_bytes(b"ctl");
        let shard = server.store().layout().shard_dir(&hash).unwrap();
        std::fs::create_dir_all(&shard).unwrap();
        std::fs::write(shard.join(format!("{hash}.x\u{1}y")), b"ctl").unwrap();

        let response = server
            .router()
            .oneshot(request("GET", &format!("/download/{hash}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(disposition(&response), format!("attachment; filename=\"{hash}.x_y\""));
    }

    #[tokio::test]
    async fn control_character_in_upload_name_is_unprocessable() {
        let (_temp, app) = test_app();
        let response = app
            .oneshot(upload_request("/upload/", "file", Some("a.x\u{1}y"), b"ctl"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let (_temp, server) = test_server_with(|config| config.server.max_upload_size = 1024);
        let response = server
            .router()
            .oneshot(upload_request("/upload/", "file", Some("big.bin"), &[0u8; 8192]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
