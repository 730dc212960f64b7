//! HTTP surface: `POST /api/image` takes a multipart `file` upload and
//! answers with the rendered ECG grid as `image/png`.
use std::sync::Arc;
use std::time::Instant;
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{error, info, log, warn, Level};
use serde::{Deserialize, Serialize};
use crate::config::ServerConfig;
use crate::ecg::{EcgError, UploadConverter, UploadKind};
const FILE_FIELD: &str = "file";
#[derive(Clone)]
pub struct AppState {
    converter: Arc<UploadConverter>,
}
impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            converter: Arc::new(UploadConverter::new(config)),
        }
    }
}
/// Error body, shaped like `{"detail": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
#[derive(Debug)]
pub enum ApiError {
    /// Anything wrong with the upload or its rendering.
    Processing(EcgError),
    /// The render task itself died, which is a server bug rather than bad input.
    Internal(String),
}
impl ApiError {
    /// Bad waveforms are routine client mistakes; decode failures deserve a warning.
    fn log_level(&self) -> Level {
        match self {
            ApiError::Processing(err) if err.is_validation() => Level::Info,
            ApiError::Processing(_) => Level::Warn,
            ApiError::Internal(_) => Level::Error,
        }
    }
}
impl From<EcgError> for ApiError {
    fn from(value: EcgError) -> Self {
        ApiError::Processing(value)
    }
}
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Processing(err) => (
                StatusCode::BAD_REQUEST,
                format!("Error processing file: {err}"),
            ),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
pub fn create_router(config: &ServerConfig) -> Router {
    Router::new()
        .route("/api/image", post(convert_image_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(AppState::new(config))
}
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("DICOM ECG converter listening on http://{addr}");
    axum::serve(listener, create_router(&config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;
    Ok(())
}
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
async fn convert_image_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let (filename, kind, png) = match convert_upload(&state, multipart).await {
        Ok(converted) => converted,
        Err(err) => {
            log!(err.log_level(), "upload rejected: {err:?}");
            return Err(err);
        }
    };
    info!(
        "rendered {filename} ({kind}) into {} PNG bytes in {:?}",
        png.len(),
        started.elapsed()
    );
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
async fn convert_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(String, UploadKind, Vec<u8>), ApiError> {
    let mut multipart = multipart.map_err(|err| EcgError::Upload(err.body_text()))?;
    let (filename, bytes) = read_file_field(&mut multipart).await?;
    let kind = UploadKind::from_filename(&filename)?;
    info!("received {filename} as {kind} ({} bytes)", bytes.len());
    let converter = Arc::clone(&state.converter);
    let png = tokio::task::spawn_blocking(move || converter.convert(kind, &bytes))
        .await
        .map_err(|err| {
            error!("render task for {filename} failed: {err}");
            ApiError::Internal("Internal rendering failure".into())
        })??;
    Ok((filename, kind, png))
}
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), EcgError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| EcgError::Upload(err.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| EcgError::Upload(err.body_text()))?;
        return Ok((filename, bytes));
    }
    Err(EcgError::Upload(format!("missing multipart field `{FILE_FIELD}`")))
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderSettings;
    use crate::ecg::dicom::tests::ecg_file_bytes;
    use crate::ecg::vector::encode_npy;
    use crate::ecg::vector::tests::npy_with_header;
    use axum::body::Body;
    use axum::http::Request;
    use ndarray::Array2;
    use tower::util::ServiceExt;
    const BOUNDARY: &str = "ecg-test-boundary";
    fn create_test_app() -> Router {
        create_router(&ServerConfig {
            render: RenderSettings {
                dpi: 20.0,
                ..RenderSettings::default()
            },
            ..ServerConfig::default()
        })
    }
    fn upload_request(field: &str, filename: &str, payload: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/image")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }
    async fn send(request: Request<Body>) -> (StatusCode, Option<String>, Bytes) {
        let response = create_test_app().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, body)
    }
    fn detail(body: &[u8]) -> String {
        serde_json::from_slice::<ErrorResponse>(body).unwrap().detail
    }
    #[tokio::test]
    async fn hl7vector_upload_returns_png() {
        let payload = encode_npy(&Array2::zeros((12, 500)));
        let (status, content_type, body) =
            send(upload_request("file", "sample.hl7vector", &payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("image/png"));
        assert!(!body.is_empty());
        assert_eq!(&body[1..4], b"PNG");
    }
    #[tokio::test]
    async fn unsupported_suffix_is_bad_request() {
        let (status, _, body) = send(upload_request("file", "sample.txt", b"hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let detail = detail(&body);
        assert!(detail.starts_with("Error processing file: "));
        assert!(detail.contains("Unsupported file type"));
    }
    #[tokio::test]
    async fn ten_lead_vector_is_bad_request() {
        let payload = encode_npy(&Array2::zeros((10, 500)));
        let (status, _, body) = send(upload_request("file", "sample.hl7vector", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("Expected ECG data with 12 leads"));
    }
    #[tokio::test]
    async fn malformed_dtype_is_bad_request() {
        let header = "{'descr': '<é8', 'fortran_order': False, 'shape': (12, 1), }\n";
        let payload = npy_with_header(1, header, &[0u8; 96]);
        let (status, _, body) = send(upload_request("file", "sample.hl7vector", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let detail = detail(&body);
        assert!(detail.starts_with("Error processing file: invalid hl7vector payload"));
    }
    #[test]
    fn rejections_are_logged_by_severity() {
        let lead_count = ApiError::from(EcgError::LeadCount { actual: 10 });
        assert_eq!(lead_count.log_level(), Level::Info);
        let decode = ApiError::from(EcgError::Vector("truncated header".into()));
        assert_eq!(decode.log_level(), Level::Warn);
        let crashed = ApiError::Internal("Internal rendering failure".into());
        assert_eq!(crashed.log_level(), Level::Error);
    }
    #[tokio::test]
    async fn dicom_upload_returns_png() {
        let (status, content_type, body) =
            send(upload_request("file", "record.dcm", &ecg_file_bytes(500))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("image/png"));
        assert_eq!(&body[1..4], b"PNG");
    }
    #[tokio::test]
    async fn corrupt_dicom_is_bad_request() {
        let (status, _, body) = send(upload_request("file", "record.dcm", b"garbage")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("invalid DICOM ECG record"));
    }
    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let (status, _, body) = send(upload_request("upload", "sample.hl7vector", b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("missing multipart field"));
    }
    #[tokio::test]
    async fn non_multipart_body_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/image")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).starts_with("Error processing file: invalid upload"));
    }
    #[tokio::test]
    async fn only_post_is_routed() {
        let request = Request::builder()
            .uri("/api/image")
            .body(Body::empty())
            .unwrap();
        let response = create_test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
