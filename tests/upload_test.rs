use anyhow::Result;
use async_trait::async_trait;
use avatar_backend::config::AppConfig;
use avatar_backend::services::staging::DiskStager;
use avatar_backend::services::transform::{
    ImageTransformer, TransformOutcome, TransformationPlan,
};
use avatar_backend::{AppState, create_app};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// Records every transformation call instead of contacting a provider.
#[derive(Default)]
struct RecordingTransformer {
    calls: Mutex<Vec<RecordedCall>>,
    fail: bool,
}

struct RecordedCall {
    staged_path: PathBuf,
    plan: String,
    file_existed: bool,
}

#[async_trait]
impl ImageTransformer for RecordingTransformer {
    async fn transform(
        &self,
        staged_path: &std::path::Path,
        plan: &TransformationPlan,
    ) -> Result<TransformOutcome> {
        self.calls.lock().unwrap().push(RecordedCall {
            staged_path: staged_path.to_path_buf(),
            plan: plan.as_param(),
            file_existed: staged_path.exists(),
        });

        if self.fail {
            anyhow::bail!("provider returned 401: invalid signature");
        }

        Ok(TransformOutcome {
            public_id: "avatars/abc123".to_string(),
            secure_url: "https://res.example.com/avatars/abc123.png".to_string(),
            width: Some(200),
            height: Some(200),
            format: Some("png".to_string()),
        })
    }
}

fn test_app(transformer: Arc<RecordingTransformer>) -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        port: 0,
        upload_dir: dir.path().to_path_buf(),
        public_dir: PathBuf::from("public"),
        max_file_size: 1024 * 1024,
    };
    let stager = Arc::new(DiskStager::new(
        config.upload_dir.clone(),
        config.max_file_size,
    ));
    let state = AppState {
        stager,
        transformer,
        config,
    };
    (create_app(state), dir)
}

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn profile_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/profile")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn staged_count(dir: &TempDir) -> usize {
    dir.path().read_dir().unwrap().count()
}

#[tokio::test]
async fn missing_avatar_field_returns_400_with_canonical_message() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, dir) = test_app(transformer.clone());

    let body = multipart_body("something_else", "photo.png", "image/png", b"not the field");
    let response = app.oneshot(profile_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "Please upload an image!");

    assert_eq!(staged_count(&dir), 0);
    assert!(transformer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn disallowed_mime_type_returns_400_and_stages_nothing() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, dir) = test_app(transformer.clone());

    let body = multipart_body("avatar", "notes.txt", "text/plain", b"plain text payload");
    let response = app.oneshot(profile_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "Please upload an image!");

    assert_eq!(staged_count(&dir), 0);
    assert!(transformer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn accepted_png_is_staged_transformed_and_cleaned_up() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, dir) = test_app(transformer.clone());

    let data = vec![0x89u8; 500 * 1024];
    let body = multipart_body("avatar", "photo.png", "image/png", &data);
    let response = app.oneshot(profile_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["url"], "https://res.example.com/avatars/abc123.png");
    assert_eq!(json["public_id"], "avatars/abc123");
    assert_eq!(json["width"], 200);

    let calls = transformer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];

    // Staged as `<uuid>-photo.png` and present for the provider call
    let name = call.staged_path.file_name().unwrap().to_str().unwrap();
    assert!(name.ends_with("-photo.png"));
    assert!(Uuid::parse_str(&name[..36]).is_ok());
    assert!(call.file_existed);

    // Fixed avatar pipeline parameters
    assert_eq!(
        call.plan,
        "c_scale,r_max,w_200/fl_region_relative,g_adv_eyes,l_glasses,w_1.7"
    );

    // Staged copy removed once the call resolved
    assert_eq!(staged_count(&dir), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected_and_nothing_persists() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, dir) = test_app(transformer.clone());

    let data = vec![0xFFu8; 2 * 1024 * 1024];
    let body = multipart_body("avatar", "photo.jpeg", "image/jpeg", &data);
    let response = app.oneshot(profile_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(staged_count(&dir), 0);
    assert!(transformer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn upload_over_cap_but_under_body_limit_is_rejected_by_the_stager() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, dir) = test_app(transformer.clone());

    // Fits the transport body limit, so the stager's inline cap must trip
    let data = vec![0xFFu8; 1536 * 1024];
    let body = multipart_body("avatar", "photo.jpeg", "image/jpeg", &data);
    let response = app.oneshot(profile_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(staged_count(&dir), 0);
    assert!(transformer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_avatar_field_leaves_no_orphaned_staged_file() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, dir) = test_app(transformer.clone());

    let mut body = Vec::new();
    for (filename, data) in [("first.png", vec![1u8; 8 * 1024]), ("second.png", vec![2u8; 8 * 1024])] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"avatar\"; filename=\"{filename}\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let response = app.oneshot(profile_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The last field wins and the superseded staged copy is removed too
    let calls = transformer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let name = calls[0].staged_path.file_name().unwrap().to_str().unwrap();
    assert!(name.ends_with("-second.png"));

    assert_eq!(staged_count(&dir), 0);
}

#[tokio::test]
async fn concurrent_uploads_with_the_same_name_do_not_collide() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, dir) = test_app(transformer.clone());

    let first = app
        .clone()
        .oneshot(profile_request(multipart_body(
            "avatar",
            "a.png",
            "image/png",
            &vec![1u8; 100 * 1024],
        )));
    let second = app.oneshot(profile_request(multipart_body(
        "avatar",
        "a.png",
        "image/png",
        &vec![2u8; 100 * 1024],
    )));

    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.unwrap().status(), StatusCode::OK);
    assert_eq!(second.unwrap().status(), StatusCode::OK);

    let calls = transformer.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].staged_path, calls[1].staged_path);

    // Both staged copies cleaned up afterwards
    assert_eq!(staged_count(&dir), 0);
}

#[tokio::test]
async fn provider_failure_surfaces_as_502_and_staged_file_is_discarded() {
    let transformer = Arc::new(RecordingTransformer {
        fail: true,
        ..Default::default()
    });
    let (app, dir) = test_app(transformer.clone());

    let body = multipart_body("avatar", "photo.png", "image/png", &vec![0u8; 10 * 1024]);
    let response = app.oneshot(profile_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "Image transformation failed");

    assert_eq!(transformer.calls.lock().unwrap().len(), 1);
    assert_eq!(staged_count(&dir), 0);
}

#[tokio::test]
async fn openapi_document_registers_the_upload_form_schema() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, _dir) = test_app(transformer);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();

    // The request body schema must resolve to a registered component
    assert!(json["components"]["schemas"]["AvatarUploadForm"].is_object());
    assert!(
        json["paths"]["/profile"]["post"]["requestBody"]["content"]["multipart/form-data"]
            .is_object()
    );
}

#[tokio::test]
async fn health_endpoint_reports_staging_readiness() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (app, _dir) = test_app(transformer);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["staging"], "ready");
}
