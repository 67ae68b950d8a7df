use super::*;
use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use std::{fs, net::SocketAddr};

async fn spawn_labeler(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr: SocketAddr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/classify")
}

fn write_image(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).expect("write image");
    path
}

#[tokio::test]
async fn http_classifier_formats_label_with_confidence() {
    let app = Router::new().route(
        "/classify",
        post(|headers: HeaderMap, body: Bytes| async move {
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let label = if content_type == "image/jpeg" && body.as_ref() == b"jpeg-bytes" {
                "tabby cat"
            } else {
                "unexpected request"
            };
            Json(serde_json::json!({ "label": label, "confidence": 0.5 }))
        }),
    );
    let endpoint = spawn_labeler(app).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let image = write_image(&dir, "cat.JPG", b"jpeg-bytes");

    let classifier = HttpClassifier::new(&endpoint, Duration::from_secs(5)).expect("classifier");
    let label = classifier.classify(&image).await.expect("label");

    assert_eq!(label, "tabby cat (50.0% likely)");
}

#[tokio::test]
async fn http_classifier_returns_bare_label_without_confidence() {
    let app = Router::new().route(
        "/classify",
        post(|| async { Json(serde_json::json!({ "label": "  lighthouse " })) }),
    );
    let endpoint = spawn_labeler(app).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let image = write_image(&dir, "coast.png", b"png");

    let classifier = HttpClassifier::new(&endpoint, Duration::from_secs(5)).expect("classifier");
    assert_eq!(classifier.classify(&image).await.expect("label"), "lighthouse");
}

#[tokio::test]
async fn http_classifier_reports_error_status() {
    let app = Router::new().route(
        "/classify",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model loading") }),
    );
    let endpoint = spawn_labeler(app).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let image = write_image(&dir, "cat.jpg", b"jpeg");

    let classifier = HttpClassifier::new(&endpoint, Duration::from_secs(5)).expect("classifier");
    let err = classifier.classify(&image).await.expect_err("should fail");

    assert!(matches!(err, ClassifierError::Status { status: 503 }));
}

#[tokio::test]
async fn http_classifier_rejects_blank_label_and_bad_json() {
    let blank = spawn_labeler(Router::new().route(
        "/classify",
        post(|| async { Json(serde_json::json!({ "label": "   " })) }),
    ))
    .await;
    let garbage = spawn_labeler(Router::new().route("/classify", post(|| async { "not json" }))).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let image = write_image(&dir, "cat.jpg", b"jpeg");

    let err = HttpClassifier::new(&blank, Duration::from_secs(5))
        .expect("classifier")
        .classify(&image)
        .await
        .expect_err("blank label");
    assert!(matches!(err, ClassifierError::EmptyLabel));

    let err = HttpClassifier::new(&garbage, Duration::from_secs(5))
        .expect("classifier")
        .classify(&image)
        .await
        .expect_err("bad json");
    assert!(matches!(err, ClassifierError::Decode(_)));
}

#[tokio::test]
async fn http_classifier_reports_missing_image() {
    let classifier =
        HttpClassifier::new("http://127.0.0.1:9/classify", Duration::from_secs(1)).expect("classifier");
    let dir = tempfile::tempdir().expect("tempdir");

    let err = classifier
        .classify(&dir.path().join("gone.jpg"))
        .await
        .expect_err("missing file");

    assert!(matches!(err, ClassifierError::ReadImage { .. }));
}

#[test]
fn build_classifier_is_absent_without_endpoint() {
    assert!(build_classifier(&ClassifierSettings::default())
        .expect("build")
        .is_none());

    let blank = ClassifierSettings {
        endpoint: Some("  ".into()),
        ..ClassifierSettings::default()
    };
    assert!(build_classifier(&blank).expect("build").is_none());
}

#[test]
fn build_classifier_rejects_non_http_endpoint() {
    let settings = ClassifierSettings {
        endpoint: Some("ftp://models.local/label".into()),
        ..ClassifierSettings::default()
    };
    let err = build_classifier(&settings).err().expect("should fail");
    assert!(matches!(err, ClassifierError::InvalidEndpoint { .. }));

    let settings = ClassifierSettings {
        endpoint: Some("not a url".into()),
        ..ClassifierSettings::default()
    };
    assert!(build_classifier(&settings).is_err());
}

#[test]
fn build_classifier_accepts_http_endpoint() {
    let settings = ClassifierSettings {
        endpoint: Some("http://localhost:5000/classify".into()),
        ..ClassifierSettings::default()
    };
    assert!(build_classifier(&settings).expect("build").is_some());
}

#[test]
fn content_type_follows_extension() {
    assert_eq!(content_type_for(Path::new("a/b.JPEG")), "image/jpeg");
    assert_eq!(content_type_for(Path::new("logo.svg")), "image/svg+xml");
    assert_eq!(content_type_for(Path::new("README")), "application/octet-stream");
}
