// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use sentiment_backend::Settings;
use tower::ServiceExt;

// Only test in this binary: the Prometheus recorder is process-global.
#[tokio::test]
async fn metrics_endpoint_exposes_pipeline_and_inference_series() {
    let app = sentiment_backend::app(Settings::from_lookup(|_| None)).await;

    let req = Request::post("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"documents":[{"source":"news","text":"Dow closes higher"},{"source":"news","text":"   "}]}"#,
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    for needle in [
        "preprocess_documents_total",
        "preprocess_dropped_total{step=\"drop_empty_text\"}",
        "inference_texts_total{service=\"mock\"}",
        "# HELP preprocess_dropped_total",
        "# HELP inference_texts_total",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
}
