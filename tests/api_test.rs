//! HTTP API tests using tower's `oneshot` against the router.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use hlsrelay_common::StreamId;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{body_json, body_string, TestHarness};

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let harness = TestHarness::new();
    let response = harness.router().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_request_id_echoed() {
    let harness = TestHarness::new();
    let request = Request::get("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = harness.router().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_convert_requires_url() {
    let harness = TestHarness::new();

    for body in [json!({}), json!({ "rtsp_url": "" }), json!({ "rtsp_url": "  " })] {
        let response = harness
            .router()
            .oneshot(json_request("POST", "/api/convert", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "RTSP URL is required");
        assert_eq!(body["code"], "validation_error");
    }

    // Nothing was allocated
    assert_eq!(harness.ctx.orchestrator.registry().allocated(), 0);
}

#[tokio::test]
async fn test_convert_malformed_body() {
    let harness = TestHarness::new();
    let request = Request::post("/api/convert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = harness.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_convert_spawn_failure_is_500() {
    let harness = TestHarness::new();
    let response = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/convert",
            json!({ "rtsp_url": "rtsp://cam/live" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let body = body_json(response).await;
    assert_eq!(body["code"], "spawn_error");
    assert_eq!(body["request_id"], request_id);

    // The failed conversion is visible
    let response = harness.router().oneshot(get("/api/streams")).await.unwrap();
    let streams = body_json(response).await;
    assert_eq!(streams.as_array().unwrap().len(), 1);
    assert_eq!(streams[0]["state"], "failed");
}

#[cfg(unix)]
#[tokio::test]
async fn test_convert_and_fetch_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = common::write_engine(tmp.path(), "engine.sh", common::MANIFEST_WRITER);
    let harness = TestHarness::with_engine(&engine, 5);

    let response = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/convert",
            json!({ "rtsp_url": "rtsp://cam/live" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let stream_id = body["stream_id"].as_str().unwrap().to_string();
    let hls_url = body["hls_url"].as_str().unwrap().to_string();
    assert_eq!(hls_url, format!("/streams/{}/index.m3u8", stream_id));

    let response = harness.router().oneshot(get(&hls_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.starts_with("#EXTM3U"));

    let response = harness
        .router()
        .oneshot(get(&format!("/api/streams/{}", stream_id)))
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["state"], "ready");
    assert_eq!(status["running"], true);

    let response = harness
        .router()
        .oneshot(
            Request::post(format!("/api/streams/{}/stop", stream_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stopped = body_json(response).await;
    assert_eq!(stopped["state"], "stopped");
    assert_eq!(stopped["running"], false);

    let response = harness
        .router()
        .oneshot(
            Request::delete(format!("/api/streams/{}", stream_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["purged"], stream_id);
    assert!(!harness.streams_root().join(&stream_id).exists());
}

#[tokio::test]
async fn test_stream_segments_served_from_disk() {
    let harness = TestHarness::new();
    let dir = harness.streams_root().join("cam-dir");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("segment3.ts"), b"\x47segment").unwrap();

    let response = harness
        .router()
        .oneshot(get("/streams/cam-dir/segment3.ts"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = harness
        .router()
        .oneshot(get("/streams/cam-dir/missing.ts"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_lookup_errors() {
    let harness = TestHarness::new();

    let response = harness
        .router()
        .oneshot(get("/api/streams/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_identifier");

    let response = harness
        .router()
        .oneshot(get(&format!("/api/streams/{}", StreamId::new())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overlay_round_trip() {
    let harness = TestHarness::new();

    let response = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/overlays",
            json!({ "stream_id": "s1", "type": "text", "content": "Hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["position"], json!({ "x": 10.0, "y": 10.0 }));
    assert_eq!(created["size"], json!({ "w": 150.0, "h": 50.0 }));
    let id = created["id"].as_str().unwrap().to_string();

    // Another stream's overlay must not show up in the filtered list
    harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/overlays",
            json!({ "stream_id": "s2", "type": "image", "content": "logo.png" }),
        ))
        .await
        .unwrap();

    let response = harness
        .router()
        .oneshot(get("/api/overlays?stream_id=s1"))
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id.as_str());

    let response = harness
        .router()
        .oneshot(json_request(
            "PUT",
            &format!("/api/overlays/{}", id),
            json!({ "content": "Bye" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["content"], "Bye");
    assert_eq!(updated["type"], "text");

    let response = harness
        .router()
        .oneshot(get(&format!("/api/overlays/{}", id)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["content"], "Bye");

    let delete = || {
        Request::delete(format!("/api/overlays/{}", id))
            .body(Body::empty())
            .unwrap()
    };
    let response = harness.router().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "deleted": id }));

    let response = harness
        .router()
        .oneshot(get("/api/overlays?stream_id=s1"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!([]));

    let response = harness.router().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overlay_validation() {
    let harness = TestHarness::new();

    let response = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/overlays",
            json!({ "stream_id": "s1", "type": "video", "content": "x" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = harness
        .router()
        .oneshot(json_request(
            "POST",
            "/api/overlays",
            json!({ "type": "text", "content": "x" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = harness
        .router()
        .oneshot(json_request("PUT", "/api/overlays/not-a-uuid", json!({ "content": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_identifier");

    let response = harness
        .router()
        .oneshot(json_request(
            "PUT",
            &format!("/api/overlays/{}", uuid_like()),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "validation_error");

    let response = harness
        .router()
        .oneshot(json_request(
            "PUT",
            &format!("/api/overlays/{}", uuid_like()),
            json!({ "content": "x" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn uuid_like() -> String {
    hlsrelay_common::OverlayId::new().to_string()
}

#[tokio::test]
async fn test_tools_endpoint_reports_missing_engine() {
    let harness = TestHarness::new();
    let response = harness.router().oneshot(get("/api/tools")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let tools = body_json(response).await;
    assert_eq!(tools[0]["name"], "ffmpeg");
    assert_eq!(tools[0]["available"], false);
}
