//! Integration tests for kraken-agent API endpoints
//!
//! Tests cover:
//! - get_config and the settings setters
//! - Parameter validation leaving the document untouched
//! - One write per request
//! - Unknown routes and the health endpoint

mod common;

use axum::http::{header, StatusCode};
use common::*;
use tower::util::ServiceExt; // for `oneshot` method

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "kraken-agent");
    assert!(body["version"].is_string());
}

// =============================================================================
// get_config
// =============================================================================

#[tokio::test]
async fn test_get_config_returns_document() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let response = app
        .oneshot(get("/api/krakensdr/get_config"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json; charset=utf-8"
    );

    let body = extract_json(response).await;
    assert_eq!(body["errcode"], 0);
    assert_eq!(body["errmsg"], "");
    assert_eq!(body["settings"], read_document(dir.path()));
}

#[tokio::test]
async fn test_get_config_is_repeatable() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let first = body_bytes(
        app.clone()
            .oneshot(get("/api/krakensdr/get_config"))
            .await
            .unwrap(),
    )
    .await;
    let second = body_bytes(
        app.oneshot(get("/api/krakensdr/get_config"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first, second);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_get_config_reports_missing_document() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());
    std::fs::remove_file(dir.path().join("settings.json")).unwrap();

    let response = app
        .oneshot(get("/api/krakensdr/get_config"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["errcode"], 4);
    assert_eq!(body["errkind"], "io_failure");
    assert!(body["errmsg"]
        .as_str()
        .unwrap()
        .starts_with("ERROR getting config"));
}

// =============================================================================
// set_frequency / set_gain
// =============================================================================

#[tokio::test]
async fn test_set_frequency_writes_center_freq() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let response = app
        .oneshot(get("/api/krakensdr/set_frequency?freq=433.5"))
        .await
        .unwrap();
    let body = extract_json(response).await;

    assert_eq!(body["errcode"], 0);
    assert_eq!(read_document(dir.path())["center_freq"], 433.5);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_set_frequency_range_edges() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    for freq in ["24", "1766"] {
        let uri = format!("/api/krakensdr/set_frequency?freq={}", freq);
        let body = extract_json(app.clone().oneshot(get(&uri)).await.unwrap()).await;
        assert_eq!(body["errcode"], 0, "freq={} should be accepted", freq);
    }

    for freq in ["23.9", "1766.1", "abc"] {
        let uri = format!("/api/krakensdr/set_frequency?freq={}", freq);
        let body = extract_json(app.clone().oneshot(get(&uri)).await.unwrap()).await;
        assert_eq!(body["errcode"], 1, "freq={} should be rejected", freq);
    }
}

#[tokio::test]
async fn test_rejected_frequency_leaves_document_untouched() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_frequency?freq=10"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 1);
    assert_eq!(body["errkind"], "validation");
    assert_eq!(
        body["errmsg"],
        "Frequency range error.  Value should be in MHz and range from 24.0 - 1766.0"
    );
    let on_disk = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
    assert_eq!(on_disk, SETTINGS_FIXTURE);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_set_frequency_missing_key() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_frequency?frequency=433"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 1);
    assert_eq!(
        body["errmsg"],
        "Correct key not specified in request.  Expecting freq=&lt;value&gt;"
    );
}

#[tokio::test]
async fn test_blank_frequency_is_missing_key() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_frequency?freq="))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 1);
    assert_eq!(
        body["errmsg"],
        "Correct key not specified in request.  Expecting freq=&lt;value&gt;"
    );
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_frequency_with_gain_is_one_write() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_frequency?freq=433.5&gain=29.7"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 0);
    let document = read_document(dir.path());
    assert_eq!(document["center_freq"], 433.5);
    assert_eq!(document["uniform_gain"], 29.7);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_bad_gain_rejects_whole_request() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_frequency?freq=433.5&gain=15.0"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 1);
    assert_eq!(read_document(dir.path())["center_freq"], 416.588);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_set_gain_accepts_only_tuner_steps() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.clone()
            .oneshot(get("/api/krakensdr/set_gain?gain=49.6"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["errcode"], 0);
    assert_eq!(read_document(dir.path())["uniform_gain"], 49.6);

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_gain?gain=50"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["errcode"], 1);
    assert_eq!(read_document(dir.path())["uniform_gain"], 49.6);
}

// =============================================================================
// VFO endpoints
// =============================================================================

#[tokio::test]
async fn test_set_frequency_and_vfo() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get(
            "/api/krakensdr/set_frequency_and_vfo?freq=433&vfo_index=1&vfo_freq=433100000",
        ))
        .await
        .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 0);
    let document = read_document(dir.path());
    assert_eq!(document["center_freq"], 433.0);
    assert_eq!(document["vfo_freq_1"], 433100000.0);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_set_frequency_and_vfo_requires_every_key() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_frequency_and_vfo?freq=433&vfo_index=1"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 1);
    assert_eq!(
        body["errmsg"],
        "Correct key not specified in request.  Expecting vfo_freq=&lt;value in Hz&gt;"
    );
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_set_vfo_frequency_range() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.clone()
            .oneshot(get("/api/krakensdr/set_vfo_frequency?vfo_index=0&vfo_freq=145500000"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["errcode"], 0);
    assert_eq!(read_document(dir.path())["vfo_freq_0"], 145500000.0);

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_vfo_frequency?vfo_index=0&vfo_freq=145.5"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["errcode"], 1);
    assert!(body["errmsg"]
        .as_str()
        .unwrap()
        .starts_with("Frequency range error.  Value should be in Hz"));
}

#[tokio::test]
async fn test_set_vfo_bandwidth_stores_bandwidth() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.clone()
            .oneshot(get("/api/krakensdr/set_vfo_bandwidth?vfo_index=1&vfo_bw=25000"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["errcode"], 0);
    assert_eq!(read_document(dir.path())["vfo_bw_1"], 25000.0);

    for bw in ["0", "2400001"] {
        let uri = format!("/api/krakensdr/set_vfo_bandwidth?vfo_index=1&vfo_bw={}", bw);
        let body = extract_json(app.clone().oneshot(get(&uri)).await.unwrap()).await;
        assert_eq!(body["errcode"], 1, "vfo_bw={} should be rejected", bw);
    }
    assert_eq!(read_document(dir.path())["vfo_bw_1"], 25000.0);
}

#[tokio::test]
async fn test_set_output_vfo() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_output_vfo?vfo_index=2"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 0);
    assert_eq!(read_document(dir.path())["output_vfo"], 2);
}

// =============================================================================
// en_optimize_short_bursts / set_coordinates
// =============================================================================

#[tokio::test]
async fn test_optimize_short_bursts() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.clone()
            .oneshot(get("/api/krakensdr/en_optimize_short_bursts?state=True"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["errcode"], 0);
    assert_eq!(read_document(dir.path())["en_optimize_short_bursts"], true);

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/en_optimize_short_bursts?state=maybe"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["errcode"], 1);
    assert_eq!(read_document(dir.path())["en_optimize_short_bursts"], true);
}

#[tokio::test]
async fn test_set_coordinates_writes_location_fields() {
    let dir = settings_dir();
    let (app, store) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get(
            "/api/krakensdr/set_coordinates?latitude=40.5&longitude=-75.25&location_source=gpsd&gps_min_speed=5&color=red",
        ))
        .await
        .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 0);
    let document = read_document(dir.path());
    assert_eq!(document["latitude"], 40.5);
    assert_eq!(document["longitude"], -75.25);
    assert_eq!(document["location_source"], "gpsd");
    assert_eq!(document["gps_min_speed"], 5);
    assert!(document.get("color").is_none());
    assert!(document.get("heading").is_none());
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_set_coordinates_needs_both_axes() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_coordinates?latitude=40.5"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 1);
    assert_eq!(
        body["errmsg"],
        "Correct key not specified in request.  latitude and longitude"
    );
}

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn test_unknown_request() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let response = app
        .oneshot(get("/api/krakensdr/reboot"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["errcode"], 2);
    assert_eq!(body["errkind"], "not_found");
    assert_eq!(body["errmsg"], "Unknown request");
}

#[tokio::test]
async fn test_routes_match_exactly() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_frequency_extra?freq=433"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 2);
    assert_eq!(read_document(dir.path())["center_freq"], 416.588);
}

#[tokio::test]
async fn test_error_message_is_escaped() {
    let dir = settings_dir();
    let (app, _) = setup_app(dir.path());

    let body = extract_json(
        app.oneshot(get("/api/krakensdr/set_gain?gain=%3Cscript%3E"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["errcode"], 1);
    let message = body["errmsg"].as_str().unwrap();
    assert!(message.contains("&lt;script&gt;"));
    assert!(!message.contains('<'));
}
