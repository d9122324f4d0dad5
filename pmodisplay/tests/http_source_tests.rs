//! Integration tests for the HTTP catalog source

mod common;

use common::RecordingPlayer;
use pmodisplay::{
    CatalogSource, DisplayRuntime, DisplaySettings, Error, HttpCatalogSource, ItemId,
    PlayerHandle, TimeoutConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Catalog document as published by the bot
fn mock_catalog_json() -> serde_json::Value {
    json!({
        "videos": {
            "1": {
                "url": "clips/cat.mp4",
                "author": "Ada",
                "created": "2017-05-01T12:00:00"
            },
            "2": {
                "url": "clips/dog.mp4",
                "author": "Linus",
                "created": "2017-05-02T08:30:00"
            }
        },
        "config": {
            "timeout_enabled": true,
            "timeout_delay": 30
        }
    })
}

async fn source_for(server: &MockServer) -> HttpCatalogSource {
    HttpCatalogSource::builder()
        .url(format!("{}/data.json", server.uri()))
        .user_agent("pmodisplay-test")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_fetch_snapshot() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .and(header("user-agent", "pmodisplay-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_catalog_json()))
        .mount(&mock_server)
        .await;

    let source = source_for(&mock_server).await;
    let snapshot = assert_ok!(source.fetch_snapshot().await);

    assert_eq!(snapshot.len(), 2);
    let item = snapshot.get(&ItemId::from("2")).unwrap();
    assert_eq!(item.url, "clips/dog.mp4");
    assert_eq!(item.author(), Some("Linus"));
    assert_eq!(
        snapshot.config(),
        TimeoutConfig::after(Duration::from_secs(30))
    );
}

#[tokio::test]
async fn test_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let source = source_for(&mock_server).await;
    let result = source.fetch_snapshot().await;

    assert!(matches!(result, Err(Error::Status(404))));
}

#[tokio::test]
async fn test_malformed_document() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"videos\": [1, 2"))
        .mount(&mock_server)
        .await;

    let source = source_for(&mock_server).await;
    assert!(matches!(source.fetch_snapshot().await, Err(Error::Json(_))));
}

#[tokio::test]
async fn test_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(mock_catalog_json())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let source = HttpCatalogSource::builder()
        .url(format!("{}/data.json", mock_server.uri()))
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    assert!(matches!(source.fetch_snapshot().await, Err(Error::Http(_))));
}

#[tokio::test]
async fn test_display_plays_published_catalog() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": {"1": {"url": "clips/cat.mp4"}},
            "config": {"timeout_enabled": false}
        })))
        .mount(&mock_server)
        .await;

    let settings = DisplaySettings {
        poll_interval: Duration::from_millis(50),
        ..DisplaySettings::default()
    };
    let source = source_for(&mock_server).await;
    let player = Arc::new(RecordingPlayer::default());
    let display = DisplayRuntime::new(Arc::new(source), settings)
        .start(Some(player.clone() as Arc<dyn PlayerHandle>));

    let played = tokio::time::timeout(Duration::from_secs(5), async {
        while player.calls().len() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert_ok!(played);
    assert_eq!(player.calls(), vec!["load clips/cat.mp4", "play"]);
    display.shutdown().await;
}
