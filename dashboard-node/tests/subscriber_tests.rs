//! Subscriber tests against a stub push endpoint
//!
//! The stub serves a fixed event-stream body, so malformed and foreign-version
//! messages can be injected alongside valid ones.

use axum::{http::header, routing::get, Router};
use tokio::net::TcpListener;

use dashboard_node::{DashboardError, DashboardSubscriber};
use flowguard_common::{
    encode_frame, FeatureRecord, Label, StreamMessage, FEATURE_COUNT, SCHEMA_VERSION,
};

fn payload(index: u64, prediction: Label) -> String {
    StreamMessage {
        version: SCHEMA_VERSION,
        index,
        features: FeatureRecord::from_values(&[1.5; FEATURE_COUNT]).unwrap(),
        prediction,
    }
    .encode()
    .unwrap()
}

/// Serve `body` as an event stream on an ephemeral port, returning the stream URL
async fn start_stub(body: String) -> String {
    let app = Router::new().route(
        "/stream",
        get(move || {
            let body = body.clone();
            async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/stream")
}

#[tokio::test]
async fn test_subscriber_aggregates_until_close() {
    let body = [
        encode_frame(&payload(0, Label::Benign)),
        encode_frame(&payload(1, Label::Attack)),
        encode_frame(&payload(2, Label::Benign)),
    ]
    .concat();
    let url = start_stub(body).await;

    let mut seen = Vec::new();
    let report = DashboardSubscriber::new(url)
        .run(|state| seen.push(state.total()))
        .await
        .unwrap();

    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.state.benign_count(), 2);
    assert_eq!(report.state.attack_count(), 1);
    assert_eq!(report.state.attack_rate(), 33.3);
}

#[tokio::test]
async fn test_undecodable_messages_are_skipped() {
    let foreign_version = payload(1, Label::Attack).replacen("\"version\":1", "\"version\":7", 1);
    let body = [
        encode_frame(&payload(0, Label::Attack)),
        // Loosely quoted dump that is not JSON
        encode_frame("{'Flow Bytes/s': 1.0, 'Prediction': 'Attack'}"),
        encode_frame(&foreign_version),
        ": comment only\n\n".to_string(),
        encode_frame(&payload(2, Label::Benign)),
    ]
    .concat();
    let url = start_stub(body).await;

    let report = DashboardSubscriber::new(url).run(|_| {}).await.unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.state.total(), 2);
    let indexes: Vec<u64> = report.state.recent().iter().map(|e| e.index).collect();
    assert_eq!(indexes, vec![2, 0]);
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let url = start_stub(String::new()).await.replace("/stream", "/missing");

    let err = DashboardSubscriber::new(url).run(|_| {}).await.unwrap_err();
    assert!(matches!(err, DashboardError::Status(status) if status.as_u16() == 404));
}
