use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use backup_receiver::config::ReceiverConfig;
use backup_receiver::{AppState, create_app};
use std::fmt;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Records the `request_id` field of every `http_request` span.
#[derive(Clone, Default)]
struct RequestIds(Arc<Mutex<Vec<String>>>);

impl<S: Subscriber> Layer<S> for RequestIds {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() != "http_request" {
            return;
        }
        let mut visitor = RequestIdField(None);
        attrs.record(&mut visitor);
        if let Some(id) = visitor.0 {
            self.0.lock().unwrap().push(id);
        }
    }
}

struct RequestIdField(Option<String>);

impl Visit for RequestIdField {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "request_id" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

async fn get_health(request_id: Option<&str>) -> (StatusCode, String, Vec<String>) {
    let dir = tempfile::tempdir().unwrap();
    let ids = RequestIds::default();
    let subscriber = tracing_subscriber::registry().with(ids.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = create_app(AppState::new(ReceiverConfig::new(dir.path(), "unused")));
    let mut request = Request::builder().uri("/health");
    if let Some(id) = request_id {
        request = request.header("x-request-id", id);
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let echoed = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let captured = ids.0.lock().unwrap().clone();
    (response.status(), echoed, captured)
}

#[tokio::test]
async fn test_span_carries_generated_request_id() {
    let (status, echoed, captured) = get_health(None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(captured.len(), 1);
    assert_ne!(captured[0], "unknown");
    assert_eq!(captured[0], echoed);
}

#[tokio::test]
async fn test_span_carries_client_request_id() {
    let (_, echoed, captured) = get_health(Some("nightly-db-dump-42")).await;

    assert_eq!(echoed, "nightly-db-dump-42");
    assert_eq!(captured, vec!["nightly-db-dump-42".to_string()]);
}
