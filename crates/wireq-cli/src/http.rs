//! HTTP face of the engine, mirroring the wireq routes.
//!
//! - `POST /dequeue-entries.json`: destructive read
//! - `GET /entries.json`: leased read, entries carry `_wireq_receipt`
//! - `DELETE /entry/{receipt}`: redeem a receipt
//! - `POST /entries.json`: enqueue one document or an array of them
//! - `GET /stats.json`: engine counters
//!
//! Anything else, including a known path with the wrong method, answers
//! 403 as the hosted wireq does.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tracing::info;
use wireq_core::{Batch, DeleteOutcome, Polled, QueueEngine, QueueStats};

pub type AppState = Arc<QueueEngine>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/dequeue-entries.json", post(dequeue_entries))
        .route("/entries.json", get(get_entries).post(enqueue_entries))
        .route("/entry/{receipt}", delete(delete_entry))
        .route("/stats.json", get(stats))
        .fallback(forbidden)
        .method_not_allowed_fallback(forbidden)
        .with_state(state)
}

/// Status code the hosted wireq uses for each delete outcome.
pub fn delete_status(outcome: DeleteOutcome) -> StatusCode {
    match outcome {
        DeleteOutcome::Deleted => StatusCode::NO_CONTENT,
        DeleteOutcome::AlreadyDeleted | DeleteOutcome::Expired => StatusCode::GONE,
        DeleteOutcome::Unknown => StatusCode::NOT_FOUND,
    }
}

fn polled_response(polled: Polled<Value>) -> Response {
    let retry_after = polled.retry_after().as_secs().to_string();
    match polled {
        Polled::Served(batch) => (
            StatusCode::OK,
            [(header::RETRY_AFTER, retry_after)],
            Json(json!({ "entries": batch.items })),
        )
            .into_response(),
        Polled::Throttled { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after)],
            Json(json!({})),
        )
            .into_response(),
    }
}

async fn dequeue_entries(State(engine): State<AppState>) -> Response {
    let polled = engine.poll_dequeue();
    info!(
        throttled = polled.is_throttled(),
        retry_after = polled.retry_after().as_secs(),
        "POST /dequeue-entries.json"
    );
    polled_response(polled)
}

async fn get_entries(State(engine): State<AppState>) -> Response {
    let polled = match engine.poll_get() {
        Polled::Served(batch) => Polled::Served(Batch {
            items: batch.items.iter().map(|leased| leased.annotated()).collect(),
            retry_after: batch.retry_after,
            backlog: batch.backlog,
        }),
        Polled::Throttled { retry_after } => Polled::Throttled { retry_after },
    };
    info!(
        throttled = polled.is_throttled(),
        retry_after = polled.retry_after().as_secs(),
        "GET /entries.json"
    );
    polled_response(polled)
}

async fn enqueue_entries(
    State(engine): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let items = match body {
        Value::Array(items) => items,
        single => vec![single],
    };
    let enqueued = engine.enqueue(items).len();
    info!(enqueued, "POST /entries.json");
    (StatusCode::ACCEPTED, Json(json!({ "enqueued": enqueued })))
}

async fn delete_entry(State(engine): State<AppState>, Path(receipt): Path<String>) -> StatusCode {
    let outcome = engine.delete(&receipt);
    info!(%receipt, ?outcome, "DELETE /entry");
    delete_status(outcome)
}

async fn stats(State(engine): State<AppState>) -> Json<QueueStats> {
    Json(engine.stats())
}

async fn forbidden() -> StatusCode {
    StatusCode::FORBIDDEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use rstest::rstest;
    use std::time::Duration;
    use tower::ServiceExt;
    use wireq_core::QueueConfig;

    fn engine(max_items: usize, max_ops: usize) -> AppState {
        Arc::new(QueueEngine::new(
            QueueConfig::builder()
                .max_items_returned(max_items)
                .retry_after_drained(Duration::from_secs(100))
                .retry_after_more_data(Duration::from_secs(10))
                .retry_after_throttled(Duration::from_secs(360))
                .max_ops_per_minute(max_ops)
                .build()
                .unwrap(),
        ))
    }

    async fn send(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> Response {
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        create_router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn retry_after(response: &Response) -> &str {
        response.headers()[header::RETRY_AFTER].to_str().unwrap()
    }

    fn articles(n: usize) -> Value {
        Value::Array((0..n).map(|i| json!({ "urn": format!("urn:{i}") })).collect())
    }

    #[tokio::test]
    async fn dequeue_pages_through_with_retry_after() {
        let state = engine(10, 1_000);
        state.enqueue(articles(20).as_array().unwrap().clone());

        let first = send(&state, Method::POST, "/dequeue-entries.json", None).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(retry_after(&first), "10");
        let body = json_body(first).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 10);
        assert_eq!(body["entries"][0]["urn"], "urn:0");

        let second = send(&state, Method::POST, "/dequeue-entries.json", None).await;
        assert_eq!(retry_after(&second), "100");
        let body = json_body(second).await;
        assert_eq!(body["entries"][9]["urn"], "urn:19");
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn get_then_delete_redeems_receipt_once() {
        let state = engine(10, 1_000);
        state.enqueue(vec![json!({ "urn": "urn:1" })]);

        let response = send(&state, Method::GET, "/entries.json", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let receipt = body["entries"][0]["_wireq_receipt"].as_str().unwrap().to_string();
        assert_eq!(body["entries"][0]["urn"], "urn:1");

        let uri = format!("/entry/{receipt}");
        let first = send(&state, Method::DELETE, &uri, None).await;
        assert_eq!(first.status(), StatusCode::NO_CONTENT);
        let second = send(&state, Method::DELETE, &uri, None).await;
        assert_eq!(second.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn unknown_receipt_is_not_found() {
        let state = engine(10, 1_000);
        let response = send(&state, Method::DELETE, "/entry/some-uuid", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn throttled_poll_is_429_with_long_retry_after() {
        let state = engine(1, 2);
        state.enqueue(articles(5).as_array().unwrap().clone());

        for _ in 0..2 {
            let ok = send(&state, Method::POST, "/dequeue-entries.json", None).await;
            assert_eq!(ok.status(), StatusCode::OK);
        }
        let throttled = send(&state, Method::GET, "/entries.json", None).await;
        assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(retry_after(&throttled), "360");
        assert_eq!(json_body(throttled).await, json!({}));
    }

    #[tokio::test]
    async fn enqueue_accepts_arrays_and_single_documents() {
        let state = engine(10, 1_000);

        let many = send(&state, Method::POST, "/entries.json", Some(articles(3))).await;
        assert_eq!(many.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(many).await["enqueued"], 3);

        let one = send(&state, Method::POST, "/entries.json", Some(json!({"urn": "x"}))).await;
        assert_eq!(json_body(one).await["enqueued"], 1);

        let stats = json_body(send(&state, Method::GET, "/stats.json", None).await).await;
        assert_eq!(stats["visible"], 4);
        assert_eq!(stats["enqueued"], 4);
    }

    #[rstest]
    #[case(Method::POST, "/")]
    #[case(Method::POST, "/notarealroute")]
    #[case(Method::POST, "/dequeue-entries")]
    #[case(Method::GET, "/dequeue-entries.json")]
    #[case(Method::DELETE, "/entries.json")]
    #[case(Method::PUT, "/entries.json")]
    #[case(Method::GET, "/entry/rcpt-01HQ")]
    #[case(Method::POST, "/stats.json")]
    #[tokio::test]
    async fn unhandled_requests_are_forbidden(#[case] method: Method, #[case] uri: &str) {
        let state = engine(10, 1_000);
        state.enqueue(articles(1).as_array().unwrap().clone());

        let response = send(&state, method, uri, None).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(state.stats().visible, 1);
    }

    #[rstest]
    #[case(DeleteOutcome::Deleted, StatusCode::NO_CONTENT)]
    #[case(DeleteOutcome::AlreadyDeleted, StatusCode::GONE)]
    #[case(DeleteOutcome::Expired, StatusCode::GONE)]
    #[case(DeleteOutcome::Unknown, StatusCode::NOT_FOUND)]
    fn delete_outcomes_map_to_status(#[case] outcome: DeleteOutcome, #[case] status: StatusCode) {
        assert_eq!(delete_status(outcome), status);
    }
}
