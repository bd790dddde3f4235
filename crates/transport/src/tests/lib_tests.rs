use super::*;

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode as AxumStatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use shared::domain::{SampleId, SampleStatus, SampleSummary};
use shared::protocol::SortOrder;
use tokio::{net::TcpListener, sync::oneshot, sync::Mutex};
use uuid::Uuid;

fn sample(id: i64, name: &str) -> SampleSummary {
    SampleSummary {
        sample_id: SampleId(id),
        specimen_uuid: Uuid::nil(),
        name: name.to_string(),
        status: SampleStatus::Registered,
        container_id: None,
        project_id: None,
        updated_at: Utc::now(),
    }
}

#[derive(Clone)]
struct CaptureState {
    tx: Arc<Mutex<Option<oneshot::Sender<HashMap<String, String>>>>>,
}

async fn handle_list_samples(
    State(state): State<CaptureState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<PageEnvelope<SampleSummary>> {
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(params);
    }
    Json(PageEnvelope {
        results: vec![sample(1, "plasma aliquot")],
        count: 1,
    })
}

async fn spawn_capture_server() -> Result<(String, oneshot::Receiver<HashMap<String, String>>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();
    let state = CaptureState {
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/samples", get(handle_list_samples))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), rx))
}

fn page_query() -> PageQuery {
    let mut filters = BTreeMap::new();
    filters.insert("status".to_string(), "registered".to_string());
    PageQuery {
        filters,
        sort_by: Some("name".to_string()),
        order: Some(SortOrder::Desc),
        offset: 25,
        limit: 25,
    }
}

#[tokio::test]
async fn page_request_carries_query_parameters() {
    let (server_url, params_rx) = spawn_capture_server().await.expect("spawn server");
    let api = HttpApi::new(server_url);

    let envelope = api
        .sample_pages()
        .fetch_page(&page_query())
        .await
        .expect("page fetch succeeds");
    assert_eq!(envelope.count, 1);
    assert_eq!(envelope.results[0].name, "plasma aliquot");

    let params = params_rx.await.expect("server captured params");
    assert_eq!(params.get("status").map(String::as_str), Some("registered"));
    assert_eq!(params.get("sort_by").map(String::as_str), Some("name"));
    assert_eq!(params.get("order").map(String::as_str), Some("desc"));
    assert_eq!(params.get("offset").map(String::as_str), Some("25"));
    assert_eq!(params.get("limit").map(String::as_str), Some("25"));
}

async fn handle_rejected_filter() -> (AxumStatusCode, Json<ApiError>) {
    (
        AxumStatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiError::new(ErrorCode::Validation, "unknown filter: barcode")),
    )
}

async fn handle_backend_down() -> (AxumStatusCode, String) {
    (AxumStatusCode::INTERNAL_SERVER_ERROR, "overloaded".to_string())
}

async fn handle_get_sample(Path(id): Path<i64>) -> Json<SampleSummary> {
    Json(sample(id, "single record"))
}

async fn spawn_plain_server(app: Router) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn api_error_body_wins_over_status_mapping() {
    let app = Router::new().route("/samples", get(handle_rejected_filter));
    let server_url = spawn_plain_server(app).await.expect("spawn server");
    let api = HttpApi::new(server_url);

    let err = api
        .sample_pages()
        .fetch_page(&page_query())
        .await
        .expect_err("fetch must fail");
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(err.message, "unknown filter: barcode");
}

#[tokio::test]
async fn server_errors_map_to_unavailable() {
    let app = Router::new().route("/samples", get(handle_backend_down));
    let server_url = spawn_plain_server(app).await.expect("spawn server");
    let api = HttpApi::new(server_url);

    let err = api
        .sample_pages()
        .fetch_page(&page_query())
        .await
        .expect_err("fetch must fail");
    assert_eq!(err.code, ErrorCode::Unavailable);
    assert_eq!(err.message, "overloaded");
}

#[tokio::test]
async fn record_request_uses_id_path() {
    let app = Router::new().route("/samples/:id", get(handle_get_sample));
    let server_url = spawn_plain_server(app).await.expect("spawn server");
    let api = HttpApi::new(server_url);

    let record = api
        .sample_records()
        .fetch_record(SampleId(7))
        .await
        .expect("record fetch succeeds");
    assert_eq!(record.sample_id, SampleId(7));
    assert_eq!(record.name, "single record");
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let (server_url, _params_rx) = spawn_capture_server().await.expect("spawn server");
    let api = HttpApi::new(format!("{server_url}/"));

    let envelope = api
        .sample_pages()
        .fetch_page(&page_query())
        .await
        .expect("page fetch succeeds");
    assert_eq!(envelope.count, 1);
}
