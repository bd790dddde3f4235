use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use client_core::{LabApi, PageFetcher, RecordFetcher};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::domain::{ContainerSummary, Entity, ProjectSummary, SampleSummary, WorkflowSummary};
use shared::error::{ApiError, ApiException, ErrorCode};
use shared::protocol::{PageEnvelope, PageQuery};
use tracing::debug;

/// HTTP implementation of the fetch contracts against the LIMS REST API:
/// `GET {base}/{kind}` serves pages, `GET {base}/{kind}/{id}` serves single
/// records. Filter keys map directly onto query parameters next to the
/// reserved `sort_by`, `order`, `offset`, and `limit`.
pub struct HttpApi {
    http: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn fetcher<T>(&self) -> Arc<HttpFetcher<T>>
    where
        T: Entity + DeserializeOwned,
    {
        Arc::new(HttpFetcher {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            _entity: PhantomData,
        })
    }
}

impl LabApi for HttpApi {
    fn container_pages(&self) -> Arc<dyn PageFetcher<ContainerSummary>> {
        self.fetcher()
    }

    fn container_records(&self) -> Arc<dyn RecordFetcher<ContainerSummary>> {
        self.fetcher()
    }

    fn sample_pages(&self) -> Arc<dyn PageFetcher<SampleSummary>> {
        self.fetcher()
    }

    fn sample_records(&self) -> Arc<dyn RecordFetcher<SampleSummary>> {
        self.fetcher()
    }

    fn workflow_pages(&self) -> Arc<dyn PageFetcher<WorkflowSummary>> {
        self.fetcher()
    }

    fn workflow_records(&self) -> Arc<dyn RecordFetcher<WorkflowSummary>> {
        self.fetcher()
    }

    fn project_pages(&self) -> Arc<dyn PageFetcher<ProjectSummary>> {
        self.fetcher()
    }

    fn project_records(&self) -> Arc<dyn RecordFetcher<ProjectSummary>> {
        self.fetcher()
    }
}

struct HttpFetcher<T> {
    http: Client,
    base_url: String,
    _entity: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T> PageFetcher<T> for HttpFetcher<T>
where
    T: Entity + DeserializeOwned,
{
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageEnvelope<T>, ApiException> {
        let url = format!("{}/{}", self.base_url, T::KIND);
        debug!(
            kind = T::KIND,
            offset = query.offset,
            limit = query.limit,
            "transport: page request"
        );
        let response = self
            .http
            .get(&url)
            .query(&query_params(query))
            .send()
            .await
            .map_err(transport_error)?;
        decode_or_error(response).await
    }
}

#[async_trait]
impl<T> RecordFetcher<T> for HttpFetcher<T>
where
    T: Entity + DeserializeOwned,
{
    async fn fetch_record(&self, id: T::Id) -> Result<T, ApiException> {
        let url = format!("{}/{}/{id}", self.base_url, T::KIND);
        debug!(kind = T::KIND, id = %id, "transport: record request");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;
        decode_or_error(response).await
    }
}

fn query_params(query: &PageQuery) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if let Some(sort_by) = &query.sort_by {
        params.push(("sort_by".to_string(), sort_by.clone()));
    }
    if let Some(order) = query.order {
        params.push(("order".to_string(), order.as_str().to_string()));
    }
    params.push(("offset".to_string(), query.offset.to_string()));
    params.push(("limit".to_string(), query.limit.to_string()));
    params
}

/// Decodes a success body, or maps a failure response onto the shared
/// error taxonomy. A JSON `ApiError` body wins over the status-derived
/// code so server-side messages survive the trip.
async fn decode_or_error<P: DeserializeOwned>(response: Response) -> Result<P, ApiException> {
    let status = response.status();
    if !status.is_success() {
        let fallback = code_for_status(status);
        let body = response.text().await.unwrap_or_default();
        if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
            return Err(error.into());
        }
        let message = if body.is_empty() {
            status.to_string()
        } else {
            body
        };
        return Err(ApiException::new(fallback, message));
    }
    response
        .json::<P>()
        .await
        .map_err(|err| ApiException::new(ErrorCode::Internal, format!("invalid response payload: {err}")))
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        status if status.is_server_error() => ErrorCode::Unavailable,
        _ => ErrorCode::Internal,
    }
}

fn transport_error(err: reqwest::Error) -> ApiException {
    ApiException::unavailable(format!("request failed: {err}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
