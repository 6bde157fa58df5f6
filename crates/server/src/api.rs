use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use policydesk_core::access::{AgentIdentity, AgentOwnership};
use policydesk_core::domain::agent::AgentId;
use policydesk_core::errors::{ApplicationError, InterfaceError};
use policydesk_core::quoting::{QuoteAggregator, SourceRegistry};
use policydesk_db::repositories::{QuoteRepository, SqlCustomerRepository, SqlQuoteRepository};
use policydesk_db::{BackOfficeService, DbPool, QuoteRunService};

use crate::{backoffice, quotes};

pub const AGENT_HEADER: &str = "x-agent-id";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    pub backoffice: Arc<BackOfficeService>,
    pub quote_runs: Arc<QuoteRunService>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub lead_days: u32,
}

impl ApiState {
    pub fn sql(
        pool: DbPool,
        registry: SourceRegistry,
        aggregator: QuoteAggregator,
        lead_days: u32,
    ) -> Self {
        let quotes: Arc<dyn QuoteRepository> = Arc::new(SqlQuoteRepository::new(pool.clone()));
        let quote_runs = QuoteRunService::new(
            Arc::new(SqlCustomerRepository::new(pool.clone())),
            quotes.clone(),
            registry,
            aggregator,
            Arc::new(AgentOwnership),
        );

        Self {
            backoffice: Arc::new(BackOfficeService::sql(pool)),
            quote_runs: Arc::new(quote_runs),
            quotes,
            lead_days,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new().merge(quotes::routes()).merge(backoffice::routes()).with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'static str,
    detail: &'a str,
    correlation_id: &'a str,
}

/// Interface error rendered as a JSON problem body.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn new(error: impl Into<ApplicationError>, correlation_id: &str) -> Self {
        Self(error.into().into_interface(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            InterfaceError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            InterfaceError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        warn!(
            event_name = "api.request.failed",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "request failed"
        );

        let body = ErrorBody {
            error,
            message: self.0.user_message(),
            detail: self.0.message(),
            correlation_id: self.0.correlation_id(),
        };
        (status, Json(body)).into_response()
    }
}

/// The agent a request acts for, resolved from the `x-agent-id` header.
#[derive(Clone, Debug)]
pub struct ActingAgent {
    pub identity: AgentIdentity,
    pub correlation_id: String,
}

impl ActingAgent {
    pub fn fail(&self, error: impl Into<ApplicationError>) -> ApiError {
        ApiError::new(error, &self.correlation_id)
    }
}

impl FromRequestParts<ApiState> for ActingAgent {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(&parts.headers);
        let agent_id = parts
            .headers
            .get(AGENT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                ApiError::new(
                    ApplicationError::Forbidden(format!("missing `{AGENT_HEADER}` header")),
                    &correlation_id,
                )
            })?;

        let identity = match state.backoffice.identify(&AgentId(agent_id.to_string())).await {
            Ok(identity) => identity,
            Err(ApplicationError::NotFound(_)) => {
                return Err(ApiError::new(
                    ApplicationError::Forbidden(format!("unknown agent `{agent_id}`")),
                    &correlation_id,
                ));
            }
            Err(error) => return Err(ApiError::new(error, &correlation_id)),
        };

        Ok(Self { identity, correlation_id })
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use policydesk_core::quoting::{QuoteAggregator, SimulatedSource, SourceRegistry};
    use policydesk_db::{connect_with_settings, migrations, DbPool, DemoSeedDataset};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::api::{router, ApiState, AGENT_HEADER, CORRELATION_HEADER};

    pub async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("seed");
        pool
    }

    /// Three insurers with fixed prices: 20% off, 40% off and list price.
    pub fn fixed_registry() -> SourceRegistry {
        SourceRegistry::new()
            .with_source(Arc::new(SimulatedSource::new("Anadolu", Duration::ZERO, (-0.2, -0.2))))
            .with_source(Arc::new(SimulatedSource::new("Allianz", Duration::ZERO, (-0.4, -0.4))))
            .with_source(Arc::new(SimulatedSource::new("Axa", Duration::ZERO, (0.0, 0.0))))
    }

    pub async fn app() -> Router {
        let pool = seeded_pool().await;
        router(ApiState::sql(pool, fixed_registry(), QuoteAggregator::new(), 7))
    }

    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        agent: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = send_raw(app, method, uri, agent, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json response body")
        };
        (status, value)
    }

    pub async fn send_raw(
        app: &Router,
        method: Method,
        uri: &str,
        agent: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder =
            Request::builder().method(method).uri(uri).header(CORRELATION_HEADER, "test-req");
        if let Some(agent) = agent {
            builder = builder.header(AGENT_HEADER, agent);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = app.clone().oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
        (status, bytes.to_vec())
    }
}
