use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use policydesk_core::domain::customer::CustomerId;
use policydesk_core::domain::quote::{
    PolicyType, QuoteFilter, QuoteRecord, QuoteRecordId, QuoteRequest, RunId,
};
use policydesk_core::errors::ApplicationError;
use policydesk_db::QuoteRunOutcome;

use crate::api::{ActingAgent, ApiError, ApiState};

const NO_OFFERS_WARNING: &str = "no offers available: every insurer declined or failed";

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/v1/quotes", get(list_quotes).post(request_quotes))
        .route("/api/v1/quotes/{id}", get(get_quote))
        .route("/api/v1/quote-runs/{run_id}", get(get_run))
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteListQuery {
    pub customer: Option<String>,
    pub policy_type: Option<String>,
}

impl QuoteListQuery {
    fn into_filter(self) -> Result<QuoteFilter, ApplicationError> {
        let policy_type = self
            .policy_type
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.parse::<PolicyType>())
            .transpose()
            .map_err(|error| ApplicationError::InvalidRequest(error.to_string()))?;
        let customer_id = self
            .customer
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(CustomerId);

        Ok(QuoteFilter { customer_id, policy_type })
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteRunResponse {
    #[serde(flatten)]
    pub outcome: QuoteRunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

impl From<QuoteRunOutcome> for QuoteRunResponse {
    fn from(outcome: QuoteRunOutcome) -> Self {
        let warning = outcome.ranked.no_offers_available().then_some(NO_OFFERS_WARNING);
        Self { outcome, warning }
    }
}

async fn list_quotes(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Query(query): Query<QuoteListQuery>,
) -> Result<Json<Vec<QuoteRecord>>, ApiError> {
    let filter = query.into_filter().map_err(|error| actor.fail(error))?;
    let records = state
        .quotes
        .list(&actor.identity.list_scope(), &filter)
        .await
        .map_err(|error| actor.fail(error))?;
    Ok(Json(records))
}

async fn request_quotes(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Json(request): Json<QuoteRequest>,
) -> Result<(StatusCode, Json<QuoteRunResponse>), ApiError> {
    let outcome =
        state.quote_runs.run(&actor.identity, request).await.map_err(|error| actor.fail(error))?;

    info!(
        event_name = "api.quotes.requested",
        correlation_id = %actor.correlation_id,
        run_id = %outcome.run_id,
        offers = outcome.ranked.successes().count(),
        "quote run served"
    );
    Ok((StatusCode::CREATED, Json(QuoteRunResponse::from(outcome))))
}

async fn get_quote(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Path(id): Path<String>,
) -> Result<Json<QuoteRecord>, ApiError> {
    let record = state
        .quotes
        .find_by_id(&QuoteRecordId(id.clone()))
        .await
        .map_err(|error| actor.fail(error))?
        .ok_or_else(|| actor.fail(ApplicationError::NotFound(format!("quote `{id}`"))))?;

    if !actor.identity.list_scope().includes(record.issued_by_agent.as_ref()) {
        return Err(actor.fail(ApplicationError::Forbidden(format!("quote `{id}`"))));
    }
    Ok(Json(record))
}

async fn get_run(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Path(run_id): Path<String>,
) -> Result<Json<QuoteRunResponse>, ApiError> {
    let outcome = state
        .quote_runs
        .comparison(&actor.identity, &RunId(run_id.clone()))
        .await
        .map_err(|error| actor.fail(error))?
        .ok_or_else(|| actor.fail(ApplicationError::NotFound(format!("quote run `{run_id}`"))))?;
    Ok(Json(QuoteRunResponse::from(outcome)))
}
