use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use policydesk_core::documents::{extract_policy_from_filename, ExtractedPolicy};
use policydesk_core::domain::customer::{Customer, CustomerId};
use policydesk_core::domain::policy::{Policy, PolicyId};
use policydesk_core::errors::ApplicationError;
use policydesk_db::{CustomerDraft, Dashboard, DocumentRemoval, PolicyDraft};

use crate::api::{ActingAgent, ApiError, ApiState};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/customers", get(list_customers).post(create_customer))
        .route("/api/v1/customers/{id}", get(get_customer).put(update_customer))
        .route("/api/v1/policies", get(list_policies).post(create_policy))
        .route("/api/v1/policies/{id}", get(get_policy).put(update_policy))
        .route("/api/v1/policies/{id}/document", delete(remove_document))
        .route("/api/v1/documents/analyze", post(analyze_document))
        .route("/api/v1/exports/customers.csv", get(export_customers))
        .route("/api/v1/exports/policies.csv", get(export_policies))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentRemovalResponse {
    pub policy_id: PolicyId,
    pub outcome: DocumentRemoval,
}

async fn dashboard(
    State(state): State<ApiState>,
    actor: ActingAgent,
) -> Result<Json<Dashboard>, ApiError> {
    let today = Utc::now().date_naive();
    let dashboard = state
        .backoffice
        .dashboard(&actor.identity, today, state.lead_days)
        .await
        .map_err(|error| actor.fail(error))?;
    Ok(Json(dashboard))
}

async fn list_customers(
    State(state): State<ApiState>,
    actor: ActingAgent,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers =
        state.backoffice.list_customers(&actor.identity).await.map_err(|error| actor.fail(error))?;
    Ok(Json(customers))
}

async fn create_customer(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Json(draft): Json<CustomerDraft>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state
        .backoffice
        .create_customer(&actor.identity, draft)
        .await
        .map_err(|error| actor.fail(error))?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn get_customer(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state
        .backoffice
        .customer(&actor.identity, &CustomerId(id))
        .await
        .map_err(|error| actor.fail(error))?;
    Ok(Json(customer))
}

async fn update_customer(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Path(id): Path<String>,
    Json(draft): Json<CustomerDraft>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state
        .backoffice
        .update_customer(&actor.identity, &CustomerId(id), draft)
        .await
        .map_err(|error| actor.fail(error))?;
    Ok(Json(customer))
}

async fn list_policies(
    State(state): State<ApiState>,
    actor: ActingAgent,
) -> Result<Json<Vec<Policy>>, ApiError> {
    let policies =
        state.backoffice.list_policies(&actor.identity).await.map_err(|error| actor.fail(error))?;
    Ok(Json(policies))
}

async fn create_policy(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Json(draft): Json<PolicyDraft>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    let policy = state
        .backoffice
        .create_policy(&actor.identity, draft)
        .await
        .map_err(|error| actor.fail(error))?;
    Ok((StatusCode::CREATED, Json(policy)))
}

async fn get_policy(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Path(id): Path<String>,
) -> Result<Json<Policy>, ApiError> {
    let policy = state
        .backoffice
        .policy(&actor.identity, &PolicyId(id))
        .await
        .map_err(|error| actor.fail(error))?;
    Ok(Json(policy))
}

async fn update_policy(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Path(id): Path<String>,
    Json(draft): Json<PolicyDraft>,
) -> Result<Json<Policy>, ApiError> {
    let policy = state
        .backoffice
        .update_policy(&actor.identity, &PolicyId(id), draft)
        .await
        .map_err(|error| actor.fail(error))?;
    Ok(Json(policy))
}

async fn remove_document(
    State(state): State<ApiState>,
    actor: ActingAgent,
    Path(id): Path<String>,
) -> Result<Json<DocumentRemovalResponse>, ApiError> {
    let policy_id = PolicyId(id);
    let outcome = state
        .backoffice
        .remove_document(&actor.identity, &policy_id)
        .await
        .map_err(|error| actor.fail(error))?;

    info!(
        event_name = "api.policy.document_removed",
        correlation_id = %actor.correlation_id,
        policy_id = %policy_id,
        outcome = ?outcome,
        "policy document removal handled"
    );
    Ok(Json(DocumentRemovalResponse { policy_id, outcome }))
}

async fn analyze_document(
    actor: ActingAgent,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ExtractedPolicy>, ApiError> {
    let filename = request.filename.trim();
    if filename.is_empty() {
        return Err(actor.fail(ApplicationError::InvalidRequest("filename is required".to_string())));
    }
    Ok(Json(extract_policy_from_filename(filename, Utc::now().date_naive())))
}

async fn export_customers(
    State(state): State<ApiState>,
    actor: ActingAgent,
) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .backoffice
        .export_customers_csv(&actor.identity)
        .await
        .map_err(|error| actor.fail(error))?;
    Ok(csv_attachment("customers.csv", body))
}

async fn export_policies(
    State(state): State<ApiState>,
    actor: ActingAgent,
) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .backoffice
        .export_policies_csv(&actor.identity)
        .await
        .map_err(|error| actor.fail(error))?;
    Ok(csv_attachment("policies.csv", body))
}

fn csv_attachment(filename: &'static str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
}
