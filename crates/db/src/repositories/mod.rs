use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use policydesk_core::access::ListScope;
use policydesk_core::domain::agent::{Agent, AgentId};
use policydesk_core::domain::customer::{Customer, CustomerId};
use policydesk_core::domain::policy::{Policy, PolicyId};
use policydesk_core::domain::quote::{QuoteFilter, QuoteRecord, QuoteRecordId, RunId};
use policydesk_core::errors::ApplicationError;

pub mod agent;
pub mod customer;
pub mod memory;
pub mod policy;
pub mod quote;

pub use agent::SqlAgentRepository;
pub use customer::SqlCustomerRepository;
pub use memory::{InMemoryCustomerRepository, InMemoryQuoteRepository};
pub use policy::SqlPolicyRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::NotFound(message) => Self::NotFound(message),
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Agent>, RepositoryError>;
    async fn save(&self, agent: Agent) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    /// Newest first.
    async fn list(&self, scope: &ListScope) -> Result<Vec<Customer>, RepositoryError>;
    async fn count(&self, scope: &ListScope) -> Result<u64, RepositoryError>;
    async fn insert(&self, customer: Customer) -> Result<(), RepositoryError>;
    async fn update(&self, customer: Customer) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError>;
    /// Newest first.
    async fn list(&self, scope: &ListScope) -> Result<Vec<Policy>, RepositoryError>;
    async fn count(&self, scope: &ListScope) -> Result<u64, RepositoryError>;
    async fn insert(&self, policy: Policy) -> Result<(), RepositoryError>;
    async fn update(&self, policy: Policy) -> Result<(), RepositoryError>;
    /// Returns `false` when the policy had no document attached.
    async fn clear_document(&self, id: &PolicyId) -> Result<bool, RepositoryError>;
    /// Active policies ending within `[from, to]`, soonest first.
    async fn list_active_ending_between(
        &self,
        scope: &ListScope,
        from: NaiveDate,
        to: NaiveDate,
        limit: Option<u32>,
    ) -> Result<Vec<Policy>, RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Writes every record of one run atomically: all rows or none.
    async fn record_run(&self, records: &[QuoteRecord]) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &QuoteRecordId) -> Result<Option<QuoteRecord>, RepositoryError>;
    async fn list(
        &self,
        scope: &ListScope,
        filter: &QuoteFilter,
    ) -> Result<Vec<QuoteRecord>, RepositoryError>;
    /// Records of one run in source registration order.
    async fn list_run(&self, run_id: &RunId) -> Result<Vec<QuoteRecord>, RepositoryError>;
}

pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_date(column: &str, value: String) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| {
        RepositoryError::Decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_optional_date(
    column: &str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, RepositoryError> {
    value.map(|date| parse_date(column, date)).transpose()
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    value.parse::<Decimal>().map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_u64(column: &str, value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative integer): {value}"
        ))
    })
}

/// Turns unique-constraint violations into [`RepositoryError::Conflict`].
pub(crate) fn write_error(error: sqlx::Error, conflict: impl FnOnce() -> String) -> RepositoryError {
    let unique_violation =
        error.as_database_error().map(|db_error| db_error.is_unique_violation()).unwrap_or(false);
    if unique_violation {
        RepositoryError::Conflict(conflict())
    } else {
        RepositoryError::Database(error)
    }
}
