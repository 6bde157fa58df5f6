use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row};

use policydesk_core::access::ListScope;
use policydesk_core::domain::agent::AgentId;
use policydesk_core::domain::customer::CustomerId;
use policydesk_core::domain::policy::{Policy, PolicyId, PolicyStatus};

use super::{
    format_timestamp, parse_date, parse_decimal, parse_timestamp, parse_u64, write_error,
    PolicyRepository, RepositoryError,
};
use crate::DbPool;

const POLICY_COLUMNS: &str = "id, policy_number, policy_type, customer_id, start_date, end_date,
    premium_amount, status, document, issued_by_agent, created_at";

pub struct SqlPolicyRepository {
    pool: DbPool,
}

impl SqlPolicyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PolicyRepository for SqlPolicyRepository {
    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {POLICY_COLUMNS} FROM policy WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(policy_from_row).transpose()
    }

    async fn list(&self, scope: &ListScope) -> Result<Vec<Policy>, RepositoryError> {
        let rows = match scope.agent_id() {
            Some(agent_id) => {
                sqlx::query(&format!(
                    "SELECT {POLICY_COLUMNS} FROM policy
                     WHERE issued_by_agent = ?
                     ORDER BY created_at DESC, id DESC"
                ))
                .bind(&agent_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {POLICY_COLUMNS} FROM policy ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(policy_from_row).collect()
    }

    async fn count(&self, scope: &ListScope) -> Result<u64, RepositoryError> {
        let count: i64 = match scope.agent_id() {
            Some(agent_id) => {
                sqlx::query_scalar("SELECT COUNT(1) FROM policy WHERE issued_by_agent = ?")
                    .bind(&agent_id.0)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => sqlx::query_scalar("SELECT COUNT(1) FROM policy").fetch_one(&self.pool).await?,
        };
        parse_u64("count", count)
    }

    async fn insert(&self, policy: Policy) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO policy (
                id, policy_number, policy_type, customer_id, start_date, end_date,
                premium_amount, status, document, issued_by_agent, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&policy.id.0)
        .bind(&policy.policy_number)
        .bind(&policy.policy_type)
        .bind(&policy.customer_id.0)
        .bind(policy.start_date.to_string())
        .bind(policy.end_date.to_string())
        .bind(policy.premium_amount.to_string())
        .bind(policy.status.as_str())
        .bind(policy.document.as_deref())
        .bind(policy.issued_by_agent.as_ref().map(|agent_id| agent_id.0.as_str()))
        .bind(format_timestamp(&policy.created_at))
        .execute(&self.pool)
        .await
        .map_err(|error| write_error(error, || policy_number_conflict(&policy)))?;

        Ok(())
    }

    async fn update(&self, policy: Policy) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE policy SET
                policy_number = ?, policy_type = ?, customer_id = ?, start_date = ?,
                end_date = ?, premium_amount = ?, status = ?, document = ?
             WHERE id = ?",
        )
        .bind(&policy.policy_number)
        .bind(&policy.policy_type)
        .bind(&policy.customer_id.0)
        .bind(policy.start_date.to_string())
        .bind(policy.end_date.to_string())
        .bind(policy.premium_amount.to_string())
        .bind(policy.status.as_str())
        .bind(policy.document.as_deref())
        .bind(&policy.id.0)
        .execute(&self.pool)
        .await
        .map_err(|error| write_error(error, || policy_number_conflict(&policy)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("policy `{}`", policy.id)));
        }
        Ok(())
    }

    async fn clear_document(&self, id: &PolicyId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE policy SET document = NULL WHERE id = ? AND document IS NOT NULL")
                .bind(&id.0)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_active_ending_between(
        &self,
        scope: &ListScope,
        from: NaiveDate,
        to: NaiveDate,
        limit: Option<u32>,
    ) -> Result<Vec<Policy>, RepositoryError> {
        // SQLite treats a negative LIMIT as no limit.
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            "SELECT {POLICY_COLUMNS} FROM policy
             WHERE status = 'active'
               AND end_date BETWEEN ? AND ?
               AND (? IS NULL OR issued_by_agent = ?)
             ORDER BY end_date ASC, policy_number ASC
             LIMIT ?"
        ))
        .bind(from.to_string())
        .bind(to.to_string())
        .bind(scope.agent_id().map(|agent_id| agent_id.0.as_str()))
        .bind(scope.agent_id().map(|agent_id| agent_id.0.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(policy_from_row).collect()
    }
}

fn policy_number_conflict(policy: &Policy) -> String {
    format!("policy number `{}` is already registered", policy.policy_number)
}

fn policy_from_row(row: SqliteRow) -> Result<Policy, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = status_raw
        .parse::<PolicyStatus>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(Policy {
        id: PolicyId(row.try_get("id")?),
        policy_number: row.try_get("policy_number")?,
        policy_type: row.try_get("policy_type")?,
        customer_id: CustomerId(row.try_get("customer_id")?),
        start_date: parse_date("start_date", row.try_get("start_date")?)?,
        end_date: parse_date("end_date", row.try_get("end_date")?)?,
        premium_amount: parse_decimal("premium_amount", row.try_get("premium_amount")?)?,
        status,
        document: row.try_get("document")?,
        issued_by_agent: row.try_get::<Option<String>, _>("issued_by_agent")?.map(AgentId),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
