use sqlx::{sqlite::SqliteRow, Row};

use policydesk_core::access::ListScope;
use policydesk_core::domain::agent::AgentId;
use policydesk_core::domain::customer::CustomerId;
use policydesk_core::domain::quote::{
    PolicyType, QuoteFilter, QuoteOrdering, QuoteRecord, QuoteRecordId, RunId,
};

use super::{
    format_timestamp, parse_decimal, parse_timestamp, write_error, QuoteRepository,
    RepositoryError,
};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, run_id, source_position, company_name, policy_type,
    premium_amount, error_message, issued_by_agent, customer_id, created_at";

const PRICE_FIRST: &str = "premium_amount IS NULL, CAST(premium_amount AS REAL) ASC,
    created_at DESC, source_position ASC";
const RECENCY_FIRST: &str = "created_at DESC, premium_amount IS NULL,
    CAST(premium_amount AS REAL) ASC, source_position ASC";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn record_run(&self, records: &[QuoteRecord]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                "INSERT INTO insurer_quote (
                    id, run_id, source_position, company_name, policy_type,
                    premium_amount, error_message, issued_by_agent, customer_id, created_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.id.0)
            .bind(&record.run_id.0)
            .bind(i64::from(record.source_position))
            .bind(&record.company_name)
            .bind(record.policy_type.as_str())
            .bind(record.premium_amount.map(|premium| premium.to_string()))
            .bind(record.error_message.as_deref())
            .bind(record.issued_by_agent.as_ref().map(|agent_id| agent_id.0.as_str()))
            .bind(record.customer_id.as_ref().map(|customer_id| customer_id.0.as_str()))
            .bind(format_timestamp(&record.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|error| {
                write_error(error, || {
                    format!(
                        "run `{}` already has a record at position {}",
                        record.run_id, record.source_position
                    )
                })
            })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &QuoteRecordId) -> Result<Option<QuoteRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM insurer_quote WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(quote_from_row).transpose()
    }

    async fn list(
        &self,
        scope: &ListScope,
        filter: &QuoteFilter,
    ) -> Result<Vec<QuoteRecord>, RepositoryError> {
        let order_by = match filter.ordering() {
            QuoteOrdering::PriceFirst => PRICE_FIRST,
            QuoteOrdering::RecencyFirst => RECENCY_FIRST,
        };
        let agent_id = scope.agent_id().map(|agent_id| agent_id.0.as_str());
        let customer_id = filter.customer_id.as_ref().map(|customer_id| customer_id.0.as_str());
        let policy_type = filter.policy_type.map(|policy_type| policy_type.as_str());

        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM insurer_quote
             WHERE (? IS NULL OR issued_by_agent = ?)
               AND (? IS NULL OR customer_id = ?)
               AND (? IS NULL OR policy_type = ?)
             ORDER BY {order_by}"
        ))
        .bind(agent_id)
        .bind(agent_id)
        .bind(customer_id)
        .bind(customer_id)
        .bind(policy_type)
        .bind(policy_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(quote_from_row).collect()
    }

    async fn list_run(&self, run_id: &RunId) -> Result<Vec<QuoteRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM insurer_quote
             WHERE run_id = ?
             ORDER BY source_position ASC"
        ))
        .bind(&run_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(quote_from_row).collect()
    }
}

fn quote_from_row(row: SqliteRow) -> Result<QuoteRecord, RepositoryError> {
    let policy_type = row
        .try_get::<String, _>("policy_type")?
        .parse::<PolicyType>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let source_position = row.try_get::<i64, _>("source_position")?;
    let source_position = u32::try_from(source_position).map_err(|_| {
        RepositoryError::Decode(format!("invalid source position: {source_position}"))
    })?;
    let premium_amount = row
        .try_get::<Option<String>, _>("premium_amount")?
        .map(|premium| parse_decimal("premium_amount", premium))
        .transpose()?;

    Ok(QuoteRecord {
        id: QuoteRecordId(row.try_get("id")?),
        run_id: RunId(row.try_get("run_id")?),
        source_position,
        company_name: row.try_get("company_name")?,
        policy_type,
        premium_amount,
        error_message: row.try_get("error_message")?,
        issued_by_agent: row.try_get::<Option<String>, _>("issued_by_agent")?.map(AgentId),
        customer_id: row.try_get::<Option<String>, _>("customer_id")?.map(CustomerId),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
