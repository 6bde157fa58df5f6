use sqlx::{sqlite::SqliteRow, Row};

use policydesk_core::domain::agent::{Agent, AgentId, AgentRole};

use super::{format_timestamp, parse_timestamp, write_error, AgentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAgentRepository {
    pool: DbPool,
}

impl SqlAgentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AgentRepository for SqlAgentRepository {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, username, email, role, created_at FROM agent WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(agent_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, username, email, role, created_at FROM agent ORDER BY username ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(agent_from_row).collect()
    }

    async fn save(&self, agent: Agent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agent (id, username, email, role, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                email = excluded.email,
                role = excluded.role",
        )
        .bind(&agent.id.0)
        .bind(&agent.username)
        .bind(agent.email.as_deref())
        .bind(agent.role.as_str())
        .bind(format_timestamp(&agent.created_at))
        .execute(&self.pool)
        .await
        .map_err(|error| write_error(error, || format!("username `{}` is taken", agent.username)))?;

        Ok(())
    }
}

fn agent_from_row(row: SqliteRow) -> Result<Agent, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = role_raw
        .parse::<AgentRole>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(Agent {
        id: AgentId(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        role,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
