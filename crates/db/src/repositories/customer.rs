use sqlx::{sqlite::SqliteRow, Row};

use policydesk_core::access::ListScope;
use policydesk_core::domain::agent::AgentId;
use policydesk_core::domain::customer::{Address, Customer, CustomerId, CustomerType};

use super::{
    format_timestamp, parse_optional_date, parse_timestamp, parse_u64, write_error,
    CustomerRepository, RepositoryError,
};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "id, name, national_id, customer_type, phone, email, street, city,
    state, zipcode, date_of_birth, agent_id, created_at, updated_at";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(customer_from_row).transpose()
    }

    async fn list(&self, scope: &ListScope) -> Result<Vec<Customer>, RepositoryError> {
        let rows = match scope.agent_id() {
            Some(agent_id) => {
                sqlx::query(&format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customer
                     WHERE agent_id = ?
                     ORDER BY created_at DESC, id DESC"
                ))
                .bind(&agent_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customer ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(customer_from_row).collect()
    }

    async fn count(&self, scope: &ListScope) -> Result<u64, RepositoryError> {
        let count: i64 = match scope.agent_id() {
            Some(agent_id) => {
                sqlx::query_scalar("SELECT COUNT(1) FROM customer WHERE agent_id = ?")
                    .bind(&agent_id.0)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => sqlx::query_scalar("SELECT COUNT(1) FROM customer").fetch_one(&self.pool).await?,
        };
        parse_u64("count", count)
    }

    async fn insert(&self, customer: Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customer (
                id, name, national_id, customer_type, phone, email, street, city,
                state, zipcode, date_of_birth, agent_id, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&customer.id.0)
        .bind(&customer.name)
        .bind(customer.national_id.as_deref())
        .bind(customer.customer_type.as_str())
        .bind(customer.phone.as_deref())
        .bind(customer.email.as_deref())
        .bind(customer.address.street.as_deref())
        .bind(customer.address.city.as_deref())
        .bind(customer.address.state.as_deref())
        .bind(customer.address.zipcode.as_deref())
        .bind(customer.date_of_birth.map(|date| date.to_string()))
        .bind(customer.agent_id.as_ref().map(|agent_id| agent_id.0.as_str()))
        .bind(format_timestamp(&customer.created_at))
        .bind(format_timestamp(&customer.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|error| write_error(error, || national_id_conflict(&customer)))?;

        Ok(())
    }

    async fn update(&self, customer: Customer) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE customer SET
                name = ?, national_id = ?, customer_type = ?, phone = ?, email = ?,
                street = ?, city = ?, state = ?, zipcode = ?, date_of_birth = ?,
                agent_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&customer.name)
        .bind(customer.national_id.as_deref())
        .bind(customer.customer_type.as_str())
        .bind(customer.phone.as_deref())
        .bind(customer.email.as_deref())
        .bind(customer.address.street.as_deref())
        .bind(customer.address.city.as_deref())
        .bind(customer.address.state.as_deref())
        .bind(customer.address.zipcode.as_deref())
        .bind(customer.date_of_birth.map(|date| date.to_string()))
        .bind(customer.agent_id.as_ref().map(|agent_id| agent_id.0.as_str()))
        .bind(format_timestamp(&customer.updated_at))
        .bind(&customer.id.0)
        .execute(&self.pool)
        .await
        .map_err(|error| write_error(error, || national_id_conflict(&customer)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("customer `{}`", customer.id)));
        }
        Ok(())
    }
}

fn national_id_conflict(customer: &Customer) -> String {
    format!(
        "national id `{}` is already registered",
        customer.national_id.as_deref().unwrap_or_default()
    )
}

fn customer_from_row(row: SqliteRow) -> Result<Customer, RepositoryError> {
    let type_raw = row.try_get::<String, _>("customer_type")?;
    let customer_type = type_raw
        .parse::<CustomerType>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        name: row.try_get("name")?,
        national_id: row.try_get("national_id")?,
        customer_type,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: Address {
            street: row.try_get("street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zipcode: row.try_get("zipcode")?,
        },
        date_of_birth: parse_optional_date("date_of_birth", row.try_get("date_of_birth")?)?,
        agent_id: row.try_get::<Option<String>, _>("agent_id")?.map(AgentId),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};

    use policydesk_core::access::ListScope;
    use policydesk_core::domain::agent::AgentId;
    use policydesk_core::domain::customer::{Address, Customer, CustomerId, CustomerType};

    use super::SqlCustomerRepository;
    use crate::fixtures::DemoSeedDataset;
    use crate::repositories::{CustomerRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("seed agents");
        pool
    }

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("timestamp").with_timezone(&Utc)
    }

    fn customer(id: &str, national_id: Option<&str>, agent: &str) -> Customer {
        Customer {
            id: CustomerId(id.to_string()),
            name: "Selin Arslan".to_string(),
            national_id: national_id.map(str::to_string),
            customer_type: CustomerType::Individual,
            phone: Some("+90 555 000 0000".to_string()),
            email: Some("selin@example.com".to_string()),
            address: Address {
                street: Some("İstiklal Cd. 1".to_string()),
                city: Some("İstanbul".to_string()),
                state: Some("Beyoğlu".to_string()),
                zipcode: None,
            },
            date_of_birth: NaiveDate::from_ymd_opt(1992, 7, 3),
            agent_id: Some(AgentId(agent.to_string())),
            created_at: ts("2026-10-18T10:00:00Z"),
            updated_at: ts("2026-10-18T10:00:00Z"),
        }
    }

    #[tokio::test]
    async fn sql_customer_repo_round_trip() {
        let repo = SqlCustomerRepository::new(setup_pool().await);
        let selin = customer("CUS-T1", Some("11122233344"), "AGT-elif");

        repo.insert(selin.clone()).await.expect("insert customer");

        assert_eq!(repo.find_by_id(&selin.id).await.expect("find"), Some(selin));
    }

    #[tokio::test]
    async fn listing_is_scoped_to_owning_agent() {
        let repo = SqlCustomerRepository::new(setup_pool().await);
        let elif = ListScope::Agent(AgentId("AGT-elif".to_string()));

        let names: Vec<_> =
            repo.list(&elif).await.expect("list").into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Demir Lojistik A.Ş.", "Ayşe Yılmaz"]);
        assert_eq!(repo.count(&elif).await.expect("count"), 2);
        assert_eq!(repo.count(&ListScope::All).await.expect("count all"), 4);
    }

    #[tokio::test]
    async fn duplicate_national_id_is_a_conflict() {
        let repo = SqlCustomerRepository::new(setup_pool().await);

        let error = repo
            .insert(customer("CUS-T2", Some("12345678901"), "AGT-mert"))
            .await
            .expect_err("national id already seeded");
        assert!(matches!(error, RepositoryError::Conflict(message) if message.contains("12345678901")));
    }

    #[tokio::test]
    async fn customers_without_national_id_do_not_collide() {
        let repo = SqlCustomerRepository::new(setup_pool().await);

        repo.insert(customer("CUS-T3", None, "AGT-mert")).await.expect("first");
        repo.insert(customer("CUS-T4", None, "AGT-mert")).await.expect("second");
    }

    #[tokio::test]
    async fn update_rewrites_fields() {
        let repo = SqlCustomerRepository::new(setup_pool().await);
        let mut selin = customer("CUS-T5", None, "AGT-elif");
        repo.insert(selin.clone()).await.expect("insert");

        selin.phone = None;
        selin.customer_type = CustomerType::Corporate;
        selin.updated_at = ts("2026-10-19T10:00:00Z");
        repo.update(selin.clone()).await.expect("update");

        assert_eq!(repo.find_by_id(&selin.id).await.expect("find"), Some(selin));
    }
}
