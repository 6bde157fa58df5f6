use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_AGENT_IDS: &[&str] = &["AGT-admin", "AGT-elif", "AGT-mert"];
const SEED_CUSTOMER_IDS: &[&str] =
    &["CUS-seed-ayse", "CUS-seed-demir", "CUS-seed-can", "CUS-seed-zeynep"];
const SEED_POLICY_IDS: &[&str] =
    &["POL-seed-ksk", "POL-seed-trf", "POL-seed-dask", "POL-seed-konut"];

/// Demo agents, customers and policies for local runs and end-to-end tests.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Loads the dataset. Existing rows with the same ids are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            agents: SEED_AGENT_IDS.len(),
            customers: SEED_CUSTOMER_IDS.len(),
            policies: SEED_POLICY_IDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (label, table, ids) in [
            ("seed-agents", "agent", SEED_AGENT_IDS),
            ("seed-customers", "customer", SEED_CUSTOMER_IDS),
            ("seed-policies", "policy", SEED_POLICY_IDS),
        ] {
            let quoted = sql_array_from_ids(ids);
            let present: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table} WHERE id IN {quoted}"))
                    .fetch_one(pool)
                    .await?;
            checks.push((label, present == ids.len() as i64));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_policies = sql_array_from_ids(SEED_POLICY_IDS);
        let quoted_customers = sql_array_from_ids(SEED_CUSTOMER_IDS);
        let quoted_agents = sql_array_from_ids(SEED_AGENT_IDS);

        sqlx::query(&format!("DELETE FROM policy WHERE id IN {quoted_policies}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM customer WHERE id IN {quoted_customers}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM agent WHERE id IN {quoted_agents}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub agents: usize,
    pub customers: usize,
    pub policies: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
