use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use policydesk_core::access::{AgentIdentity, AgentOwnership, ListScope, OwnershipPolicy};
use policydesk_core::domain::agent::AgentId;
use policydesk_core::domain::customer::{Address, Customer, CustomerId, CustomerType};
use policydesk_core::domain::policy::{Policy, PolicyId, PolicyStatus};
use policydesk_core::errors::ApplicationError;
use policydesk_core::expiry::{notice_date, ExpiryNotice, MAX_LEAD_DAYS};
use policydesk_core::export::{customers_csv, policies_csv, AgentDirectory};

use crate::repositories::{
    AgentRepository, CustomerRepository, PolicyRepository, SqlAgentRepository,
    SqlCustomerRepository, SqlPolicyRepository,
};
use crate::DbPool;

const DASHBOARD_EXPIRING_LIMIT: u32 = 5;

/// Editable customer fields. Ownership and timestamps are set by the service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDraft {
    pub name: String,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub customer_type: CustomerType,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub policy_number: String,
    pub policy_type: String,
    pub customer_id: CustomerId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium_amount: Decimal,
    #[serde(default)]
    pub status: PolicyStatus,
    #[serde(default)]
    pub document: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentRemoval {
    Removed,
    NothingAttached,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub customer_count: u64,
    pub policy_count: u64,
    pub expiring_policies: Vec<Policy>,
}

/// Customer and policy management on behalf of an agent.
pub struct BackOfficeService {
    agents: Arc<dyn AgentRepository>,
    customers: Arc<dyn CustomerRepository>,
    policies: Arc<dyn PolicyRepository>,
    ownership: Arc<dyn OwnershipPolicy>,
}

impl BackOfficeService {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        customers: Arc<dyn CustomerRepository>,
        policies: Arc<dyn PolicyRepository>,
        ownership: Arc<dyn OwnershipPolicy>,
    ) -> Self {
        Self { agents, customers, policies, ownership }
    }

    pub fn sql(pool: DbPool) -> Self {
        Self::new(
            Arc::new(SqlAgentRepository::new(pool.clone())),
            Arc::new(SqlCustomerRepository::new(pool.clone())),
            Arc::new(SqlPolicyRepository::new(pool)),
            Arc::new(AgentOwnership),
        )
    }

    pub async fn identify(&self, agent_id: &AgentId) -> Result<AgentIdentity, ApplicationError> {
        let agent = self
            .agents
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("agent `{agent_id}`")))?;
        Ok(AgentIdentity::from(&agent))
    }

    pub async fn dashboard(
        &self,
        actor: &AgentIdentity,
        today: NaiveDate,
        lead_days: u32,
    ) -> Result<Dashboard, ApplicationError> {
        let until = due_date(today, lead_days)?;
        let scope = actor.list_scope();
        let customer_count = self.customers.count(&scope).await?;
        let policy_count = self.policies.count(&scope).await?;
        let expiring_policies = self
            .policies
            .list_active_ending_between(
                &scope,
                today,
                until,
                Some(DASHBOARD_EXPIRING_LIMIT),
            )
            .await?;

        Ok(Dashboard { customer_count, policy_count, expiring_policies })
    }

    pub async fn list_customers(&self, actor: &AgentIdentity) -> Result<Vec<Customer>, ApplicationError> {
        Ok(self.customers.list(&actor.list_scope()).await?)
    }

    pub async fn customer(
        &self,
        actor: &AgentIdentity,
        id: &CustomerId,
    ) -> Result<Customer, ApplicationError> {
        let customer = self
            .customers
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("customer `{id}`")))?;
        if !self.ownership.may_access_customer(actor, &customer) {
            return Err(ApplicationError::Forbidden(format!("customer `{id}`")));
        }
        Ok(customer)
    }

    /// The new customer is assigned to the creating agent.
    pub async fn create_customer(
        &self,
        actor: &AgentIdentity,
        draft: CustomerDraft,
    ) -> Result<Customer, ApplicationError> {
        let now = Utc::now();
        let customer = apply_customer_draft(
            Customer {
                id: CustomerId::generate(),
                name: String::new(),
                national_id: None,
                customer_type: CustomerType::default(),
                phone: None,
                email: None,
                address: Address::default(),
                date_of_birth: None,
                agent_id: Some(actor.agent_id.clone()),
                created_at: now,
                updated_at: now,
            },
            draft,
        )?;

        self.customers.insert(customer.clone()).await?;
        info!(
            event_name = "backoffice.customer.created",
            customer_id = %customer.id,
            agent_id = %actor.agent_id,
            "customer created"
        );
        Ok(customer)
    }

    pub async fn update_customer(
        &self,
        actor: &AgentIdentity,
        id: &CustomerId,
        draft: CustomerDraft,
    ) -> Result<Customer, ApplicationError> {
        let mut customer = apply_customer_draft(self.customer(actor, id).await?, draft)?;
        customer.updated_at = Utc::now();

        self.customers.update(customer.clone()).await?;
        Ok(customer)
    }

    pub async fn list_policies(&self, actor: &AgentIdentity) -> Result<Vec<Policy>, ApplicationError> {
        Ok(self.policies.list(&actor.list_scope()).await?)
    }

    pub async fn policy(
        &self,
        actor: &AgentIdentity,
        id: &PolicyId,
    ) -> Result<Policy, ApplicationError> {
        let policy = self
            .policies
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("policy `{id}`")))?;
        if !self.ownership.may_access_policy(actor, &policy) {
            return Err(ApplicationError::Forbidden(format!("policy `{id}`")));
        }
        Ok(policy)
    }

    /// The policy is issued by the acting agent for one of their customers.
    pub async fn create_policy(
        &self,
        actor: &AgentIdentity,
        draft: PolicyDraft,
    ) -> Result<Policy, ApplicationError> {
        self.customer(actor, &draft.customer_id).await?;

        let policy = Policy {
            id: PolicyId::generate(),
            policy_number: draft.policy_number.trim().to_string(),
            policy_type: draft.policy_type.trim().to_string(),
            customer_id: draft.customer_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            premium_amount: draft.premium_amount,
            status: draft.status,
            document: draft.document,
            issued_by_agent: Some(actor.agent_id.clone()),
            created_at: Utc::now(),
        };
        policy.validate()?;

        self.policies.insert(policy.clone()).await?;
        info!(
            event_name = "backoffice.policy.created",
            policy_id = %policy.id,
            customer_id = %policy.customer_id,
            agent_id = %actor.agent_id,
            "policy created"
        );
        Ok(policy)
    }

    pub async fn update_policy(
        &self,
        actor: &AgentIdentity,
        id: &PolicyId,
        draft: PolicyDraft,
    ) -> Result<Policy, ApplicationError> {
        let current = self.policy(actor, id).await?;
        if draft.customer_id != current.customer_id {
            self.customer(actor, &draft.customer_id).await?;
        }

        let policy = Policy {
            policy_number: draft.policy_number.trim().to_string(),
            policy_type: draft.policy_type.trim().to_string(),
            customer_id: draft.customer_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            premium_amount: draft.premium_amount,
            status: draft.status,
            document: draft.document.or(current.document.clone()),
            ..current
        };
        policy.validate()?;

        self.policies.update(policy.clone()).await?;
        Ok(policy)
    }

    pub async fn remove_document(
        &self,
        actor: &AgentIdentity,
        id: &PolicyId,
    ) -> Result<DocumentRemoval, ApplicationError> {
        self.policy(actor, id).await?;

        let removed = self.policies.clear_document(id).await?;
        Ok(if removed { DocumentRemoval::Removed } else { DocumentRemoval::NothingAttached })
    }

    pub async fn export_customers_csv(&self, actor: &AgentIdentity) -> Result<String, ApplicationError> {
        let customers = self.customers.list(&actor.list_scope()).await?;
        let agents = AgentDirectory::new(&self.agents.list().await?);

        customers_csv(&customers, &agents)
            .map_err(|error| ApplicationError::Integration(error.to_string()))
    }

    pub async fn export_policies_csv(&self, actor: &AgentIdentity) -> Result<String, ApplicationError> {
        let policies = self.policies.list(&actor.list_scope()).await?;
        let agents = AgentDirectory::new(&self.agents.list().await?);
        let mut customers = HashMap::new();
        for policy in &policies {
            if customers.contains_key(&policy.customer_id) {
                continue;
            }
            if let Some(customer) = self.customers.find_by_id(&policy.customer_id).await? {
                customers.insert(customer.id.clone(), customer);
            }
        }

        policies_csv(&policies, &customers, &agents)
            .map_err(|error| ApplicationError::Integration(error.to_string()))
    }

    /// One notice per active policy ending exactly `lead_days` after `today`,
    /// across all agents. Policy status is left untouched.
    pub async fn expiry_notices(
        &self,
        today: NaiveDate,
        lead_days: u32,
    ) -> Result<Vec<ExpiryNotice>, ApplicationError> {
        let due = due_date(today, lead_days)?;
        let ending = self
            .policies
            .list_active_ending_between(&ListScope::All, due, due, None)
            .await?;

        let mut notices = Vec::with_capacity(ending.len());
        for policy in &ending {
            let Some(customer) = self.customers.find_by_id(&policy.customer_id).await? else {
                continue;
            };
            let agent = match &policy.issued_by_agent {
                Some(agent_id) => self.agents.find_by_id(agent_id).await?,
                None => None,
            };

            let notice = ExpiryNotice::new(policy, &customer, agent.as_ref());
            info!(
                event_name = "expiry.notice",
                policy_number = %notice.policy_number,
                end_date = %notice.end_date,
                days_left = policy.days_until_expiry(today),
                "{}",
                notice.summary()
            );
            notices.push(notice);
        }

        Ok(notices)
    }
}

fn apply_customer_draft(
    mut customer: Customer,
    draft: CustomerDraft,
) -> Result<Customer, ApplicationError> {
    customer.name = draft.name;
    customer.national_id = draft.national_id;
    customer.customer_type = draft.customer_type;
    customer.phone = draft.phone;
    customer.email = draft.email;
    customer.address = draft.address;
    customer.date_of_birth = draft.date_of_birth;

    let customer = customer.normalized();
    customer.validate()?;
    Ok(customer)
}

fn due_date(today: NaiveDate, lead_days: u32) -> Result<NaiveDate, ApplicationError> {
    notice_date(today, lead_days).ok_or_else(|| {
        ApplicationError::InvalidRequest(format!(
            "lead days must be in range 0..={MAX_LEAD_DAYS}, got {lead_days}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use policydesk_core::access::AgentIdentity;
    use policydesk_core::domain::agent::{AgentId, AgentRole};
    use policydesk_core::domain::customer::CustomerId;
    use policydesk_core::domain::policy::{PolicyId, PolicyStatus};
    use policydesk_core::errors::{ApplicationError, DomainError};

    use super::{BackOfficeService, CustomerDraft, DocumentRemoval, PolicyDraft};
    use crate::fixtures::DemoSeedDataset;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("seed");
        pool
    }

    fn agent(id: &str) -> AgentIdentity {
        AgentIdentity::new(AgentId(id.to_string()), AgentRole::Agent)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn policy_draft(number: &str, customer: &str, end: NaiveDate) -> PolicyDraft {
        PolicyDraft {
            policy_number: number.to_string(),
            policy_type: "Kasko".to_string(),
            customer_id: CustomerId(customer.to_string()),
            start_date: date(2026, 1, 1),
            end_date: end,
            premium_amount: Decimal::new(750_050, 2),
            status: PolicyStatus::Active,
            document: None,
        }
    }

    #[tokio::test]
    async fn identify_resolves_role_from_the_agent_table() {
        let service = BackOfficeService::sql(setup_pool().await);

        let admin = service.identify(&AgentId("AGT-admin".to_string())).await.expect("admin");
        assert!(admin.is_admin());
        let missing = service.identify(&AgentId("AGT-nobody".to_string())).await;
        assert!(matches!(missing, Err(ApplicationError::NotFound(_))));
    }

    #[tokio::test]
    async fn created_customer_belongs_to_the_creating_agent() {
        let service = BackOfficeService::sql(setup_pool().await);
        let mert = agent("AGT-mert");

        let created = service
            .create_customer(
                &mert,
                CustomerDraft {
                    name: "  Selin Arslan ".to_string(),
                    national_id: Some("".to_string()),
                    ..CustomerDraft::default()
                },
            )
            .await
            .expect("create");

        assert_eq!(created.name, "Selin Arslan");
        assert_eq!(created.national_id, None);
        assert_eq!(created.agent_id, Some(AgentId("AGT-mert".to_string())));
        assert_eq!(service.list_customers(&mert).await.expect("list").len(), 3);
    }

    #[tokio::test]
    async fn duplicate_national_id_surfaces_as_conflict() {
        let service = BackOfficeService::sql(setup_pool().await);

        let result = service
            .create_customer(
                &agent("AGT-mert"),
                CustomerDraft {
                    name: "Ayşe Y.".to_string(),
                    national_id: Some("12345678901".to_string()),
                    ..CustomerDraft::default()
                },
            )
            .await;

        assert!(matches!(result, Err(ApplicationError::Conflict(_))));
    }

    #[tokio::test]
    async fn agents_cannot_read_or_edit_other_agents_records() {
        let service = BackOfficeService::sql(setup_pool().await);
        let elif = agent("AGT-elif");

        let customer = service.customer(&elif, &CustomerId("CUS-seed-can".to_string())).await;
        assert!(matches!(customer, Err(ApplicationError::Forbidden(_))));

        let policy = service.policy(&elif, &PolicyId("POL-seed-dask".to_string())).await;
        assert!(matches!(policy, Err(ApplicationError::Forbidden(_))));

        let created = service
            .create_policy(&elif, policy_draft("KSK-X1", "CUS-seed-can", date(2027, 1, 1)))
            .await;
        assert!(matches!(created, Err(ApplicationError::Forbidden(_))));
    }

    #[tokio::test]
    async fn policy_end_date_must_follow_start_date() {
        let service = BackOfficeService::sql(setup_pool().await);

        let result = service
            .create_policy(
                &agent("AGT-elif"),
                policy_draft("KSK-X2", "CUS-seed-ayse", date(2025, 12, 31)),
            )
            .await;

        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::InvalidPolicyPeriod { .. }))
        ));
    }

    #[tokio::test]
    async fn document_removal_reports_missing_document() {
        let service = BackOfficeService::sql(setup_pool().await);
        let elif = agent("AGT-elif");
        let id = PolicyId("POL-seed-ksk".to_string());

        assert_eq!(
            service.remove_document(&elif, &id).await.expect("remove"),
            DocumentRemoval::Removed
        );
        assert_eq!(
            service.remove_document(&elif, &id).await.expect("remove again"),
            DocumentRemoval::NothingAttached
        );
    }

    #[tokio::test]
    async fn dashboard_counts_are_scoped_and_lists_soonest_expiry() {
        let service = BackOfficeService::sql(setup_pool().await);
        let elif = agent("AGT-elif");
        let today = date(2026, 10, 19);
        service
            .create_policy(&elif, policy_draft("KSK-D1", "CUS-seed-ayse", date(2026, 10, 24)))
            .await
            .expect("create");
        service
            .create_policy(&elif, policy_draft("KSK-D2", "CUS-seed-demir", date(2026, 10, 20)))
            .await
            .expect("create");

        let dashboard = service.dashboard(&elif, today, 7).await.expect("dashboard");

        assert_eq!(dashboard.customer_count, 2);
        assert_eq!(dashboard.policy_count, 4);
        let numbers: Vec<_> =
            dashboard.expiring_policies.iter().map(|p| p.policy_number.as_str()).collect();
        assert_eq!(numbers, vec!["KSK-D2", "KSK-D1"]);
    }

    #[tokio::test]
    async fn expiry_notices_match_the_exact_lead_day() {
        let service = BackOfficeService::sql(setup_pool().await);
        let elif = agent("AGT-elif");
        service
            .create_policy(&elif, policy_draft("KSK-E1", "CUS-seed-ayse", date(2026, 10, 26)))
            .await
            .expect("create");
        service
            .create_policy(&elif, policy_draft("KSK-E2", "CUS-seed-ayse", date(2026, 10, 27)))
            .await
            .expect("create");

        let notices = service.expiry_notices(date(2026, 10, 19), 7).await.expect("notices");

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].policy_number, "KSK-E1");
        assert_eq!(notices[0].customer_email.as_deref(), Some("ayse.yilmaz@example.com"));
        assert_eq!(notices[0].agent_email.as_deref(), Some("elif@policydesk.example"));
    }

    #[tokio::test]
    async fn out_of_range_lead_days_are_rejected_not_panicking() {
        let service = BackOfficeService::sql(setup_pool().await);
        let today = date(2026, 10, 19);

        let notices = service.expiry_notices(today, u32::MAX).await;
        assert!(matches!(notices, Err(ApplicationError::InvalidRequest(_))));

        let dashboard = service.dashboard(&agent("AGT-elif"), today, 366).await;
        assert!(matches!(dashboard, Err(ApplicationError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn exports_only_contain_the_agents_records() {
        let service = BackOfficeService::sql(setup_pool().await);
        let mert = agent("AGT-mert");

        let customers = service.export_customers_csv(&mert).await.expect("customers csv");
        assert!(customers.starts_with("name,national_id,customer_type,email,phone,address,agent\n"));
        assert!(customers.contains("Can Öztürk"));
        assert!(!customers.contains("Ayşe Yılmaz"));

        let policies = service.export_policies_csv(&mert).await.expect("policies csv");
        assert!(policies.contains("DASK-2025-0003"));
        assert!(policies.contains("Zeynep Kaya"));
        assert!(!policies.contains("KSK-2026-0001"));
    }
}
