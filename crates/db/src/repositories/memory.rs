//! Lock-guarded stores for service tests that run without a database.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use policydesk_core::access::ListScope;
use policydesk_core::domain::customer::{Customer, CustomerId};
use policydesk_core::domain::quote::{QuoteFilter, QuoteRecord, QuoteRecordId, RunId};

use super::{CustomerRepository, QuoteRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

impl InMemoryCustomerRepository {
    fn national_id_taken(customers: &HashMap<String, Customer>, customer: &Customer) -> bool {
        match &customer.national_id {
            Some(national_id) => customers.values().any(|existing| {
                existing.id != customer.id && existing.national_id.as_ref() == Some(national_id)
            }),
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn list(&self, scope: &ListScope) -> Result<Vec<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        let mut listed: Vec<_> = customers
            .values()
            .filter(|customer| scope.includes(customer.agent_id.as_ref()))
            .cloned()
            .collect();
        listed.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
        });
        Ok(listed)
    }

    async fn count(&self, scope: &ListScope) -> Result<u64, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.values().filter(|customer| scope.includes(customer.agent_id.as_ref())).count()
            as u64)
    }

    async fn insert(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        if customers.contains_key(&customer.id.0) {
            return Err(RepositoryError::Conflict(format!("customer `{}` exists", customer.id)));
        }
        if Self::national_id_taken(&customers, &customer) {
            return Err(national_id_conflict(&customer));
        }
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }

    async fn update(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        if !customers.contains_key(&customer.id.0) {
            return Err(RepositoryError::NotFound(format!("customer `{}`", customer.id)));
        }
        if Self::national_id_taken(&customers, &customer) {
            return Err(national_id_conflict(&customer));
        }
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }
}

fn national_id_conflict(customer: &Customer) -> RepositoryError {
    RepositoryError::Conflict(format!(
        "national id `{}` is already registered",
        customer.national_id.as_deref().unwrap_or_default()
    ))
}

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    records: RwLock<Vec<QuoteRecord>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn record_run(&self, records: &[QuoteRecord]) -> Result<(), RepositoryError> {
        let mut stored = self.records.write().await;

        let mut slots: HashSet<(String, u32)> = stored
            .iter()
            .map(|record| (record.run_id.0.clone(), record.source_position))
            .collect();
        for record in records {
            if record.premium_amount.is_some() == record.error_message.is_some() {
                return Err(RepositoryError::Decode(format!(
                    "quote `{}` must carry exactly one of premium or error",
                    record.id.0
                )));
            }
            if !slots.insert((record.run_id.0.clone(), record.source_position)) {
                return Err(RepositoryError::Conflict(format!(
                    "run `{}` already has a record at position {}",
                    record.run_id, record.source_position
                )));
            }
        }

        stored.extend(records.iter().cloned());
        Ok(())
    }

    async fn find_by_id(&self, id: &QuoteRecordId) -> Result<Option<QuoteRecord>, RepositoryError> {
        let stored = self.records.read().await;
        Ok(stored.iter().find(|record| &record.id == id).cloned())
    }

    async fn list(
        &self,
        scope: &ListScope,
        filter: &QuoteFilter,
    ) -> Result<Vec<QuoteRecord>, RepositoryError> {
        let stored = self.records.read().await;
        let mut listed: Vec<_> = stored
            .iter()
            .filter(|record| scope.includes(record.issued_by_agent.as_ref()))
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        filter.ordering().sort(&mut listed);
        Ok(listed)
    }

    async fn list_run(&self, run_id: &RunId) -> Result<Vec<QuoteRecord>, RepositoryError> {
        let stored = self.records.read().await;
        let mut run: Vec<_> = stored.iter().filter(|record| &record.run_id == run_id).cloned().collect();
        run.sort_by_key(|record| record.source_position);
        Ok(run)
    }
}
