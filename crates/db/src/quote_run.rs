use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use policydesk_core::access::{AgentIdentity, OwnershipPolicy};
use policydesk_core::domain::quote::{PolicyType, QuoteRecord, QuoteRecordId, QuoteRequest, RunId};
use policydesk_core::quoting::{
    rank_offers, QuoteAggregator, QuoteRunError, RankedOffers, RequestRejection, SourceRegistry,
    SourceResult,
};

use crate::repositories::{CustomerRepository, QuoteRepository, RepositoryError};

/// Everything one aggregation run produced: the persisted rows and the ranked
/// comparison built from them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteRunOutcome {
    pub run_id: RunId,
    pub records: Vec<QuoteRecord>,
    pub ranked: RankedOffers,
}

impl QuoteRunOutcome {
    pub fn best_record(&self) -> Option<&QuoteRecord> {
        self.ranked.best_index.and_then(|index| self.records.get(index))
    }
}

pub struct QuoteRunService {
    customers: Arc<dyn CustomerRepository>,
    quotes: Arc<dyn QuoteRepository>,
    registry: SourceRegistry,
    aggregator: QuoteAggregator,
    ownership: Arc<dyn OwnershipPolicy>,
}

impl QuoteRunService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        quotes: Arc<dyn QuoteRepository>,
        registry: SourceRegistry,
        aggregator: QuoteAggregator,
        ownership: Arc<dyn OwnershipPolicy>,
    ) -> Self {
        Self { customers, quotes, registry, aggregator, ownership }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Validates and authorizes the request, asks every insurer, then stores
    /// one row per insurer in a single transaction. A rejected request calls
    /// no insurer and stores nothing.
    pub async fn run(
        &self,
        actor: &AgentIdentity,
        request: QuoteRequest,
    ) -> Result<QuoteRunOutcome, QuoteRunError> {
        let policy_type =
            request.policy_type.parse::<PolicyType>().map_err(RequestRejection::from)?;

        let customer = self
            .customers
            .find_by_id(&request.customer_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| RequestRejection::UnknownCustomer(request.customer_id.0.clone()))?;

        if !self.ownership.may_access_customer(actor, &customer) {
            warn!(
                event_name = "quoting.request.forbidden",
                agent_id = %actor.agent_id,
                customer_id = %customer.id,
                "agent requested quotes for a customer they do not own"
            );
            return Err(RequestRejection::CustomerNotOwned(customer.id.0.clone()).into());
        }

        let run_id = RunId::generate();
        info!(
            event_name = "quoting.run.started",
            run_id = %run_id,
            customer_id = %customer.id,
            agent_id = %actor.agent_id,
            policy_type = %policy_type,
            sources = self.registry.len(),
            "quote run started"
        );

        let results = self
            .aggregator
            .collect(&self.registry, &customer.profile(), policy_type)
            .await
            .map_err(RequestRejection::from)?;

        let created_at = Utc::now();
        let records: Vec<QuoteRecord> = results
            .iter()
            .enumerate()
            .map(|(position, result)| QuoteRecord {
                id: QuoteRecordId::generate(),
                run_id: run_id.clone(),
                source_position: position as u32,
                company_name: result.company().to_string(),
                policy_type,
                premium_amount: result.price(),
                error_message: result.error_message().map(str::to_string),
                issued_by_agent: Some(actor.agent_id.clone()),
                customer_id: Some(customer.id.clone()),
                created_at,
            })
            .collect();

        self.quotes.record_run(&records).await.map_err(|error| {
            warn!(
                event_name = "quoting.run.persist_failed",
                run_id = %run_id,
                error = %error,
                "quote run could not be saved"
            );
            persistence(error)
        })?;

        let ranked = rank_offers(results);
        info!(
            event_name = "quoting.run.completed",
            run_id = %run_id,
            customer_id = %customer.id,
            persisted = records.len(),
            best_price = ?ranked.best_price(),
            no_offers_available = ranked.no_offers_available(),
            "quote run saved"
        );

        Ok(QuoteRunOutcome { run_id, records, ranked })
    }

    /// Rebuilds the ranked comparison of a stored run. `None` when the run
    /// does not exist or was issued by another agent.
    pub async fn comparison(
        &self,
        actor: &AgentIdentity,
        run_id: &RunId,
    ) -> Result<Option<QuoteRunOutcome>, QuoteRunError> {
        let records = self.quotes.list_run(run_id).await.map_err(persistence)?;
        if records.is_empty() {
            return Ok(None);
        }
        let visible = actor.list_scope();
        if !records.iter().all(|record| visible.includes(record.issued_by_agent.as_ref())) {
            return Ok(None);
        }

        let ranked = rank_offers(records.iter().map(SourceResult::from).collect());
        Ok(Some(QuoteRunOutcome { run_id: run_id.clone(), records, ranked }))
    }
}

fn persistence(error: RepositoryError) -> QuoteRunError {
    QuoteRunError::Persistence(error.to_string())
}
