use std::sync::Arc;

use policydesk_core::access::{AgentIdentity, AgentOwnership};
use policydesk_core::config::AppConfig;
use policydesk_core::domain::agent::AgentId;
use policydesk_core::domain::customer::CustomerId;
use policydesk_core::domain::quote::QuoteRequest;
use policydesk_core::errors::ApplicationError;
use policydesk_core::quoting::{QuoteAggregator, SourceRegistry};
use policydesk_db::repositories::{
    AgentRepository, SqlAgentRepository, SqlCustomerRepository, SqlQuoteRepository,
};
use policydesk_db::{QuoteRunOutcome, QuoteRunService};

use crate::commands::{
    application_failure, build_runtime, load_config, open_database, CommandResult, StepError,
};

pub struct QuoteArgs {
    pub agent: String,
    pub customer: String,
    pub policy_type: String,
}

pub fn run(args: QuoteArgs) -> CommandResult {
    let config = match load_config("quote") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("quote") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(execute(&config, args)) {
        Ok(message) => CommandResult::success("quote", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("quote", error_class, message, exit_code)
        }
    }
}

async fn execute(config: &AppConfig, args: QuoteArgs) -> Result<String, StepError> {
    let registry = SourceRegistry::from_config(&config.quoting).map_err(application_failure)?;
    let pool = open_database(config).await?;

    let agent = SqlAgentRepository::new(pool.clone())
        .find_by_id(&AgentId(args.agent.clone()))
        .await
        .map_err(|error| application_failure(error.into()))?
        .ok_or_else(|| {
            application_failure(ApplicationError::NotFound(format!("agent `{}`", args.agent)))
        })?;

    let service = QuoteRunService::new(
        Arc::new(SqlCustomerRepository::new(pool.clone())),
        Arc::new(SqlQuoteRepository::new(pool.clone())),
        registry,
        QuoteAggregator::from_config(&config.quoting),
        Arc::new(AgentOwnership),
    );
    let request =
        QuoteRequest { customer_id: CustomerId(args.customer), policy_type: args.policy_type };

    let outcome = service
        .run(&AgentIdentity::from(&agent), request)
        .await
        .map_err(|error| application_failure(error.into()));
    pool.close().await;

    outcome.map(|outcome| render_outcome(&outcome))
}

/// One line per insurer in registration order, best offer marked.
fn render_outcome(outcome: &QuoteRunOutcome) -> String {
    let mut lines = vec![format!("run {}", outcome.run_id)];
    for offer in &outcome.ranked.offers {
        let line = match offer.result.price() {
            Some(price) if offer.is_best => format!("* {}: {price} (best offer)", offer.result.company()),
            Some(price) => format!("  {}: {price}", offer.result.company()),
            None => format!(
                "  {}: no quote ({})",
                offer.result.company(),
                offer.result.error_message().unwrap_or_default()
            ),
        };
        lines.push(line);
    }
    if outcome.ranked.no_offers_available() {
        lines.push("no offers available".to_string());
    }
    lines.join("\n")
}
