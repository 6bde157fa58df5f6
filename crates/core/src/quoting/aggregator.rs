use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::QuotingConfig;
use crate::domain::customer::CustomerProfile;
use crate::domain::quote::PolicyType;
use crate::quoting::registry::SourceRegistry;
use crate::quoting::source::SourceResult;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no insurer sources are registered")]
    NoSourcesRegistered,
}

/// Fans one request out to every registered source and gathers all answers.
#[derive(Clone, Debug, Default)]
pub struct QuoteAggregator {
    per_source_timeout: Option<Duration>,
}

impl QuoteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &QuotingConfig) -> Self {
        Self { per_source_timeout: config.per_source_timeout_ms.map(Duration::from_millis) }
    }

    pub fn with_per_source_timeout(mut self, per_source_timeout: Option<Duration>) -> Self {
        self.per_source_timeout = per_source_timeout;
        self
    }

    /// Calls every source concurrently and returns one result per source, in
    /// registration order. Resolves only once every call has finished.
    pub async fn collect(
        &self,
        registry: &SourceRegistry,
        profile: &CustomerProfile,
        policy_type: PolicyType,
    ) -> Result<Vec<SourceResult>, AggregationError> {
        if registry.is_empty() {
            return Err(AggregationError::NoSourcesRegistered);
        }

        let started = Instant::now();
        let profile = Arc::new(profile.clone());
        let mut handles = Vec::with_capacity(registry.len());

        for source in registry.sources() {
            let source = Arc::clone(source);
            let profile = Arc::clone(&profile);
            let per_source_timeout = self.per_source_timeout;
            let company = source.company_name().to_string();

            let handle = tokio::spawn(async move {
                let call = source.quote(&profile, policy_type);
                match per_source_timeout {
                    Some(limit) => match timeout(limit, call).await {
                        Ok(result) => result,
                        Err(_) => SourceResult::failure(
                            source.company_name(),
                            format!("request timed out after {} ms", limit.as_millis()),
                        ),
                    },
                    None => call.await,
                }
            });

            handles.push((company, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (company, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(error) => SourceResult::failure(&company, format!("quote task failed: {error}")),
            };

            if let SourceResult::Failure { error_message, .. } = &result {
                warn!(
                    event_name = "quoting.source.failed",
                    company = %company,
                    policy_type = %policy_type,
                    error = %error_message,
                    "insurer returned no quote"
                );
            }
            results.push(result);
        }

        info!(
            event_name = "quoting.aggregation.completed",
            policy_type = %policy_type,
            sources = results.len(),
            succeeded = results.iter().filter(|result| result.is_success()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "quote aggregation completed"
        );

        Ok(results)
    }
}
