use std::sync::Arc;

use reqwest::Client;

use crate::config::{QuotingConfig, QuotingMode};
use crate::errors::ApplicationError;
use crate::quoting::live::LiveSource;
use crate::quoting::simulated::SimulatedSource;
use crate::quoting::source::QuoteSource;

/// Ordered set of insurer connectors. Registration order is the order
/// results are reported and ties are broken in.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn QuoteSource>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sources.iter().map(|source| source.company_name())).finish()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.register(source);
        self
    }

    pub fn register(&mut self, source: Arc<dyn QuoteSource>) {
        self.sources.push(source);
    }

    pub fn from_config(config: &QuotingConfig) -> Result<Self, ApplicationError> {
        let mut registry = Self::new();
        let client = Client::new();

        for (index, insurer) in config.insurers.iter().enumerate() {
            let source: Arc<dyn QuoteSource> = match config.mode {
                QuotingMode::Simulated => {
                    // Each connector gets its own stream so sources stay independent.
                    let seed = config.seed.map(|seed| seed.wrapping_add(index as u64));
                    Arc::new(SimulatedSource::from_config(insurer, seed))
                }
                QuotingMode::Live => {
                    let live = LiveSource::from_config(insurer, client.clone()).ok_or_else(|| {
                        ApplicationError::Configuration(format!(
                            "insurer `{}` is missing an endpoint or api key for live quoting",
                            insurer.code
                        ))
                    })?;
                    Arc::new(live)
                }
            };
            registry.register(source);
        }

        Ok(registry)
    }

    pub fn sources(&self) -> &[Arc<dyn QuoteSource>] {
        &self.sources
    }

    pub fn company_names(&self) -> Vec<String> {
        self.sources.iter().map(|source| source.company_name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SourceRegistry;
    use crate::config::{default_insurers, QuotingConfig, QuotingMode};
    use crate::errors::ApplicationError;

    #[test]
    fn simulated_registry_follows_configured_order() {
        let config = QuotingConfig {
            mode: QuotingMode::Simulated,
            per_source_timeout_ms: None,
            seed: Some(1),
            insurers: default_insurers(),
        };

        let registry = SourceRegistry::from_config(&config).expect("registry");

        assert_eq!(
            registry.company_names(),
            vec!["Doğa Sigorta", "Allianz Sigorta", "Türkiye Sigorta"]
        );
    }

    #[test]
    fn live_registry_requires_endpoints() {
        let config = QuotingConfig {
            mode: QuotingMode::Live,
            per_source_timeout_ms: None,
            seed: None,
            insurers: default_insurers(),
        };

        let error = SourceRegistry::from_config(&config).expect_err("missing endpoints");
        assert!(matches!(error, ApplicationError::Configuration(message) if message.contains("doga")));
    }
}
