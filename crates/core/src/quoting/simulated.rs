use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::InsurerConfig;
use crate::domain::customer::CustomerProfile;
use crate::domain::quote::PolicyType;
use crate::quoting::source::{QuoteSource, SourceResult};

/// Mock connector: waits a fixed latency, then prices the base premium
/// inside this insurer's band.
#[derive(Debug)]
pub struct SimulatedSource {
    company: String,
    latency: Duration,
    band: (f64, f64),
    failure_rate: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    pub fn new(company: impl Into<String>, latency: Duration, band: (f64, f64)) -> Self {
        Self {
            company: company.into(),
            latency,
            band,
            failure_rate: 0.0,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_config(insurer: &InsurerConfig, seed: Option<u64>) -> Self {
        let source = Self::new(
            insurer.company_name.clone(),
            Duration::from_millis(insurer.latency_ms),
            (insurer.band_low, insurer.band_high),
        )
        .with_failure_rate(insurer.failure_rate);

        match seed {
            Some(seed) => source.with_seed(seed),
            None => source,
        }
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn base_premium(policy_type: PolicyType) -> Decimal {
        match policy_type {
            PolicyType::Kasko => Decimal::new(5000, 0),
            PolicyType::Trafik | PolicyType::Dask => Decimal::new(1500, 0),
        }
    }

    /// Draws (fails, factor) while holding the lock; never across an await.
    fn draw(&self) -> (bool, f64) {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let fails = self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate);
        let (low, high) = self.band;
        (fails, rng.gen_range(low..=high))
    }
}

#[async_trait]
impl QuoteSource for SimulatedSource {
    fn company_name(&self) -> &str {
        &self.company
    }

    async fn quote(&self, _profile: &CustomerProfile, policy_type: PolicyType) -> SourceResult {
        tokio::time::sleep(self.latency).await;

        let (fails, factor) = self.draw();
        if fails {
            return SourceResult::failure(
                &self.company,
                format!("connection error or no quote available for {policy_type}"),
            );
        }

        let Some(multiplier) = Decimal::from_f64(1.0 + factor) else {
            return SourceResult::failure(&self.company, "pricing error: factor out of range");
        };
        let price = (Self::base_premium(policy_type) * multiplier).round_dp(2);
        debug!(
            event_name = "quoting.simulated.priced",
            company = %self.company,
            policy_type = %policy_type,
            price = %price,
            "simulated insurer priced request"
        );

        SourceResult::Success { company: self.company.clone(), price, policy_type }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use rust_decimal::Decimal;

    use super::SimulatedSource;
    use crate::domain::customer::CustomerProfile;
    use crate::domain::quote::PolicyType;
    use crate::quoting::source::{QuoteSource, SourceResult};

    fn profile() -> CustomerProfile {
        CustomerProfile {
            national_id: Some("12345678901".to_string()),
            name: "Ayşe Yılmaz".to_string(),
            email: None,
        }
    }

    #[tokio::test]
    async fn price_stays_inside_band() {
        let source = SimulatedSource::new("Allianz Sigorta", Duration::ZERO, (-0.1, 0.5)).with_seed(7);

        for _ in 0..50 {
            let price = source.quote(&profile(), PolicyType::Kasko).await.price().expect("priced");
            assert!(price >= Decimal::new(4500, 0), "{price} below band");
            assert!(price <= Decimal::new(7500, 0), "{price} above band");
            assert!(price.scale() <= 2);
        }
    }

    #[tokio::test]
    async fn non_kasko_products_use_lower_base() {
        let source = SimulatedSource::new("Doğa Sigorta", Duration::ZERO, (0.0, 0.0));

        let result = source.quote(&profile(), PolicyType::Dask).await;
        assert_eq!(result.price(), Some(Decimal::new(1500, 0)));
    }

    #[tokio::test]
    async fn same_seed_gives_same_prices() {
        let first = SimulatedSource::new("Türkiye Sigorta", Duration::ZERO, (0.1, 0.6)).with_seed(42);
        let second = SimulatedSource::new("Türkiye Sigorta", Duration::ZERO, (0.1, 0.6)).with_seed(42);

        for _ in 0..5 {
            assert_eq!(
                first.quote(&profile(), PolicyType::Trafik).await,
                second.quote(&profile(), PolicyType::Trafik).await
            );
        }
    }

    #[tokio::test]
    async fn certain_failure_is_reported_as_data() {
        let source =
            SimulatedSource::new("Doğa Sigorta", Duration::ZERO, (0.0, 0.1)).with_failure_rate(1.0);

        match source.quote(&profile(), PolicyType::Trafik).await {
            SourceResult::Failure { company, error_message } => {
                assert_eq!(company, "Doğa Sigorta");
                assert!(error_message.contains("Trafik"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn waits_configured_latency() {
        let source = SimulatedSource::new("Doğa Sigorta", Duration::from_millis(40), (0.0, 0.0));

        let started = Instant::now();
        source.quote(&profile(), PolicyType::Kasko).await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
