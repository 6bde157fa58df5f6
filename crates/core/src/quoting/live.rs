use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::InsurerConfig;
use crate::domain::customer::CustomerProfile;
use crate::domain::quote::PolicyType;
use crate::quoting::source::{QuoteSource, SourceResult};

/// HTTP connector for an insurer pricing endpoint.
#[derive(Clone, Debug)]
pub struct LiveSource {
    company: String,
    endpoint: String,
    api_key: SecretString,
    client: Client,
}

#[derive(Debug, Serialize)]
struct PricingRequest<'a> {
    national_id: Option<&'a str>,
    name: &'a str,
    email: Option<&'a str>,
    product_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct PricingResponse {
    premium: Decimal,
}

impl LiveSource {
    pub fn new(
        company: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: SecretString,
        client: Client,
    ) -> Self {
        Self { company: company.into(), endpoint: endpoint.into(), api_key, client }
    }

    /// Returns `None` when the insurer has no endpoint or key configured.
    pub fn from_config(insurer: &InsurerConfig, client: Client) -> Option<Self> {
        let endpoint = insurer.endpoint.clone()?;
        let api_key = insurer.api_key.clone()?;
        Some(Self::new(insurer.company_name.clone(), endpoint, api_key, client))
    }

    async fn request_premium(
        &self,
        profile: &CustomerProfile,
        policy_type: PolicyType,
    ) -> Result<Decimal, String> {
        let body = PricingRequest {
            national_id: profile.national_id.as_deref(),
            name: &profile.name,
            email: profile.email.as_deref(),
            product_code: policy_type.as_str(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| error.to_string())?;

        if !response.status().is_success() {
            return Err(format!("insurer returned {}", response.status()));
        }

        let pricing: PricingResponse = response
            .json()
            .await
            .map_err(|error| format!("invalid response body: {error}"))?;
        if pricing.premium.is_sign_negative() {
            return Err(format!("insurer returned negative premium {}", pricing.premium));
        }
        Ok(pricing.premium.round_dp(2))
    }
}

#[async_trait]
impl QuoteSource for LiveSource {
    fn company_name(&self) -> &str {
        &self.company
    }

    async fn quote(&self, profile: &CustomerProfile, policy_type: PolicyType) -> SourceResult {
        match self.request_premium(profile, policy_type).await {
            Ok(price) => SourceResult::Success { company: self.company.clone(), price, policy_type },
            Err(error) => {
                warn!(
                    event_name = "quoting.live.request_failed",
                    company = %self.company,
                    error = %error,
                    "insurer pricing request failed"
                );
                SourceResult::failure(&self.company, format!("API connection error: {error}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::LiveSource;
    use crate::domain::customer::CustomerProfile;
    use crate::domain::quote::PolicyType;
    use crate::quoting::source::{QuoteSource, SourceResult};

    fn profile() -> CustomerProfile {
        CustomerProfile {
            national_id: Some("12345678901".to_string()),
            name: "Mehmet Demir".to_string(),
            email: Some("mehmet@example.com".to_string()),
        }
    }

    fn source(server: &MockServer) -> LiveSource {
        LiveSource::new(
            "Allianz Sigorta",
            format!("{}/v1/price", server.uri()),
            "test-key".to_string().into(),
            Client::new(),
        )
    }

    #[tokio::test]
    async fn posts_profile_and_reads_premium() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/price"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(json!({
                "national_id": "12345678901",
                "name": "Mehmet Demir",
                "email": "mehmet@example.com",
                "product_code": "Kasko"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "premium": "5321.40" })))
            .expect(1)
            .mount(&server)
            .await;

        let result = source(&server).quote(&profile(), PolicyType::Kasko).await;

        assert_eq!(
            result,
            SourceResult::Success {
                company: "Allianz Sigorta".to_string(),
                price: Decimal::new(532_140, 2),
                policy_type: PolicyType::Kasko,
            }
        );
    }

    #[tokio::test]
    async fn http_error_becomes_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = source(&server).quote(&profile(), PolicyType::Trafik).await;

        let message = result.error_message().expect("failure").to_string();
        assert!(message.starts_with("API connection error"), "{message}");
        assert!(message.contains("503"), "{message}");
    }

    #[tokio::test]
    async fn malformed_body_becomes_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "price": 10 })))
            .mount(&server)
            .await;

        let result = source(&server).quote(&profile(), PolicyType::Dask).await;

        assert!(!result.is_success());
        assert!(result.error_message().is_some_and(|m| m.contains("invalid response body")));
    }

    #[tokio::test]
    async fn unreachable_endpoint_becomes_failure() {
        let source = LiveSource::new(
            "Doğa Sigorta",
            "http://127.0.0.1:9/v1/price",
            "test-key".to_string().into(),
            Client::new(),
        );

        let result = source.quote(&profile(), PolicyType::Kasko).await;
        assert_eq!(result.company(), "Doğa Sigorta");
        assert!(!result.is_success());
    }
}
