use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerProfile;
use crate::domain::quote::{PolicyType, QuoteRecord};

/// Outcome of one insurer call. A failure is data, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceResult {
    Success { company: String, price: Decimal, policy_type: PolicyType },
    Failure { company: String, error_message: String },
}

impl SourceResult {
    pub fn failure(company: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self::Failure { company: company.into(), error_message: error_message.into() }
    }

    pub fn company(&self) -> &str {
        match self {
            Self::Success { company, .. } | Self::Failure { company, .. } => company,
        }
    }

    pub fn price(&self) -> Option<Decimal> {
        match self {
            Self::Success { price, .. } => Some(*price),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_message, .. } => Some(error_message),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<&QuoteRecord> for SourceResult {
    fn from(record: &QuoteRecord) -> Self {
        match record.premium_amount {
            Some(price) => Self::Success {
                company: record.company_name.clone(),
                price,
                policy_type: record.policy_type,
            },
            None => Self::Failure {
                company: record.company_name.clone(),
                error_message: record.error_message.clone().unwrap_or_default(),
            },
        }
    }
}

/// One insurer connector. Implementations must not panic or return errors:
/// every problem is reported as [`SourceResult::Failure`].
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn company_name(&self) -> &str;

    async fn quote(&self, profile: &CustomerProfile, policy_type: PolicyType) -> SourceResult;
}
