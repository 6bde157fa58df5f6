use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::customer::CustomerId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteRecordId(pub String);

impl QuoteRecordId {
    pub fn generate() -> Self {
        Self(format!("QTE-{}", &Uuid::new_v4().simple().to_string()[..12]))
    }
}

/// Identifies one aggregation run; every record written by the run shares it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        Self(format!("RUN-{}", Uuid::new_v4().simple()))
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Product lines the insurer connectors can price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyType {
    Kasko,
    Trafik,
    #[serde(rename = "DASK")]
    Dask,
}

impl PolicyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kasko => "Kasko",
            Self::Trafik => "Trafik",
            Self::Dask => "DASK",
        }
    }
}

impl std::fmt::Display for PolicyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown policy type `{0}` (expected Kasko|Trafik|DASK)")]
pub struct UnknownPolicyType(pub String);

impl std::str::FromStr for PolicyType {
    type Err = UnknownPolicyType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kasko" => Ok(Self::Kasko),
            "trafik" => Ok(Self::Trafik),
            "dask" => Ok(Self::Dask),
            _ => Err(UnknownPolicyType(value.to_string())),
        }
    }
}

/// Unit of work submitted to an aggregation run. The policy type is kept raw
/// so that an unknown type is rejected by the run itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub customer_id: CustomerId,
    pub policy_type: String,
}

/// One insurer's answer within one run, as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub id: QuoteRecordId,
    pub run_id: RunId,
    pub source_position: u32,
    pub company_name: String,
    pub policy_type: PolicyType,
    pub premium_amount: Option<Decimal>,
    pub error_message: Option<String>,
    pub issued_by_agent: Option<AgentId>,
    pub customer_id: Option<CustomerId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteFilter {
    pub customer_id: Option<CustomerId>,
    pub policy_type: Option<PolicyType>,
}

impl QuoteFilter {
    pub fn is_active(&self) -> bool {
        self.customer_id.is_some() || self.policy_type.is_some()
    }

    pub fn matches(&self, record: &QuoteRecord) -> bool {
        let customer_ok = match &self.customer_id {
            Some(customer_id) => record.customer_id.as_ref() == Some(customer_id),
            None => true,
        };
        let type_ok = self.policy_type.map(|t| t == record.policy_type).unwrap_or(true);
        customer_ok && type_ok
    }

    pub fn ordering(&self) -> QuoteOrdering {
        if self.is_active() {
            QuoteOrdering::PriceFirst
        } else {
            QuoteOrdering::RecencyFirst
        }
    }
}

/// Sort order of a quote listing. A filtered listing is a comparison, so the
/// cheapest offer leads; an unfiltered listing is a history, so the newest
/// leads. Declined quotes (no premium) always sort after priced ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteOrdering {
    PriceFirst,
    RecencyFirst,
}

impl QuoteOrdering {
    pub fn compare(&self, left: &QuoteRecord, right: &QuoteRecord) -> Ordering {
        let by_price = compare_premium(left.premium_amount, right.premium_amount);
        let by_recency = right.created_at.cmp(&left.created_at);
        let by_position = left.source_position.cmp(&right.source_position);

        match self {
            Self::PriceFirst => by_price.then(by_recency),
            Self::RecencyFirst => by_recency.then(by_price),
        }
        .then(by_position)
    }

    pub fn sort(&self, records: &mut [QuoteRecord]) {
        records.sort_by(|left, right| self.compare(left, right));
    }
}

fn compare_premium(left: Option<Decimal>, right: Option<Decimal>) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{
        PolicyType, QuoteFilter, QuoteOrdering, QuoteRecord, QuoteRecordId, RunId,
    };
    use crate::domain::customer::CustomerId;

    fn record(premium: Option<i64>, minutes_ago: i64, position: u32) -> QuoteRecord {
        QuoteRecord {
            id: QuoteRecordId(format!("QTE-{minutes_ago}-{position}")),
            run_id: RunId("RUN-1".to_string()),
            source_position: position,
            company_name: format!("Insurer {position}"),
            policy_type: PolicyType::Kasko,
            premium_amount: premium.map(|p| Decimal::new(p, 0)),
            error_message: premium.is_none().then(|| "declined".to_string()),
            issued_by_agent: None,
            customer_id: Some(CustomerId("CUS-1".to_string())),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn policy_type_parses_case_insensitively() {
        assert_eq!("kasko".parse::<PolicyType>().expect("kasko"), PolicyType::Kasko);
        assert_eq!("DASK".parse::<PolicyType>().expect("dask"), PolicyType::Dask);
        assert!("Konut".parse::<PolicyType>().is_err());
    }

    #[test]
    fn policy_type_serializes_with_wire_names() {
        let json = serde_json::to_string(&PolicyType::Dask).expect("serialize");
        assert_eq!(json, "\"DASK\"");
    }

    #[test]
    fn filtered_listing_sorts_cheapest_first_and_declines_last() {
        let mut records = vec![record(Some(1500), 10, 0), record(None, 0, 1), record(Some(900), 5, 2)];
        QuoteOrdering::PriceFirst.sort(&mut records);

        let premiums: Vec<_> = records.iter().map(|r| r.premium_amount).collect();
        assert_eq!(premiums, vec![Some(Decimal::new(900, 0)), Some(Decimal::new(1500, 0)), None]);
    }

    #[test]
    fn unfiltered_listing_sorts_newest_first() {
        let mut records = vec![record(Some(100), 30, 0), record(Some(5000), 1, 1), record(Some(50), 10, 2)];
        QuoteOrdering::RecencyFirst.sort(&mut records);

        let positions: Vec<_> = records.iter().map(|r| r.source_position).collect();
        assert_eq!(positions, vec![1, 2, 0]);
    }

    #[test]
    fn filter_selects_ordering() {
        assert_eq!(QuoteFilter::default().ordering(), QuoteOrdering::RecencyFirst);
        let filter = QuoteFilter { policy_type: Some(PolicyType::Trafik), ..QuoteFilter::default() };
        assert_eq!(filter.ordering(), QuoteOrdering::PriceFirst);
    }
}
