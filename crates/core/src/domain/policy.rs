use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::customer::CustomerId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub String);

impl PolicyId {
    pub fn generate() -> Self {
        Self(format!("POL-{}", &Uuid::new_v4().simple().to_string()[..12]))
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    #[default]
    Active,
    Expired,
    Cancelled,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for PolicyStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported policy status `{other}` (expected active|expired|cancelled)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub policy_number: String,
    /// Free-form line of business, e.g. "Kasko" or "Konut".
    pub policy_type: String,
    pub customer_id: CustomerId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium_amount: Decimal,
    pub status: PolicyStatus,
    pub document: Option<String>,
    pub issued_by_agent: Option<AgentId>,
    pub created_at: DateTime<Utc>,
}

impl Policy {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.policy_number.trim().is_empty() {
            return Err(DomainError::InvariantViolation("policy number is required".to_string()));
        }
        if self.policy_type.trim().is_empty() {
            return Err(DomainError::InvariantViolation("policy type is required".to_string()));
        }
        if self.end_date <= self.start_date {
            return Err(DomainError::InvalidPolicyPeriod {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.premium_amount.is_sign_negative() {
            return Err(DomainError::InvariantViolation(
                "premium amount must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active
    }

    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days()
    }

    pub fn is_issued_by(&self, agent_id: &AgentId) -> bool {
        self.issued_by_agent.as_ref() == Some(agent_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{Policy, PolicyId, PolicyStatus};
    use crate::domain::customer::CustomerId;
    use crate::errors::DomainError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn policy(start: NaiveDate, end: NaiveDate) -> Policy {
        Policy {
            id: PolicyId("POL-1".to_string()),
            policy_number: "KSK-1".to_string(),
            policy_type: "Kasko".to_string(),
            customer_id: CustomerId("CUS-1".to_string()),
            start_date: start,
            end_date: end,
            premium_amount: Decimal::new(750_050, 2),
            status: PolicyStatus::Active,
            document: None,
            issued_by_agent: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_end_date_not_after_start() {
        let error = policy(date(2026, 5, 1), date(2026, 5, 1)).validate().expect_err("same day");
        assert!(matches!(error, DomainError::InvalidPolicyPeriod { .. }));
    }

    #[test]
    fn accepts_one_year_term() {
        policy(date(2026, 1, 1), date(2027, 1, 1)).validate().expect("valid term");
    }

    #[test]
    fn counts_days_until_expiry() {
        let policy = policy(date(2026, 1, 1), date(2026, 1, 31));
        assert_eq!(policy.days_until_expiry(date(2026, 1, 24)), 7);
        assert_eq!(policy.days_until_expiry(date(2026, 2, 2)), -2);
    }
}
