use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn generate() -> Self {
        Self(format!("CUS-{}", &Uuid::new_v4().simple().to_string()[..12]))
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    #[default]
    Individual,
    Corporate,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Corporate => "corporate",
        }
    }
}

impl std::str::FromStr for CustomerType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "individual" => Ok(Self::Individual),
            "corporate" => Ok(Self::Corporate),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported customer type `{other}` (expected individual|corporate)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
}

impl Address {
    /// Single-line rendering used by exports; empty parts are skipped.
    pub fn one_line(&self) -> String {
        [&self.street, &self.state, &self.city, &self.zipcode]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim).filter(|part| !part.is_empty()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub national_id: Option<String>,
    pub customer_type: CustomerType,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Address,
    pub date_of_birth: Option<NaiveDate>,
    pub agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The subset of customer data handed to insurer connectors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub national_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
}

impl Customer {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvariantViolation("customer name is required".to_string()));
        }

        if let Some(national_id) = &self.national_id {
            let valid_length = matches!(national_id.len(), 10 | 11);
            if !valid_length || !national_id.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(DomainError::InvariantViolation(format!(
                    "national id `{national_id}` must be 10 (tax) or 11 (citizen) digits"
                )));
            }
        }

        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(DomainError::InvariantViolation(format!(
                    "customer email `{email}` is not a valid address"
                )));
            }
        }

        Ok(())
    }

    pub fn is_owned_by(&self, agent_id: &AgentId) -> bool {
        self.agent_id.as_ref() == Some(agent_id)
    }

    pub fn profile(&self) -> CustomerProfile {
        CustomerProfile {
            national_id: self.national_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    /// Blank optional text fields collapse to `None` so that uniqueness on
    /// national id only applies to customers that actually have one.
    pub fn normalized(mut self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        self.name = self.name.trim().to_string();
        self.national_id = clean(self.national_id);
        self.phone = clean(self.phone);
        self.email = clean(self.email);
        self.address = Address {
            street: clean(self.address.street),
            city: clean(self.address.city),
            state: clean(self.address.state),
            zipcode: clean(self.address.zipcode),
        };
        self
    }
}
