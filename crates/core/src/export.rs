use std::collections::HashMap;

use csv::Writer;
use thiserror::Error;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::customer::{Customer, CustomerId};
use crate::domain::policy::Policy;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Flush(String),
    #[error("csv output is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

const CUSTOMER_HEADER: [&str; 7] =
    ["name", "national_id", "customer_type", "email", "phone", "address", "agent"];

const POLICY_HEADER: [&str; 8] = [
    "policy_number",
    "policy_type",
    "customer",
    "start_date",
    "end_date",
    "premium_amount",
    "status",
    "issued_by_agent",
];

/// Resolves agent ids to usernames for export columns.
#[derive(Debug, Default)]
pub struct AgentDirectory {
    usernames: HashMap<AgentId, String>,
}

impl AgentDirectory {
    pub fn new(agents: &[Agent]) -> Self {
        Self {
            usernames: agents.iter().map(|agent| (agent.id.clone(), agent.username.clone())).collect(),
        }
    }

    fn name_of(&self, agent_id: Option<&AgentId>) -> String {
        agent_id
            .map(|id| self.usernames.get(id).cloned().unwrap_or_else(|| id.0.clone()))
            .unwrap_or_default()
    }
}

pub fn customers_csv(customers: &[Customer], agents: &AgentDirectory) -> Result<String, ExportError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(CUSTOMER_HEADER)?;

    for customer in customers {
        writer.write_record([
            customer.name.as_str(),
            customer.national_id.as_deref().unwrap_or(""),
            customer.customer_type.as_str(),
            customer.email.as_deref().unwrap_or(""),
            customer.phone.as_deref().unwrap_or(""),
            customer.address.one_line().as_str(),
            agents.name_of(customer.agent_id.as_ref()).as_str(),
        ])?;
    }

    finish(writer)
}

pub fn policies_csv(
    policies: &[Policy],
    customers: &HashMap<CustomerId, Customer>,
    agents: &AgentDirectory,
) -> Result<String, ExportError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(POLICY_HEADER)?;

    for policy in policies {
        let customer = customers
            .get(&policy.customer_id)
            .map(|customer| customer.name.clone())
            .unwrap_or_else(|| policy.customer_id.0.clone());
        writer.write_record([
            policy.policy_number.clone(),
            policy.policy_type.clone(),
            customer,
            policy.start_date.to_string(),
            policy.end_date.to_string(),
            policy.premium_amount.to_string(),
            policy.status.as_str().to_string(),
            agents.name_of(policy.issued_by_agent.as_ref()),
        ])?;
    }

    finish(writer)
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer.into_inner().map_err(|error| ExportError::Flush(error.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{customers_csv, policies_csv, AgentDirectory};
    use crate::domain::agent::{Agent, AgentId, AgentRole};
    use crate::domain::customer::{Address, Customer, CustomerId, CustomerType};
    use crate::domain::policy::{Policy, PolicyId, PolicyStatus};

    fn agent() -> Agent {
        Agent {
            id: AgentId("AGT-1".to_string()),
            username: "elif".to_string(),
            email: Some("elif@agency.example".to_string()),
            role: AgentRole::Agent,
            created_at: Utc::now(),
        }
    }

    fn customer() -> Customer {
        Customer {
            id: CustomerId("CUS-1".to_string()),
            name: "Kaya, Zeynep".to_string(),
            national_id: Some("12345678901".to_string()),
            customer_type: CustomerType::Individual,
            phone: None,
            email: Some("zeynep@example.com".to_string()),
            address: Address {
                street: Some("Atatürk Blv. 5".to_string()),
                city: Some("Ankara".to_string()),
                state: None,
                zipcode: None,
            },
            date_of_birth: None,
            agent_id: Some(AgentId("AGT-1".to_string())),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn customer_export_quotes_fields_with_commas() {
        let csv = customers_csv(&[customer()], &AgentDirectory::new(&[agent()])).expect("csv");
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("name,national_id,customer_type,email,phone,address,agent")
        );
        assert_eq!(
            lines.next(),
            Some("\"Kaya, Zeynep\",12345678901,individual,zeynep@example.com,,\"Atatürk Blv. 5, Ankara\",elif")
        );
    }

    #[test]
    fn policy_export_resolves_customer_and_agent_names() {
        let policy = Policy {
            id: PolicyId("POL-1".to_string()),
            policy_number: "KSK-1".to_string(),
            policy_type: "Kasko".to_string(),
            customer_id: CustomerId("CUS-1".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"),
            end_date: NaiveDate::from_ymd_opt(2027, 1, 1).expect("date"),
            premium_amount: Decimal::new(750_050, 2),
            status: PolicyStatus::Active,
            document: None,
            issued_by_agent: Some(AgentId("AGT-1".to_string())),
            created_at: Utc::now(),
        };
        let customers = HashMap::from([(CustomerId("CUS-1".to_string()), customer())]);

        let csv = policies_csv(&[policy], &customers, &AgentDirectory::new(&[agent()])).expect("csv");

        assert!(csv.contains("KSK-1,Kasko,\"Kaya, Zeynep\",2026-01-01,2027-01-01,7500.50,active,elif"));
    }
}
