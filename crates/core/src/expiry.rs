use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::domain::agent::Agent;
use crate::domain::customer::Customer;
use crate::domain::policy::Policy;

/// Reminder that a policy ends exactly `lead_days` from today.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExpiryNotice {
    pub policy_number: String,
    pub customer_name: String,
    pub end_date: NaiveDate,
    pub customer_email: Option<String>,
    pub agent_email: Option<String>,
}

impl ExpiryNotice {
    pub fn new(policy: &Policy, customer: &Customer, agent: Option<&Agent>) -> Self {
        Self {
            policy_number: policy.policy_number.clone(),
            customer_name: customer.name.clone(),
            end_date: policy.end_date,
            customer_email: customer.email.clone(),
            agent_email: agent.and_then(|agent| agent.email.clone()),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "policy {} for {} ends {} (customer email: {}, agent email: {})",
            self.policy_number,
            self.customer_name,
            self.end_date,
            self.customer_email.as_deref().unwrap_or("none"),
            self.agent_email.as_deref().unwrap_or("no agent"),
        )
    }
}

/// Longest lead time accepted from config or the command line.
pub const MAX_LEAD_DAYS: u32 = 365;

/// The only end date that triggers a notice today. Matching a single day
/// means a daily run warns about each policy once. `None` when the lead
/// time exceeds `MAX_LEAD_DAYS` or the date overflows.
pub fn notice_date(today: NaiveDate, lead_days: u32) -> Option<NaiveDate> {
    if lead_days > MAX_LEAD_DAYS {
        return None;
    }
    today.checked_add_signed(Duration::days(i64::from(lead_days)))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{notice_date, ExpiryNotice, MAX_LEAD_DAYS};
    use crate::domain::customer::{Address, Customer, CustomerId, CustomerType};
    use crate::domain::policy::{Policy, PolicyId, PolicyStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    #[test]
    fn notice_date_is_exactly_lead_days_ahead() {
        let today = date(2026, 10, 19);
        assert_eq!(notice_date(today, 0), Some(today));
        assert_eq!(notice_date(today, 7), Some(date(2026, 10, 26)));
        assert_eq!(notice_date(today, MAX_LEAD_DAYS), Some(date(2027, 10, 19)));
    }

    #[test]
    fn out_of_range_lead_time_has_no_notice_date() {
        let today = date(2026, 10, 19);
        assert_eq!(notice_date(today, MAX_LEAD_DAYS + 1), None);
        assert_eq!(notice_date(today, u32::MAX), None);
        assert_eq!(notice_date(NaiveDate::MAX, 1), None);
    }

    #[test]
    fn summary_names_missing_contacts() {
        let customer = Customer {
            id: CustomerId("CUS-1".to_string()),
            name: "Zeynep Kaya".to_string(),
            national_id: None,
            customer_type: CustomerType::Individual,
            phone: None,
            email: None,
            address: Address::default(),
            date_of_birth: None,
            agent_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let policy = Policy {
            id: PolicyId("POL-1".to_string()),
            policy_number: "TRF-1".to_string(),
            policy_type: "Trafik".to_string(),
            customer_id: customer.id.clone(),
            start_date: date(2025, 10, 26),
            end_date: date(2026, 10, 26),
            premium_amount: Decimal::new(2500, 0),
            status: PolicyStatus::Active,
            document: None,
            issued_by_agent: None,
            created_at: Utc::now(),
        };

        let notice = ExpiryNotice::new(&policy, &customer, None);

        assert_eq!(
            notice.summary(),
            "policy TRF-1 for Zeynep Kaya ends 2026-10-26 (customer email: none, agent email: no agent)"
        );
    }
}
