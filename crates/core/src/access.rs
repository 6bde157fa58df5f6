use serde::{Deserialize, Serialize};

use crate::domain::agent::{Agent, AgentId, AgentRole};
use crate::domain::customer::Customer;
use crate::domain::policy::Policy;

/// The authenticated caller, as established by the session layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub agent_id: AgentId,
    pub role: AgentRole,
}

impl AgentIdentity {
    pub fn new(agent_id: AgentId, role: AgentRole) -> Self {
        Self { agent_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == AgentRole::Admin
    }

    /// Listing scope: admins see every record, agents see their own.
    pub fn list_scope(&self) -> ListScope {
        if self.is_admin() {
            ListScope::All
        } else {
            ListScope::Agent(self.agent_id.clone())
        }
    }
}

impl From<&Agent> for AgentIdentity {
    fn from(agent: &Agent) -> Self {
        Self::new(agent.id.clone(), agent.role)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListScope {
    All,
    Agent(AgentId),
}

impl ListScope {
    pub fn agent_id(&self) -> Option<&AgentId> {
        match self {
            Self::All => None,
            Self::Agent(agent_id) => Some(agent_id),
        }
    }

    pub fn includes(&self, owner: Option<&AgentId>) -> bool {
        match self {
            Self::All => true,
            Self::Agent(agent_id) => owner == Some(agent_id),
        }
    }
}

/// Decides which records an agent may act on.
pub trait OwnershipPolicy: Send + Sync {
    fn may_access_customer(&self, actor: &AgentIdentity, customer: &Customer) -> bool;

    fn may_access_policy(&self, actor: &AgentIdentity, policy: &Policy) -> bool;
}

/// Agents work with the customers assigned to them and the policies they
/// issued. Admins work with all.
#[derive(Clone, Copy, Debug, Default)]
pub struct AgentOwnership;

impl OwnershipPolicy for AgentOwnership {
    fn may_access_customer(&self, actor: &AgentIdentity, customer: &Customer) -> bool {
        actor.is_admin() || customer.is_owned_by(&actor.agent_id)
    }

    fn may_access_policy(&self, actor: &AgentIdentity, policy: &Policy) -> bool {
        actor.is_admin() || policy.is_issued_by(&actor.agent_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{AgentIdentity, AgentOwnership, ListScope, OwnershipPolicy};
    use crate::domain::agent::{AgentId, AgentRole};
    use crate::domain::customer::{Address, Customer, CustomerId, CustomerType};

    fn customer_of(agent: &str) -> Customer {
        Customer {
            id: CustomerId("CUS-1".to_string()),
            name: "Can Öztürk".to_string(),
            national_id: None,
            customer_type: CustomerType::Individual,
            phone: None,
            email: None,
            address: Address::default(),
            date_of_birth: None,
            agent_id: Some(AgentId(agent.to_string())),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn agents_only_access_their_own_customers() {
        let actor = AgentIdentity::new(AgentId("AGT-1".to_string()), AgentRole::Agent);

        assert!(AgentOwnership.may_access_customer(&actor, &customer_of("AGT-1")));
        assert!(!AgentOwnership.may_access_customer(&actor, &customer_of("AGT-2")));
    }

    #[test]
    fn admins_access_everything() {
        let admin = AgentIdentity::new(AgentId("AGT-9".to_string()), AgentRole::Admin);

        assert!(AgentOwnership.may_access_customer(&admin, &customer_of("AGT-2")));
        assert_eq!(admin.list_scope(), ListScope::All);
    }

    #[test]
    fn agent_scope_filters_by_owner() {
        let scope = ListScope::Agent(AgentId("AGT-1".to_string()));

        assert!(scope.includes(Some(&AgentId("AGT-1".to_string()))));
        assert!(!scope.includes(Some(&AgentId("AGT-2".to_string()))));
        assert!(!scope.includes(None));
    }
}
