pub mod access;
pub mod config;
pub mod documents;
pub mod domain;
pub mod errors;
pub mod expiry;
pub mod export;
pub mod quoting;

pub use access::{AgentIdentity, AgentOwnership, ListScope, OwnershipPolicy};
pub use domain::agent::{Agent, AgentId, AgentRole};
pub use domain::customer::{Address, Customer, CustomerId, CustomerProfile, CustomerType};
pub use domain::policy::{Policy, PolicyId, PolicyStatus};
pub use domain::quote::{
    PolicyType, QuoteFilter, QuoteOrdering, QuoteRecord, QuoteRecordId, QuoteRequest, RunId,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use quoting::{
    rank_offers, QuoteAggregator, QuoteRunError, QuoteSource, RankedOffers, RequestRejection,
    SourceRegistry, SourceResult,
};
