pub mod agent;
pub mod customer;
pub mod policy;
pub mod quote;
