pub mod backoffice;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod quote_run;
pub mod repositories;

pub use backoffice::{BackOfficeService, CustomerDraft, Dashboard, DocumentRemoval, PolicyDraft};
pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use quote_run::{QuoteRunOutcome, QuoteRunService};
