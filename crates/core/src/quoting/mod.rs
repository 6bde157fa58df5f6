pub mod aggregator;
pub mod live;
pub mod ranker;
pub mod registry;
pub mod simulated;
pub mod source;

use thiserror::Error;

use crate::errors::ApplicationError;

pub use aggregator::{AggregationError, QuoteAggregator};
pub use live::LiveSource;
pub use ranker::{rank_offers, RankedOffer, RankedOffers};
pub use registry::SourceRegistry;
pub use simulated::SimulatedSource;
pub use source::{QuoteSource, SourceResult};

/// Why a quote request was refused before any insurer was called.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestRejection {
    #[error("customer `{0}` does not exist")]
    UnknownCustomer(String),
    #[error("customer `{0}` is not assigned to the requesting agent")]
    CustomerNotOwned(String),
    #[error(transparent)]
    UnknownPolicyType(#[from] crate::domain::quote::UnknownPolicyType),
    #[error(transparent)]
    NoSources(#[from] AggregationError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QuoteRunError {
    #[error("quote request rejected: {0}")]
    RequestInvalid(#[from] RequestRejection),
    #[error("quote results could not be saved: {0}")]
    Persistence(String),
}

impl From<QuoteRunError> for ApplicationError {
    fn from(error: QuoteRunError) -> Self {
        match error {
            QuoteRunError::RequestInvalid(RequestRejection::UnknownCustomer(id)) => {
                Self::NotFound(format!("customer `{id}`"))
            }
            QuoteRunError::RequestInvalid(RequestRejection::CustomerNotOwned(id)) => {
                Self::Forbidden(format!("customer `{id}` is not assigned to you"))
            }
            QuoteRunError::RequestInvalid(rejection) => Self::InvalidRequest(rejection.to_string()),
            QuoteRunError::Persistence(message) => Self::Persistence(message),
        }
    }
}
