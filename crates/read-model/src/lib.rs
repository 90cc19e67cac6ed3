pub mod cache;
pub mod ingestion;
pub mod query;

pub use cache::{OrderCache, RestoreStats};
pub use ingestion::IngestionPipeline;
pub use query::{Lookup, QueryService};

use domain::DomainError;
use order_store::StoreError;
use thiserror::Error;

/// What the transport should do with a message once the pipeline is done with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Never deliver this message again
    Acknowledge,
    /// Leave the message unacknowledged so the transport delivers it again
    Redeliver,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed order message: {0}")]
    Parse(#[source] DomainError),

    #[error("Invalid order message: {0}")]
    Validation(#[source] DomainError),

    #[error("Store unavailable while persisting order {order_uid}: {source}")]
    StoreUnavailable {
        order_uid: String,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// Poison messages fail the same way on every delivery
    pub fn is_poison(&self) -> bool {
        matches!(self, IngestError::Parse(_) | IngestError::Validation(_))
    }

    pub fn disposition(&self) -> Disposition {
        if self.is_poison() {
            Disposition::Acknowledge
        } else {
            Disposition::Redeliver
        }
    }
}

impl From<DomainError> for IngestError {
    fn from(err: DomainError) -> Self {
        if err.is_parse() {
            IngestError::Parse(err)
        } else {
            IngestError::Validation(err)
        }
    }
}
