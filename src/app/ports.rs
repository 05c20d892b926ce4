use crate::config::ClientCredentials;
use crate::error::Result;
use crate::types::{Credential, DetailRecord, Event, PriceQuote, SearchResult};
use async_trait::async_trait;

/// Exchanges a key pair for a bearer credential and holds it for the batch.
#[async_trait]
pub trait CredentialPort: Send + Sync {
    async fn refresh(&self, credentials: &ClientCredentials) -> Result<Credential>;
}

/// The three remote lookups against the catalog service. No retries.
#[async_trait]
pub trait CatalogPort: Send + Sync {
    async fn search(&self, identifier: &str) -> Result<SearchResult>;
    async fn detail(&self, product_id: i64) -> Result<DetailRecord>;
    async fn price(&self, product_id: i64) -> Result<Vec<PriceQuote>>;
}

#[async_trait]
pub trait ThrottlePort: Send + Sync {
    async fn wait(&self);
}

/// Fire-and-forget publishing; must not block and must not fail the caller.
pub trait EventNotifierPort: Send + Sync {
    fn emit(&self, event: Event);
}

/// Turns an uploaded tabular document into raw identifiers.
pub trait IdentifierReaderPort: Send + Sync {
    fn read_identifiers(&self, bytes: &[u8]) -> Result<Vec<String>>;
}
