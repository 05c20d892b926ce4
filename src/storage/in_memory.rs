use super::{CardTable, Storage};
use crate::error::Result;
use crate::types::{CardFilter, EnrichedRecord, StoredCard};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// In-memory storage implementation for development/testing
#[derive(Default)]
pub struct InMemoryStorage {
    table: RwLock<CardTable>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = EnrichedRecord>) -> Self {
        let mut table = CardTable::default();
        for record in records {
            table.insert(&record);
        }
        Self {
            table: RwLock::new(table),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn fetch_batch(&self, filter: &CardFilter) -> Result<Vec<EnrichedRecord>> {
        let table = self.table.read().await;
        Ok(table.list(filter).into_iter().map(|c| c.record).collect())
    }

    async fn upsert_by_identifier(
        &self,
        identifier: &str,
        record: &EnrichedRecord,
    ) -> Result<StoredCard> {
        let card = self.table.write().await.upsert_by_identifier(identifier, record)?;
        debug!("Upserted card {} with id {}", identifier, card.id);
        Ok(card)
    }

    async fn insert(&self, record: &EnrichedRecord) -> Result<Uuid> {
        let id = self.table.write().await.insert(record);
        debug!("Inserted card {} with id {}", record.detail.name, id);
        Ok(id)
    }

    async fn list(&self, filter: &CardFilter) -> Result<Vec<StoredCard>> {
        Ok(self.table.read().await.list(filter))
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<StoredCard>> {
        self.table.read().await.get_by_identifier(identifier)
    }

    async fn update_by_id(&self, id: Uuid, record: &EnrichedRecord) -> Result<Option<StoredCard>> {
        Ok(self.table.write().await.update_by_id(id, record))
    }

    async fn delete_by_identifier(&self, identifier: &str) -> Result<bool> {
        self.table.write().await.delete_by_identifier(identifier)
    }
}
