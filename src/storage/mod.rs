mod in_memory;
mod json_file;

pub use in_memory::InMemoryStorage;
pub use json_file::JsonFileStorage;

use crate::error::{EnrichError, Result};
use crate::types::{normalize_identifier, CardFilter, EnrichedRecord, StoredCard};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage trait for persisting enriched cards
#[async_trait]
pub trait Storage: Send + Sync {
    async fn fetch_batch(&self, filter: &CardFilter) -> Result<Vec<EnrichedRecord>>;

    /// Replace the row whose card number matches, inserting when none does.
    async fn upsert_by_identifier(
        &self,
        identifier: &str,
        record: &EnrichedRecord,
    ) -> Result<StoredCard>;

    async fn insert(&self, record: &EnrichedRecord) -> Result<Uuid>;

    async fn list(&self, filter: &CardFilter) -> Result<Vec<StoredCard>>;
    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<StoredCard>>;
    async fn update_by_id(&self, id: Uuid, record: &EnrichedRecord) -> Result<Option<StoredCard>>;
    async fn delete_by_identifier(&self, identifier: &str) -> Result<bool>;
}

/// Row set shared by the storage adapters, kept in insertion order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct CardTable {
    cards: Vec<StoredCard>,
}

fn key(identifier: &str) -> Result<String> {
    normalize_identifier(identifier)
        .ok_or_else(|| EnrichError::Persistence("empty card number".to_string()))
}

impl CardTable {
    fn position(&self, key: &str) -> Option<usize> {
        self.cards
            .iter()
            .position(|c| c.record.identifier().as_deref() == Some(key))
    }

    pub(crate) fn list(&self, filter: &CardFilter) -> Vec<StoredCard> {
        self.cards
            .iter()
            .filter(|c| filter.matches(&c.record))
            .cloned()
            .collect()
    }

    pub(crate) fn get_by_identifier(&self, identifier: &str) -> Result<Option<StoredCard>> {
        let key = key(identifier)?;
        Ok(self.position(&key).map(|i| self.cards[i].clone()))
    }

    pub(crate) fn upsert_by_identifier(
        &mut self,
        identifier: &str,
        record: &EnrichedRecord,
    ) -> Result<StoredCard> {
        let key = key(identifier)?;
        let now = Utc::now();
        match self.position(&key) {
            Some(i) => {
                let card = &mut self.cards[i];
                card.record = record.clone();
                card.updated_at = now;
                Ok(card.clone())
            }
            None => {
                let card = StoredCard {
                    id: Uuid::new_v4(),
                    record: record.clone(),
                    updated_at: now,
                };
                self.cards.push(card.clone());
                Ok(card)
            }
        }
    }

    pub(crate) fn insert(&mut self, record: &EnrichedRecord) -> Uuid {
        let id = Uuid::new_v4();
        self.cards.push(StoredCard {
            id,
            record: record.clone(),
            updated_at: Utc::now(),
        });
        id
    }

    pub(crate) fn update_by_id(&mut self, id: Uuid, record: &EnrichedRecord) -> Option<StoredCard> {
        let card = self.cards.iter_mut().find(|c| c.id == id)?;
        card.record = record.clone();
        card.updated_at = Utc::now();
        Some(card.clone())
    }

    pub(crate) fn delete_by_identifier(&mut self, identifier: &str) -> Result<bool> {
        let key = key(identifier)?;
        match self.position(&key) {
            Some(i) => {
                self.cards.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
