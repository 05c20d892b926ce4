use super::{CardTable, Storage};
use crate::error::{EnrichError, Result};
use crate::types::{CardFilter, EnrichedRecord, StoredCard};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Document store backed by a single JSON file, rewritten on every mutation
pub struct JsonFileStorage {
    path: PathBuf,
    table: RwLock<CardTable>,
}

impl JsonFileStorage {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let table = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CardTable::default(),
            Err(e) => return Err(e.into()),
        };
        info!("Opened card store at {}", path.display());
        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    async fn persist(&self, table: &CardTable) -> Result<()> {
        let write = async {
            if let Some(dir) = self.path.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            let bytes = serde_json::to_vec_pretty(table)?;
            let tmp = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &self.path).await?;
            Ok::<_, EnrichError>(())
        };
        write.await.map_err(|e| {
            EnrichError::Persistence(format!("writing {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn fetch_batch(&self, filter: &CardFilter) -> Result<Vec<EnrichedRecord>> {
        let table = self.table.read().await;
        Ok(table.list(filter).into_iter().map(|c| c.record).collect())
    }

    async fn upsert_by_identifier(
        &self,
        identifier: &str,
        record: &EnrichedRecord,
    ) -> Result<StoredCard> {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        let card = next.upsert_by_identifier(identifier, record)?;
        self.persist(&next).await?;
        *table = next;
        debug!("Upserted card {} with id {}", identifier, card.id);
        Ok(card)
    }

    async fn insert(&self, record: &EnrichedRecord) -> Result<Uuid> {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        let id = next.insert(record);
        self.persist(&next).await?;
        *table = next;
        Ok(id)
    }

    async fn list(&self, filter: &CardFilter) -> Result<Vec<StoredCard>> {
        Ok(self.table.read().await.list(filter))
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<StoredCard>> {
        self.table.read().await.get_by_identifier(identifier)
    }

    async fn update_by_id(&self, id: Uuid, record: &EnrichedRecord) -> Result<Option<StoredCard>> {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        let updated = next.update_by_id(id, record);
        if updated.is_some() {
            self.persist(&next).await?;
            *table = next;
        }
        Ok(updated)
    }

    async fn delete_by_identifier(&self, identifier: &str) -> Result<bool> {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        let deleted = next.delete_by_identifier(identifier)?;
        if deleted {
            self.persist(&next).await?;
            *table = next;
        }
        Ok(deleted)
    }
}
