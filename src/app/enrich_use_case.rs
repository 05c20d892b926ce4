use crate::app::ports::{
    CatalogPort, CredentialPort, EventNotifierPort, IdentifierReaderPort, ThrottlePort,
};
use crate::config::ClientCredentials;
use crate::error::{EnrichError, Result};
use crate::storage::Storage;
use crate::types::{
    dedupe_identifiers, normalize_identifier, BatchOutcome, CardFilter, EnrichedRecord, Event,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How an enriched record reaches storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    /// Enriching rows that already exist.
    UpsertByIdentifier,
    /// Adding rows from an uploaded list.
    Insert,
}

/// Acknowledgment for an admitted batch. The batch keeps running whether or not
/// this handle is awaited.
#[derive(Debug)]
pub struct BatchHandle {
    count: usize,
    task: JoinHandle<BatchOutcome>,
}

impl BatchHandle {
    /// Number of distinct identifiers admitted.
    pub fn count(&self) -> usize {
        self.count
    }

    pub async fn join(self) -> std::result::Result<BatchOutcome, JoinError> {
        self.task.await
    }
}

/// Single-flight flag, released when the batch task finishes or admission fails.
struct BatchGuard(Arc<AtomicBool>);

impl BatchGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EnrichError::BatchInProgress)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives credential refresh, the three-stage lookup per card, persistence and
/// lifecycle events for a batch of card numbers.
#[derive(Clone)]
pub struct EnrichUseCase {
    credentials: Arc<dyn CredentialPort>,
    catalog: Arc<dyn CatalogPort>,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn EventNotifierPort>,
    throttle: Arc<dyn ThrottlePort>,
    client: ClientCredentials,
    app_name: String,
    running: Arc<AtomicBool>,
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EnrichError::Cancelled),
        res = call => res,
    }
}

impl EnrichUseCase {
    pub fn new(
        credentials: Arc<dyn CredentialPort>,
        catalog: Arc<dyn CatalogPort>,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn EventNotifierPort>,
        throttle: Arc<dyn ThrottlePort>,
        client: ClientCredentials,
        app_name: &str,
    ) -> Self {
        Self {
            credentials,
            catalog,
            storage,
            notifier,
            throttle,
            client,
            app_name: app_name.to_string(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Re-enrich every card currently in storage.
    #[instrument(skip_all)]
    pub async fn trigger_from_storage(&self, cancel: CancellationToken) -> Result<BatchHandle> {
        let guard = BatchGuard::acquire(&self.running)?;
        let records = self.storage.fetch_batch(&CardFilter::default()).await?;
        let identifiers: Vec<String> = records
            .iter()
            .filter_map(|r| {
                let id = r.identifier();
                if id.is_none() {
                    warn!(product_id = r.detail.product_id, "Stored card has no number; skipping");
                }
                id
            })
            .collect();
        self.start(guard, identifiers, PersistMode::UpsertByIdentifier, cancel)
            .await
    }

    /// Enrich a list of card numbers and add them as new rows.
    #[instrument(skip_all, fields(submitted = identifiers.len()))]
    pub async fn trigger_from_identifiers(
        &self,
        identifiers: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<BatchHandle> {
        let guard = BatchGuard::acquire(&self.running)?;
        self.start(guard, identifiers, PersistMode::Insert, cancel).await
    }

    pub async fn trigger_from_file(
        &self,
        reader: &dyn IdentifierReaderPort,
        bytes: &[u8],
        cancel: CancellationToken,
    ) -> Result<BatchHandle> {
        let identifiers = reader.read_identifiers(bytes)?;
        self.trigger_from_identifiers(identifiers, cancel).await
    }

    /// Synchronous variant for one card: no hand-off, no events, no throttle.
    #[instrument(skip(self))]
    pub async fn enrich_single(&self, identifier: &str) -> Result<EnrichedRecord> {
        let id = normalize_identifier(identifier)
            .ok_or_else(|| EnrichError::Parse("empty card number".to_string()))?;
        self.refresh().await?;
        let record = self.enrich_item(&id, &CancellationToken::new()).await?;
        self.persist(&id, &record, PersistMode::UpsertByIdentifier)
            .await?;
        Ok(record)
    }

    async fn refresh(&self) -> Result<()> {
        match self.credentials.refresh(&self.client).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Credential refresh failed: {}", e);
                Err(match e {
                    EnrichError::Auth(_) => e,
                    other => EnrichError::Auth(other.to_string()),
                })
            }
        }
    }

    async fn start(
        &self,
        guard: BatchGuard,
        identifiers: Vec<String>,
        mode: PersistMode,
        cancel: CancellationToken,
    ) -> Result<BatchHandle> {
        let identifiers = dedupe_identifiers(identifiers);
        self.refresh().await?;

        let count = identifiers.len();
        info!(count, ?mode, "Batch accepted");
        let this = self.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            this.run_batch(identifiers, mode, cancel).await
        });
        Ok(BatchHandle { count, task })
    }

    async fn run_batch(
        &self,
        identifiers: Vec<String>,
        mode: PersistMode,
        cancel: CancellationToken,
    ) -> BatchOutcome {
        crate::metrics::batch_started();
        let total = identifiers.len();
        self.notifier.emit(Event::started(&self.app_name, total));

        let mut outcome = BatchOutcome::default();
        let mut cancelled = false;

        for (i, id) in identifiers.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            outcome.attempted += 1;
            info!(
                card_number = %id,
                progress = %format!("{} of {}", i + 1, total),
                "Retrieving card info"
            );

            let result = match self.enrich_item(id, &cancel).await {
                Ok(record) => self.persist(id, &record, mode).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    outcome.succeeded += 1;
                    crate::metrics::item_finished("success");
                }
                Err(EnrichError::Cancelled) => {
                    crate::metrics::item_finished("cancelled");
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(card_number = %id, kind = e.kind(), "Unable to enrich card: {}", e);
                    crate::metrics::item_finished(e.kind());
                    self.notifier
                        .emit(Event::item_error(&self.app_name, id, &e));
                }
            }

            tokio::select! {
                _ = self.throttle.wait() => {}
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
            }
        }

        if cancelled {
            warn!(
                attempted = outcome.attempted,
                succeeded = outcome.succeeded,
                "Batch cancelled"
            );
        } else {
            info!(
                attempted = outcome.attempted,
                succeeded = outcome.succeeded,
                "Batch finished"
            );
        }
        self.notifier
            .emit(Event::terminated(&self.app_name, outcome, cancelled));
        outcome
    }

    /// Search, detail and price for one card. Stops at the first failing stage.
    async fn enrich_item(&self, id: &str, cancel: &CancellationToken) -> Result<EnrichedRecord> {
        let search = cancellable(cancel, self.catalog.search(id)).await?;
        let product_id = search
            .first_candidate()
            .ok_or_else(|| EnrichError::NotFound(id.to_string()))?;
        debug!(card_number = %id, product_id, "Resolved product");

        let detail = cancellable(cancel, self.catalog.detail(product_id)).await?;
        let quotes = cancellable(cancel, self.catalog.price(product_id)).await?;
        Ok(EnrichedRecord::new(detail, quotes))
    }

    async fn persist(&self, id: &str, record: &EnrichedRecord, mode: PersistMode) -> Result<()> {
        let written = match mode {
            PersistMode::UpsertByIdentifier => self
                .storage
                .upsert_by_identifier(id, record)
                .await
                .map(|card| card.id),
            PersistMode::Insert => self.storage.insert(record).await,
        };
        match written {
            Ok(row_id) => {
                debug!(card_number = %id, %row_id, prices = record.prices.len(), "Stored card");
                Ok(())
            }
            Err(e @ EnrichError::Persistence(_)) => Err(e),
            Err(other) => Err(EnrichError::Persistence(other.to_string())),
        }
    }
}
