pub mod catalog_client;
pub mod credential_manager;
#[cfg(feature = "kafka")]
pub mod kafka_notifier;
pub mod notifier;
pub mod throttle;

pub use catalog_client::CatalogClient;
pub use credential_manager::CredentialManager;
pub use notifier::LogNotifier;
pub use throttle::FixedIntervalThrottle;

use crate::app::ports::EventNotifierPort;
use crate::app::EnrichUseCase;
use crate::config::Config;
use crate::error::Result;
use crate::storage::Storage;
use std::sync::Arc;

pub fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.catalog.request_timeout())
        .build()?)
}

/// Kafka when brokers are configured and the feature is compiled in, the log channel otherwise.
#[cfg(feature = "kafka")]
pub fn build_notifier(config: &Config) -> Result<Arc<dyn EventNotifierPort>> {
    match &config.notifier.brokers {
        Some(brokers) => {
            let notifier = kafka_notifier::KafkaNotifier::new(
                brokers,
                &config.notifier.topic,
                &config.notifier.app_name,
            )?;
            tracing::info!(topic = %config.notifier.topic, "Publishing events to Kafka");
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier::new())),
    }
}

#[cfg(not(feature = "kafka"))]
pub fn build_notifier(config: &Config) -> Result<Arc<dyn EventNotifierPort>> {
    if config.notifier.brokers.is_some() {
        tracing::warn!("Kafka brokers configured but the kafka feature is disabled; events stay local");
    }
    Ok(Arc::new(LogNotifier::new()))
}

/// Wire the reqwest-backed adapters into an orchestrator.
pub fn build_use_case(config: &Config, storage: Arc<dyn Storage>) -> Result<EnrichUseCase> {
    let credentials = config.credentials()?.clone();
    let http = build_http_client(config)?;
    let manager = Arc::new(CredentialManager::new(http.clone(), &config.catalog.base_url));
    let catalog = Arc::new(CatalogClient::new(http, &config.catalog, manager.clone()));
    let throttle = Arc::new(FixedIntervalThrottle::new(config.throttle.interval()));
    let notifier = build_notifier(config)?;
    Ok(EnrichUseCase::new(
        manager,
        catalog,
        storage,
        notifier,
        throttle,
        credentials,
        &config.notifier.app_name,
    ))
}
