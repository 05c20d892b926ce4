//! Port fakes shared by the orchestrator and HTTP tests.

use crate::app::ports::{CatalogPort, CredentialPort, EventNotifierPort, ThrottlePort};
use crate::config::ClientCredentials;
use crate::error::{EnrichError, Result};
use crate::types::{
    Credential, DetailRecord, Event, EventKind, ExtendedField, PriceQuote, SearchResult,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub struct FakeCredentials {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeCredentials {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { fail: false, calls: AtomicUsize::new(0) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialPort for FakeCredentials {
    async fn refresh(&self, _credentials: &ClientCredentials) -> Result<Credential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(EnrichError::Auth("invalid_client".into()))
        } else {
            Ok(Credential { token: "tok".into(), expires_at: None })
        }
    }
}

/// Catalog keyed by card number. Unknown numbers fail at search.
#[derive(Default)]
pub struct FakeCatalog {
    products: HashMap<String, i64>,
    details: HashMap<i64, DetailRecord>,
    prices: HashMap<i64, Vec<PriceQuote>>,
    failing_prices: HashSet<i64>,
    search_delay: Option<Duration>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeCatalog {
    pub fn with_card(mut self, number: &str, product_id: i64, name: &str, markets: &[f64]) -> Self {
        self.products.insert(number.to_string(), product_id);
        self.details.insert(product_id, detail(number, product_id, name));
        self.prices.insert(
            product_id,
            markets.iter().map(|m| quote(product_id, *m)).collect(),
        );
        self
    }

    pub fn failing_price(mut self, product_id: i64) -> Self {
        self.failing_prices.insert(product_id);
        self
    }

    /// Every search takes `delay` before answering.
    pub fn slow_search(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push((call, Instant::now()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn search_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c.starts_with("search:"))
            .map(|(_, t)| *t)
            .collect()
    }
}

#[async_trait]
impl CatalogPort for FakeCatalog {
    async fn search(&self, identifier: &str) -> Result<SearchResult> {
        self.record(format!("search:{identifier}"));
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        match self.products.get(identifier) {
            Some(id) => Ok(SearchResult { candidate_product_ids: vec![*id] }),
            None => Err(EnrichError::NotFound(identifier.to_string())),
        }
    }

    async fn detail(&self, product_id: i64) -> Result<DetailRecord> {
        self.record(format!("detail:{product_id}"));
        self.details
            .get(&product_id)
            .cloned()
            .ok_or_else(|| EnrichError::NotFound(product_id.to_string()))
    }

    async fn price(&self, product_id: i64) -> Result<Vec<PriceQuote>> {
        self.record(format!("price:{product_id}"));
        if self.failing_prices.contains(&product_id) {
            return Err(EnrichError::Remote { message: "pricing unavailable".into() });
        }
        Ok(self.prices.get(&product_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }
}

impl EventNotifierPort for RecordingNotifier {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct NoopThrottle;

#[async_trait]
impl ThrottlePort for NoopThrottle {
    async fn wait(&self) {}
}

pub fn detail(number: &str, product_id: i64, name: &str) -> DetailRecord {
    DetailRecord {
        product_id,
        name: name.to_string(),
        clean_name: None,
        image_url: None,
        category_id: Some(2),
        group_id: None,
        url: None,
        modified_on: None,
        extended_data: vec![ExtendedField {
            name: "Number".into(),
            display_name: Some("Card Number".into()),
            value: number.to_string(),
        }],
    }
}

pub fn quote(product_id: i64, market: f64) -> PriceQuote {
    PriceQuote {
        product_id,
        low_price: Some(market),
        mid_price: None,
        high_price: None,
        market_price: Some(market),
        direct_low_price: None,
        variant: if market == 0.0 { "Unlimited".into() } else { "1st Edition".into() },
    }
}
