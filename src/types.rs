use crate::constants::{EVENT_ITEM_ERROR, EVENT_STARTED, EVENT_TERMINATED, NUMBER_FIELD};
use crate::error::{EnrichError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// Normalize a card number the way the catalog matches it. Blank input yields `None`.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_uppercase())
    }
}

/// Normalize and de-duplicate identifiers, keeping first-seen order.
pub fn dedupe_identifiers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|s| normalize_identifier(s.as_ref()))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Short-lived bearer credential for the catalog service
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |exp| exp <= now)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    #[serde(rename = ".expires")]
    pub expires: Option<String>,
}

/// Standard response wrapper of the catalog service
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub results: Option<Vec<T>>,
}

impl<T> Envelope<T> {
    /// A non-empty error list is a failure even when the transport succeeded.
    pub fn into_results(self) -> Result<Vec<T>> {
        if !self.errors.is_empty() {
            return Err(EnrichError::Remote {
                message: self.errors.join("; "),
            });
        }
        Ok(self.results.unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
pub struct SearchFilter<'a> {
    pub name: &'a str,
    pub values: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct SearchBody<'a> {
    pub filters: Vec<SearchFilter<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub candidate_product_ids: Vec<i64>,
}

impl SearchResult {
    /// Only the first candidate is used; ambiguity is not resolved here.
    pub fn first_candidate(&self) -> Option<i64> {
        self.candidate_product_ids.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedField {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub value: String,
}

/// Product details with extended catalog fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    pub product_id: i64,
    pub name: String,
    #[serde(default)]
    pub clean_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub modified_on: Option<String>,
    #[serde(default)]
    pub extended_data: Vec<ExtendedField>,
}

impl DetailRecord {
    pub fn catalog_fields(&self) -> BTreeMap<&str, &str> {
        self.extended_data
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
            .collect()
    }

    pub fn number(&self) -> Option<&str> {
        self.extended_data
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(NUMBER_FIELD))
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub product_id: i64,
    #[serde(default)]
    pub low_price: Option<f64>,
    #[serde(default)]
    pub mid_price: Option<f64>,
    #[serde(default)]
    pub high_price: Option<f64>,
    #[serde(default)]
    pub market_price: Option<f64>,
    #[serde(default)]
    pub direct_low_price: Option<f64>,
    #[serde(rename = "subTypeName", default)]
    pub variant: String,
}

impl PriceQuote {
    /// A missing market price counts as zero.
    pub fn has_market_price(&self) -> bool {
        self.market_price.map_or(false, |p| p != 0.0)
    }
}

/// Keep quotes with a non-zero market price, order preserved.
pub fn filter_priced(quotes: Vec<PriceQuote>) -> Vec<PriceQuote> {
    quotes.into_iter().filter(PriceQuote::has_market_price).collect()
}

/// Unit persisted to storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(rename = "card")]
    pub detail: DetailRecord,
    #[serde(default)]
    pub prices: Vec<PriceQuote>,
}

impl EnrichedRecord {
    pub fn new(detail: DetailRecord, quotes: Vec<PriceQuote>) -> Self {
        Self {
            detail,
            prices: filter_priced(quotes),
        }
    }

    /// Normalized card number embedded in the detail fields.
    pub fn identifier(&self) -> Option<String> {
        self.detail.number().and_then(normalize_identifier)
    }
}

/// A persisted record with its surrogate id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCard {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: EnrichedRecord,
    pub updated_at: DateTime<Utc>,
}

/// Query filters for listing stored cards
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFilter {
    pub number: Option<String>,
    pub name: Option<String>,
}

impl CardFilter {
    pub fn matches(&self, record: &EnrichedRecord) -> bool {
        if let Some(number) = self.number.as_deref().and_then(normalize_identifier) {
            if record.identifier().as_deref() != Some(number.as_str()) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !record
                .detail
                .name
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub succeeded: usize,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "item-error")]
    ItemError,
    #[serde(rename = "terminated")]
    Terminated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Started => EVENT_STARTED,
            EventKind::ItemError => EVENT_ITEM_ERROR,
            EventKind::Terminated => EVENT_TERMINATED,
        }
    }
}

/// Lifecycle event published on the notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub app_name: String,
    #[serde(rename = "event")]
    pub kind: EventKind,
    pub message: String,
    pub is_error: bool,
    #[serde(rename = "timeStamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub succeeded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attempted: Option<usize>,
}

impl Event {
    pub fn started(app_name: &str, count: usize) -> Self {
        Self {
            app_name: app_name.to_string(),
            kind: EventKind::Started,
            message: format!("Started processing {count} cards"),
            is_error: false,
            timestamp: Utc::now(),
            succeeded: None,
            attempted: None,
        }
    }

    pub fn item_error(app_name: &str, identifier: &str, err: &EnrichError) -> Self {
        Self {
            app_name: app_name.to_string(),
            kind: EventKind::ItemError,
            message: format!("Error processing card {identifier} ({}): {err}", err.kind()),
            is_error: true,
            timestamp: Utc::now(),
            succeeded: None,
            attempted: None,
        }
    }

    pub fn terminated(app_name: &str, outcome: BatchOutcome, cancelled: bool) -> Self {
        let message = if cancelled {
            format!(
                "Batch cancelled: {} of {} cards processed successfully",
                outcome.succeeded, outcome.attempted
            )
        } else {
            format!(
                "{} of {} cards processed successfully",
                outcome.succeeded, outcome.attempted
            )
        };
        Self {
            app_name: app_name.to_string(),
            kind: EventKind::Terminated,
            message,
            is_error: cancelled,
            timestamp: Utc::now(),
            succeeded: Some(outcome.succeeded),
            attempted: Some(outcome.attempted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quote(market: Option<f64>, variant: &str) -> PriceQuote {
        PriceQuote {
            product_id: 1,
            low_price: None,
            mid_price: None,
            high_price: None,
            market_price: market,
            direct_low_price: None,
            variant: variant.to_string(),
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence_and_normalizes() {
        let ids = dedupe_identifiers(["A", "a ", "B", "", "  ", "A"]);
        assert_eq!(ids, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn filter_priced_drops_zero_and_missing_market_prices() {
        let quotes = vec![
            quote(Some(1.5), "1st Edition"),
            quote(Some(0.0), "Unlimited"),
            quote(None, "Limited"),
            quote(Some(45.5), "Foil"),
        ];
        let kept = filter_priced(quotes);
        let variants: Vec<_> = kept.iter().map(|q| q.variant.as_str()).collect();
        assert_eq!(variants, vec!["1st Edition", "Foil"]);
    }

    #[test]
    fn envelope_with_errors_is_remote_failure() {
        let env: Envelope<i64> = serde_json::from_value(json!({
            "success": true,
            "errors": ["Invalid request"],
            "results": [1, 2]
        }))
        .unwrap();
        match env.into_results() {
            Err(EnrichError::Remote { message }) => assert_eq!(message, "Invalid request"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_tolerates_null_results() {
        let env: Envelope<i64> =
            serde_json::from_value(json!({"success": false, "errors": [], "results": null}))
                .unwrap();
        assert!(env.into_results().unwrap().is_empty());
    }

    #[test]
    fn detail_decodes_wire_shape_and_exposes_number() {
        let detail: DetailRecord = serde_json::from_value(json!({
            "productId": 500,
            "name": "Blue-Eyes White Dragon",
            "cleanName": "Blue Eyes White Dragon",
            "imageUrl": "https://example.com/500.jpg",
            "categoryId": 2,
            "groupId": 10,
            "url": "https://example.com/p/500",
            "modifiedOn": "2020-01-01T00:00:00",
            "extendedData": [
                {"name": "Rarity", "displayName": "Rarity", "value": "Ultra Rare"},
                {"name": "Number", "displayName": "Card Number", "value": "lob-001"}
            ]
        }))
        .unwrap();
        assert_eq!(detail.number(), Some("lob-001"));
        assert_eq!(detail.catalog_fields().get("Rarity"), Some(&"Ultra Rare"));
        let record = EnrichedRecord::new(detail, vec![]);
        assert_eq!(record.identifier().as_deref(), Some("LOB-001"));
    }

    #[test]
    fn price_quote_reads_sub_type_name_as_variant() {
        let q: PriceQuote = serde_json::from_value(json!({
            "productId": 500,
            "lowPrice": 30.0,
            "midPrice": 40.0,
            "highPrice": 99.99,
            "marketPrice": 45.5,
            "directLowPrice": null,
            "subTypeName": "1st Edition"
        }))
        .unwrap();
        assert_eq!(q.variant, "1st Edition");
        assert!(q.has_market_price());
    }

    #[test]
    fn event_serializes_with_camel_case_wire_names() {
        let ev = Event::terminated("app", BatchOutcome { attempted: 3, succeeded: 2 }, false);
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "terminated");
        assert_eq!(v["appName"], "app");
        assert_eq!(v["isError"], false);
        assert_eq!(v["succeeded"], 2);
        assert!(v.get("timeStamp").is_some());
    }

    #[test]
    fn credential_debug_hides_token() {
        let c = Credential { token: "secret-token".into(), expires_at: None };
        assert!(!format!("{c:?}").contains("secret-token"));
        assert!(!c.is_expired(Utc::now()));
    }
}
