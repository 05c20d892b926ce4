/// Catalog service defaults and wire names shared across the crate

pub const DEFAULT_BASE_URL: &str = "https://api.tcgplayer.com";
pub const DEFAULT_API_VERSION: &str = "v1.37.0";
/// Yu-Gi-Oh! category in the catalog.
pub const DEFAULT_CATEGORY_ID: u32 = 2;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// One pause per item keeps three calls per item under 300 calls/minute.
pub const DEFAULT_THROTTLE_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_APP_NAME: &str = "ygo-card-processor";
pub const DEFAULT_EVENT_TOPIC: &str = "card-processor-events";
pub const DEFAULT_STORAGE_PATH: &str = "data/cards.json";

/// Extended-data field carrying the card number.
pub const NUMBER_FIELD: &str = "Number";

// Event names published on the notification channel
pub const EVENT_STARTED: &str = "started";
pub const EVENT_ITEM_ERROR: &str = "item-error";
pub const EVENT_TERMINATED: &str = "terminated";

// Environment overrides
pub const ENV_CLIENT_ID: &str = "CARD_ENRICHER_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "CARD_ENRICHER_CLIENT_SECRET";
pub const ENV_BASE_URL: &str = "CARD_ENRICHER_BASE_URL";
pub const ENV_PORT: &str = "CARD_ENRICHER_PORT";
pub const ENV_KAFKA_BROKERS: &str = "CARD_ENRICHER_KAFKA_BROKERS";
