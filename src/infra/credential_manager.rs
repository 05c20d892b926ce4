use crate::app::ports::CredentialPort;
use crate::config::ClientCredentials;
use crate::error::{EnrichError, Result};
use crate::types::{Credential, TokenResponse};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{PoisonError, RwLock};
use tracing::{info, instrument, warn};

/// Holds the bearer credential for the current batch.
///
/// `refresh` swaps the whole value under a write lock, so readers observe either the
/// previous credential or the new one. A failed refresh leaves no usable credential.
pub struct CredentialManager {
    http: reqwest::Client,
    token_url: String,
    current: RwLock<Option<Credential>>,
}

impl CredentialManager {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            token_url: format!("{}/token", base_url.trim_end_matches('/')),
            current: RwLock::new(None),
        }
    }

    /// The held credential, if one exists and has not expired.
    pub fn current(&self) -> Result<Credential> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(c) if c.is_expired(Utc::now()) => {
                Err(EnrichError::Auth("credential expired".to_string()))
            }
            Some(c) => Ok(c.clone()),
            None => Err(EnrichError::Auth("no credential held".to_string())),
        }
    }

    fn store(&self, credential: Option<Credential>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = credential;
    }

    async fn exchange(&self, credentials: &ClientCredentials) -> Result<Credential> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose()),
        ];
        let resp = self.http.post(&self.token_url).form(&form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EnrichError::Auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }
        let body: TokenResponse = resp.json().await?;
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EnrichError::Auth("token response had no access_token".to_string()))?;
        let expires_at = body
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        Ok(Credential { token, expires_at })
    }
}

#[async_trait]
impl CredentialPort for CredentialManager {
    #[instrument(skip_all, fields(client_id = %credentials.client_id))]
    async fn refresh(&self, credentials: &ClientCredentials) -> Result<Credential> {
        match self.exchange(credentials).await {
            Ok(credential) => {
                info!(expires_at = ?credential.expires_at, "Refreshed catalog credential");
                self.store(Some(credential.clone()));
                Ok(credential)
            }
            Err(e) => {
                warn!("Credential refresh failed: {}", e);
                self.store(None);
                Err(match e {
                    EnrichError::Auth(_) => e,
                    other => EnrichError::Auth(other.to_string()),
                })
            }
        }
    }
}
