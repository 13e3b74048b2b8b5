//! Key Vault secret retrieval.
//!
//! [`SecretClient`] reads secrets through the Key Vault REST API
//! (`GET {vault}/secrets/{name}?api-version=...`). Startup resolves the two
//! stream secrets with [`resolve_stream_secrets`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::credential::{CredentialError, TokenCredential, KEY_VAULT_SCOPE};

/// Secret holding the Event Hubs connection string.
pub const CONNECTION_STRING_SECRET: &str = "EventHubConnectionString";

/// Secret holding the event hub name.
pub const HUB_NAME_SECRET: &str = "EventHubName";

/// Key Vault REST API version.
pub const DEFAULT_API_VERSION: &str = "7.4";

/// Errors that can occur while reading secrets.
#[derive(Error, Debug)]
pub enum SecretError {
    /// The secret does not exist.
    #[error("Secret '{0}' not found")]
    NotFound(String),

    /// The caller may not read the secret.
    #[error("Not authorized to read secret '{name}': {message}")]
    Authentication {
        /// Secret name.
        name: String,
        /// Message from Key Vault.
        message: String,
    },

    /// Any other non-success response.
    #[error("Key Vault returned {status} for secret '{name}': {message}")]
    Api {
        /// Secret name.
        name: String,
        /// HTTP status code.
        status: u16,
        /// Message from Key Vault.
        message: String,
    },

    /// The secret exists but has no value.
    #[error("Secret '{0}' is empty")]
    Empty(String),

    /// The vault URL is unusable.
    #[error("Invalid Key Vault URL: {0}")]
    InvalidUrl(String),

    /// Transport failure.
    #[error("Key Vault request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No token could be acquired.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// A source of named string secrets.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Get the current value of the secret `name`.
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

/// Key Vault client.
pub struct SecretClient {
    http: Client,
    vault_url: Url,
    api_version: String,
    credential: Arc<dyn TokenCredential>,
}

impl SecretClient {
    /// Create a client for `vault_url`.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::InvalidUrl` if the URL cannot be a base URL,
    /// or `SecretError::Http` if the HTTP client cannot be built.
    pub fn new(
        vault_url: &str,
        credential: Arc<dyn TokenCredential>,
        timeout: Duration,
    ) -> Result<Self, SecretError> {
        let mut url =
            Url::parse(vault_url).map_err(|e| SecretError::InvalidUrl(format!("{}: {}", vault_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(SecretError::InvalidUrl(vault_url.to_string()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("laekning-eventhub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            vault_url: url,
            api_version: DEFAULT_API_VERSION.to_string(),
            credential,
        })
    }

    /// Use another REST API version.
    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }

    /// The vault URL, always ending in `/`.
    pub fn vault_url(&self) -> &Url {
        &self.vault_url
    }

    /// Public-cloud vault URL for a vault name.
    ///
    /// # Examples
    ///
    /// ```
    /// use laekning_eventhub::secrets::SecretClient;
    ///
    /// assert_eq!(
    ///     SecretClient::vault_url_for("defaultvault"),
    ///     "https://defaultvault.vault.azure.net/"
    /// );
    /// ```
    pub fn vault_url_for(vault_name: &str) -> String {
        format!("https://{}.vault.azure.net/", vault_name)
    }

    fn secret_url(&self, name: &str) -> Result<Url, SecretError> {
        let mut url = self
            .vault_url
            .join(&format!("secrets/{}", name))
            .map_err(|e| SecretError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }
}

/// Extract `error.message` from a Key Vault error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl SecretSource for SecretClient {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let token = self.credential.get_token(KEY_VAULT_SCOPE).await?;
        let url = self.secret_url(name)?;
        debug!(secret = %name, vault = %self.vault_url, "Fetching secret");

        let response = self.http.get(url).bearer_auth(&token.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = error_message(&response.text().await.unwrap_or_default());
            return Err(match status {
                StatusCode::NOT_FOUND => SecretError::NotFound(name.to_string()),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SecretError::Authentication {
                    name: name.to_string(),
                    message,
                },
                _ => SecretError::Api {
                    name: name.to_string(),
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let bundle: SecretBundle = response.json().await?;
        Ok(bundle.value.unwrap_or_default())
    }
}

/// The secrets needed to open the stream.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamSecrets {
    /// Event Hubs connection string.
    pub connection_string: String,
    /// Event hub name.
    pub hub_name: String,
}

impl fmt::Debug for StreamSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSecrets")
            .field("connection_string", &"<redacted>")
            .field("hub_name", &self.hub_name)
            .finish()
    }
}

impl StreamSecrets {
    /// Build from already-known values, rejecting empty ones.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::Empty` naming the first empty value.
    pub fn new(
        connection_string: &str,
        hub_name: &str,
        connection_secret: &str,
        hub_secret: &str,
    ) -> Result<Self, SecretError> {
        if connection_string.trim().is_empty() {
            return Err(SecretError::Empty(connection_secret.to_string()));
        }
        if hub_name.trim().is_empty() {
            return Err(SecretError::Empty(hub_secret.to_string()));
        }
        Ok(Self {
            connection_string: connection_string.trim().to_string(),
            hub_name: hub_name.trim().to_string(),
        })
    }
}

/// Fetch the connection string and hub name secrets.
///
/// # Errors
///
/// Fails if either secret cannot be read or is empty.
pub async fn resolve_stream_secrets(
    source: &dyn SecretSource,
    connection_secret: &str,
    hub_secret: &str,
) -> Result<StreamSecrets, SecretError> {
    let connection_string = source.get_secret(connection_secret).await?;
    let hub_name = source.get_secret(hub_secret).await?;
    let secrets = StreamSecrets::new(&connection_string, &hub_name, connection_secret, hub_secret)?;
    info!(hub = %secrets.hub_name, "Resolved stream secrets from Key Vault");
    Ok(secrets)
}
