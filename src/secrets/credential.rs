//! Azure access token credentials.
//!
//! Key Vault requests are authorized with a bearer token for the
//! [`KEY_VAULT_SCOPE`] scope. Tokens come from one of three credentials,
//! tried in order by [`ChainedTokenCredential::from_env`]:
//!
//! 1. [`ClientSecretCredential`]: a service principal from `AZURE_TENANT_ID`,
//!    `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`
//! 2. [`ManagedIdentityCredential`]: App Service style identity endpoint or
//!    the instance metadata service
//! 3. [`AzureCliCredential`]: `az account get-access-token`
//!
//! The chain caches tokens per scope until shortly before they expire.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// Scope of Key Vault data-plane tokens.
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Default Microsoft Entra authority.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Longest wait for `az account get-access-token`.
const AZURE_CLI_TIMEOUT: Duration = Duration::from_secs(10);

/// Tokens closer than this to expiry are refreshed.
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Errors that can occur while acquiring a token.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The credential lacks the environment it needs.
    #[error("{credential} unavailable: {reason}")]
    Unavailable {
        /// Credential name.
        credential: &'static str,
        /// Why it cannot be used.
        reason: String,
    },

    /// The token request failed.
    #[error("{credential} token request failed: {message}")]
    Request {
        /// Credential name.
        credential: &'static str,
        /// Failure description.
        message: String,
    },

    /// The token response could not be understood.
    #[error("{credential} returned an invalid token response: {message}")]
    InvalidResponse {
        /// Credential name.
        credential: &'static str,
        /// Failure description.
        message: String,
    },

    /// Every credential in a chain failed.
    #[error("no credential could provide a token: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// A bearer token and its expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Token value.
    pub token: String,
    /// Expiry instant.
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token.
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Returns true if the token is still usable at `now`, allowing the
    /// refresh margin.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use laekning_eventhub::secrets::AccessToken;
    ///
    /// let now = Utc::now();
    /// assert!(AccessToken::new("t", now + Duration::hours(1)).is_fresh_at(now));
    /// assert!(!AccessToken::new("t", now + Duration::minutes(2)).is_fresh_at(now));
    /// ```
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Something that can produce access tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Acquire a token for `scope`.
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Strip the `/.default` suffix to obtain a v1 resource identifier.
fn resource_for(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Read a seconds value that may be encoded as a number or a string.
fn seconds(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compute an expiry from `expires_on` (epoch seconds) or `expires_in`.
fn expiry_from(expires_on: Option<&Value>, expires_in: Option<&Value>) -> Option<DateTime<Utc>> {
    if let Some(epoch) = seconds(expires_on) {
        return Utc.timestamp_opt(epoch, 0).single();
    }
    seconds(expires_in).map(|secs| Utc::now() + chrono::Duration::seconds(secs))
}

/// Build an error from a non-success token endpoint response.
async fn request_failure(credential: &'static str, response: reqwest::Response) -> CredentialError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error_description")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);
    CredentialError::Request {
        credential,
        message: format!("{}: {}", status, detail.trim()),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<Value>,
    #[serde(default)]
    expires_in: Option<Value>,
}

impl TokenResponse {
    fn into_token(self, credential: &'static str) -> Result<AccessToken, CredentialError> {
        let expires_on = expiry_from(self.expires_on.as_ref(), self.expires_in.as_ref())
            .ok_or_else(|| CredentialError::InvalidResponse {
                credential,
                message: "missing token expiry".to_string(),
            })?;
        Ok(AccessToken::new(self.access_token, expires_on))
    }
}

/// Service principal credential using the client credentials grant.
pub struct ClientSecretCredential {
    http: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    const NAME: &'static str = "ClientSecretCredential";

    /// Create a credential against the default authority.
    pub fn new(http: Client, tenant_id: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            http,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// Use another authority host, e.g. a sovereign cloud or a test server.
    pub fn with_authority_host(mut self, authority_host: &str) -> Self {
        self.authority_host = authority_host.to_string();
        self
    }

    /// Create a credential from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`,
    /// `AZURE_CLIENT_SECRET` and optionally `AZURE_AUTHORITY_HOST`.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Unavailable` if a variable is missing.
    pub fn from_env(http: Client) -> Result<Self, CredentialError> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| CredentialError::Unavailable {
                    credential: Self::NAME,
                    reason: format!("{} is not set", name),
                })
        };
        let tenant_id = var("AZURE_TENANT_ID")?;
        let client_id = var("AZURE_CLIENT_ID")?;
        let client_secret = var("AZURE_CLIENT_SECRET")?;

        let mut credential = Self::new(http, &tenant_id, &client_id, &client_secret);
        if let Ok(host) = std::env::var("AZURE_AUTHORITY_HOST") {
            credential = credential.with_authority_host(&host);
        }
        Ok(credential)
    }

    fn token_url(&self) -> Result<Url, CredentialError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        );
        Url::parse(&url).map_err(|e| CredentialError::Unavailable {
            credential: Self::NAME,
            reason: format!("invalid token endpoint '{}': {}", url, e),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let url = self.token_url()?;
        debug!(url = %url, client_id = %self.client_id, "Requesting client secret token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];
        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CredentialError::Request {
                credential: Self::NAME,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(request_failure(Self::NAME, response).await);
        }

        let body: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| CredentialError::InvalidResponse {
                    credential: Self::NAME,
                    message: e.to_string(),
                })?;
        body.into_token(Self::NAME)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Managed identity credential.
///
/// Uses `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` when both are set (App
/// Service, Functions, Container Apps) and the instance metadata service
/// otherwise. A user-assigned identity is selected with `AZURE_CLIENT_ID`.
pub struct ManagedIdentityCredential {
    http: Client,
    endpoint: Url,
    identity_header: Option<String>,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    const NAME: &'static str = "ManagedIdentityCredential";

    /// Create a credential for an explicit endpoint.
    ///
    /// With `identity_header` the App Service protocol is used, otherwise
    /// the instance metadata protocol.
    pub fn new(http: Client, endpoint: Url, identity_header: Option<String>) -> Self {
        Self {
            http,
            endpoint,
            identity_header,
            client_id: None,
        }
    }

    /// Select a user-assigned identity.
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    /// Create a credential from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Unavailable` if `IDENTITY_ENDPOINT` is not a
    /// URL.
    pub fn from_env(http: Client) -> Result<Self, CredentialError> {
        let client_id = std::env::var("AZURE_CLIENT_ID").ok();
        let endpoint = std::env::var("IDENTITY_ENDPOINT").ok();
        let header = std::env::var("IDENTITY_HEADER").ok();

        let (endpoint, header) = match (endpoint, header) {
            (Some(endpoint), Some(header)) => (endpoint, Some(header)),
            _ => (IMDS_ENDPOINT.to_string(), None),
        };
        let endpoint = Url::parse(&endpoint).map_err(|e| CredentialError::Unavailable {
            credential: Self::NAME,
            reason: format!("invalid identity endpoint '{}': {}", endpoint, e),
        })?;

        Ok(Self::new(http, endpoint, header).with_client_id(client_id))
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            match self.identity_header {
                Some(_) => query.append_pair("api-version", APP_SERVICE_API_VERSION),
                None => query.append_pair("api-version", IMDS_API_VERSION),
            };
            query.append_pair("resource", resource_for(scope));
            if let Some(client_id) = &self.client_id {
                query.append_pair("client_id", client_id);
            }
        }

        let request = match &self.identity_header {
            Some(header) => self.http.get(url).header("X-IDENTITY-HEADER", header),
            None => self
                .http
                .get(url)
                .header("Metadata", "true")
                .timeout(Duration::from_secs(3)),
        };

        let response = request.send().await.map_err(|e| CredentialError::Request {
            credential: Self::NAME,
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(request_failure(Self::NAME, response).await);
        }

        let body: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| CredentialError::InvalidResponse {
                    credential: Self::NAME,
                    message: e.to_string(),
                })?;
        body.into_token(Self::NAME)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Credential that asks a signed-in Azure CLI for a token.
#[derive(Debug)]
pub struct AzureCliCredential {
    timeout: Duration,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self {
            timeout: AZURE_CLI_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<Value>,
}

impl AzureCliCredential {
    const NAME: &'static str = "AzureCliCredential";

    /// Bound how long the CLI may take.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `command`, killing it if it outlives `timeout`.
    async fn run(
        mut command: tokio::process::Command,
        timeout: Duration,
    ) -> Result<std::process::Output, CredentialError> {
        command.kill_on_drop(true);
        match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(CredentialError::Unavailable {
                credential: Self::NAME,
                reason: format!("failed to run Azure CLI: {}", e),
            }),
            Err(_) => Err(CredentialError::Unavailable {
                credential: Self::NAME,
                reason: format!("Azure CLI timed out after {:?}", timeout),
            }),
        }
    }

    fn program() -> &'static str {
        if cfg!(windows) {
            "az.cmd"
        } else {
            "az"
        }
    }

    /// Parse the JSON printed by `az account get-access-token`.
    fn parse_output(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
        let invalid = |message: String| CredentialError::InvalidResponse {
            credential: Self::NAME,
            message,
        };
        let token: CliToken = serde_json::from_slice(stdout).map_err(|e| invalid(e.to_string()))?;

        // Newer CLIs print epoch seconds; older ones only a local time.
        let expires_on = match seconds(token.expires_on_epoch.as_ref()) {
            Some(epoch) => Utc.timestamp_opt(epoch, 0).single(),
            None => token
                .expires_on
                .as_deref()
                .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
                .and_then(|naive| Local.from_local_datetime(&naive).single())
                .map(|local| local.with_timezone(&Utc)),
        }
        .ok_or_else(|| invalid("missing or unreadable expiry".to_string()))?;

        Ok(AccessToken::new(token.access_token, expires_on))
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        debug!("Requesting token from Azure CLI");
        let mut command = tokio::process::Command::new(Self::program());
        command.args([
            "account",
            "get-access-token",
            "--output",
            "json",
            "--resource",
            resource_for(scope),
        ]);
        let output = Self::run(command, self.timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::Request {
                credential: Self::NAME,
                message: stderr.trim().to_string(),
            });
        }

        Self::parse_output(&output.stdout)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Tries credentials in order and caches the first token obtained.
pub struct ChainedTokenCredential {
    sources: Vec<Box<dyn TokenCredential>>,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl ChainedTokenCredential {
    const NAME: &'static str = "ChainedTokenCredential";

    /// Create a chain over `sources`.
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Build the default chain from the process environment.
    ///
    /// The client secret credential is included only when its variables are
    /// set.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Unavailable` if the HTTP client cannot be
    /// built or the managed identity endpoint is invalid.
    pub fn from_env(timeout: Duration) -> Result<Self, CredentialError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("laekning-eventhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CredentialError::Unavailable {
                credential: Self::NAME,
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        let mut sources: Vec<Box<dyn TokenCredential>> = Vec::new();
        match ClientSecretCredential::from_env(http.clone()) {
            Ok(credential) => sources.push(Box::new(credential)),
            Err(e) => debug!("Skipping client secret credential: {}", e),
        }
        sources.push(Box::new(ManagedIdentityCredential::from_env(http)?));
        sources.push(Box::new(AzureCliCredential::default()));

        Ok(Self::new(sources))
    }

    /// Names of the credentials in the chain, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(scope) {
            if token.is_fresh_at(Utc::now()) {
                debug!(scope, "Using cached access token");
                return Ok(token.clone());
            }
            debug!(scope, "Cached access token expired, refreshing");
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!(credential = source.name(), "Acquired access token");
                    cache.insert(scope.to_string(), token.clone());
                    return Ok(token);
                }
                Err(e) => {
                    debug!(credential = source.name(), error = %e, "Credential failed");
                    failures.push(e.to_string());
                }
            }
        }

        Err(CredentialError::Exhausted(failures))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(value: &str, minutes: i64) -> AccessToken {
        AccessToken::new(value, Utc::now() + ChronoDuration::minutes(minutes))
    }

    #[test]
    fn test_resource_for_scope() {
        assert_eq!(resource_for(KEY_VAULT_SCOPE), "https://vault.azure.net");
        assert_eq!(resource_for("https://example"), "https://example");
    }

    #[test]
    fn test_expiry_from_number_and_string() {
        let on = expiry_from(Some(&json!("1700000000")), None).unwrap();
        assert_eq!(on.timestamp(), 1_700_000_000);

        let before = Utc::now();
        let in_hour = expiry_from(None, Some(&json!(3600))).unwrap();
        assert!(in_hour >= before + ChronoDuration::seconds(3600));

        assert!(expiry_from(None, Some(&json!(true))).is_none());
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let debug = format!("{:?}", token("super-secret", 60));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_cli_output_with_epoch() {
        let out = br#"{"accessToken":"abc","expiresOn":"2024-01-01 10:00:00.000000","expires_on":1704103200,"tokenType":"Bearer"}"#;
        let token = AzureCliCredential::parse_output(out).unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expires_on.timestamp(), 1_704_103_200);
    }

    #[test]
    fn test_cli_output_with_local_time_only() {
        let out = br#"{"accessToken":"abc","expiresOn":"2030-01-01 10:00:00.000000"}"#;
        let token = AzureCliCredential::parse_output(out).unwrap();
        assert!(token.expires_on > Utc::now());
    }

    #[test]
    fn test_cli_output_invalid() {
        let err = AzureCliCredential::parse_output(b"ERROR: Please run 'az login'").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidResponse { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cli_run_times_out() {
        let mut command = tokio::process::Command::new("sleep");
        command.arg("5");

        let started = std::time::Instant::now();
        let err = AzureCliCredential::run(command, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(matches!(err, CredentialError::Unavailable { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_cli_default_timeout() {
        assert_eq!(AzureCliCredential::default().timeout, AZURE_CLI_TIMEOUT);
        let credential = AzureCliCredential::default().with_timeout(Duration::from_secs(2));
        assert_eq!(credential.timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_client_secret_credential_requests_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-1"))
            .and(body_string_contains("scope=https%3A%2F%2Fvault.azure.net%2F.default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "vault-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ClientSecretCredential::new(Client::new(), "tenant-1", "app-1", "s3cret")
            .with_authority_host(&server.uri());
        let token = credential.get_token(KEY_VAULT_SCOPE).await.unwrap();

        assert_eq!(token.token, "vault-token");
        assert!(token.is_fresh_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_client_secret_credential_reports_error_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })))
            .mount(&server)
            .await;

        let credential = ClientSecretCredential::new(Client::new(), "tenant-1", "app-1", "wrong")
            .with_authority_host(&server.uri());
        let err = credential.get_token(KEY_VAULT_SCOPE).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("Invalid client secret"));
    }

    #[tokio::test]
    async fn test_managed_identity_app_service_protocol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/msi/token"))
            .and(query_param("api-version", APP_SERVICE_API_VERSION))
            .and(query_param("resource", "https://vault.azure.net"))
            .and(header("X-IDENTITY-HEADER", "header-value"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "mi-token",
                "expires_on": "4102444800",
                "resource": "https://vault.azure.net",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/msi/token", server.uri())).unwrap();
        let credential =
            ManagedIdentityCredential::new(Client::new(), endpoint, Some("header-value".into()));
        let token = credential.get_token(KEY_VAULT_SCOPE).await.unwrap();

        assert_eq!(token.token, "mi-token");
        assert_eq!(token.expires_on.timestamp(), 4_102_444_800);
    }

    #[tokio::test]
    async fn test_managed_identity_imds_protocol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/identity/oauth2/token"))
            .and(query_param("api-version", IMDS_API_VERSION))
            .and(query_param("client_id", "user-assigned"))
            .and(header("Metadata", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "imds-token",
                "expires_in": "3600"
            })))
            .mount(&server)
            .await;

        let endpoint =
            Url::parse(&format!("{}/metadata/identity/oauth2/token", server.uri())).unwrap();
        let credential = ManagedIdentityCredential::new(Client::new(), endpoint, None)
            .with_client_id(Some("user-assigned".into()));
        let token = credential.get_token(KEY_VAULT_SCOPE).await.unwrap();

        assert_eq!(token.token, "imds-token");
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_next_credential() {
        let mut failing = MockTokenCredential::new();
        failing.expect_get_token().times(1).returning(|_| {
            Err(CredentialError::Unavailable {
                credential: "First",
                reason: "not configured".to_string(),
            })
        });
        failing.expect_name().return_const("First");

        let mut working = MockTokenCredential::new();
        working
            .expect_get_token()
            .times(1)
            .returning(|_| Ok(token("second", 60)));
        working.expect_name().return_const("Second");

        let chain = ChainedTokenCredential::new(vec![Box::new(failing), Box::new(working)]);
        assert_eq!(chain.names(), vec!["First", "Second"]);
        assert_eq!(chain.get_token(KEY_VAULT_SCOPE).await.unwrap().token, "second");
    }

    #[tokio::test]
    async fn test_chain_reports_every_failure() {
        let mut first = MockTokenCredential::new();
        first.expect_get_token().returning(|_| {
            Err(CredentialError::Request {
                credential: "First",
                message: "boom".to_string(),
            })
        });
        first.expect_name().return_const("First");
        let mut second = MockTokenCredential::new();
        second.expect_get_token().returning(|_| {
            Err(CredentialError::Unavailable {
                credential: "Second",
                reason: "no cli".to_string(),
            })
        });
        second.expect_name().return_const("Second");

        let chain = ChainedTokenCredential::new(vec![Box::new(first), Box::new(second)]);
        let err = chain.get_token(KEY_VAULT_SCOPE).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "no credential could provide a token: First token request failed: boom; Second unavailable: no cli"
        );
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
        minutes: i64,
    }

    #[async_trait]
    impl TokenCredential for Counting {
        async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(token(&format!("token-{}", n), self.minutes))
        }

        fn name(&self) -> &'static str {
            "Counting"
        }
    }

    #[tokio::test]
    async fn test_chain_caches_fresh_tokens() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = ChainedTokenCredential::new(vec![Box::new(Counting {
            calls: calls.clone(),
            minutes: 60,
        })]);

        let first = chain.get_token(KEY_VAULT_SCOPE).await.unwrap();
        let second = chain.get_token(KEY_VAULT_SCOPE).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chain_refreshes_tokens_near_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = ChainedTokenCredential::new(vec![Box::new(Counting {
            calls: calls.clone(),
            minutes: 1,
        })]);

        chain.get_token(KEY_VAULT_SCOPE).await.unwrap();
        let second = chain.get_token(KEY_VAULT_SCOPE).await.unwrap();
        assert_eq!(second.token, "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
