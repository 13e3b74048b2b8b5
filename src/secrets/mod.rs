//! Secret resolution from Azure Key Vault
//!
//! - [`credential`]: access token credentials and the credential chain
//! - [`vault`]: the Key Vault secret client and stream secret resolution

pub mod credential;
pub mod vault;

pub use credential::{
    AccessToken, AzureCliCredential, ChainedTokenCredential, ClientSecretCredential,
    CredentialError, ManagedIdentityCredential, TokenCredential, KEY_VAULT_SCOPE,
};
pub use vault::{
    resolve_stream_secrets, SecretClient, SecretError, SecretSource, StreamSecrets,
    CONNECTION_STRING_SECRET, DEFAULT_API_VERSION, HUB_NAME_SECRET,
};
