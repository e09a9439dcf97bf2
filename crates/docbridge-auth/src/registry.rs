//! Client registry (RFC 7591 dynamic client registration).

use chrono::Utc;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::store::{SharedStore, StoreError};
use crate::types::{ClientMetadata, GrantType, RegisteredClient};

/// Identifier allocation attempts before giving up.
const MAX_ID_ATTEMPTS: usize = 4;

/// Registration response members only the server may set (RFC 7591 §3.2.1).
const SERVER_OWNED_MEMBERS: [&str; 4] = [
    "client_id",
    "client_id_issued_at",
    "client_secret",
    "client_secret_expires_at",
];

/// Registers and resolves OAuth clients.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: SharedStore<RegisteredClient>,
}

impl ClientRegistry {
    /// Registry over `clients`.
    pub fn new(clients: SharedStore<RegisteredClient>) -> Self {
        Self { clients }
    }

    /// Validate `metadata` and register a new public client.
    ///
    /// # Errors
    ///
    /// - `invalid_redirect_uri` if a redirect URI is missing, relative, or has a fragment
    /// - `invalid_client_metadata` for unsupported grant/response types or auth methods
    /// - `Storage` if the store is unavailable
    pub async fn register_client(&self, metadata: ClientMetadata) -> AuthResult<RegisteredClient> {
        if let Err(err) = validate_metadata(&metadata) {
            warn!(error = %err, "client registration rejected");
            return Err(err);
        }

        for _ in 0..MAX_ID_ATTEMPTS {
            let client = RegisteredClient {
                client_id: Uuid::new_v4().to_string(),
                client_id_issued_at: Utc::now().timestamp(),
                metadata: metadata.clone(),
            };
            if self.clients.insert_if_absent(&client.client_id, &client).await? {
                info!(
                    client_id = %client.client_id,
                    client_name = client.metadata.client_name.as_deref().unwrap_or(""),
                    redirect_uris = client.metadata.redirect_uris.len(),
                    "registered OAuth client"
                );
                return Ok(client);
            }
        }

        Err(StoreError::KeyExhausted("clients").into())
    }

    /// Look up a client.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store is unavailable.
    pub async fn get_client(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        Ok(self.clients.get(client_id).await?)
    }

    /// Look up a client, failing with `invalid_client` if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown identifiers and `Storage` if the
    /// store is unavailable.
    pub async fn resolve_client(&self, client_id: &str) -> AuthResult<RegisteredClient> {
        self.get_client(client_id)
            .await?
            .ok_or(AuthError::InvalidClient("unknown client_id"))
    }
}

fn validate_metadata(metadata: &ClientMetadata) -> AuthResult<()> {
    if SERVER_OWNED_MEMBERS
        .iter()
        .any(|member| metadata.extra.contains_key(*member))
    {
        return Err(AuthError::InvalidClientMetadata(
            "client_id, client_id_issued_at and client secrets are assigned by the server",
        ));
    }

    if metadata.redirect_uris.is_empty() {
        return Err(AuthError::InvalidRedirectUri(
            "at least one redirect_uri is required",
        ));
    }

    for uri in &metadata.redirect_uris {
        let parsed = Url::parse(uri)
            .map_err(|_| AuthError::InvalidRedirectUri("redirect_uri must be an absolute URL"))?;
        if parsed.fragment().is_some() {
            return Err(AuthError::InvalidRedirectUri(
                "redirect_uri must not contain a fragment",
            ));
        }
    }

    if metadata.grant_types.is_empty() {
        return Err(AuthError::InvalidClientMetadata("grant_types must not be empty"));
    }
    for grant in &metadata.grant_types {
        grant
            .parse::<GrantType>()
            .map_err(|_| AuthError::InvalidClientMetadata("unsupported grant_type"))?;
    }
    if !metadata
        .grant_types
        .iter()
        .any(|g| g == GrantType::AuthorizationCode.as_str())
    {
        return Err(AuthError::InvalidClientMetadata(
            "grant_types must include authorization_code",
        ));
    }

    if metadata.response_types.iter().any(|r| r != "code") {
        return Err(AuthError::InvalidClientMetadata(
            "only the code response_type is supported",
        ));
    }

    if metadata.token_endpoint_auth_method != "none" {
        return Err(AuthError::InvalidClientMetadata(
            "only public clients (token_endpoint_auth_method=none) are supported",
        ));
    }

    Ok(())
}
