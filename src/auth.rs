//! Access tokens for Google APIs.
//!
//! [`TokenProvider`] is the seam the API clients authenticate through.
//! [`ServiceAccountAuth`] implements it for the service-account key file
//! used by the sheet writer; the Drive listing uses the user token from
//! [`crate::credential_store::CredentialStore`].

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scopes needed to find a spreadsheet by name and write its values.
pub const SHEETS_SCOPES: &[&str] = &[
    "https://spreadsheets.google.com/feeds",
    "https://www.googleapis.com/auth/drive",
];

/// Something that can hand out a bearer token for Google APIs.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // Space separated OAuth scopes
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration (unix seconds).
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Authenticator for Google APIs using service account credentials.
#[derive(Clone)]
pub struct ServiceAccountAuth {
    credentials: Arc<ServiceAccountCredentials>,
    scopes: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    /// Create a new authenticator from a service account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P, scopes: &[&str]) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials, scopes))
    }

    /// Create a new authenticator from credentials.
    pub fn new(credentials: ServiceAccountCredentials, scopes: &[&str]) -> Self {
        Self {
            credentials: Arc::new(credentials),
            scopes: scopes.join(" "),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Service account email the tokens are issued for.
    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    fn token_uri(&self) -> &str {
        self.credentials.token_uri.as_deref().unwrap_or(TOKEN_URI)
    }

    fn claims(&self, now: u64) -> Claims {
        Claims {
            iss: self.credentials.client_email.clone(),
            scope: self.scopes.clone(),
            aud: self.token_uri().to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        }
    }

    /// Exchange a signed JWT assertion for an access token.
    async fn fetch_token(&self) -> Result<CachedToken> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &self.claims(now), &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", &jwt),
        ];

        let response = self
            .client
            .post(self.token_uri())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        debug!(
            client_email = %self.credentials.client_email,
            expires_in = token_response.expires_in,
            "Obtained service account token"
        );

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: now as i64 + token_response.expires_in as i64,
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                // 60 second buffer before expiration
                if token.expires_at > chrono::Utc::now().timestamp() + 60 {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.fetch_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }
}
