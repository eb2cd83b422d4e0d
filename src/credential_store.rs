//! User credentials for the Drive API.
//!
//! The store keeps the user's OAuth token in a JSON cache file. When the
//! cached token is missing or expired it is refreshed, or a full browser
//! login on a loopback redirect is run, and the result is written back.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use reqwest::{Client, Url};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::error::{Result, SyncError};
use crate::models::{ClientSecret, ClientSecretFile, StoredToken};

/// Read-only access to file metadata. Changing it invalidates the token cache.
pub const DRIVE_METADATA_SCOPE: &str = "https://www.googleapis.com/auth/drive.metadata.readonly";

/// Port of the loopback redirect used by the interactive login.
pub const CALLBACK_PORT: u16 = 49555;

const CALLBACK_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: text/html; charset=utf-8\r\n\
Connection: close\r\n\r\n\
<html><body>The authentication flow has completed. You may close this window.</body></html>";

const NOT_FOUND_RESPONSE: &str = "HTTP/1.1 404 Not Found\r\n\
Content-Length: 0\r\n\
Connection: close\r\n\r\n";

/// Upper bound on the request head read from a callback connection.
const MAX_REQUEST_HEAD: usize = 16 * 1024;

/// How long a partially received request may stall before it is parsed as is.
const REQUEST_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// OAuth client with only the token endpoint configured.
type TokenClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Shows the authorization URL to the user during an interactive login.
///
/// The loopback listener is already bound when this is called, so an
/// implementation may hit the redirect itself.
pub trait LoginDelegate: Send + Sync {
    fn present_user_url(&self, url: &Url);
}

/// Prints the authorization URL and tries to open it in the default browser.
pub struct BrowserDelegate;

impl LoginDelegate for BrowserDelegate {
    fn present_user_url(&self, url: &Url) {
        println!("Please visit this URL to authorize this application: {}", url);
        if let Err(e) = open::that(url.as_str()) {
            warn!(error = %e, "Could not open a browser, open the URL manually");
        }
    }
}

/// Query parameters of the redirect that ends a login.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code { code: String, state: String },
    Denied(String),
}

/// Token cache backed by a JSON file, driving the login flow when needed.
pub struct CredentialStore {
    client_secret_path: PathBuf,
    token_path: PathBuf,
    callback_port: u16,
    delegate: Arc<dyn LoginDelegate>,
    http: Client,
    token: RwLock<Option<StoredToken>>,
}

impl CredentialStore {
    /// Create a store.
    ///
    /// # Arguments
    /// * `client_secret_path` - OAuth client secret JSON, only read when a login is needed
    /// * `token_path` - token cache file, created on the first successful login
    pub fn new(client_secret_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        // Token endpoints must not be followed through redirects.
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            client_secret_path: client_secret_path.into(),
            token_path: token_path.into(),
            callback_port: CALLBACK_PORT,
            delegate: Arc::new(BrowserDelegate),
            http,
            token: RwLock::new(None),
        }
    }

    /// Use another port for the loopback redirect (0 picks a free one).
    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    /// Replace the browser prompt used by the interactive login.
    pub fn with_login_delegate(mut self, delegate: Arc<dyn LoginDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Load the cached token, `None` if the cache file does not exist.
    pub fn load_token(&self) -> Result<Option<StoredToken>> {
        if !self.token_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.token_path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Persist a token to the cache file.
    pub fn save_token(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.token_path, serde_json::to_string_pretty(token)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.token_path, fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = ?self.token_path, "Saved token");
        Ok(())
    }

    /// Read the OAuth client secret file.
    pub fn load_client_secret(&self) -> Result<ClientSecret> {
        if !self.client_secret_path.exists() {
            return Err(SyncError::MissingClientSecret(self.client_secret_path.clone()));
        }
        let content = fs::read_to_string(&self.client_secret_path)?;
        let file: ClientSecretFile = serde_json::from_str(&content)?;
        file.into_secret().ok_or_else(|| {
            SyncError::AuthenticationError(format!(
                "{:?} has neither an 'installed' nor a 'web' client",
                self.client_secret_path
            ))
        })
    }

    /// Return a valid token, refreshing or logging in as needed.
    pub async fn authorize(&self) -> Result<StoredToken> {
        let token = match self.load_token()? {
            Some(token) if !token.is_expired() => {
                debug!(path = ?self.token_path, "Using cached token");
                token
            }
            Some(token) if token.refresh_token.is_some() => {
                info!("Cached token expired, refreshing");
                let refreshed = self.refresh(&token).await?;
                self.save_token(&refreshed)?;
                refreshed
            }
            _ => {
                info!("No valid token found, starting login");
                let token = self.login().await?;
                self.save_token(&token)?;
                token
            }
        };

        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
            SyncError::TokenRefreshError("no refresh token available".to_string())
        })?;

        let secret = match (&token.client_id, &token.client_secret) {
            (Some(client_id), Some(client_secret)) => ClientSecret {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                auth_uri: String::new(),
                token_uri: token
                    .token_uri
                    .clone()
                    .unwrap_or_else(|| crate::auth::TOKEN_URI.to_string()),
            },
            _ => self.load_client_secret()?,
        };

        let client = token_client(&secret)?;
        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| SyncError::TokenRefreshError(describe(&e)))?;

        let mut refreshed = stored_token(&response, &secret);
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token.to_string());
        }
        Ok(refreshed)
    }

    /// Run the interactive browser login.
    async fn login(&self) -> Result<StoredToken> {
        let secret = self.load_client_secret()?;

        let listener = TcpListener::bind(("127.0.0.1", self.callback_port)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        debug!(%redirect_uri, "Listening for the authorization redirect");

        let client = token_client(&secret)?
            .set_auth_uri(AuthUrl::new(secret.auth_uri.clone()).map_err(invalid_endpoint)?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri).map_err(invalid_endpoint)?);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_METADATA_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        self.delegate.present_user_url(&url);

        let code = match wait_for_callback(listener).await? {
            Callback::Code { code, state } if state == *csrf_state.secret() => code,
            Callback::Code { .. } => {
                return Err(SyncError::AuthenticationError(
                    "state mismatch in authorization response".to_string(),
                ))
            }
            Callback::Denied(reason) => {
                return Err(SyncError::AuthenticationError(format!(
                    "authorization denied: {}",
                    reason
                )))
            }
        };

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| {
                SyncError::AuthenticationError(format!("code exchange failed: {}", describe(&e)))
            })?;

        info!("Login completed");
        Ok(stored_token(&response, &secret))
    }
}

#[async_trait]
impl TokenProvider for CredentialStore {
    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        Ok(self.authorize().await?.access_token)
    }
}

fn token_client(secret: &ClientSecret) -> Result<TokenClient> {
    let token_url = TokenUrl::new(secret.token_uri.clone()).map_err(invalid_endpoint)?;

    Ok(BasicClient::new(ClientId::new(secret.client_id.clone()))
        .set_client_secret(oauth2::ClientSecret::new(secret.client_secret.clone()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(token_url))
}

fn invalid_endpoint(e: oauth2::url::ParseError) -> SyncError {
    SyncError::AuthenticationError(format!("invalid OAuth endpoint: {}", e))
}

/// Error message including its sources, which carry the server's reason.
fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn stored_token(response: &BasicTokenResponse, secret: &ClientSecret) -> StoredToken {
    let scopes = match response.scopes() {
        Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
        None => vec![DRIVE_METADATA_SCOPE.to_string()],
    };

    StoredToken {
        access_token: response.access_token().secret().clone(),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        expires_at: response
            .expires_in()
            .map(|d| chrono::Utc::now().timestamp() + d.as_secs() as i64),
        token_type: "Bearer".to_string(),
        scopes,
        client_id: Some(secret.client_id.clone()),
        client_secret: Some(secret.client_secret.clone()),
        token_uri: Some(secret.token_uri.clone()),
    }
}

/// Serve the loopback listener until a request carries a code or an error.
///
/// Each connection is handled on its own task, so idle preconnects and
/// unrelated requests (favicon and the like) do not hold up the login.
async fn wait_for_callback(listener: TcpListener) -> Result<Callback> {
    let (tx, mut rx) = mpsc::channel(1);

    loop {
        tokio::select! {
            Some(callback) = rx.recv() => return Ok(callback),
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                let tx = tx.clone();
                tokio::spawn(async move {
                    match serve_callback(socket).await {
                        Ok(Some(callback)) => {
                            let _ = tx.send(callback).await;
                        }
                        Ok(None) => debug!(%peer, "Ignored request on the callback listener"),
                        Err(e) => debug!(%peer, error = %e, "Callback connection failed"),
                    }
                });
            }
        }
    }
}

async fn serve_callback(mut socket: TcpStream) -> std::io::Result<Option<Callback>> {
    let target = match read_request_target(&mut socket).await? {
        Some(target) => target,
        None => return Ok(None),
    };

    let callback = parse_callback_target(&target);
    let response = if callback.is_some() {
        CALLBACK_RESPONSE
    } else {
        NOT_FOUND_RESPONSE
    };
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;

    Ok(callback)
}

/// Read the request head and return the target of its request line.
async fn read_request_target(socket: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];

    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
        let read = socket.read(&mut chunk);
        let n = if head.is_empty() {
            read.await?
        } else {
            match tokio::time::timeout(REQUEST_IDLE_TIMEOUT, read).await {
                Ok(n) => n?,
                Err(_) => break,
            }
        };
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&head);
    Ok(head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string))
}

/// Parse the target of `GET /?code=xxx&state=yyy`. `None` for any other request.
fn parse_callback_target(target: &str) -> Option<Callback> {
    let url = Url::parse("http://127.0.0.1/").ok()?.join(target).ok()?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Some(Callback::Denied(value.into_owned())),
            _ => {}
        }
    }

    code.map(|code| Callback::Code {
        code,
        state: state.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth2::basic::BasicTokenType;
    use oauth2::{AccessToken, EmptyExtraTokenFields};

    fn secret() -> ClientSecret {
        ClientSecret {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    async fn send_in_parts(addr: std::net::SocketAddr, parts: &[&str]) -> String {
        let mut socket = TcpStream::connect(addr).await.unwrap();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            socket.write_all(part.as_bytes()).await.unwrap();
        }
        let mut response = String::new();
        socket.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_parse_callback_target() {
        assert_eq!(
            parse_callback_target("/?state=xyz789&code=4%2Fabc123&scope=x"),
            Some(Callback::Code {
                code: "4/abc123".to_string(),
                state: "xyz789".to_string(),
            })
        );
        assert_eq!(
            parse_callback_target("/?error=access_denied"),
            Some(Callback::Denied("access_denied".to_string()))
        );
        assert_eq!(parse_callback_target("/favicon.ico"), None);
        assert_eq!(parse_callback_target("/"), None);
    }

    #[test]
    fn test_callback_without_state_never_matches() {
        assert_eq!(
            parse_callback_target("/?code=abc"),
            Some(Callback::Code {
                code: "abc".to_string(),
                state: String::new(),
            })
        );
    }

    #[tokio::test]
    async fn test_callback_after_empty_connection_and_split_request() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            drop(TcpStream::connect(addr).await.unwrap());
            send_in_parts(
                addr,
                &["GET /?code=abc", "&state=xyz HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n"],
            )
            .await
        });

        let callback = wait_for_callback(listener).await.unwrap();
        assert_eq!(
            callback,
            Callback::Code {
                code: "abc".to_string(),
                state: "xyz".to_string(),
            }
        );
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_unrelated_requests_get_not_found() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            let favicon = send_in_parts(addr, &["GET /favicon.ico HTTP/1.1\r\n\r\n"]).await;
            let denied = send_in_parts(addr, &["GET /?error=access_denied HTTP/1.1\r\n\r\n"]).await;
            (favicon, denied)
        });

        let callback = wait_for_callback(listener).await.unwrap();
        assert_eq!(callback, Callback::Denied("access_denied".to_string()));

        let (favicon, denied) = browser.await.unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(denied.starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn test_stored_token_keeps_client() {
        let mut response = BasicTokenResponse::new(
            AccessToken::new("at".to_string()),
            BasicTokenType::Bearer,
            EmptyExtraTokenFields {},
        );
        response.set_expires_in(Some(&Duration::from_secs(3599)));
        response.set_refresh_token(Some(RefreshToken::new("rt".to_string())));

        let token = stored_token(&response, &secret());

        assert_eq!(token.access_token, "at");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
        assert_eq!(token.client_id.as_deref(), Some("client-id"));
        assert_eq!(token.scopes, vec![DRIVE_METADATA_SCOPE.to_string()]);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_client_rejects_bad_endpoint() {
        let mut bad = secret();
        bad.token_uri = "not a url".to_string();
        assert!(matches!(
            token_client(&bad),
            Err(SyncError::AuthenticationError(_))
        ));
    }
}
