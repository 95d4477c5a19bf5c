//! OAuth2 authentication for the Gmail API

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::env;
use std::path::Path;
use tracing::{debug, info};
use yup_oauth2::ApplicationSecret;

use crate::client::GmailHub;
use crate::error::{Result, SyncError};

/// Scopes needed to manage labels, filters and message labels
///
/// - gmail.modify: search messages and change their labels
/// - gmail.labels: create and delete labels
/// - gmail.settings.basic: create, list and delete filters
/// - gmail.settings.sharing: filters that archive mail out of the inbox
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.labels",
    "https://www.googleapis.com/auth/gmail.settings.basic",
    "https://www.googleapis.com/auth/gmail.settings.sharing",
];

/// Read the OAuth2 client secret, preferring the credentials file and falling
/// back to `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET`
pub async fn resolve_application_secret(credentials_path: &Path) -> Result<ApplicationSecret> {
    if credentials_path.exists() {
        debug!("Reading OAuth2 credentials from {:?}", credentials_path);
        return yup_oauth2::read_application_secret(credentials_path)
            .await
            .map_err(|e| SyncError::AuthError(format!("Failed to read credentials: {}", e)));
    }

    debug!(
        "{:?} not found, reading OAuth2 credentials from environment",
        credentials_path
    );
    load_credentials_from_env().map_err(|e| {
        SyncError::AuthError(format!(
            "No credentials file at {:?} and {}",
            credentials_path, e
        ))
    })
}

/// Authenticate and build the Gmail hub.
///
/// Runs the installed-app flow (opens a browser) when no valid token is cached;
/// tokens are persisted to `token_cache_path` and refreshed automatically.
pub async fn initialize_gmail_hub(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<GmailHub> {
    let secret = resolve_application_secret(credentials_path).await?;

    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| SyncError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Request every scope up front so the cached token covers all calls
    auth.token(REQUIRED_SCOPES)
        .await
        .map_err(|e| SyncError::AuthError(format!("Failed to obtain token: {}", e)))?;

    if token_cache_path.exists() {
        secure_token_file(token_cache_path).await?;
    }

    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| SyncError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}

/// Drop the cached token so the next run re-authorizes
pub async fn clear_token_cache(token_cache_path: &Path) -> Result<bool> {
    if !token_cache_path.exists() {
        return Ok(false);
    }
    tokio::fs::remove_file(token_cache_path).await?;
    info!("Removed cached token at {:?}", token_cache_path);
    Ok(true)
}

/// Load OAuth2 credentials from environment variables
///
/// # Environment Variables
/// - `GMAIL_CLIENT_ID`: OAuth2 client ID
/// - `GMAIL_CLIENT_SECRET`: OAuth2 client secret
/// - `GMAIL_REDIRECT_URI`: Redirect URI (optional, defaults to http://localhost:8080)
pub fn load_credentials_from_env() -> Result<ApplicationSecret> {
    let client_id = env::var("GMAIL_CLIENT_ID")
        .map_err(|_| SyncError::ConfigError("GMAIL_CLIENT_ID not set".to_string()))?;
    let client_secret = env::var("GMAIL_CLIENT_SECRET")
        .map_err(|_| SyncError::ConfigError("GMAIL_CLIENT_SECRET not set".to_string()))?;
    let redirect_uri = env::var("GMAIL_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());

    Ok(ApplicationSecret {
        client_id,
        client_secret,
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        redirect_uris: vec![redirect_uri],
        ..Default::default()
    })
}

/// Restrict token file permissions to the owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

// Windows protects files through ACLs; the default profile ACL already limits access
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
