//! App Access Tokens, acquired with the client-credentials grant.
use super::creds::AccessToken;
use super::error::AccessTokenManagerError;
use super::AccessTokenManagerData;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Holds the current App Access Token for every Helix request.
///
/// Can be reused by cloning. Only [acquire](AccessTokenManager::acquire)
/// replaces the stored token.
#[derive(Clone)]
pub struct AccessTokenManager {
    token: Arc<RwLock<Option<AccessToken>>>,
    client_id: Arc<String>,
    client_secret: Arc<String>,
    token_url: Arc<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenRequestResponse {
    access_token: String,
    expires_in: u64,
}

impl AccessTokenManager {
    /// Creates a manager with no token. Call [acquire](AccessTokenManager::acquire)
    /// before handing it to a Helix client.
    pub fn new(data: AccessTokenManagerData) -> Self {
        AccessTokenManager {
            token: Arc::new(RwLock::new(None)),
            client_id: Arc::new(data.client_id),
            client_secret: Arc::new(data.client_secret),
            token_url: Arc::new(data.token_url),
            http: reqwest::Client::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Exchanges the client id and secret for a new App Access Token, which
    /// replaces the stored one.
    ///
    /// # Errors
    /// Returns `Err(AccessTokenManagerError...)`:
    /// * `::Net` if a response was not received from Twitch.
    /// * `::OnRequest` if Twitch denied the request.
    /// * `::BadData` if a response from Twitch could not be parsed.
    pub async fn acquire(&self) -> Result<AccessToken, AccessTokenManagerError> {
        let response = self
            .http
            .post(self.token_url.as_str())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(AccessTokenManagerError::Net)?;
        let status = response.status();
        let response = response
            .text()
            .await
            .map_err(AccessTokenManagerError::Net)?;
        let response = crate::twitch::parse_twitch::<TokenRequestResponse, _>(
            status,
            &response,
            AccessTokenManagerError::OnRequest,
            AccessTokenManagerError::BadData,
        )?;

        let token = AccessToken {
            access_token: response.access_token,
            expires_in: Duration::from_secs(response.expires_in),
        };
        *self.token.write().await = Some(token.clone());
        debug!(
            expires_in = response.expires_in,
            "Acquired a new App Access Token"
        );
        Ok(token)
    }

    /// Calls [acquire](AccessTokenManager::acquire) until it succeeds or the
    /// policy runs out of attempts, backing off between calls.
    ///
    /// # Errors
    /// The error of the last attempt.
    pub async fn acquire_with_retry(
        &self,
        policy: &RetryPolicy,
    ) -> Result<AccessToken, AccessTokenManagerError> {
        let mut attempts = 0;
        loop {
            tokio::time::sleep(policy.delay_for(attempts)).await;
            attempts += 1;
            match self.acquire().await {
                Ok(token) => return Ok(token),
                Err(err) if policy.should_retry(attempts) => {
                    warn!(attempts, "Could not acquire an App Access Token: {err}")
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn current(&self) -> Option<AccessToken> {
        self.token.read().await.clone()
    }

    /// The stored access token, for an `Authorization: Bearer` header.
    pub async fn bearer(&self) -> Result<String, AccessTokenManagerError> {
        self.token
            .read()
            .await
            .as_ref()
            .map(|token| token.access_token.clone())
            .ok_or(AccessTokenManagerError::NoToken)
    }

    /// Spawns the refresh loop. A new token is acquired shortly before the
    /// current one expires; if every retry fails, the loop logs the error and
    /// tries again after the policy's longest delay. Stops when `cancel` fires.
    pub fn spawn_refresh(&self, policy: RetryPolicy, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut wait = manager
                .current()
                .await
                .map_or(Duration::ZERO, |token| token.refresh_after());
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(wait) => {}
                }
                let result = tokio::select! {
                    () = cancel.cancelled() => break,
                    result = manager.acquire_with_retry(&policy) => result,
                };
                wait = match result {
                    Ok(token) => {
                        info!(
                            next_refresh_secs = token.refresh_after().as_secs(),
                            "Refreshed the App Access Token"
                        );
                        token.refresh_after()
                    }
                    Err(err) => {
                        error!("Could not refresh the App Access Token: {err}");
                        policy.max_delay()
                    }
                };
            }
            debug!("Token refresh stopped");
        })
    }
}

// Keeps the client secret and token out of logs.
impl std::fmt::Debug for AccessTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenManager")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}
