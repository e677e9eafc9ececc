//! Session token lifecycle: credential attachment, single-flight refresh
//! and one-shot replay of requests rejected with 401.
//!
//! Every outbound call goes through [`SessionTokenManager::execute`]:
//! attach → send → [`handle_failure`](SessionTokenManager::handle_failure)
//! → at most one replay.
//!
//! Concurrent 401s converge on a single refresh. Each attempt records the
//! token generation it was sent with; a failed attempt only refreshes if no
//! newer generation exists, and the refresh itself runs under
//! `refresh_lock`. Requests that lose the race wait on the lock and then pick
//! up the token the winner installed.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::token_store::TokenStore;
use crate::types::{RefreshState, TokenPair};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const REFRESH_PATH: &str = "/api/auth/token/refresh/";

/// Endpoints that are always sent without a credential.
pub const UNAUTHENTICATED_PATHS: &[&str] = &[REGISTER_PATH, LOGIN_PATH, REFRESH_PATH];

/// A request is replayed at most this many times after a refresh.
pub const MAX_REPLAYS: u32 = 1;

pub fn is_unauthenticated(path: &str) -> bool {
    UNAUTHENTICATED_PATHS.contains(&path)
}

/// The access token attached to one attempt, tagged with its generation.
#[derive(Clone, Debug)]
pub struct Credential {
    pub access_token: String,
    pub generation: u64,
}

/// Retry bookkeeping for one logical request.
///
/// Threaded through the retry path instead of being stored on the request,
/// so the replay limit does not depend on mutating shared request state.
#[derive(Clone, Debug)]
pub struct RequestAttempt {
    path: String,
    replays: u32,
    credential: Option<Credential>,
}

impl RequestAttempt {
    pub fn first(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            replays: 0,
            credential: None,
        }
    }

    /// The attempt that replays this one.
    pub fn next(&self) -> Self {
        Self {
            path: self.path.clone(),
            replays: self.replays + 1,
            credential: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn replays(&self) -> u32 {
        self.replays
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

/// What to do with a response once it has come back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Tokens were refreshed; send the request again.
    Replay,
    /// Hand the response to the caller as-is.
    Surface,
}

struct SessionState {
    tokens: Option<TokenPair>,
    /// Bumped on every change of `tokens`.
    generation: u64,
}

impl SessionState {
    fn ensure_active(&self) -> ClientResult<()> {
        match self.tokens {
            Some(_) => Ok(()),
            None => Err(ClientError::SessionExpired),
        }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Resets the in-flight flag even if the refresh future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the process-wide [`TokenPair`] and authorizes outbound requests.
pub struct SessionTokenManager {
    client: Client,
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    state: RwLock<SessionState>,
    /// Serializes refresh calls. Without it, concurrent 401s would all
    /// present the same refresh token.
    refresh_lock: Mutex<()>,
    refresh_in_flight: AtomicBool,
}

impl SessionTokenManager {
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> ClientResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            store,
            state: RwLock::new(SessionState {
                tokens: None,
                generation: 0,
            }),
            refresh_lock: Mutex::new(()),
            refresh_in_flight: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Loads a previously persisted pair. Returns whether one was found.
    pub async fn restore(&self) -> ClientResult<bool> {
        let Some(tokens) = self.store.load()? else {
            return Ok(false);
        };
        let mut state = self.state.write().await;
        state.tokens = Some(tokens);
        state.generation += 1;
        debug!("restored persisted session");
        Ok(true)
    }

    /// Installs a new pair (login, registration) and persists it.
    pub async fn set_tokens(&self, tokens: TokenPair) -> ClientResult<()> {
        let mut state = self.state.write().await;
        self.store.save(&tokens)?;
        state.tokens = Some(tokens);
        state.generation += 1;
        Ok(())
    }

    /// Drops the session from memory and from the store.
    pub async fn clear(&self) -> ClientResult<()> {
        let mut state = self.state.write().await;
        self.clear_locked(&mut state)
    }

    /// Memory and store change together, under the state write lock.
    fn clear_locked(&self, state: &mut SessionState) -> ClientResult<()> {
        state.tokens = None;
        state.generation += 1;
        self.store.delete()
    }

    pub async fn tokens(&self) -> Option<TokenPair> {
        self.state.read().await.tokens.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.tokens.is_some()
    }

    pub fn refresh_state(&self) -> RefreshState {
        if self.refresh_in_flight.load(Ordering::SeqCst) {
            RefreshState::RefreshInFlight
        } else {
            RefreshState::Idle
        }
    }

    /// Adds the bearer token unless `attempt`'s path is allow-listed.
    ///
    /// An access token whose `exp` falls within the refresh margin is
    /// refreshed first, through the same single-flight path as a 401.
    pub async fn attach_credential(
        &self,
        attempt: &mut RequestAttempt,
        request: RequestBuilder,
    ) -> ClientResult<RequestBuilder> {
        if is_unauthenticated(&attempt.path) {
            attempt.credential = None;
            return Ok(request);
        }

        let margin = self.config.token_refresh_margin_secs;
        let stale_generation = {
            let state = self.state.read().await;
            let tokens = state.tokens.as_ref().ok_or(ClientError::AuthRequired)?;
            if tokens.expires_within_secs(margin) {
                Some(state.generation)
            } else {
                None
            }
        };

        if let Some(generation) = stale_generation {
            debug!("access token expiring within {margin}s, refreshing before {}", attempt.path);
            self.refresh_after(generation).await?;
        }

        let credential = {
            let state = self.state.read().await;
            let tokens = state.tokens.as_ref().ok_or(ClientError::AuthRequired)?;
            Credential {
                access_token: tokens.access_token.clone(),
                generation: state.generation,
            }
        };

        let request = request.bearer_auth(&credential.access_token);
        attempt.credential = Some(credential);
        Ok(request)
    }

    /// Decides whether a response should be replayed.
    ///
    /// Only a 401 on a credentialed first attempt refreshes and replays.
    /// A failed refresh clears the session and returns its error.
    pub async fn handle_failure(
        &self,
        attempt: &RequestAttempt,
        status: StatusCode,
    ) -> ClientResult<RetryDecision> {
        if status != StatusCode::UNAUTHORIZED {
            return Ok(RetryDecision::Surface);
        }
        let Some(credential) = attempt.credential.as_ref() else {
            return Ok(RetryDecision::Surface);
        };
        if attempt.replays >= MAX_REPLAYS {
            warn!("401 on replayed {}, giving up", attempt.path);
            return Ok(RetryDecision::Surface);
        }

        debug!("401 on {}, refreshing token", attempt.path);
        self.refresh_after(credential.generation).await?;
        Ok(RetryDecision::Replay)
    }

    /// Sends a request built by `build`, with credential attachment and at
    /// most one replay after a token refresh.
    ///
    /// `build` is called once per attempt, so bodies that cannot be cloned
    /// (multipart streams) are rebuilt for the replay.
    pub async fn execute<F>(&self, path: &str, build: F) -> ClientResult<Response>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let url = self.config.url(path);
        let mut attempt = RequestAttempt::first(path);

        loop {
            let request = self
                .attach_credential(&mut attempt, build(&self.client, &url))
                .await?;
            let response = request.send().await?;

            match self.handle_failure(&attempt, response.status()).await? {
                RetryDecision::Surface => return Ok(response),
                RetryDecision::Replay => attempt = attempt.next(),
            }
        }
    }

    /// Refreshes the pair unless it already changed since `stale_generation`.
    ///
    /// The refresh token is read from the store, so a pair deleted there
    /// ends the session. A result that arrives after the session was
    /// replaced or cleared is discarded.
    async fn refresh_after(&self, stale_generation: u64) -> ClientResult<()> {
        let _guard = self.refresh_lock.lock().await;

        let generation = {
            let state = self.state.read().await;
            if state.generation > stale_generation {
                // Someone else refreshed (or cleared) while we waited.
                return state.ensure_active();
            }
            state.ensure_active()?;
            state.generation
        };

        let Some(stored) = self.store.load()? else {
            warn!("no persisted refresh token, clearing session");
            let mut state = self.state.write().await;
            if state.generation == generation {
                self.clear_locked(&mut state)?;
            }
            return Err(ClientError::SessionExpired);
        };

        let result = {
            let _in_flight = InFlightGuard::enter(&self.refresh_in_flight);
            self.request_refresh(&stored.refresh_token).await
        };

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!("session changed during refresh, discarding result");
            return state.ensure_active();
        }

        match result {
            Ok(tokens) => {
                if let Err(e) = self.store.save(&tokens) {
                    warn!("failed to persist refreshed tokens: {e}");
                }
                state.tokens = Some(tokens);
                state.generation += 1;
                info!("access token refreshed (generation {})", state.generation);
                Ok(())
            }
            Err(e) => {
                warn!("token refresh failed, clearing session: {e}");
                if let Err(store_err) = self.clear_locked(&mut state) {
                    warn!("failed to delete persisted tokens: {store_err}");
                }
                Err(e)
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> ClientResult<TokenPair> {
        let response = self
            .client
            .post(self.config.url(REFRESH_PATH))
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("token refresh failed: {e}")))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(ClientError::SessionExpired);
        }
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "token refresh failed with status {status}"
            )));
        }

        let body: RefreshResponse = response.json().await?;
        Ok(TokenPair {
            access_token: body.access,
            refresh_token: body.refresh.unwrap_or_else(|| refresh_token.to_string()),
        })
    }
}
