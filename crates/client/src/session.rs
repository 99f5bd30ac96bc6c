//! Session manager - bearer token lifecycle.
//!
//! States are `Authenticated` and `Unauthenticated`. A persisted token found
//! at startup re-enters `Authenticated` if its payload decodes to a subject;
//! signature and expiry are left to the backend, which stays the only judge
//! of whether a token is still good. An undecodable token is discarded. Every authenticated request goes through
//! [`SessionManager::send_authorized`], which signs the session out the
//! first time the backend answers 401 for the current token.

use std::sync::Arc;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tareas_core::Session;
use tareas_storage::TokenStore;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use crate::config::ClientConfig;
use crate::error::{check_status, read_json, ApiError, Result};

const USER_AGENT: &str = concat!("tareas/", env!("CARGO_PKG_VERSION"));
const EVENT_CAPACITY: usize = 16;

/// Why the session is unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// No session was ever established in this process or persisted before
    NeverSignedIn,

    /// The user logged out
    LoggedOut,

    /// The backend rejected the token (HTTP 401)
    Expired,

    /// The stored token could not be decoded
    InvalidToken,
}

/// Current authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A token is held
    Authenticated,

    /// No token is held
    Unauthenticated(SignOutReason),
}

/// Session transitions, published to UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login succeeded
    SignedIn,

    /// The session ended
    SignedOut(SignOutReason),
}

/// Login credentials for the token endpoint.
#[derive(Clone)]
pub struct Credentials {
    /// Username (the account email)
    pub username: String,

    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

struct Inner {
    session: Option<Session>,
    reason: SignOutReason,
}

/// Owns the session token and the authorized request path.
pub struct SessionManager {
    http: reqwest::Client,
    api_root: String,
    store: Arc<dyn TokenStore>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Create a session manager, picking up any token persisted in `store`.
    pub async fn restore(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let api_root = config.api_root()?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::Transport)?;

        let mut reason = SignOutReason::NeverSignedIn;
        let session = match store.load().await?.map(Session::new) {
            Some(session) => match session.subject() {
                Ok(_) => {
                    debug!("Restored persisted session");
                    Some(session)
                }
                Err(e) => {
                    warn!("Discarding undecodable persisted token: {}", e);
                    store.clear().await?;
                    reason = SignOutReason::InvalidToken;
                    None
                }
            },
            None => None,
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            http,
            api_root,
            store,
            inner: Mutex::new(Inner {
                session,
                reason,
            }),
            events,
        })
    }

    /// Subscribe to session transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current state.
    pub async fn state(&self) -> SessionState {
        let inner = self.inner.lock().await;
        match inner.session {
            Some(_) => SessionState::Authenticated,
            None => SessionState::Unauthenticated(inner.reason),
        }
    }

    /// The current session, without validating it.
    pub async fn current(&self) -> Option<Session> {
        self.inner.lock().await.session.clone()
    }

    /// Exchange credentials for a token and persist it.
    ///
    /// The token endpoint takes form fields, not JSON. A rejection carries
    /// the server's detail message; it does not count as session expiry.
    pub async fn acquire(&self, credentials: &Credentials) -> Result<Session> {
        let url = self.url("/token");
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let response = check_status(response).await?;
        let body: TokenResponse = read_json(response).await?;
        let session = Session::new(body.access_token);

        let mut inner = self.inner.lock().await;
        self.store.save(session.token()).await?;
        inner.session = Some(session.clone());
        drop(inner);

        let _ = self.events.send(SessionEvent::SignedIn);
        info!("Logged in as {}", credentials.username);
        Ok(session)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        let url = self.url("/users/register");
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(ApiError::Transport)?;

        check_status(response).await?;
        info!("Registered {}", email);
        Ok(())
    }

    /// The `sub` claim of the current token, for display.
    ///
    /// A token that cannot be decoded ends the session instead of failing.
    pub async fn display_identity(&self) -> Option<String> {
        let session = self.current().await?;
        match session.subject() {
            Ok(subject) => Some(subject),
            Err(e) => {
                warn!("Discarding undecodable session token: {}", e);
                if let Err(e) = self.end(Some(session.token()), SignOutReason::InvalidToken).await {
                    warn!("Failed to clear stored token: {}", e);
                }
                None
            }
        }
    }

    /// Log out.
    pub async fn logout(&self) -> Result<()> {
        if self.end(None, SignOutReason::LoggedOut).await? {
            info!("Logged out");
        }
        Ok(())
    }

    /// End the session for `reason`. Returns whether a session was actually
    /// ended; ending an already unauthenticated session only makes sure the
    /// store is empty and publishes nothing.
    pub async fn invalidate(&self, reason: SignOutReason) -> Result<bool> {
        self.end(None, reason).await
    }

    /// End the session if it still holds `expected` (any session if `None`).
    async fn end(&self, expected: Option<&str>, reason: SignOutReason) -> Result<bool> {
        let mut inner = self.inner.lock().await;

        let ending = match (&inner.session, expected) {
            (None, _) => false,
            (Some(current), Some(token)) => current.token() == token,
            (Some(_), None) => true,
        };

        if !ending {
            if inner.session.is_none() && expected.is_none() {
                self.store.clear().await?;
            }
            return Ok(false);
        }

        inner.session = None;
        inner.reason = reason;
        let cleared = self.store.clear().await;
        drop(inner);

        let _ = self.events.send(SessionEvent::SignedOut(reason));
        cleared?;
        Ok(true)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    /// Send `request` with the current bearer token.
    ///
    /// Without a session nothing is sent. A 401 ends the session (once, even
    /// if several requests with the same token are rejected) and is reported
    /// as [`ApiError::Unauthorized`] after subscribers have been notified.
    pub(crate) async fn send_authorized(&self, request: RequestBuilder) -> Result<Response> {
        let Some(session) = self.current().await else {
            debug!("No session, request not sent");
            return Err(ApiError::NotAuthenticated);
        };

        let response = request
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await
            .map_err(ApiError::Transport)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            match self.end(Some(session.token()), SignOutReason::Expired).await {
                Ok(true) => warn!("Server rejected the session token, signed out"),
                Ok(false) => debug!("Session already ended"),
                Err(e) => warn!("Failed to clear stored token: {}", e),
            }
            return Err(ApiError::Unauthorized);
        }

        check_status(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use tareas_storage::MemoryTokenStore;
    use tokio::sync::broadcast::error::TryRecvError;

    const TOKEN: &str = "abc.eyJzdWIiOiJhQGIuY29tIn0.def";

    async fn manager(server: &mockito::ServerGuard, store: Arc<MemoryTokenStore>) -> SessionManager {
        let config = ClientConfig::default().with_base_url(server.url());
        SessionManager::restore(&config, store).await.unwrap()
    }

    #[tokio::test]
    async fn test_acquire_then_display_identity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "a@b.com".into()),
                Matcher::UrlEncoded("password".into(), "x".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"access_token":"{}","token_type":"bearer"}}"#, TOKEN))
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let sessions = manager(&server, store.clone()).await;
        let mut events = sessions.subscribe();
        assert_eq!(
            sessions.state().await,
            SessionState::Unauthenticated(SignOutReason::NeverSignedIn)
        );

        let session = sessions.acquire(&Credentials::new("a@b.com", "x")).await.unwrap();
        mock.assert_async().await;

        assert_eq!(session.token(), TOKEN);
        assert_eq!(store.load().await.unwrap().as_deref(), Some(TOKEN));
        assert_eq!(sessions.state().await, SessionState::Authenticated);
        assert_eq!(sessions.display_identity().await.as_deref(), Some("a@b.com"));
        assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedIn);
    }

    #[tokio::test]
    async fn test_acquire_rejected_surfaces_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":"Incorrect username or password"}"#)
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let sessions = manager(&server, store.clone()).await;
        let mut events = sessions.subscribe();

        let err = sessions
            .acquire(&Credentials::new("a@b.com", "wrong"))
            .await
            .unwrap_err();
        match err {
            ApiError::Rejected { status, detail } => {
                assert_eq!(status, 401);
                assert_eq!(detail, "Incorrect username or password");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(
            sessions.state().await,
            SessionState::Unauthenticated(SignOutReason::NeverSignedIn)
        );
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_persisted_token_reenters_authenticated() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let sessions = manager(&server, store).await;

        assert_eq!(sessions.state().await, SessionState::Authenticated);
        assert_eq!(sessions.current().await.unwrap().token(), TOKEN);
    }

    #[tokio::test]
    async fn test_undecodable_persisted_token_is_never_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tareas")
            .with_status(200)
            .with_body("[]")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::with_token("not-a-token"));
        let sessions = manager(&server, store.clone()).await;
        let mut events = sessions.subscribe();

        assert_eq!(
            sessions.state().await,
            SessionState::Unauthenticated(SignOutReason::InvalidToken)
        );
        assert_eq!(sessions.current().await, None);
        assert_eq!(store.load().await.unwrap(), None);

        let request = sessions.http().get(sessions.url("/tareas"));
        let err = sessions.send_authorized(request).await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
        mock.assert_async().await;

        // Re-entry is not a transition.
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_malformed_token_invalidates_instead_of_failing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"abc.bm90IGpzb24.def","token_type":"bearer"}"#)
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let sessions = manager(&server, store.clone()).await;
        sessions.acquire(&Credentials::new("a@b.com", "x")).await.unwrap();
        let mut events = sessions.subscribe();

        assert_eq!(sessions.display_identity().await, None);
        assert_eq!(sessions.current().await, None);
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(
            sessions.state().await,
            SessionState::Unauthenticated(SignOutReason::InvalidToken)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SignedOut(SignOutReason::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_401_signs_out_and_stops_sending() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tareas")
            .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
            .with_status(401)
            .with_body(r#"{"detail":"Could not validate credentials"}"#)
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let sessions = manager(&server, store.clone()).await;
        let mut events = sessions.subscribe();

        let request = sessions.http().get(sessions.url("/tareas"));
        let err = sessions.send_authorized(request).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));

        // Signed out within the same call, before control returned.
        assert_eq!(
            sessions.state().await,
            SessionState::Unauthenticated(SignOutReason::Expired)
        );
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SignedOut(SignOutReason::Expired)
        );

        // No stale Authorization header: the next request is never sent.
        let request = sessions.http().get(sessions.url("/tareas"));
        let err = sessions.send_authorized(request).await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_401s_sign_out_once() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/tareas".into()))
            .with_status(401)
            .expect_at_least(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let sessions = manager(&server, store).await;
        let mut events = sessions.subscribe();

        let (a, b) = tokio::join!(
            sessions.send_authorized(sessions.http().get(sessions.url("/tareas"))),
            sessions.send_authorized(sessions.http().get(sessions.url("/tareas/1"))),
        );
        for result in [a, b] {
            assert!(result.unwrap_err().is_auth());
        }

        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SignedOut(SignOutReason::Expired)
        );
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_401_for_replaced_token_keeps_new_session() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let sessions = manager(&server, store.clone()).await;

        assert!(!sessions.end(Some("older.token.value"), SignOutReason::Expired).await.unwrap());
        assert_eq!(sessions.state().await, SessionState::Authenticated);
        assert_eq!(store.load().await.unwrap().as_deref(), Some(TOKEN));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let sessions = manager(&server, store.clone()).await;
        let mut events = sessions.subscribe();

        sessions.logout().await.unwrap();
        sessions.logout().await.unwrap();
        assert!(!sessions.invalidate(SignOutReason::Expired).await.unwrap());

        assert_eq!(
            sessions.state().await,
            SessionState::Unauthenticated(SignOutReason::LoggedOut)
        );
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SignedOut(SignOutReason::LoggedOut)
        );
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_server_error_keeps_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tareas")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let sessions = manager(&server, store).await;

        let request = sessions.http().get(sessions.url("/tareas"));
        let err = sessions.send_authorized(request).await.unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 500, .. }));
        assert_eq!(sessions.state().await, SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_register() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("POST", "/users/register")
            .match_body(Matcher::Json(serde_json::json!({"email": "a@b.com", "password": "x"})))
            .with_status(201)
            .with_body(r#"{"id":1,"email":"a@b.com"}"#)
            .create_async()
            .await;

        let sessions = manager(&server, Arc::new(MemoryTokenStore::new())).await;
        sessions.register("a@b.com", "x").await.unwrap();
        ok.assert_async().await;
        assert_eq!(
            sessions.state().await,
            SessionState::Unauthenticated(SignOutReason::NeverSignedIn)
        );

        server
            .mock("POST", "/users/register")
            .match_body(Matcher::PartialJson(serde_json::json!({"email": "taken@b.com"})))
            .with_status(400)
            .with_body(r#"{"detail":"Email already registered"}"#)
            .create_async()
            .await;

        let err = sessions.register("taken@b.com", "x").await.unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_transport_error() {
        let config = ClientConfig::default().with_base_url("http://127.0.0.1:1");
        let sessions = SessionManager::restore(&config, Arc::new(MemoryTokenStore::new()))
            .await
            .unwrap();

        let err = sessions
            .acquire(&Credentials::new("a@b.com", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("a@b.com", "hunter2"));
        assert!(rendered.contains("a@b.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
