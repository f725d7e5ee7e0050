//! Server-side sessions keyed by a cookie.
//!
//! A session carries the authenticated user, the CSRF token for form posts and the
//! pending flash messages. Sessions live in a [`DashMap`]; an entry idle for longer than
//! the configured lifetime is dropped the next time it is looked up.
//!
//! Handlers never touch the store. The server loads a [`SessionHandle`] before dispatch,
//! handlers read and mutate it through the request, and the server writes it back with
//! [`SessionStore::save`] once the response is built.
//!
//! A fresh session is only stored once it holds something worth keeping: a user, a
//! flash, or a CSRF token that was handed out to a form. Privilege changes (login,
//! logout) move the session to a new id and the old id is forgotten on save.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::SessionConfig;
use crate::models::PublicUser;
use crate::security::{constant_time_eq, generate_token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    #[serde(rename = "tipo")]
    pub kind: FlashKind,
    #[serde(rename = "mensaje")]
    pub message: String,
}

#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub user: Option<PublicUser>,
    csrf_token: String,
    csrf_issued: bool,
    flashes: Vec<Flash>,
    last_seen: Instant,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.as_ref().map(|u| &u.id))
            .field("flashes", &self.flashes.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    fn new() -> Self {
        Self {
            id: generate_token(),
            user: None,
            csrf_token: generate_token(),
            csrf_issued: false,
            flashes: Vec::new(),
            last_seen: Instant::now(),
        }
    }

    fn holds_state(&self) -> bool {
        self.user.is_some() || self.csrf_issued || !self.flashes.is_empty()
    }
}

/// Shared, lockable view of one session for the duration of a request.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
    /// Id the session was loaded under; `None` for a fresh session.
    loaded_id: Option<String>,
}

impl SessionHandle {
    fn wrap(session: Session, is_new: bool) -> Self {
        let loaded_id = (!is_new).then(|| session.id.clone());
        Self {
            inner: Arc::new(Mutex::new(session)),
            loaded_id,
        }
    }

    /// Detached session, for handlers exercised without a server.
    #[must_use]
    pub fn detached() -> Self {
        Self::wrap(Session::new(), true)
    }

    #[must_use]
    pub fn id(&self) -> String {
        self.inner.lock().id.clone()
    }

    /// True when no cookie matched and a fresh session was minted.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.loaded_id.is_none()
    }

    /// Move the session to a fresh id, keeping its contents.
    ///
    /// Call on every privilege change so an id known before login never becomes an
    /// authenticated one.
    pub fn regenerate_id(&self) {
        self.inner.lock().id = generate_token();
    }

    #[must_use]
    pub fn user(&self) -> Option<PublicUser> {
        self.inner.lock().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().user.is_some()
    }

    pub fn set_user(&self, user: Option<PublicUser>) {
        self.inner.lock().user = user;
    }

    /// The form token. Handing it out marks the session as worth storing.
    #[must_use]
    pub fn csrf_token(&self) -> String {
        let mut session = self.inner.lock();
        session.csrf_issued = true;
        session.csrf_token.clone()
    }

    /// Compare a submitted token with the session's, in constant time.
    #[must_use]
    pub fn verify_csrf(&self, submitted: Option<&str>) -> bool {
        let Some(submitted) = submitted else {
            return false;
        };
        let session = self.inner.lock();
        constant_time_eq(session.csrf_token.as_bytes(), submitted.as_bytes())
    }

    /// Issue a new CSRF token, e.g. after the session's privilege changes.
    pub fn rotate_csrf(&self) {
        self.inner.lock().csrf_token = generate_token();
    }

    pub fn flash(&self, kind: FlashKind, message: impl Into<String>) {
        self.inner.lock().flashes.push(Flash {
            kind,
            message: message.into(),
        });
    }

    /// Drain pending flashes; they are shown once.
    #[must_use]
    pub fn take_flashes(&self) -> Vec<Flash> {
        std::mem::take(&mut self.inner.lock().flashes)
    }

    #[must_use]
    pub fn pending_flashes(&self) -> usize {
        self.inner.lock().flashes.len()
    }

    fn snapshot(&self) -> Session {
        self.inner.lock().clone()
    }
}

/// Concurrent session map with lazy expiry.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    cookie_name: String,
    lifetime: Duration,
    secure: bool,
    cookie_path: String,
}

impl SessionStore {
    #[must_use]
    pub fn new(config: &SessionConfig, base_path: &str) -> Self {
        Self {
            sessions: DashMap::new(),
            cookie_name: config.cookie_name.clone(),
            lifetime: Duration::from_secs(config.lifetime_secs),
            secure: config.secure,
            cookie_path: if base_path.is_empty() {
                "/".to_string()
            } else {
                base_path.to_string()
            },
        }
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn expired(&self, session: &Session, now: Instant) -> bool {
        now.duration_since(session.last_seen) >= self.lifetime
    }

    /// Session for the cookie value, or a new one when it is unknown or expired.
    #[must_use]
    pub fn load(&self, cookie: Option<&str>) -> SessionHandle {
        let now = Instant::now();
        if let Some(id) = cookie.filter(|id| !id.is_empty()) {
            let found = self.sessions.get(id).map(|entry| entry.value().clone());
            match found {
                Some(session) if !self.expired(&session, now) => {
                    return SessionHandle::wrap(session, false);
                }
                Some(_) => {
                    self.sessions.remove(id);
                    debug!("Dropped expired session");
                }
                None => {}
            }
        }
        SessionHandle::wrap(Session::new(), true)
    }

    /// Persist the handle's state and refresh its idle timer.
    ///
    /// Returns false, storing nothing, for a fresh session that holds no state. A
    /// session whose id was regenerated replaces its old entry.
    pub fn save(&self, handle: &SessionHandle) -> bool {
        let mut session = handle.snapshot();
        if let Some(old) = handle.loaded_id.as_deref().filter(|old| *old != session.id) {
            self.sessions.remove(old);
            debug!("Session moved to a new id");
        }
        if handle.is_new() && !session.holds_state() {
            return false;
        }
        session.last_seen = Instant::now();
        self.sessions.insert(session.id.clone(), session);
        true
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.expired(session, now));
        before.saturating_sub(self.sessions.len())
    }

    /// `Set-Cookie` value carrying the session id.
    #[must_use]
    pub fn cookie_header(&self, handle: &SessionHandle) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Lax",
            self.cookie_name,
            handle.id(),
            self.cookie_path,
            self.lifetime.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
