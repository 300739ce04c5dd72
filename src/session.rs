//! Session store
//!
//! Owns the authenticated identity. Constructed once by the entry point and
//! passed down explicitly; observers follow changes through [`SessionStore::subscribe`].

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::gateway::models::Identity;
use crate::gateway::Gateway;

/// Current authentication state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: Option<Identity>,
    pub credential: Option<String>,
    /// True until the one-time bootstrap has finished
    pub bootstrapping: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user: None,
            credential: None,
            bootstrapping: true,
        }
    }
}

pub struct SessionStore {
    gateway: Gateway,
    state: watch::Sender<Session>,
    bootstrapped: AtomicBool,
}

impl SessionStore {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            state: watch::Sender::new(Session::default()),
            bootstrapped: AtomicBool::new(false),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Restore the identity behind a stored credential
    ///
    /// Only the first call does anything. Any failure drops the stored
    /// credential and leaves the session empty; `bootstrapping` is cleared
    /// either way.
    pub async fn bootstrap(&self) {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(token) = self.gateway.store().credential() {
            match self.gateway.current_user().await {
                Ok(user) => {
                    info!("Restored session for {}", user.username);
                    self.state.send_modify(|s| {
                        s.user = Some(user);
                        s.credential = Some(token);
                    });
                }
                Err(e) => {
                    warn!("Stored credential rejected during bootstrap: {}", e);
                    if let Err(e) = self.gateway.store().clear_credential() {
                        warn!("Failed to discard credential: {}", e);
                    }
                }
            }
        }

        self.state.send_modify(|s| s.bootstrapping = false);
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ApiError> {
        let response = self.gateway.login(email, password).await?;
        self.establish(response.access_token, response.user)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, ApiError> {
        let response = self.gateway.register(username, email, password).await?;
        self.establish(response.access_token, response.user)
    }

    fn establish(&self, token: String, user: Identity) -> Result<Identity, ApiError> {
        self.gateway.store().set_credential(&token)?;
        info!("Signed in as {}", user.username);
        self.state.send_modify(|s| {
            s.user = Some(user.clone());
            s.credential = Some(token);
        });
        Ok(user)
    }

    /// Forget the identity and the stored credential. Safe to call repeatedly.
    pub fn logout(&self) {
        if let Err(e) = self.gateway.store().clear_credential() {
            warn!("Failed to discard credential on logout: {}", e);
        }
        self.state.send_if_modified(|s| {
            let changed = s.user.is_some() || s.credential.is_some();
            s.user = None;
            s.credential = None;
            changed
        });
        info!("Signed out");
    }

    /// Align the in-memory identity with durable storage.
    ///
    /// A 401 anywhere removes the stored credential but leaves the identity in
    /// place. The route guard calls this before every decision, which is
    /// where such a session finally ends.
    pub fn reconcile(&self) -> Session {
        let stored = self.gateway.store().credential();
        self.state.send_if_modified(|s| {
            if s.user.is_some() && stored.is_none() {
                info!("Stored credential gone; ending session");
                s.user = None;
                s.credential = None;
                true
            } else {
                false
            }
        });
        self.snapshot()
    }
}
