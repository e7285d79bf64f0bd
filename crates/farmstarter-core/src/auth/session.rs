use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::api::{AuthApi, AuthError, Operation};
use crate::models::User;

use super::claims::{decode, Claims};
use super::clock::{Clock, SystemClock};
use super::token_store::TokenStore;

/// How long the logout confirmation stays up before the session is dropped
pub const LOGOUT_NOTICE_DURATION: Duration = Duration::from_secs(2);

pub const LOGOUT_MESSAGE: &str = "You have been logged out successfully.";

/// Message for authenticated fetches attempted without a valid session
const NOT_AUTHENTICATED_MESSAGE: &str = "User not authenticated.";

/// Current authentication state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    #[default]
    Unauthenticated,
    Authenticated(Claims),
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }

    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Session::Authenticated(claims) => Some(claims),
            Session::Unauthenticated => None,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims().map(|c| c.sub.as_str())
    }
}

/// Confirmation shown between a successful sign-out and the session reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutNotice {
    pub message: String,
    pub duration: Duration,
    /// Which logout published this notice
    generation: u64,
}

impl LogoutNotice {
    fn new(duration: Duration, generation: u64) -> Self {
        Self {
            message: LOGOUT_MESSAGE.to_string(),
            duration,
            generation,
        }
    }
}

/// Owner of the session state.
///
/// The manager is the only writer to the token store and to the published
/// `Session`. Everything else reads through `current_session` or a
/// subscription. Clone is cheap and every clone drives the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    session: watch::Sender<Session>,
    notice: watch::Sender<Option<LogoutNotice>>,
    logouts: AtomicU64,
    /// Serializes store -> decode -> publish sequences
    transition: Mutex<()>,
    notice_duration: Duration,
}

impl SessionManager {
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn TokenStore>) -> Self {
        Self::with_clock(api, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (session, _) = watch::channel(Session::Unauthenticated);
        let (notice, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                api,
                store,
                clock,
                session,
                notice,
                logouts: AtomicU64::new(0),
                transition: Mutex::new(()),
                notice_duration: LOGOUT_NOTICE_DURATION,
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn current_session(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.borrow().is_authenticated()
    }

    pub fn current_notice(&self) -> Option<LogoutNotice> {
        self.inner.notice.borrow().clone()
    }

    /// Receive every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }

    /// Receive logout notices as they are shown and withdrawn
    pub fn notices(&self) -> watch::Receiver<Option<LogoutNotice>> {
        self.inner.notice.subscribe()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Derive the session from whatever the token store holds.
    ///
    /// Malformed or expired credentials are removed and the session falls
    /// back to unauthenticated without reporting an error.
    pub async fn initialize(&self) -> Result<Session, AuthError> {
        let _guard = self.inner.transition.lock().await;

        let session = match self.inner.store.load()? {
            None => {
                debug!("No stored credential");
                Session::Unauthenticated
            }
            Some(credential) => match decode(&credential) {
                Err(e) => {
                    warn!(error = %e, "Stored credential is malformed, clearing");
                    self.inner.store.clear()?;
                    Session::Unauthenticated
                }
                Ok(claims) if claims.is_expired_at(self.inner.clock.now()) => {
                    info!(exp = claims.exp, "Stored credential has expired, clearing");
                    self.inner.store.clear()?;
                    Session::Unauthenticated
                }
                Ok(claims) => {
                    debug!(subject = %claims.sub, "Restored session from stored credential");
                    Session::Authenticated(claims)
                }
            },
        };

        self.inner.publish(session.clone());
        Ok(session)
    }

    /// Sign in and adopt the returned credential.
    ///
    /// On failure the session and the token store are left untouched and
    /// the client's error is returned as-is.
    pub async fn login(&self, email: &str, password: &str) -> Result<Claims, AuthError> {
        let credential = self.inner.api.sign_in(email, password).await?;

        let claims = decode(&credential).map_err(|e| {
            error!(error = %e, "Server issued a credential that cannot be decoded");
            AuthError::from(e)
        })?;

        let _guard = self.inner.transition.lock().await;
        self.inner.store.save(&credential)?;
        self.inner.publish(Session::Authenticated(claims.clone()));
        info!(subject = %claims.sub, "Login successful");
        Ok(claims)
    }

    /// Sign out on the server, then drop the local session after the
    /// notice period.
    ///
    /// If the server call fails the session stays authenticated, no notice
    /// is shown, and the error is returned for the caller to log.
    ///
    /// A newer logout replaces the notice and gets its own full period.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let credential = self.inner.store.load()?;

        let Some(credential) = credential else {
            // Nothing the server could invalidate
            let _guard = self.inner.transition.lock().await;
            self.inner.publish(Session::Unauthenticated);
            return Ok(());
        };

        if let Err(e) = self.inner.api.sign_out(&credential).await {
            debug!(error = %e, "Server rejected sign-out, keeping session");
            return Err(e);
        }

        let generation = self.inner.logouts.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.notice.send_replace(Some(LogoutNotice::new(
            self.inner.notice_duration,
            generation,
        )));
        debug!(
            generation,
            delay = ?self.inner.notice_duration,
            "Signed out on server, local reset scheduled"
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.notice_duration).await;
            inner.complete_logout(&credential, generation).await;
        });

        Ok(())
    }

    /// Drop the session if its claims have expired.
    ///
    /// Called before authenticated fetches and route decisions so an
    /// expired token is never treated as a signed-in user.
    pub async fn enforce_expiry(&self) -> Result<Session, AuthError> {
        let _guard = self.inner.transition.lock().await;
        let current = self.current_session();

        if let Session::Authenticated(claims) = &current {
            if claims.is_expired_at(self.inner.clock.now()) {
                info!(subject = %claims.sub, "Session expired");
                self.inner.store.clear()?;
                self.inner.publish(Session::Unauthenticated);
                return Ok(Session::Unauthenticated);
            }
        }

        Ok(current)
    }

    // =========================================================================
    // Authenticated data
    // =========================================================================

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        let credential = self.authorized_credential(Operation::ListUsers).await?;
        self.inner.api.list_users(&credential).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AuthError> {
        let credential = self.authorized_credential(Operation::GetUser).await?;
        self.inner.api.get_user(&credential, user_id).await
    }

    async fn authorized_credential(&self, op: Operation) -> Result<String, AuthError> {
        if !self.enforce_expiry().await?.is_authenticated() {
            return Err(op.error(NOT_AUTHENTICATED_MESSAGE));
        }
        self.inner
            .store
            .load()?
            .ok_or_else(|| op.error(NOT_AUTHENTICATED_MESSAGE))
    }
}

impl Inner {
    fn publish(&self, session: Session) {
        self.session.send_replace(session);
    }

    /// Withdraw the notice, unless a later logout has replaced it
    fn withdraw_notice(&self, generation: u64) {
        self.notice.send_if_modified(|notice| match notice {
            Some(shown) if shown.generation == generation => {
                *notice = None;
                true
            }
            _ => false,
        });
    }

    /// Deferred half of `logout`.
    ///
    /// Skipped when the stored credential is no longer the one that was
    /// signed out, i.e. a newer login landed during the notice period.
    async fn complete_logout(&self, signed_out: &str, generation: u64) {
        let _guard = self.transition.lock().await;

        match self.store.load() {
            Ok(Some(current)) if current != signed_out => {
                debug!("Credential replaced during logout notice, keeping new session");
                self.withdraw_notice(generation);
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read token store during logout"),
        }

        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear stored credential");
        }
        self.publish(Session::Unauthenticated);
        self.withdraw_notice(generation);
        info!("Logout complete");
    }
}
