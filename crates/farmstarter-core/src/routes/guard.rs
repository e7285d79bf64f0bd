use tokio::sync::watch;

use crate::auth::{Session, SessionManager};

use super::table::{Resolution, RouteTable};

/// Where unauthenticated visitors of protected views are sent
pub const SIGNIN_PATH: &str = "/signin";

/// Access requirement of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Public,
    Protected,
}

/// Outcome of gating a single view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Render,
    Redirect(String),
}

/// Gate a view on the current session. Pure; no I/O.
pub fn guard(session: &Session, access: Access) -> Decision {
    match (access, session) {
        (Access::Protected, Session::Unauthenticated) => Decision::Redirect(SIGNIN_PATH.to_string()),
        _ => Decision::Render,
    }
}

/// Session-aware gate that follows the session manager.
///
/// Holds a subscription rather than a snapshot, so every decision reflects
/// the session as it is at that moment.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    sessions: watch::Receiver<Session>,
}

impl RouteGuard {
    pub fn new(sessions: watch::Receiver<Session>) -> Self {
        Self { sessions }
    }

    pub fn for_manager(manager: &SessionManager) -> Self {
        Self::new(manager.subscribe())
    }

    pub fn session(&self) -> Session {
        self.sessions.borrow().clone()
    }

    pub fn decide(&self, access: Access) -> Decision {
        guard(&self.sessions.borrow(), access)
    }

    pub fn resolve(&self, table: &RouteTable, path: &str) -> Resolution {
        table.resolve(path, &self.sessions.borrow())
    }

    /// Wait for the next session change and return the new session.
    ///
    /// Returns `None` once the session manager is gone.
    pub async fn changed(&mut self) -> Option<Session> {
        self.sessions.changed().await.ok()?;
        Some(self.sessions.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;

    fn signed_in() -> Session {
        Session::Authenticated(Claims {
            sub: "user@example.com".to_string(),
            exp: i64::MAX,
            extra: Default::default(),
        })
    }

    #[test]
    fn test_guard_redirects_unauthenticated_from_protected() {
        assert_eq!(
            guard(&Session::Unauthenticated, Access::Protected),
            Decision::Redirect("/signin".to_string())
        );
    }

    #[test]
    fn test_guard_renders_otherwise() {
        assert_eq!(guard(&Session::Unauthenticated, Access::Public), Decision::Render);
        assert_eq!(guard(&signed_in(), Access::Public), Decision::Render);
        assert_eq!(guard(&signed_in(), Access::Protected), Decision::Render);
    }

    #[tokio::test]
    async fn test_route_guard_follows_session_changes() {
        let (tx, rx) = watch::channel(Session::Unauthenticated);
        let mut route_guard = RouteGuard::new(rx);
        assert!(matches!(route_guard.decide(Access::Protected), Decision::Redirect(_)));

        tx.send_replace(signed_in());
        let session = route_guard.changed().await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(route_guard.decide(Access::Protected), Decision::Render);

        tx.send_replace(Session::Unauthenticated);
        assert!(matches!(route_guard.decide(Access::Protected), Decision::Redirect(_)));
        assert_eq!(route_guard.changed().await, Some(Session::Unauthenticated));

        drop(tx);
        assert_eq!(route_guard.changed().await, None);
    }
}
