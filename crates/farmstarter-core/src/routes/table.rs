//! Declarative route table.
//!
//! Routes are matched in declaration order. A route either names a view or
//! groups child routes under a shared prefix and access level, the way a
//! protected layout wraps the dashboard and profile pages. Patterns are
//! `/`-separated segments: literals, `:name` captures, and a trailing `*`
//! that swallows the rest of the path.

use std::collections::HashMap;
use std::fmt;

use crate::auth::Session;

use super::guard::{guard, Access, Decision};

/// Views the client can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    About,
    SignIn,
    Register,
    Dashboard,
    Profile,
    NotFound,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::Home => "Home",
            View::About => "About",
            View::SignIn => "Sign In",
            View::Register => "Register",
            View::Dashboard => "Dashboard",
            View::Profile => "Profile",
            View::NotFound => "Not Found",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    segments: Vec<String>,
    view: Option<View>,
    access: Access,
    children: Vec<Route>,
}

impl Route {
    /// A public page
    pub fn page(pattern: &str, view: View) -> Self {
        Self {
            segments: split(pattern),
            view: Some(view),
            access: Access::Public,
            children: Vec::new(),
        }
    }

    /// A layout that requires a session for everything beneath it
    pub fn protected(children: Vec<Route>) -> Self {
        Self {
            segments: Vec::new(),
            view: None,
            access: Access::Protected,
            children,
        }
    }

    /// Group children under a path prefix
    pub fn nest(prefix: &str, children: Vec<Route>) -> Self {
        Self {
            segments: split(prefix),
            view: None,
            access: Access::Public,
            children,
        }
    }

    pub fn require_auth(mut self) -> Self {
        self.access = Access::Protected;
        self
    }

    /// Match `path` against this route and its children.
    ///
    /// Access is the strictest level along the matched branch.
    fn matches(&self, path: &[&str], inherited: Access) -> Option<Match> {
        let access = if inherited == Access::Protected {
            Access::Protected
        } else {
            self.access
        };

        let mut params = HashMap::new();
        let mut consumed = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            if segment == "*" {
                // Catch-all swallows the rest, including nothing
                let view = self.view?;
                params.insert("*".to_string(), path[consumed..].join("/"));
                return Some(Match { view, params, access });
            }
            let actual = path.get(i)?;
            if let Some(name) = segment.strip_prefix(':') {
                params.insert(name.to_string(), (*actual).to_string());
            } else if segment != actual {
                return None;
            }
            consumed += 1;
        }

        let rest = &path[consumed..];
        if let Some(view) = self.view {
            if rest.is_empty() {
                return Some(Match { view, params, access });
            }
        }

        self.children.iter().find_map(|child| {
            child.matches(rest, access).map(|mut m| {
                for (k, v) in &params {
                    m.params.entry(k.clone()).or_insert_with(|| v.clone());
                }
                m
            })
        })
    }
}

struct Match {
    view: View,
    params: HashMap<String, String>,
    access: Access,
}

/// Result of routing a path for the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Render {
        view: View,
        params: HashMap<String, String>,
    },
    Redirect {
        to: String,
    },
    NotFound,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Find the view for `path` and gate it on `session`
    pub fn resolve(&self, path: &str, session: &Session) -> Resolution {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let Some(found) = self
            .routes
            .iter()
            .find_map(|route| route.matches(&segments, Access::Public))
        else {
            return Resolution::NotFound;
        };

        match guard(session, found.access) {
            Decision::Render => Resolution::Render {
                view: found.view,
                params: found.params,
            },
            Decision::Redirect(to) => Resolution::Redirect { to },
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            Route::page("/", View::Home),
            Route::page("/about", View::About),
            Route::page("/signin", View::SignIn),
            Route::page("/register", View::Register),
            Route::protected(vec![
                Route::page("/dashboard", View::Dashboard),
                Route::page("/profile/:userId", View::Profile),
            ]),
            Route::page("*", View::NotFound),
        ])
    }
}

fn split(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;

    fn signed_in() -> Session {
        Session::Authenticated(Claims {
            sub: "65f1c0ffee".to_string(),
            exp: i64::MAX,
            extra: Default::default(),
        })
    }

    fn view_of(resolution: Resolution) -> Option<View> {
        match resolution {
            Resolution::Render { view, .. } => Some(view),
            _ => None,
        }
    }

    #[test]
    fn test_public_routes() {
        let table = RouteTable::default();
        let anon = Session::Unauthenticated;
        assert_eq!(view_of(table.resolve("/", &anon)), Some(View::Home));
        assert_eq!(view_of(table.resolve("/about", &anon)), Some(View::About));
        assert_eq!(view_of(table.resolve("/about/", &anon)), Some(View::About));
        assert_eq!(view_of(table.resolve("/signin?next=x", &anon)), Some(View::SignIn));
        assert_eq!(view_of(table.resolve("/register", &anon)), Some(View::Register));
    }

    #[test]
    fn test_protected_routes_redirect_when_signed_out() {
        let table = RouteTable::default();
        let anon = Session::Unauthenticated;
        for path in ["/dashboard", "/profile/42"] {
            assert_eq!(
                table.resolve(path, &anon),
                Resolution::Redirect {
                    to: "/signin".to_string()
                }
            );
        }
    }

    #[test]
    fn test_protected_routes_render_when_signed_in() {
        let table = RouteTable::default();
        let session = signed_in();
        assert_eq!(view_of(table.resolve("/dashboard", &session)), Some(View::Dashboard));

        match table.resolve("/profile/42", &session) {
            Resolution::Render { view, params } => {
                assert_eq!(view, View::Profile);
                assert_eq!(params.get("userId").map(String::as_str), Some("42"));
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_paths_hit_catch_all() {
        let table = RouteTable::default();
        let anon = Session::Unauthenticated;
        assert_eq!(view_of(table.resolve("/nope", &anon)), Some(View::NotFound));
        // Profile without an id is not the profile route
        assert_eq!(view_of(table.resolve("/profile", &anon)), Some(View::NotFound));
        assert_eq!(view_of(table.resolve("/dashboard/extra", &anon)), Some(View::NotFound));
    }

    #[test]
    fn test_table_without_catch_all() {
        let table = RouteTable::new(vec![Route::page("/", View::Home)]);
        assert_eq!(table.resolve("/missing", &Session::Unauthenticated), Resolution::NotFound);
    }

    #[test]
    fn test_nested_protection_is_inherited() {
        let table = RouteTable::new(vec![Route::nest(
            "/admin",
            vec![Route::nest("/users", vec![Route::page("/:id", View::Profile)])],
        )
        .require_auth()]);

        assert!(matches!(
            table.resolve("/admin/users/7", &Session::Unauthenticated),
            Resolution::Redirect { .. }
        ));
        match table.resolve("/admin/users/7", &signed_in()) {
            Resolution::Render { params, .. } => assert_eq!(params["id"], "7"),
            other => panic!("unexpected resolution: {:?}", other),
        }
    }
}
