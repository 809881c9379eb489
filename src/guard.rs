//! Route table and navigation guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every navigation attempt runs through `NavigationGuard::check` exactly
//! once. Routes carry two flags: `requires_auth` pages bounce signed-out
//! users to `/login`, `requires_guest` pages bounce signed-in users to
//! `/dashboard`. Everything else proceeds.

use crate::credentials::{CredentialStore, UserRecord};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
}

impl RouteMeta {
    const PUBLIC: Self = Self { requires_auth: false, requires_guest: false };
    const AUTH: Self = Self { requires_auth: true, requires_guest: false };
    const GUEST: Self = Self { requires_auth: false, requires_guest: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub name: &'static str,
    pub meta: RouteMeta,
    /// Static alias: navigating here goes straight to the target.
    pub redirect: Option<&'static str>,
}

pub const ROUTES: &[Route] = &[
    Route { path: LOGIN_PATH, name: "Login", meta: RouteMeta::GUEST, redirect: None },
    Route { path: "/", name: "Root", meta: RouteMeta::PUBLIC, redirect: Some(DASHBOARD_PATH) },
    Route { path: DASHBOARD_PATH, name: "Dashboard", meta: RouteMeta::AUTH, redirect: None },
    Route { path: "/countries", name: "Countries", meta: RouteMeta::AUTH, redirect: None },
    Route { path: "/keywords", name: "Keywords", meta: RouteMeta::AUTH, redirect: None },
    Route { path: "/publication-types", name: "PublicationTypes", meta: RouteMeta::AUTH, redirect: None },
];

/// Look up a route by path. Trailing slashes and query strings are ignored.
#[must_use]
pub fn resolve(path: &str) -> Option<&'static Route> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    let normalized = if trimmed.is_empty() { "/" } else { trimmed };
    ROUTES.iter().find(|route| route.path == normalized)
}

/// Guard outcome for one navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(&'static str),
}

/// Transition table over route flags and authentication state.
#[must_use]
pub fn decide(meta: RouteMeta, is_authenticated: bool) -> Navigation {
    if meta.requires_auth && !is_authenticated {
        return Navigation::Redirect(LOGIN_PATH);
    }
    if meta.requires_guest && is_authenticated {
        return Navigation::Redirect(DASHBOARD_PATH);
    }
    Navigation::Proceed
}

#[derive(Debug)]
pub struct NavigationGuard {
    credentials: CredentialStore,
    user: Option<UserRecord>,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials, user: None }
    }

    /// Decide whether navigation to `route` may proceed.
    ///
    /// The stored user is loaded on the first check that finds an access
    /// credential; the decision itself only looks at credential presence.
    pub fn check(&mut self, route: &Route) -> Navigation {
        let is_authenticated = self.credentials.is_authenticated();
        if is_authenticated && self.user.is_none() {
            self.initialize();
        }
        let outcome = decide(route.meta, is_authenticated);
        tracing::debug!(path = route.path, is_authenticated, ?outcome, "navigation guard");
        outcome
    }

    fn initialize(&mut self) {
        match self.credentials.user() {
            Ok(user) => self.user = user,
            Err(e) => tracing::warn!(error = %e, "stored user record unreadable"),
        }
    }

    /// The user loaded from storage, once a check has initialised it.
    #[must_use]
    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    /// Forget the cached user; the next check reloads from storage.
    pub fn reset(&mut self) {
        self.user = None;
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;
