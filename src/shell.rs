//! Application shell: current location plus session-event handling.
//!
//! DESIGN
//! ======
//! The shell owns the guard and the current location. `navigate` resolves a
//! path, follows static aliases and guard redirects, and settles on a final
//! location. When the HTTP context reports the session ended, the shell
//! drops its cached state and moves to `/login` instead of reloading.

use tokio::sync::broadcast;

use crate::guard::{self, LOGIN_PATH, Navigation, NavigationGuard};
use crate::http::{ApiClient, SessionEvent};

/// Longest chain of redirects followed before giving up.
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("page not found: {0}")]
    NotFound(String),
    #[error("redirect loop while navigating to {0}")]
    RedirectLoop(String),
}

#[derive(Debug)]
pub struct AppShell {
    guard: NavigationGuard,
    location: &'static str,
    resets: usize,
    last_event: Option<SessionEvent>,
}

impl AppShell {
    /// New shell starting at the login page.
    #[must_use]
    pub fn new(client: &ApiClient) -> Self {
        Self {
            guard: NavigationGuard::new(client.credentials().clone()),
            location: LOGIN_PATH,
            resets: 0,
            last_event: None,
        }
    }

    #[must_use]
    pub fn location(&self) -> &'static str {
        self.location
    }

    #[must_use]
    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    /// Number of session resets applied so far.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// The event behind the most recent reset.
    #[must_use]
    pub fn last_event(&self) -> Option<SessionEvent> {
        self.last_event
    }

    /// Navigate to `path`, returning the location actually reached.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::NotFound`] for unknown paths (the location
    /// is left unchanged) or [`NavigationError::RedirectLoop`] if redirects
    /// do not settle.
    pub fn navigate(&mut self, path: &str) -> Result<&'static str, NavigationError> {
        let mut route = guard::resolve(path).ok_or_else(|| NavigationError::NotFound(path.to_owned()))?;
        for _ in 0..MAX_REDIRECTS {
            if let Some(target) = route.redirect {
                route = guard::resolve(target).ok_or_else(|| NavigationError::NotFound(target.to_owned()))?;
                continue;
            }
            match self.guard.check(route) {
                Navigation::Proceed => {
                    self.location = route.path;
                    return Ok(route.path);
                }
                Navigation::Redirect(target) => {
                    route = guard::resolve(target).ok_or_else(|| NavigationError::NotFound(target.to_owned()))?;
                }
            }
        }
        Err(NavigationError::RedirectLoop(path.to_owned()))
    }

    /// Apply one session event: drop cached state and return to login.
    pub fn handle_event(&mut self, event: SessionEvent) {
        tracing::info!(?event, from = self.location, "session ended; returning to login");
        self.guard.reset();
        self.location = LOGIN_PATH;
        self.resets += 1;
        self.last_event = Some(event);
    }

    /// Apply every event already queued on `events` without waiting.
    /// Returns how many were applied.
    pub fn drain(&mut self, events: &mut broadcast::Receiver<SessionEvent>) -> usize {
        let mut applied = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    applied += 1;
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session events lagged");
                    self.handle_event(SessionEvent::Invalidated);
                    applied += 1;
                }
                Err(_) => return applied,
            }
        }
    }
}

#[cfg(test)]
#[path = "shell_test.rs"]
mod shell_test;
