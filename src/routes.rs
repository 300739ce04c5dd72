//! Screen routing and the authentication guard

use tracing::debug;

use crate::session::{Session, SessionStore};

/// Addressable screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    Checkout,
    Dashboard,
    Leaderboard,
}

impl Route {
    /// Resolve a path; unknown paths yield `None`
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        match path {
            "" => Some(Self::Landing),
            "/login" => Some(Self::Login),
            "/register" => Some(Self::Register),
            "/checkout" => Some(Self::Checkout),
            "/dashboard" => Some(Self::Dashboard),
            "/leaderboard" => Some(Self::Leaderboard),
            _ => None,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Checkout => "/checkout",
            Self::Dashboard => "/dashboard",
            Self::Leaderboard => "/leaderboard",
        }
    }

    /// Screens that require an authenticated session
    pub fn is_guarded(&self) -> bool {
        matches!(self, Self::Dashboard)
    }
}

/// What the guard lets the caller do with a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still bootstrapping: show a neutral placeholder, decide nothing
    Loading,
    /// Go elsewhere; `replace` means the current history entry is overwritten
    Redirect { to: Route, replace: bool },
    Render,
}

pub fn guard(route: Route, session: &Session) -> GuardDecision {
    if !route.is_guarded() {
        return GuardDecision::Render;
    }
    if session.bootstrapping {
        return GuardDecision::Loading;
    }
    if session.is_authenticated() {
        GuardDecision::Render
    } else {
        GuardDecision::Redirect {
            to: Route::Login,
            replace: true,
        }
    }
}

/// Navigation history with push/replace/back semantics
#[derive(Debug, Clone)]
pub struct Navigator {
    history: Vec<Route>,
}

/// Result of a navigation: the screen to show and whether it is final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading(Route),
    Show(Route),
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            history: vec![Route::Landing],
        }
    }

    pub fn current(&self) -> Route {
        self.history.last().copied().unwrap_or(Route::Landing)
    }

    pub fn history(&self) -> &[Route] {
        &self.history
    }

    /// Navigate to `path`, pushing a history entry
    pub fn navigate(&mut self, path: &str, session: &SessionStore) -> Screen {
        match Route::parse(path) {
            Some(route) => {
                self.history.push(route);
                self.resolve(session)
            }
            None => {
                // the unknown entry is pushed and immediately replaced
                debug!("Unknown path {}, redirecting to /", path);
                self.history.push(Route::Landing);
                self.resolve(session)
            }
        }
    }

    /// Step back one entry (the first entry is never popped)
    pub fn back(&mut self, session: &SessionStore) -> Screen {
        if self.history.len() > 1 {
            self.history.pop();
        }
        self.resolve(session)
    }

    /// Re-run the guard for the current entry, following redirects
    ///
    /// Call again once bootstrapping finishes to turn a `Loading` screen into
    /// a final one.
    pub fn resolve(&mut self, session: &SessionStore) -> Screen {
        let snapshot = session.reconcile();
        loop {
            let route = self.current();
            match guard(route, &snapshot) {
                GuardDecision::Loading => return Screen::Loading(route),
                GuardDecision::Render => return Screen::Show(route),
                GuardDecision::Redirect { to, replace } => {
                    debug!("Guard redirect {} -> {}", route.path(), to.path());
                    if replace {
                        self.replace(to);
                    } else {
                        self.history.push(to);
                    }
                }
            }
        }
    }

    fn replace(&mut self, route: Route) {
        match self.history.last_mut() {
            Some(last) => *last = route,
            None => self.history.push(route),
        }
    }
}
