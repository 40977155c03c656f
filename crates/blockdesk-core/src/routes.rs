//! Which console views a session may open.

use crate::auth::{Identity, SessionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    /// Block/unblock form; the home view.
    Submit,
    Blocklist,
    AuditLog,
    ApiKeys,
    ApiLogs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    RedirectToLogin,
    RedirectToHome,
}

impl Route {
    pub const HOME: Route = Route::Submit;

    /// Resolve a path; anything unknown lands on the home view.
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/login" => Route::Login,
            "/blocklist" => Route::Blocklist,
            "/logs" => Route::AuditLog,
            "/api-keys" => Route::ApiKeys,
            "/api-logs" => Route::ApiLogs,
            _ => Route::HOME,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Submit => "/",
            Route::Blocklist => "/blocklist",
            Route::AuditLog => "/logs",
            Route::ApiKeys => "/api-keys",
            Route::ApiLogs => "/api-logs",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Submit => "Block / Unblock",
            Route::Blocklist => "Blocklist",
            Route::AuditLog => "Audit Log",
            Route::ApiKeys => "API Keys",
            Route::ApiLogs => "API Logs",
        }
    }

    pub fn requires_session(&self) -> bool {
        !matches!(self, Route::Login)
    }

    pub fn requires_privilege(&self) -> bool {
        matches!(self, Route::ApiKeys | Route::ApiLogs)
    }
}

/// Decide whether `identity` (None when logged out) may open `route`.
pub fn guard(route: Route, identity: Option<&Identity>) -> Access {
    if !route.requires_session() {
        return Access::Allow;
    }
    match identity {
        None => Access::RedirectToLogin,
        Some(id) if route.requires_privilege() && !id.is_privileged => Access::RedirectToHome,
        Some(_) => Access::Allow,
    }
}

/// Resolve where a navigation to `route` actually ends up.
pub async fn resolve(route: Route, session: &SessionManager) -> Route {
    let identity = session.identity().await;
    match guard(route, identity.as_ref()) {
        Access::Allow => route,
        Access::RedirectToLogin => Route::Login,
        Access::RedirectToHome => Route::HOME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(privileged: bool) -> Identity {
        Identity {
            name: "alice".into(),
            is_privileged: privileged,
        }
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Route::from_path("/"), Route::Submit);
        assert_eq!(Route::from_path("/blocklist/"), Route::Blocklist);
        assert_eq!(Route::from_path("/logs"), Route::AuditLog);
        assert_eq!(Route::from_path("/api-logs"), Route::ApiLogs);
        assert_eq!(Route::from_path("/nope"), Route::Submit);
        for route in [Route::Login, Route::Blocklist, Route::AuditLog, Route::ApiKeys, Route::ApiLogs] {
            assert_eq!(Route::from_path(route.path()), route);
        }
    }

    #[test]
    fn test_login_always_allowed() {
        assert_eq!(guard(Route::Login, None), Access::Allow);
        assert_eq!(guard(Route::Login, Some(&user(false))), Access::Allow);
    }

    #[test]
    fn test_no_session_redirects_to_login() {
        for route in [Route::Submit, Route::Blocklist, Route::AuditLog, Route::ApiKeys, Route::ApiLogs] {
            assert_eq!(guard(route, None), Access::RedirectToLogin);
        }
    }

    #[test]
    fn test_privileged_routes() {
        assert_eq!(guard(Route::ApiKeys, Some(&user(false))), Access::RedirectToHome);
        assert_eq!(guard(Route::ApiLogs, Some(&user(false))), Access::RedirectToHome);
        assert_eq!(guard(Route::ApiKeys, Some(&user(true))), Access::Allow);
        assert_eq!(guard(Route::Blocklist, Some(&user(false))), Access::Allow);
    }

    #[tokio::test]
    async fn test_resolve_without_session() {
        let session = SessionManager::with_client(reqwest::Client::new(), "http://localhost:8000/api");
        assert_eq!(resolve(Route::ApiLogs, &session).await, Route::Login);
        assert_eq!(resolve(Route::Login, &session).await, Route::Login);
    }
}
