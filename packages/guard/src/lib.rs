#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Role-based route guard policy.
//!
//! A pure decision function gating every non-public request path by the
//! requesting principal's role. The policy is fail-closed: any outcome
//! other than a successfully resolved session (missing token, expired
//! token, resolver error) redirects to login with the originally requested
//! path preserved as the return target.
//!
//! Session resolution itself is the server's job; this crate only decides.

use relief_map_incident_models::Role;

/// Paths reachable without a session.
const PUBLIC_PATHS: &[&str] = &["/", "/login", "/signup", "/favicon.ico"];

/// Path prefixes reachable without a session. The API surface does its own
/// per-handler auth checks and returns 401 instead of redirecting; media
/// file ids are opaque and served directly.
const PUBLIC_PREFIXES: &[&str] = &["/api", "/assets", "/media"];

/// Role-agnostic prefixes any authenticated principal may browse.
const COMMON_PROTECTED_PREFIXES: &[&str] = &["/profile", "/settings"];

/// Outcome of resolving the request's session token, as seen by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionResolution {
    /// No session token was presented.
    NoToken,
    /// A token was presented but resolved to no principal (expired,
    /// unknown, or the resolver itself failed).
    Invalid,
    /// A valid principal with the given role.
    Authenticated(Role),
}

/// The guard's verdict for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve the request.
    Allow,
    /// Redirect to the login page, preserving the requested path.
    RedirectToLogin {
        /// The originally requested path, to return to after login.
        redirect_to: String,
    },
    /// Redirect to the principal's canonical dashboard.
    RedirectToDashboard(&'static str),
}

/// Returns whether `path` is reachable without a session.
#[must_use]
pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Decides whether a request for `path` with the given session resolution
/// is served, or where it is redirected.
#[must_use]
pub fn evaluate(path: &str, session: SessionResolution) -> RouteDecision {
    if is_public(path) {
        return RouteDecision::Allow;
    }

    let role = match session {
        SessionResolution::NoToken | SessionResolution::Invalid => {
            return RouteDecision::RedirectToLogin {
                redirect_to: path.to_string(),
            };
        }
        SessionResolution::Authenticated(role) => role,
    };

    let allowed = path.starts_with(role.route_prefix())
        || COMMON_PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p));

    if allowed {
        RouteDecision::Allow
    } else {
        RouteDecision::RedirectToDashboard(role.dashboard_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths_need_no_session() {
        for path in [
            "/",
            "/login",
            "/signup",
            "/api/incidents",
            "/assets/app.js",
            "/media/abc123.jpg",
        ] {
            assert_eq!(
                evaluate(path, SessionResolution::NoToken),
                RouteDecision::Allow,
                "{path} should be public"
            );
        }
    }

    #[test]
    fn missing_session_redirects_to_login_with_return_target() {
        let decision = evaluate("/admin/dashboard", SessionResolution::NoToken);
        assert_eq!(
            decision,
            RouteDecision::RedirectToLogin {
                redirect_to: "/admin/dashboard".to_string()
            }
        );
    }

    #[test]
    fn invalid_session_fails_closed() {
        // Expired tokens and resolver errors look identical to the guard.
        let decision = evaluate("/user/dashboard", SessionResolution::Invalid);
        assert_eq!(
            decision,
            RouteDecision::RedirectToLogin {
                redirect_to: "/user/dashboard".to_string()
            }
        );
    }

    #[test]
    fn role_may_browse_its_own_prefix() {
        for role in Role::all() {
            let decision = evaluate(
                role.dashboard_path(),
                SessionResolution::Authenticated(*role),
            );
            assert_eq!(decision, RouteDecision::Allow, "{role:?}");
        }
    }

    #[test]
    fn community_cannot_reach_admin_routes() {
        let decision = evaluate(
            "/admin/resources",
            SessionResolution::Authenticated(Role::Community),
        );
        assert_eq!(
            decision,
            RouteDecision::RedirectToDashboard("/user/dashboard")
        );
    }

    #[test]
    fn volunteer_redirected_off_foreign_prefix() {
        let decision = evaluate(
            "/ngo/dashboard",
            SessionResolution::Authenticated(Role::Volunteer),
        );
        assert_eq!(
            decision,
            RouteDecision::RedirectToDashboard("/volunteer/dashboard")
        );
    }

    #[test]
    fn common_routes_open_to_all_roles() {
        for role in Role::all() {
            for path in ["/profile", "/settings/notifications"] {
                assert_eq!(
                    evaluate(path, SessionResolution::Authenticated(*role)),
                    RouteDecision::Allow,
                    "{role:?} {path}"
                );
            }
        }
    }
}
