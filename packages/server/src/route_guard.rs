// Actix runs each worker on its own thread; middleware futures don't
// need to be Send.
#![allow(clippy::future_not_send)]

//! Route guard middleware.
//!
//! Resolves the request's session cookie into a [`SessionResolution`] and
//! applies the pure guard policy from `relief_map_guard` to every request.
//! Unauthenticated requests for protected pages are redirected to the
//! login page with the requested path preserved in the `redirectTo` query
//! parameter; authenticated requests for another role's pages are
//! redirected to the principal's own dashboard.

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{Error, HttpResponse, web};
use relief_map_guard::{RouteDecision, SessionResolution};

use crate::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Evaluates the route guard policy for one request.
///
/// # Errors
///
/// Returns an error if the wrapped service fails.
pub async fn enforce(
    state: web::Data<AppState>,
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let path = req.path().to_string();

    // Public paths never need session resolution.
    let session = if relief_map_guard::is_public(&path) {
        SessionResolution::NoToken
    } else {
        resolve_session(&state, &req).await
    };

    match relief_map_guard::evaluate(&path, session) {
        RouteDecision::Allow => Ok(next.call(req).await?.map_into_boxed_body()),
        RouteDecision::RedirectToLogin { redirect_to } => {
            let target = format!("/login?redirectTo={}", urlencoding::encode(&redirect_to));
            Ok(req.into_response(redirect(&target)))
        }
        RouteDecision::RedirectToDashboard(dashboard) => {
            Ok(req.into_response(redirect(dashboard)))
        }
    }
}

/// Resolves the session cookie into the guard's view of the session.
///
/// Resolver errors fail closed: they are indistinguishable from an
/// invalid token.
async fn resolve_session(state: &AppState, req: &ServiceRequest) -> SessionResolution {
    let Some(cookie) = req.cookie(SESSION_COOKIE) else {
        return SessionResolution::NoToken;
    };

    match relief_map_auth::current_principal(state.db.as_ref(), cookie.value()).await {
        Ok(Some(principal)) => SessionResolution::Authenticated(principal.prefs.role),
        Ok(None) => SessionResolution::Invalid,
        Err(e) => {
            log::error!("Session resolution failed: {e}");
            SessionResolution::Invalid
        }
    }
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

#[cfg(test)]
mod tests {
    #[test]
    fn redirect_target_is_percent_encoded() {
        let target = format!(
            "/login?redirectTo={}",
            urlencoding::encode("/admin/resources?type=ngo")
        );
        assert_eq!(target, "/login?redirectTo=%2Fadmin%2Fresources%3Ftype%3Dngo");
    }
}
