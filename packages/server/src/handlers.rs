// Actix runs each worker on its own thread; handler futures don't need
// to be Send.
#![allow(clippy::future_not_send)]

//! HTTP handler functions for the relief map API.
//!
//! Every protected handler resolves the requesting principal from the
//! session cookie itself and returns 401/403 JSON errors instead of
//! redirecting; page-level redirects are the route guard middleware's
//! job.

use std::collections::HashMap;

use actix_multipart::Multipart;
use actix_web::cookie::{Cookie, SameSite, time};
use actix_web::{HttpRequest, HttpResponse, web};
use relief_map_assign::AssignError;
use relief_map_auth::AuthError;
use relief_map_database::{DbError, queries};
use relief_map_database_models::{IncidentFilter, IncidentRow, PrincipalRow, ResourceFilter};
use relief_map_incident_models::{IncidentStatus, ResourceType, Role};
use relief_map_server_models::{
    ApiAssignment, ApiError, ApiHealth, ApiIncident, ApiPrincipal, ApiResource,
    ApiResourceDetail, ApiResourceStats, ApiSuccess, ApiValidationError, AssignRequest,
    AssignResponse, AssignmentAction, AssignmentActionRequest, IncidentListParams, LoginRequest,
    ResourceQueryParams, ResourceTypeCount, ResourceUpdateRequest, SignupRequest, SkillCount,
    TopPerformer,
};
use relief_map_storage::INCIDENT_MEDIA_BUCKET;

use crate::{AppState, multipart, route_guard::SESSION_COOKIE};

/// How many top performers the stats endpoint reports.
const TOP_PERFORMER_COUNT: usize = 5;

/// Minimum resolved incidents before a resource qualifies as a top
/// performer.
const TOP_PERFORMER_MIN_RESOLVED: i64 = 3;

/// Default page size for list endpoints.
const DEFAULT_LIMIT: u32 = 100;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/auth/signup`
///
/// Creates a principal, mints a session, and sets the session cookie.
pub async fn signup(state: web::Data<AppState>, body: web::Json<SignupRequest>) -> HttpResponse {
    let body = body.into_inner();

    let mut principal = match relief_map_auth::create_principal(
        state.db.as_ref(),
        &body.email,
        &body.password,
        &body.name,
        body.role,
    )
    .await
    {
        Ok(principal) => principal,
        Err(e) => return auth_error_response(e),
    };

    if let Some(phone) = &body.phone {
        if let Err(e) =
            queries::update_principal_phone(state.db.as_ref(), &principal.id, phone).await
        {
            return db_error_response(&e, "Failed to save phone number");
        }
        principal.phone = Some(phone.clone());
    }

    let session =
        match relief_map_auth::create_session(state.db.as_ref(), &body.email, &body.password)
            .await
        {
            Ok(session) => session,
            Err(e) => return auth_error_response(e),
        };

    HttpResponse::Created()
        .cookie(session_cookie(&session))
        .json(ApiPrincipal::from(principal))
}

/// `POST /api/auth/login`
pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> HttpResponse {
    let session =
        match relief_map_auth::create_session(state.db.as_ref(), &body.email, &body.password)
            .await
        {
            Ok(session) => session,
            Err(e) => return auth_error_response(e),
        };

    let principal = match queries::get_principal_by_email(state.db.as_ref(), &body.email).await {
        Ok(Some(creds)) => creds.principal,
        Ok(None) => return unauthorized(),
        Err(e) => return db_error_response(&e, "Failed to load principal"),
    };

    HttpResponse::Ok()
        .cookie(session_cookie(&session))
        .json(ApiPrincipal::from(principal))
}

/// `POST /api/auth/logout`
///
/// Destroys the session (if any) and clears the cookie. Logging out
/// without a session is not an error.
pub async fn logout(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if let Err(e) = relief_map_auth::destroy_session(state.db.as_ref(), cookie.value()).await
        {
            return auth_error_response(e);
        }
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");

    let mut response = HttpResponse::Ok().json(ApiSuccess::default());
    if let Err(e) = response.add_removal_cookie(&removal) {
        log::error!("Failed to add removal cookie: {e}");
    }
    response
}

/// `GET /api/auth/me`
pub async fn me(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    match authenticated(&state, &req).await {
        Ok(principal) => HttpResponse::Ok().json(ApiPrincipal::from(principal)),
        Err(response) => response,
    }
}

/// `GET /api/incidents`
///
/// Lists incidents with status, category, and reporter filters.
pub async fn incidents(
    state: web::Data<AppState>,
    req: HttpRequest,
    params: web::Query<IncidentListParams>,
) -> HttpResponse {
    if let Err(response) = authenticated(&state, &req).await {
        return response;
    }

    let filter = IncidentFilter {
        status: params.status,
        category: params.category,
        user_id: params.user_id.clone(),
        limit: params.limit.unwrap_or(DEFAULT_LIMIT),
        offset: params.offset.unwrap_or(0),
    };

    match queries::list_incidents(state.db.as_ref(), &filter).await {
        Ok(rows) => {
            let incidents: Vec<ApiIncident> = rows.into_iter().map(ApiIncident::from).collect();
            HttpResponse::Ok().json(incidents)
        }
        Err(e) => db_error_response(&e, "Failed to query incidents"),
    }
}

/// `POST /api/incidents`
///
/// Accepts a multipart incident submission. Validation reports every
/// field issue at once; nothing is persisted unless all fields pass.
/// Media files are uploaded before the incident document is created, and
/// cleaned up again if document creation fails.
pub async fn create_incident(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: Multipart,
) -> HttpResponse {
    let principal = match authenticated(&state, &req).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let submission = match multipart::incident_submission(payload).await {
        Ok(submission) => submission,
        Err(e) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
    };

    let validated = match relief_map_intake::validate(submission) {
        Ok(validated) => validated,
        Err(issues) => {
            return HttpResponse::BadRequest().json(ApiValidationError {
                error: "Validation failed".to_string(),
                issues,
            });
        }
    };

    let mut media_ids = Vec::with_capacity(validated.media.len());
    for media in &validated.media {
        match state
            .files
            .upload(INCIDENT_MEDIA_BUCKET, media.filename.as_deref(), &media.bytes)
            .await
        {
            Ok(id) => media_ids.push(id),
            Err(e) => {
                log::error!("Media upload failed: {e}");
                rollback_media(&state, &media_ids).await;
                return internal_error("Failed to store media");
            }
        }
    }

    let now = relief_map_database::now_rfc3339();
    let row = IncidentRow {
        id: uuid::Uuid::new_v4().to_string(),
        category: validated.category,
        kind: validated.kind,
        description: validated.description,
        urgency: validated.urgency,
        lat: validated.lat,
        lng: validated.lng,
        status: IncidentStatus::Pending,
        user_id: principal.id,
        media_ids,
        assigned_resources: Vec::new(),
        notes: validated.notes,
        version: 1,
        created_at: now.clone(),
        updated_at: now,
    };

    if let Err(e) = queries::insert_incident(state.db.as_ref(), &row).await {
        log::error!("Failed to insert incident: {e}");
        rollback_media(&state, &row.media_ids).await;
        return internal_error("Failed to create incident");
    }

    log::info!("Incident {} created by {}", row.id, row.user_id);

    HttpResponse::Created().json(ApiIncident::from(row))
}

/// `POST /api/incidents/{id}/resolve`
///
/// Admin-only. Moves a reviewed incident to resolved.
pub async fn resolve_incident(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    if let Err(response) = admin(&state, &req).await {
        return response;
    }

    match relief_map_assign::resolve_incident(state.db.as_ref(), &path).await {
        Ok(()) => HttpResponse::Ok().json(ApiSuccess::default()),
        Err(e) => assign_error_response(&e),
    }
}

/// `POST /api/resources/assign`
///
/// Admin-only. Assigns resources to a pending incident, moving it to
/// reviewed. Concurrent assignment of the same incident produces one
/// winner; the loser gets a 409.
pub async fn assign(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<AssignRequest>,
) -> HttpResponse {
    if let Err(response) = admin(&state, &req).await {
        return response;
    }

    match relief_map_assign::assign_resources(
        state.db.as_ref(),
        &body.incident_id,
        &body.resource_ids,
    )
    .await
    {
        Ok(rows) => HttpResponse::Ok().json(AssignResponse {
            success: true,
            assignments: rows.into_iter().map(ApiAssignment::from).collect(),
        }),
        Err(e) => assign_error_response(&e),
    }
}

/// `GET /api/resources`
///
/// Lists resource principals with type, availability, and skill filters.
pub async fn resources(
    state: web::Data<AppState>,
    req: HttpRequest,
    params: web::Query<ResourceQueryParams>,
) -> HttpResponse {
    if let Err(response) = authenticated(&state, &req).await {
        return response;
    }

    let filter = ResourceFilter {
        resource_type: params.resource_type,
        available: params.available,
        skills: params.skills.as_deref().map(parse_skills).unwrap_or_default(),
        limit: params.limit.unwrap_or(DEFAULT_LIMIT),
    };

    match queries::list_resources(state.db.as_ref(), &filter).await {
        Ok(rows) => {
            let resources: Vec<ApiResource> = rows.into_iter().map(ApiResource::from).collect();
            HttpResponse::Ok().json(resources)
        }
        Err(e) => db_error_response(&e, "Failed to query resources"),
    }
}

/// `GET /api/resources/stats`
///
/// Admin-only. Aggregate statistics over the whole resource pool.
pub async fn resource_stats(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Err(response) = admin(&state, &req).await {
        return response;
    }

    let filter = ResourceFilter {
        limit: u32::MAX,
        ..ResourceFilter::default()
    };

    match queries::list_resources(state.db.as_ref(), &filter).await {
        Ok(rows) => HttpResponse::Ok().json(compute_stats(rows)),
        Err(e) => db_error_response(&e, "Failed to query resources"),
    }
}

/// `GET /api/resources/{id}`
///
/// A resource profile with its assignment history, newest first.
pub async fn resource_detail(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    if let Err(response) = authenticated(&state, &req).await {
        return response;
    }

    let row = match queries::get_principal(state.db.as_ref(), &path).await {
        Ok(Some(row)) if row.prefs.role.resource_type().is_some() => row,
        Ok(_) => return not_found("Resource not found"),
        Err(e) => return db_error_response(&e, "Failed to load resource"),
    };

    let assignments =
        match queries::list_assignments_for_resource(state.db.as_ref(), &path, DEFAULT_LIMIT)
            .await
        {
            Ok(rows) => rows.into_iter().map(ApiAssignment::from).collect(),
            Err(e) => return db_error_response(&e, "Failed to load assignments"),
        };

    HttpResponse::Ok().json(ApiResourceDetail {
        resource: ApiResource::from(row),
        assignments,
    })
}

/// `PATCH /api/resources/{id}`
///
/// Updates a principal's profile and preference bag. Principals may only
/// update themselves; admins may update anyone. Role and the lifetime
/// counters are never patchable.
pub async fn update_resource(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<ResourceUpdateRequest>,
) -> HttpResponse {
    let principal = match authenticated(&state, &req).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    if principal.id != *path && principal.prefs.role != Role::Admin {
        return HttpResponse::Forbidden()
            .json(ApiError::new("Cannot update another principal's profile"));
    }

    if !body.prefs.rating_in_range() {
        return HttpResponse::BadRequest().json(ApiError::new("Rating must be between 0 and 5"));
    }

    let target = match queries::get_principal(state.db.as_ref(), &path).await {
        Ok(Some(target)) => target,
        Ok(None) => return not_found("Resource not found"),
        Err(e) => return db_error_response(&e, "Failed to load resource"),
    };

    if let Some(name) = &body.name {
        if let Err(e) = queries::update_principal_name(state.db.as_ref(), &path, name).await {
            return db_error_response(&e, "Failed to update name");
        }
    }
    if let Some(phone) = &body.phone {
        if let Err(e) = queries::update_principal_phone(state.db.as_ref(), &path, phone).await {
            return db_error_response(&e, "Failed to update phone");
        }
    }

    let prefs = target.prefs.merged(&body.prefs);
    if let Err(e) = relief_map_auth::set_prefs(state.db.as_ref(), &path, &prefs).await {
        return auth_error_response(e);
    }

    match queries::get_principal(state.db.as_ref(), &path).await {
        Ok(Some(updated)) => HttpResponse::Ok().json(ApiResource::from(updated)),
        Ok(None) => not_found("Resource not found"),
        Err(e) => db_error_response(&e, "Failed to load resource"),
    }
}

/// `PATCH /api/assignments/{id}`
///
/// A resource accepting, declining, or completing one of its
/// assignments. Admins may act on any assignment.
pub async fn assignment_action(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<AssignmentActionRequest>,
) -> HttpResponse {
    let principal = match authenticated(&state, &req).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let assignment = match queries::get_assignment(state.db.as_ref(), &path).await {
        Ok(Some(assignment)) => assignment,
        Ok(None) => return not_found("Assignment not found"),
        Err(e) => return db_error_response(&e, "Failed to load assignment"),
    };

    if assignment.resource_id != principal.id && principal.prefs.role != Role::Admin {
        return HttpResponse::Forbidden()
            .json(ApiError::new("Cannot act on another resource's assignment"));
    }

    let result = match body.action {
        AssignmentAction::Accept => {
            relief_map_assign::respond_to_assignment(state.db.as_ref(), &path, true).await
        }
        AssignmentAction::Decline => {
            relief_map_assign::respond_to_assignment(state.db.as_ref(), &path, false).await
        }
        AssignmentAction::Complete => {
            relief_map_assign::complete_assignment(state.db.as_ref(), &path).await
        }
    };

    match result {
        Ok(row) => HttpResponse::Ok().json(ApiAssignment::from(row)),
        Err(e) => assign_error_response(&e),
    }
}

/// Resolves the requesting principal from the session cookie, or builds
/// the 401 response.
async fn authenticated(
    state: &AppState,
    req: &HttpRequest,
) -> Result<PrincipalRow, HttpResponse> {
    let Some(cookie) = req.cookie(SESSION_COOKIE) else {
        return Err(unauthorized());
    };

    match relief_map_auth::current_principal(state.db.as_ref(), cookie.value()).await {
        Ok(Some(principal)) => Ok(principal),
        Ok(None) => Err(unauthorized()),
        Err(e) => {
            log::error!("Failed to resolve session: {e}");
            Err(internal_error("Failed to resolve session"))
        }
    }
}

/// Like [`authenticated`], but additionally requires the admin role.
async fn admin(state: &AppState, req: &HttpRequest) -> Result<PrincipalRow, HttpResponse> {
    let principal = authenticated(state, req).await?;
    if principal.prefs.role == Role::Admin {
        Ok(principal)
    } else {
        Err(HttpResponse::Forbidden().json(ApiError::new("Admin access required")))
    }
}

fn session_cookie(session: &relief_map_auth::Session) -> Cookie<'static> {
    let ttl = session.expires_at - chrono::Utc::now();
    Cookie::build(SESSION_COOKIE, session.secret.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .finish()
}

/// Deletes already-uploaded media after a failed incident creation.
async fn rollback_media(state: &AppState, media_ids: &[String]) {
    for id in media_ids {
        if let Err(e) = state.files.delete(INCIDENT_MEDIA_BUCKET, id).await {
            log::warn!("Failed to clean up media {id}: {e}");
        }
    }
}

/// Splits a comma-separated skills parameter into trimmed, non-empty
/// skill names.
fn parse_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Aggregates pool-wide statistics from the resource rows.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn compute_stats(rows: Vec<PrincipalRow>) -> ApiResourceStats {
    let total = rows.len() as u64;
    let available = rows.iter().filter(|r| r.prefs.availability).count() as u64;

    let average_rating = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|r| r.prefs.rating).sum::<f64>() / rows.len() as f64
    };

    let by_type = ResourceType::all()
        .iter()
        .map(|&resource_type| ResourceTypeCount {
            resource_type,
            count: rows
                .iter()
                .filter(|r| r.prefs.role.resource_type() == Some(resource_type))
                .count() as u64,
        })
        .collect();

    let mut ranked: Vec<&PrincipalRow> = rows
        .iter()
        .filter(|r| r.prefs.resolved_incidents >= TOP_PERFORMER_MIN_RESOLVED)
        .collect();
    ranked.sort_by(|a, b| {
        b.prefs
            .rating
            .total_cmp(&a.prefs.rating)
            .then_with(|| b.prefs.resolved_incidents.cmp(&a.prefs.resolved_incidents))
    });
    let top_performers = ranked
        .into_iter()
        .take(TOP_PERFORMER_COUNT)
        .map(|r| TopPerformer {
            id: r.id.clone(),
            name: r.name.clone(),
            resource_type: r.prefs.role.resource_type(),
            resolved_incidents: r.prefs.resolved_incidents,
            rating: r.prefs.rating,
        })
        .collect();

    let mut skill_counts: HashMap<&str, u64> = HashMap::new();
    for row in &rows {
        for skill in &row.prefs.skills {
            *skill_counts.entry(skill.as_str()).or_default() += 1;
        }
    }
    let mut skills: Vec<SkillCount> = skill_counts
        .into_iter()
        .map(|(skill, count)| SkillCount {
            skill: skill.to_string(),
            count,
        })
        .collect();
    skills.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.skill.cmp(&b.skill)));

    ApiResourceStats {
        total,
        by_type,
        available,
        average_rating,
        top_performers,
        skills,
    }
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(ApiError::new("Authentication required"))
}

fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ApiError::new(message))
}

fn internal_error(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(ApiError::new(message))
}

fn db_error_response(e: &DbError, message: &str) -> HttpResponse {
    log::error!("{message}: {e}");
    internal_error(message)
}

fn auth_error_response(e: AuthError) -> HttpResponse {
    match e {
        AuthError::InvalidCredentials => {
            HttpResponse::Unauthorized().json(ApiError::new(e.to_string()))
        }
        AuthError::EmailTaken => HttpResponse::Conflict().json(ApiError::new(e.to_string())),
        AuthError::PasswordTooShort => {
            HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
        }
        AuthError::PrincipalNotFound { .. } => not_found(&e.to_string()),
        AuthError::Database(err) => db_error_response(&err, "Internal error"),
    }
}

fn assign_error_response(e: &AssignError) -> HttpResponse {
    match e {
        AssignError::Database(err) => db_error_response(err, "Internal error"),
        AssignError::EmptyResourceList | AssignError::NotAResource { .. } => {
            HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
        }
        AssignError::IncidentNotFound { .. }
        | AssignError::ResourceNotFound { .. }
        | AssignError::AssignmentNotFound { .. } => not_found(&e.to_string()),
        AssignError::IncidentConflict { .. } | AssignError::AssignmentConflict { .. } => {
            HttpResponse::Conflict().json(ApiError::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use relief_map_database_models::ResourcePrefs;

    use super::*;

    fn resource(id: &str, role: Role, resolved: i64, rating: f64, skills: &[&str]) -> PrincipalRow {
        PrincipalRow {
            id: id.to_string(),
            name: id.to_string(),
            email: format!("{id}@example.com"),
            phone: None,
            prefs: ResourcePrefs {
                role,
                resolved_incidents: resolved,
                rating,
                skills: skills.iter().map(ToString::to_string).collect(),
                ..ResourcePrefs::default()
            },
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn parse_skills_trims_and_drops_empties() {
        assert_eq!(
            parse_skills(" rescue, medical ,,first aid"),
            vec![
                "rescue".to_string(),
                "medical".to_string(),
                "first aid".to_string()
            ]
        );
        assert!(parse_skills("").is_empty());
    }

    #[test]
    fn stats_empty_pool() {
        let stats = compute_stats(Vec::new());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.available, 0);
        assert!((stats.average_rating - 0.0).abs() < f64::EPSILON);
        assert!(stats.top_performers.is_empty());
        assert!(stats.skills.is_empty());
        assert_eq!(stats.by_type.len(), ResourceType::all().len());
    }

    #[test]
    fn stats_ranks_top_performers_by_rating_then_resolved() {
        let rows = vec![
            // Below the resolved minimum, so never ranked despite the
            // perfect rating.
            resource("a", Role::Volunteer, 2, 5.0, &["rescue"]),
            resource("b", Role::Ngo, 5, 4.0, &["rescue", "logistics"]),
            resource("c", Role::Gov, 3, 4.5, &[]),
            resource("d", Role::Volunteer, 7, 4.0, &[]),
        ];
        let stats = compute_stats(rows);

        assert_eq!(stats.total, 4);
        let ids: Vec<&str> = stats
            .top_performers
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "d", "b"]);
    }

    #[test]
    fn stats_counts_types_and_skills() {
        let rows = vec![
            resource("a", Role::Volunteer, 0, 0.0, &["rescue"]),
            resource("b", Role::Volunteer, 0, 0.0, &["rescue", "medical"]),
            resource("c", Role::Ngo, 0, 0.0, &["medical"]),
        ];
        let stats = compute_stats(rows);

        let volunteer_count = stats
            .by_type
            .iter()
            .find(|c| c.resource_type == ResourceType::Volunteer)
            .map(|c| c.count);
        assert_eq!(volunteer_count, Some(2));

        assert_eq!(stats.skills[0].count, 2);
        // Tied counts fall back to name order.
        assert_eq!(stats.skills[0].skill, "medical");
    }
}
