//! Database query functions for incidents, assignments, principals, and
//! sessions.
//!
//! Write paths insert fully validated rows and never coerce. Read paths
//! are lenient: rows with unknown enum values or NULL notes (legacy or
//! externally mutated documents) are normalized to safe defaults, and
//! every normalization is logged so write-side bugs can't hide behind it.

use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use relief_map_database_models::{
    AssignmentRow, IncidentFilter, IncidentRow, PrincipalCredentials, PrincipalRow,
    ResourceFilter, ResourcePrefs, SessionRow,
};
use relief_map_incident_models::{
    AssignmentStatus, IncidentCategory, IncidentStatus, ResourceType, Role, Urgency,
};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Inserts a new incident row.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert_incident(db: &dyn Database, incident: &IncidentRow) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO incidents (
            id, category, kind, description, urgency, lat, lng,
            status, user_id, media_ids, assigned_resources, notes,
            version, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        &[
            DatabaseValue::String(incident.id.clone()),
            DatabaseValue::String(incident.category.to_string()),
            DatabaseValue::String(incident.kind.clone()),
            incident
                .description
                .as_ref()
                .map_or(DatabaseValue::Null, |d| DatabaseValue::String(d.clone())),
            DatabaseValue::String(incident.urgency.to_string()),
            DatabaseValue::Real64(incident.lat),
            DatabaseValue::Real64(incident.lng),
            DatabaseValue::String(incident.status.to_string()),
            DatabaseValue::String(incident.user_id.clone()),
            DatabaseValue::String(serde_json::to_string(&incident.media_ids)?),
            DatabaseValue::String(serde_json::to_string(&incident.assigned_resources)?),
            DatabaseValue::String(incident.notes.clone()),
            DatabaseValue::Int64(incident.version),
            DatabaseValue::String(incident.created_at.clone()),
            DatabaseValue::String(incident.updated_at.clone()),
        ],
    )
    .await?;

    Ok(())
}

/// Fetches a single incident by id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_incident(db: &dyn Database, id: &str) -> Result<Option<IncidentRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM incidents WHERE id = ?1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    Ok(rows.first().map(map_incident_row))
}

/// Queries incidents with status, category, and reporter filters.
///
/// Results are ordered newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_incidents(
    db: &dyn Database,
    filter: &IncidentFilter,
) -> Result<Vec<IncidentRow>, DbError> {
    let mut sql = String::from("SELECT * FROM incidents WHERE 1=1");

    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut param_idx = 1u32;

    if let Some(status) = filter.status {
        write!(sql, " AND status = ?{param_idx}").unwrap();
        params.push(DatabaseValue::String(status.to_string()));
        param_idx += 1;
    }

    if let Some(category) = filter.category {
        write!(sql, " AND category = ?{param_idx}").unwrap();
        params.push(DatabaseValue::String(category.to_string()));
        param_idx += 1;
    }

    if let Some(user_id) = &filter.user_id {
        write!(sql, " AND user_id = ?{param_idx}").unwrap();
        params.push(DatabaseValue::String(user_id.clone()));
        param_idx += 1;
    }

    sql.push_str(" ORDER BY created_at DESC");

    write!(sql, " LIMIT ?{param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(filter.limit)));
    param_idx += 1;

    write!(sql, " OFFSET ?{param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(filter.offset)));

    let rows = db.query_raw_params(&sql, &params).await?;

    Ok(rows.iter().map(map_incident_row).collect())
}

/// Transitions an incident from `pending` to `reviewed` and records the
/// assigned resource ids, as a single compare-and-set.
///
/// Returns `false` when the incident was not in `pending` (a concurrent
/// assignment got there first, or the id doesn't exist) — the caller
/// surfaces that as a conflict instead of losing the earlier update.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn mark_incident_reviewed(
    db: &dyn Database,
    incident_id: &str,
    resource_ids: &[String],
) -> Result<bool, DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE incidents SET
                status = 'reviewed',
                assigned_resources = ?2,
                version = version + 1,
                updated_at = ?3
             WHERE id = ?1 AND status = 'pending'",
            &[
                DatabaseValue::String(incident_id.to_string()),
                DatabaseValue::String(serde_json::to_string(resource_ids)?),
                DatabaseValue::String(crate::now_rfc3339()),
            ],
        )
        .await?;

    Ok(updated > 0)
}

/// Transitions an incident from `reviewed` to `resolved`.
///
/// Returns `false` when the incident was not in `reviewed`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn mark_incident_resolved(
    db: &dyn Database,
    incident_id: &str,
) -> Result<bool, DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE incidents SET
                status = 'resolved',
                version = version + 1,
                updated_at = ?2
             WHERE id = ?1 AND status = 'reviewed'",
            &[
                DatabaseValue::String(incident_id.to_string()),
                DatabaseValue::String(crate::now_rfc3339()),
            ],
        )
        .await?;

    Ok(updated > 0)
}

/// Maps a raw row to an [`IncidentRow`], normalizing legacy/malformed
/// values to safe defaults with a warning.
fn map_incident_row(row: &switchy_database::Row) -> IncidentRow {
    let id: String = row.to_value("id").unwrap_or_default();

    let category_raw: String = row.to_value("category").unwrap_or_default();
    let category = category_raw.parse::<IncidentCategory>().unwrap_or_else(|_| {
        log::warn!("Incident {id}: unknown category {category_raw:?}, normalizing to other");
        IncidentCategory::Other
    });

    let urgency_raw: String = row.to_value("urgency").unwrap_or_default();
    let urgency = urgency_raw.parse::<Urgency>().unwrap_or_else(|_| {
        log::warn!("Incident {id}: unknown urgency {urgency_raw:?}, normalizing to medium");
        Urgency::Medium
    });

    let status_raw: String = row.to_value("status").unwrap_or_default();
    let status = status_raw.parse::<IncidentStatus>().unwrap_or_else(|_| {
        log::warn!("Incident {id}: unknown status {status_raw:?}, normalizing to pending");
        IncidentStatus::Pending
    });

    let notes: Option<String> = row.to_value("notes").unwrap_or(None);
    let notes = notes.unwrap_or_else(|| {
        log::warn!("Incident {id}: NULL notes, normalizing to empty string");
        String::new()
    });

    IncidentRow {
        category,
        kind: row.to_value("kind").unwrap_or_default(),
        description: row.to_value("description").unwrap_or(None),
        urgency,
        lat: row.to_value("lat").unwrap_or(0.0),
        lng: row.to_value("lng").unwrap_or(0.0),
        status,
        user_id: row.to_value("user_id").unwrap_or_default(),
        media_ids: parse_id_list(&id, "media_ids", row),
        assigned_resources: parse_id_list(&id, "assigned_resources", row),
        notes,
        version: row.to_value("version").unwrap_or(1),
        created_at: row.to_value("created_at").unwrap_or_default(),
        updated_at: row.to_value("updated_at").unwrap_or_default(),
        id,
    }
}

/// Parses a JSON string-array column, normalizing malformed content to an
/// empty list with a warning.
fn parse_id_list(id: &str, column: &str, row: &switchy_database::Row) -> Vec<String> {
    let raw: String = row.to_value(column).unwrap_or_default();
    if raw.is_empty() {
        return Vec::new();
    }
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        log::warn!("Incident {id}: malformed {column} JSON ({e}), normalizing to empty");
        Vec::new()
    })
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// Inserts a new assignment row.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert_assignment(
    db: &dyn Database,
    assignment: &AssignmentRow,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO assignments (
            id, incident_id, resource_id, resource_type,
            assigned_at, accepted_at, completed_at, status, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        &[
            DatabaseValue::String(assignment.id.clone()),
            DatabaseValue::String(assignment.incident_id.clone()),
            DatabaseValue::String(assignment.resource_id.clone()),
            DatabaseValue::String(assignment.resource_type.to_string()),
            DatabaseValue::String(assignment.assigned_at.clone()),
            assignment
                .accepted_at
                .as_ref()
                .map_or(DatabaseValue::Null, |t| DatabaseValue::String(t.clone())),
            assignment
                .completed_at
                .as_ref()
                .map_or(DatabaseValue::Null, |t| DatabaseValue::String(t.clone())),
            DatabaseValue::String(assignment.status.to_string()),
            assignment
                .notes
                .as_ref()
                .map_or(DatabaseValue::Null, |n| DatabaseValue::String(n.clone())),
        ],
    )
    .await?;

    Ok(())
}

/// Fetches a single assignment by id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_assignment(
    db: &dyn Database,
    id: &str,
) -> Result<Option<AssignmentRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM assignments WHERE id = ?1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    Ok(rows.first().map(map_assignment_row))
}

/// Transitions an assignment from `pending` to `accepted` or `declined`,
/// stamping `accepted_at` on acceptance. Compare-and-set on the current
/// status; returns `false` when the assignment was not `pending`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn respond_to_assignment(
    db: &dyn Database,
    assignment_id: &str,
    accept: bool,
) -> Result<bool, DbError> {
    let updated = if accept {
        db.exec_raw_params(
            "UPDATE assignments SET status = 'accepted', accepted_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            &[
                DatabaseValue::String(assignment_id.to_string()),
                DatabaseValue::String(crate::now_rfc3339()),
            ],
        )
        .await?
    } else {
        db.exec_raw_params(
            "UPDATE assignments SET status = 'declined'
             WHERE id = ?1 AND status = 'pending'",
            &[DatabaseValue::String(assignment_id.to_string())],
        )
        .await?
    };

    Ok(updated > 0)
}

/// Transitions an assignment from `accepted` to `completed`, stamping
/// `completed_at`. Returns `false` when the assignment was not `accepted`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn complete_assignment(
    db: &dyn Database,
    assignment_id: &str,
) -> Result<bool, DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE assignments SET status = 'completed', completed_at = ?2
             WHERE id = ?1 AND status = 'accepted'",
            &[
                DatabaseValue::String(assignment_id.to_string()),
                DatabaseValue::String(crate::now_rfc3339()),
            ],
        )
        .await?;

    Ok(updated > 0)
}

/// Lists a resource's assignments, most recent first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_assignments_for_resource(
    db: &dyn Database,
    resource_id: &str,
    limit: u32,
) -> Result<Vec<AssignmentRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM assignments
             WHERE resource_id = ?1
             ORDER BY assigned_at DESC
             LIMIT ?2",
            &[
                DatabaseValue::String(resource_id.to_string()),
                DatabaseValue::Int64(i64::from(limit)),
            ],
        )
        .await?;

    Ok(rows.iter().map(map_assignment_row).collect())
}

fn map_assignment_row(row: &switchy_database::Row) -> AssignmentRow {
    let id: String = row.to_value("id").unwrap_or_default();

    let resource_type_raw: String = row.to_value("resource_type").unwrap_or_default();
    let resource_type = resource_type_raw
        .parse::<ResourceType>()
        .unwrap_or_else(|_| {
            log::warn!(
                "Assignment {id}: unknown resource type {resource_type_raw:?}, normalizing to volunteer"
            );
            ResourceType::Volunteer
        });

    let status_raw: String = row.to_value("status").unwrap_or_default();
    let status = status_raw.parse::<AssignmentStatus>().unwrap_or_else(|_| {
        log::warn!("Assignment {id}: unknown status {status_raw:?}, normalizing to pending");
        AssignmentStatus::Pending
    });

    AssignmentRow {
        incident_id: row.to_value("incident_id").unwrap_or_default(),
        resource_id: row.to_value("resource_id").unwrap_or_default(),
        resource_type,
        assigned_at: row.to_value("assigned_at").unwrap_or_default(),
        accepted_at: row.to_value("accepted_at").unwrap_or(None),
        completed_at: row.to_value("completed_at").unwrap_or(None),
        status,
        notes: row.to_value("notes").unwrap_or(None),
        id,
    }
}

// ---------------------------------------------------------------------------
// Principals
// ---------------------------------------------------------------------------

/// Inserts a new principal with its credential material.
///
/// The role lives both in its own indexed column (for resource queries)
/// and inside the JSON prefs bag; this function keeps them in sync.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails (including a
/// duplicate email).
pub async fn insert_principal(
    db: &dyn Database,
    principal: &PrincipalRow,
    password_hash: &str,
    salt: &str,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO principals (
            id, name, email, phone, role, prefs, password_hash, salt, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        &[
            DatabaseValue::String(principal.id.clone()),
            DatabaseValue::String(principal.name.clone()),
            DatabaseValue::String(principal.email.clone()),
            principal
                .phone
                .as_ref()
                .map_or(DatabaseValue::Null, |p| DatabaseValue::String(p.clone())),
            DatabaseValue::String(principal.prefs.role.to_string()),
            DatabaseValue::String(serde_json::to_string(&principal.prefs)?),
            DatabaseValue::String(password_hash.to_string()),
            DatabaseValue::String(salt.to_string()),
            DatabaseValue::String(principal.created_at.clone()),
        ],
    )
    .await?;

    Ok(())
}

/// Fetches a principal by id, without credential material.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_principal(
    db: &dyn Database,
    id: &str,
) -> Result<Option<PrincipalRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM principals WHERE id = ?1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    Ok(rows.first().map(map_principal_row))
}

/// Fetches a principal by email together with its credential material,
/// for login verification.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_principal_by_email(
    db: &dyn Database,
    email: &str,
) -> Result<Option<PrincipalCredentials>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM principals WHERE email = ?1",
            &[DatabaseValue::String(email.to_string())],
        )
        .await?;

    Ok(rows.first().map(|row| PrincipalCredentials {
        principal: map_principal_row(row),
        password_hash: row.to_value("password_hash").unwrap_or_default(),
        salt: row.to_value("salt").unwrap_or_default(),
    }))
}

/// Replaces a principal's preference bag, keeping the role column in sync.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_principal_prefs(
    db: &dyn Database,
    principal_id: &str,
    prefs: &ResourcePrefs,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE principals SET role = ?2, prefs = ?3 WHERE id = ?1",
        &[
            DatabaseValue::String(principal_id.to_string()),
            DatabaseValue::String(prefs.role.to_string()),
            DatabaseValue::String(serde_json::to_string(prefs)?),
        ],
    )
    .await?;

    Ok(())
}

/// Updates a principal's display name.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_principal_name(
    db: &dyn Database,
    principal_id: &str,
    name: &str,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE principals SET name = ?2 WHERE id = ?1",
        &[
            DatabaseValue::String(principal_id.to_string()),
            DatabaseValue::String(name.to_string()),
        ],
    )
    .await?;

    Ok(())
}

/// Updates a principal's phone number.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_principal_phone(
    db: &dyn Database,
    principal_id: &str,
    phone: &str,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE principals SET phone = ?2 WHERE id = ?1",
        &[
            DatabaseValue::String(principal_id.to_string()),
            DatabaseValue::String(phone.to_string()),
        ],
    )
    .await?;

    Ok(())
}

/// Lists resource principals (volunteers, NGOs, government agencies).
///
/// The role filter runs in SQL against the indexed role column;
/// availability and skills filters are applied after parsing the prefs
/// bag, since they live inside the JSON column. The result limit is
/// applied last, after the in-memory filters, so a filtered listing
/// returns up to `limit` matches rather than whatever survives from
/// the first `limit` rows.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_resources(
    db: &dyn Database,
    filter: &ResourceFilter,
) -> Result<Vec<PrincipalRow>, DbError> {
    let rows = if let Some(resource_type) = filter.resource_type {
        db.query_raw_params(
            "SELECT * FROM principals WHERE role = ?1 ORDER BY created_at DESC",
            &[DatabaseValue::String(resource_type.to_string())],
        )
        .await?
    } else {
        db.query_raw_params(
            "SELECT * FROM principals
             WHERE role IN ('volunteer', 'ngo', 'gov')
             ORDER BY created_at DESC",
            &[],
        )
        .await?
    };

    let resources = rows
        .iter()
        .map(map_principal_row)
        .filter(|p| {
            filter
                .available
                .is_none_or(|wanted| p.prefs.availability == wanted)
        })
        .filter(|p| {
            filter.skills.iter().all(|wanted| {
                p.prefs
                    .skills
                    .iter()
                    .any(|s| s.to_lowercase().contains(&wanted.to_lowercase()))
            })
        })
        .take(usize::try_from(filter.limit).unwrap_or(usize::MAX))
        .collect();

    Ok(resources)
}

/// Maps a raw row to a [`PrincipalRow`], normalizing a malformed prefs
/// bag to defaults (role taken from the dedicated column) with a warning.
fn map_principal_row(row: &switchy_database::Row) -> PrincipalRow {
    let id: String = row.to_value("id").unwrap_or_default();

    let role_raw: String = row.to_value("role").unwrap_or_default();
    let role = role_raw.parse::<Role>().unwrap_or_else(|_| {
        log::warn!("Principal {id}: unknown role {role_raw:?}, normalizing to community");
        Role::default()
    });

    let prefs_raw: String = row.to_value("prefs").unwrap_or_default();
    let mut prefs: ResourcePrefs = serde_json::from_str(&prefs_raw).unwrap_or_else(|e| {
        log::warn!("Principal {id}: malformed prefs JSON ({e}), normalizing to defaults");
        ResourcePrefs::default()
    });
    // The indexed column is authoritative for the role.
    prefs.role = role;

    PrincipalRow {
        name: row.to_value("name").unwrap_or_default(),
        email: row.to_value("email").unwrap_or_default(),
        phone: row.to_value("phone").unwrap_or(None),
        prefs,
        created_at: row.to_value("created_at").unwrap_or_default(),
        id,
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Inserts a new session row.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert_session(db: &dyn Database, session: &SessionRow) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO sessions (secret, principal_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        &[
            DatabaseValue::String(session.secret.clone()),
            DatabaseValue::String(session.principal_id.clone()),
            DatabaseValue::String(session.created_at.clone()),
            DatabaseValue::String(session.expires_at.clone()),
        ],
    )
    .await?;

    Ok(())
}

/// Fetches a session by its token.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_session(db: &dyn Database, secret: &str) -> Result<Option<SessionRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT * FROM sessions WHERE secret = ?1",
            &[DatabaseValue::String(secret.to_string())],
        )
        .await?;

    Ok(rows.first().map(|row| SessionRow {
        secret: row.to_value("secret").unwrap_or_default(),
        principal_id: row.to_value("principal_id").unwrap_or_default(),
        created_at: row.to_value("created_at").unwrap_or_default(),
        expires_at: row.to_value("expires_at").unwrap_or_default(),
    }))
}

/// Deletes a session by its token. Returns `false` if no such session
/// existed.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn delete_session(db: &dyn Database, secret: &str) -> Result<bool, DbError> {
    let deleted = db
        .exec_raw_params(
            "DELETE FROM sessions WHERE secret = ?1",
            &[DatabaseValue::String(secret.to_string())],
        )
        .await?;

    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_map_incident_models::Urgency;

    fn incident(id: &str, status: IncidentStatus) -> IncidentRow {
        let now = crate::now_rfc3339();
        IncidentRow {
            id: id.to_string(),
            category: IncidentCategory::Fire,
            kind: "Wildfire".to_string(),
            description: Some("Smoke on the ridge".to_string()),
            urgency: Urgency::High,
            lat: 5.6,
            lng: -0.2,
            status,
            user_id: "reporter-1".to_string(),
            media_ids: Vec::new(),
            assigned_resources: Vec::new(),
            notes: String::new(),
            version: 1,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn incident_round_trips_unaltered() {
        let db = crate::open_in_memory().await.unwrap();
        let row = incident("inc-1", IncidentStatus::Pending);
        insert_incident(db.as_ref(), &row).await.unwrap();

        let fetched = get_incident(db.as_ref(), "inc-1").await.unwrap().unwrap();
        assert_eq!(fetched, row);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_category() {
        let db = crate::open_in_memory().await.unwrap();
        insert_incident(db.as_ref(), &incident("a", IncidentStatus::Pending))
            .await
            .unwrap();
        let mut other = incident("b", IncidentStatus::Reviewed);
        other.category = IncidentCategory::Water;
        other.kind = "Flood".to_string();
        insert_incident(db.as_ref(), &other).await.unwrap();

        let filter = IncidentFilter {
            status: Some(IncidentStatus::Pending),
            limit: 100,
            ..IncidentFilter::default()
        };
        let pending = list_incidents(db.as_ref(), &filter).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a");

        let filter = IncidentFilter {
            category: Some(IncidentCategory::Water),
            limit: 100,
            ..IncidentFilter::default()
        };
        let water = list_incidents(db.as_ref(), &filter).await.unwrap();
        assert_eq!(water.len(), 1);
        assert_eq!(water[0].id, "b");
    }

    #[tokio::test]
    async fn review_cas_only_fires_once() {
        let db = crate::open_in_memory().await.unwrap();
        insert_incident(db.as_ref(), &incident("inc-1", IncidentStatus::Pending))
            .await
            .unwrap();

        let resources = vec!["vol-1".to_string(), "ngo-1".to_string()];
        assert!(
            mark_incident_reviewed(db.as_ref(), "inc-1", &resources)
                .await
                .unwrap()
        );
        // Second admin loses the race.
        assert!(
            !mark_incident_reviewed(db.as_ref(), "inc-1", &resources)
                .await
                .unwrap()
        );

        let row = get_incident(db.as_ref(), "inc-1").await.unwrap().unwrap();
        assert_eq!(row.status, IncidentStatus::Reviewed);
        assert_eq!(row.assigned_resources, resources);
        assert_eq!(row.version, 2);
    }

    #[tokio::test]
    async fn resolve_requires_reviewed() {
        let db = crate::open_in_memory().await.unwrap();
        insert_incident(db.as_ref(), &incident("inc-1", IncidentStatus::Pending))
            .await
            .unwrap();

        assert!(!mark_incident_resolved(db.as_ref(), "inc-1").await.unwrap());
        mark_incident_reviewed(db.as_ref(), "inc-1", &["vol-1".to_string()])
            .await
            .unwrap();
        assert!(mark_incident_resolved(db.as_ref(), "inc-1").await.unwrap());
        // Resolved is terminal.
        assert!(!mark_incident_resolved(db.as_ref(), "inc-1").await.unwrap());
    }

    #[tokio::test]
    async fn legacy_rows_normalize_leniently() {
        let db = crate::open_in_memory().await.unwrap();
        // A document written by an earlier prototype: unknown category and
        // status, NULL notes.
        db.exec_raw(
            "INSERT INTO incidents (
                id, category, kind, description, urgency, lat, lng,
                status, user_id, media_ids, assigned_resources, notes,
                version, created_at, updated_at
            ) VALUES (
                'legacy', 'meteor', 'Other', NULL, 'urgent', 1.0, 2.0,
                'triaged', 'u1', '[]', '[]', NULL, 1, '2024-01-01', '2024-01-01'
            )",
        )
        .await
        .unwrap();

        let row = get_incident(db.as_ref(), "legacy").await.unwrap().unwrap();
        assert_eq!(row.category, IncidentCategory::Other);
        assert_eq!(row.urgency, Urgency::Medium);
        assert_eq!(row.status, IncidentStatus::Pending);
        assert_eq!(row.notes, "");
    }

    #[tokio::test]
    async fn assignment_lifecycle_cas() {
        let db = crate::open_in_memory().await.unwrap();
        insert_incident(db.as_ref(), &incident("inc-1", IncidentStatus::Pending))
            .await
            .unwrap();
        let principal = PrincipalRow {
            id: "vol-1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            prefs: ResourcePrefs {
                role: Role::Volunteer,
                ..ResourcePrefs::default()
            },
            created_at: crate::now_rfc3339(),
        };
        insert_principal(db.as_ref(), &principal, "hash", "salt")
            .await
            .unwrap();

        let assignment = AssignmentRow {
            id: "asg-1".to_string(),
            incident_id: "inc-1".to_string(),
            resource_id: "vol-1".to_string(),
            resource_type: ResourceType::Volunteer,
            assigned_at: crate::now_rfc3339(),
            accepted_at: None,
            completed_at: None,
            status: AssignmentStatus::Pending,
            notes: None,
        };
        insert_assignment(db.as_ref(), &assignment).await.unwrap();

        // Complete before accept is rejected.
        assert!(!complete_assignment(db.as_ref(), "asg-1").await.unwrap());

        assert!(respond_to_assignment(db.as_ref(), "asg-1", true).await.unwrap());
        // Can't respond twice.
        assert!(!respond_to_assignment(db.as_ref(), "asg-1", false).await.unwrap());

        assert!(complete_assignment(db.as_ref(), "asg-1").await.unwrap());

        let row = get_assignment(db.as_ref(), "asg-1").await.unwrap().unwrap();
        assert_eq!(row.status, AssignmentStatus::Completed);
        assert!(row.accepted_at.is_some());
        assert!(row.completed_at.is_some());
    }

    #[tokio::test]
    async fn resource_listing_filters() {
        let db = crate::open_in_memory().await.unwrap();
        for (id, role, available, skills) in [
            ("vol-1", Role::Volunteer, true, vec!["first aid"]),
            ("vol-2", Role::Volunteer, false, vec!["logistics"]),
            ("ngo-1", Role::Ngo, true, vec!["logistics", "shelter"]),
            ("com-1", Role::Community, true, vec![]),
        ] {
            let principal = PrincipalRow {
                id: id.to_string(),
                name: id.to_string(),
                email: format!("{id}@example.com"),
                phone: None,
                prefs: ResourcePrefs {
                    role,
                    availability: available,
                    skills: skills.into_iter().map(String::from).collect(),
                    ..ResourcePrefs::default()
                },
                created_at: crate::now_rfc3339(),
            };
            insert_principal(db.as_ref(), &principal, "hash", "salt")
                .await
                .unwrap();
        }

        let all = list_resources(
            db.as_ref(),
            &ResourceFilter {
                limit: 100,
                ..ResourceFilter::default()
            },
        )
        .await
        .unwrap();
        // Community principals are not resources.
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|p| p.id != "com-1"));

        let available = list_resources(
            db.as_ref(),
            &ResourceFilter {
                available: Some(true),
                limit: 100,
                ..ResourceFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(available.len(), 2);

        let logistics = list_resources(
            db.as_ref(),
            &ResourceFilter {
                skills: vec!["Logistics".to_string()],
                limit: 100,
                ..ResourceFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(logistics.len(), 2);
    }

    #[tokio::test]
    async fn resource_listing_limit_applies_after_filters() {
        let db = crate::open_in_memory().await.unwrap();
        // Several non-matching rows ahead of the single match, so a
        // limit applied before filtering would come back empty.
        for (id, available) in [
            ("vol-1", false),
            ("vol-2", false),
            ("vol-3", false),
            ("vol-4", true),
        ] {
            let principal = PrincipalRow {
                id: id.to_string(),
                name: id.to_string(),
                email: format!("{id}@example.com"),
                phone: None,
                prefs: ResourcePrefs {
                    role: Role::Volunteer,
                    availability: available,
                    ..ResourcePrefs::default()
                },
                created_at: crate::now_rfc3339(),
            };
            insert_principal(db.as_ref(), &principal, "hash", "salt")
                .await
                .unwrap();
        }

        let matches = list_resources(
            db.as_ref(),
            &ResourceFilter {
                available: Some(true),
                limit: 1,
                ..ResourceFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "vol-4");

        let capped = list_resources(
            db.as_ref(),
            &ResourceFilter {
                available: Some(false),
                limit: 2,
                ..ResourceFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn session_round_trip_and_delete() {
        let db = crate::open_in_memory().await.unwrap();
        let principal = PrincipalRow {
            id: "p1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            prefs: ResourcePrefs::default(),
            created_at: crate::now_rfc3339(),
        };
        insert_principal(db.as_ref(), &principal, "hash", "salt")
            .await
            .unwrap();

        let session = SessionRow {
            secret: "tok-1".to_string(),
            principal_id: "p1".to_string(),
            created_at: crate::now_rfc3339(),
            expires_at: crate::now_rfc3339(),
        };
        insert_session(db.as_ref(), &session).await.unwrap();

        assert_eq!(
            get_session(db.as_ref(), "tok-1").await.unwrap().unwrap(),
            session
        );
        assert!(delete_session(db.as_ref(), "tok-1").await.unwrap());
        assert!(!delete_session(db.as_ref(), "tok-1").await.unwrap());
        assert!(get_session(db.as_ref(), "tok-1").await.unwrap().is_none());
    }
}
