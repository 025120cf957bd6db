#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Resource assignment policy and incident lifecycle transitions.
//!
//! Admins pick resources for a pending incident here. The incident's
//! `pending -> reviewed` transition is a compare-and-set, so two admins
//! assigning the same incident concurrently produce one winner and one
//! conflict instead of a lost update. Resource eligibility (the principal
//! exists and carries a resource role) is checked server-side before
//! anything is written.

use relief_map_database::{DbError, queries};
use relief_map_database_models::AssignmentRow;
use relief_map_incident_models::{AssignmentStatus, IncidentStatus, ResourceType};
use switchy_database::Database;

/// Errors from assignment policy operations.
#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The resource list was empty.
    #[error("At least one resource must be selected")]
    EmptyResourceList,

    /// The incident does not exist.
    #[error("Incident not found: {id}")]
    IncidentNotFound {
        /// The missing incident id.
        id: String,
    },

    /// A selected principal does not exist.
    #[error("Resource not found: {id}")]
    ResourceNotFound {
        /// The missing principal id.
        id: String,
    },

    /// A selected principal exists but is not a resource role.
    #[error("Principal {id} has role {role}, which cannot be assigned")]
    NotAResource {
        /// The ineligible principal id.
        id: String,
        /// Its actual role.
        role: String,
    },

    /// The incident was not in the status the transition requires.
    #[error("Incident {id} is {status}, expected {expected}")]
    IncidentConflict {
        /// The incident id.
        id: String,
        /// Status observed at transition time.
        status: IncidentStatus,
        /// Status the transition requires.
        expected: IncidentStatus,
    },

    /// The assignment does not exist.
    #[error("Assignment not found: {id}")]
    AssignmentNotFound {
        /// The missing assignment id.
        id: String,
    },

    /// The assignment was not in the status the transition requires.
    #[error("Assignment {id} is {status}, cannot {action}")]
    AssignmentConflict {
        /// The assignment id.
        id: String,
        /// Status observed at transition time.
        status: AssignmentStatus,
        /// The attempted action.
        action: &'static str,
    },
}

/// Assigns the given resources to a pending incident.
///
/// Validates that the incident exists and every resource id names an
/// existing principal with a resource role, then claims the incident via
/// the `pending -> reviewed` compare-and-set before writing assignment
/// records. Claiming first means a losing admin writes nothing.
///
/// Returns the created assignment rows, in the submitted resource order.
///
/// # Errors
///
/// Returns [`AssignError`] when validation fails, the incident is no
/// longer `pending`, or a database operation fails.
pub async fn assign_resources(
    db: &dyn Database,
    incident_id: &str,
    resource_ids: &[String],
) -> Result<Vec<AssignmentRow>, AssignError> {
    if resource_ids.is_empty() {
        return Err(AssignError::EmptyResourceList);
    }

    let Some(incident) = queries::get_incident(db, incident_id).await? else {
        return Err(AssignError::IncidentNotFound {
            id: incident_id.to_string(),
        });
    };

    // Resolve every resource before touching anything, so an invalid
    // selection rejects the whole request.
    let mut resource_types: Vec<ResourceType> = Vec::with_capacity(resource_ids.len());
    for resource_id in resource_ids {
        let Some(principal) = queries::get_principal(db, resource_id).await? else {
            return Err(AssignError::ResourceNotFound {
                id: resource_id.clone(),
            });
        };
        let Some(resource_type) = principal.prefs.role.resource_type() else {
            return Err(AssignError::NotAResource {
                id: resource_id.clone(),
                role: principal.prefs.role.to_string(),
            });
        };
        resource_types.push(resource_type);
    }

    if !queries::mark_incident_reviewed(db, incident_id, resource_ids).await? {
        // Re-read for an accurate status in the error; the incident may
        // have been reviewed or resolved since the fetch above.
        let status = queries::get_incident(db, incident_id)
            .await?
            .map_or(incident.status, |i| i.status);
        return Err(AssignError::IncidentConflict {
            id: incident_id.to_string(),
            status,
            expected: IncidentStatus::Pending,
        });
    }

    let mut assignments = Vec::with_capacity(resource_ids.len());
    for (resource_id, resource_type) in resource_ids.iter().zip(resource_types) {
        let assignment = AssignmentRow {
            id: uuid::Uuid::new_v4().to_string(),
            incident_id: incident_id.to_string(),
            resource_id: resource_id.clone(),
            resource_type,
            assigned_at: relief_map_database::now_rfc3339(),
            accepted_at: None,
            completed_at: None,
            status: AssignmentStatus::Pending,
            notes: None,
        };
        queries::insert_assignment(db, &assignment).await?;
        bump_assigned_counter(db, resource_id).await?;
        assignments.push(assignment);
    }

    log::info!(
        "Assigned {} resource(s) to incident {incident_id}",
        assignments.len()
    );

    // TODO: notify assigned resources once a delivery channel exists.

    Ok(assignments)
}

/// Marks a reviewed incident as resolved (explicit admin action).
///
/// # Errors
///
/// Returns [`AssignError::IncidentConflict`] when the incident is not in
/// `reviewed`, [`AssignError::IncidentNotFound`] for unknown ids, or a
/// database error.
pub async fn resolve_incident(db: &dyn Database, incident_id: &str) -> Result<(), AssignError> {
    if queries::mark_incident_resolved(db, incident_id).await? {
        log::info!("Incident {incident_id} resolved");
        return Ok(());
    }

    let Some(incident) = queries::get_incident(db, incident_id).await? else {
        return Err(AssignError::IncidentNotFound {
            id: incident_id.to_string(),
        });
    };
    Err(AssignError::IncidentConflict {
        id: incident_id.to_string(),
        status: incident.status,
        expected: IncidentStatus::Reviewed,
    })
}

/// Records a resource's response to a pending assignment.
///
/// Accepting stamps `accepted_at`; declining is terminal.
///
/// # Errors
///
/// Returns [`AssignError::AssignmentConflict`] when the assignment is not
/// `pending`, [`AssignError::AssignmentNotFound`] for unknown ids, or a
/// database error.
pub async fn respond_to_assignment(
    db: &dyn Database,
    assignment_id: &str,
    accept: bool,
) -> Result<AssignmentRow, AssignError> {
    if !queries::respond_to_assignment(db, assignment_id, accept).await? {
        return Err(assignment_conflict(db, assignment_id, "respond").await?);
    }

    fetch_assignment(db, assignment_id).await
}

/// Marks an accepted assignment as completed, stamping `completed_at` and
/// crediting the resource's resolved-incident counter.
///
/// # Errors
///
/// Returns [`AssignError::AssignmentConflict`] when the assignment is not
/// `accepted`, [`AssignError::AssignmentNotFound`] for unknown ids, or a
/// database error.
pub async fn complete_assignment(
    db: &dyn Database,
    assignment_id: &str,
) -> Result<AssignmentRow, AssignError> {
    if !queries::complete_assignment(db, assignment_id).await? {
        return Err(assignment_conflict(db, assignment_id, "complete").await?);
    }

    let assignment = fetch_assignment(db, assignment_id).await?;
    bump_resolved_counter(db, &assignment.resource_id).await?;
    Ok(assignment)
}

async fn fetch_assignment(
    db: &dyn Database,
    assignment_id: &str,
) -> Result<AssignmentRow, AssignError> {
    queries::get_assignment(db, assignment_id)
        .await?
        .ok_or_else(|| AssignError::AssignmentNotFound {
            id: assignment_id.to_string(),
        })
}

/// Builds the conflict error for a failed assignment CAS, distinguishing
/// "not found" from "wrong status".
async fn assignment_conflict(
    db: &dyn Database,
    assignment_id: &str,
    action: &'static str,
) -> Result<AssignError, AssignError> {
    let Some(assignment) = queries::get_assignment(db, assignment_id).await? else {
        return Ok(AssignError::AssignmentNotFound {
            id: assignment_id.to_string(),
        });
    };
    Ok(AssignError::AssignmentConflict {
        id: assignment_id.to_string(),
        status: assignment.status,
        action,
    })
}

async fn bump_assigned_counter(db: &dyn Database, resource_id: &str) -> Result<(), DbError> {
    if let Some(principal) = queries::get_principal(db, resource_id).await? {
        let mut prefs = principal.prefs;
        prefs.assigned_incidents += 1;
        queries::update_principal_prefs(db, resource_id, &prefs).await?;
    }
    Ok(())
}

async fn bump_resolved_counter(db: &dyn Database, resource_id: &str) -> Result<(), DbError> {
    if let Some(principal) = queries::get_principal(db, resource_id).await? {
        let mut prefs = principal.prefs;
        prefs.resolved_incidents += 1;
        queries::update_principal_prefs(db, resource_id, &prefs).await?;
    }
    Ok(())
}
