#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! API request and response types for the relief map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract.

use relief_map_database_models::{AssignmentRow, IncidentRow, PrefsPatch, PrincipalRow};
use relief_map_incident_models::{
    AssignmentStatus, IncidentCategory, IncidentStatus, ResourceType, Role, Urgency,
};
use relief_map_intake::FieldIssue;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// An incident as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncident {
    /// Unique incident ID.
    pub id: String,
    /// Top-level incident category.
    pub category: IncidentCategory,
    /// Specific incident kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short description.
    pub description: Option<String>,
    /// Urgency level.
    pub urgency: Urgency,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// Reporting principal's ID.
    pub user_id: String,
    /// Uploaded media file IDs, in submission order.
    pub media_ids: Vec<String>,
    /// Principal IDs assigned by an admin.
    pub assigned_resources: Vec<String>,
    /// Free-text notes.
    pub notes: String,
    /// Update counter, bumped on every write.
    pub version: i64,
    /// When the incident was created (ISO 8601).
    pub created_at: String,
    /// When the incident was last updated (ISO 8601).
    pub updated_at: String,
}

impl From<IncidentRow> for ApiIncident {
    fn from(row: IncidentRow) -> Self {
        Self {
            id: row.id,
            category: row.category,
            kind: row.kind,
            description: row.description,
            urgency: row.urgency,
            lat: row.lat,
            lng: row.lng,
            status: row.status,
            user_id: row.user_id,
            media_ids: row.media_ids,
            assigned_resources: row.assigned_resources,
            notes: row.notes,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Query parameters for the incidents list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentListParams {
    /// Filter by lifecycle status.
    pub status: Option<IncidentStatus>,
    /// Filter by category.
    pub category: Option<IncidentCategory>,
    /// Filter by reporting principal.
    pub user_id: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

/// Generic error envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable error message.
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Validation error envelope with field-scoped issues.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiValidationError {
    /// Summary message.
    pub error: String,
    /// Every field that failed validation.
    pub issues: Vec<FieldIssue>,
}

/// Request body for signup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Requested role; defaults to `community`.
    #[serde(default)]
    pub role: Role,
}

/// Request body for login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// An authenticated principal as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPrincipal {
    /// Unique principal ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Principal role.
    pub role: Role,
    /// Canonical dashboard path for the role.
    pub dashboard: &'static str,
    /// When the principal was created (ISO 8601).
    pub created_at: String,
}

impl From<PrincipalRow> for ApiPrincipal {
    fn from(row: PrincipalRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            role: row.prefs.role,
            dashboard: row.prefs.role.dashboard_path(),
            created_at: row.created_at,
        }
    }
}

/// Request body for assigning resources to an incident.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// Target incident.
    pub incident_id: String,
    /// Resource principals to assign.
    pub resource_ids: Vec<String>,
}

/// Response from the assign endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    /// Whether the assignment succeeded.
    pub success: bool,
    /// The created assignments.
    pub assignments: Vec<ApiAssignment>,
}

/// An assignment as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAssignment {
    /// Unique assignment ID.
    pub id: String,
    /// The assigned incident.
    pub incident_id: String,
    /// The assigned principal.
    pub resource_id: String,
    /// The resource's type at assignment time.
    pub resource_type: ResourceType,
    /// When the assignment was created (ISO 8601).
    pub assigned_at: String,
    /// When the resource accepted, if it has.
    pub accepted_at: Option<String>,
    /// When the work was completed, if it has been.
    pub completed_at: Option<String>,
    /// Lifecycle status.
    pub status: AssignmentStatus,
    /// Optional admin notes.
    pub notes: Option<String>,
}

impl From<AssignmentRow> for ApiAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            id: row.id,
            incident_id: row.incident_id,
            resource_id: row.resource_id,
            resource_type: row.resource_type,
            assigned_at: row.assigned_at,
            accepted_at: row.accepted_at,
            completed_at: row.completed_at,
            status: row.status,
            notes: row.notes,
        }
    }
}

/// Query parameters for the resources list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQueryParams {
    /// Restrict to a single resource type.
    #[serde(rename = "type")]
    pub resource_type: Option<ResourceType>,
    /// Filter by availability flag.
    pub available: Option<bool>,
    /// Comma-separated list of required skills.
    pub skills: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

/// Request body for updating a resource profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUpdateRequest {
    /// New display name.
    pub name: Option<String>,
    /// New phone number.
    pub phone: Option<String>,
    /// Preference fields to patch.
    #[serde(flatten)]
    pub prefs: PrefsPatch,
}

/// A resource principal as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    /// Unique principal ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Resource type derived from the role.
    #[serde(rename = "type")]
    pub resource_type: Option<ResourceType>,
    /// Whether the resource is currently available.
    pub availability: bool,
    /// Self-reported skills.
    pub skills: Vec<String>,
    /// Free-form location description.
    pub location: Option<String>,
    /// Organization name for NGO/government principals.
    pub organization: Option<String>,
    /// Lifetime count of incidents assigned.
    pub assigned_incidents: i64,
    /// Lifetime count of incidents resolved.
    pub resolved_incidents: i64,
    /// Average rating, 0-5.
    pub rating: f64,
}

impl From<PrincipalRow> for ApiResource {
    fn from(row: PrincipalRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            resource_type: row.prefs.role.resource_type(),
            availability: row.prefs.availability,
            skills: row.prefs.skills,
            location: row.prefs.location,
            organization: row.prefs.organization,
            assigned_incidents: row.prefs.assigned_incidents,
            resolved_incidents: row.prefs.resolved_incidents,
            rating: row.prefs.rating,
        }
    }
}

/// A resource principal with its assignment history.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceDetail {
    /// The resource profile.
    #[serde(flatten)]
    pub resource: ApiResource,
    /// All assignments for this resource, newest first.
    pub assignments: Vec<ApiAssignment>,
}

/// Aggregate statistics over the resource pool.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceStats {
    /// Total number of resource principals.
    pub total: u64,
    /// Breakdown by resource type.
    pub by_type: Vec<ResourceTypeCount>,
    /// Number of currently available resources.
    pub available: u64,
    /// Mean rating across all resources.
    pub average_rating: f64,
    /// Resources with the most resolved incidents, best first.
    pub top_performers: Vec<TopPerformer>,
    /// Skill frequency across the pool, most common first.
    pub skills: Vec<SkillCount>,
}

/// Count of resources for a single type.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeCount {
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Number of resources.
    pub count: u64,
}

/// A top-performing resource entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    /// Unique principal ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resource type derived from the role.
    #[serde(rename = "type")]
    pub resource_type: Option<ResourceType>,
    /// Lifetime count of incidents resolved.
    pub resolved_incidents: i64,
    /// Average rating, 0-5.
    pub rating: f64,
}

/// Count of resources reporting a single skill.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCount {
    /// Skill name.
    pub skill: String,
    /// Number of resources reporting it.
    pub count: u64,
}

/// Action a resource can take on one of its assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentAction {
    /// Accept the pending assignment.
    Accept,
    /// Decline the pending assignment.
    Decline,
    /// Mark the accepted assignment's work as finished.
    Complete,
}

/// Request body for acting on an assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentActionRequest {
    /// The action to take.
    pub action: AssignmentAction,
}

/// Generic success envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSuccess {
    /// Always `true`.
    pub success: bool,
}

impl Default for ApiSuccess {
    fn default() -> Self {
        Self { success: true }
    }
}

#[cfg(test)]
mod tests {
    use relief_map_database_models::ResourcePrefs;

    use super::*;

    fn principal(role: Role) -> PrincipalRow {
        PrincipalRow {
            id: "p-1".to_string(),
            name: "Jordan".to_string(),
            email: "jordan@example.com".to_string(),
            phone: None,
            prefs: ResourcePrefs {
                role,
                skills: vec!["rescue".to_string()],
                ..ResourcePrefs::default()
            },
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn incident_kind_serializes_as_type() {
        let api = ApiIncident {
            id: "i-1".to_string(),
            category: IncidentCategory::Fire,
            kind: "Wildfire".to_string(),
            description: None,
            urgency: Urgency::High,
            lat: 34.0,
            lng: -118.0,
            status: IncidentStatus::Pending,
            user_id: "p-1".to_string(),
            media_ids: vec![],
            assigned_resources: vec![],
            notes: String::new(),
            version: 1,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["type"], "Wildfire");
        assert_eq!(json["category"], "fire");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn principal_response_carries_dashboard() {
        let api = ApiPrincipal::from(principal(Role::Volunteer));
        assert_eq!(api.role, Role::Volunteer);
        assert_eq!(api.dashboard, "/volunteer/dashboard");
    }

    #[test]
    fn resource_response_flattens_prefs() {
        let api = ApiResource::from(principal(Role::Ngo));
        assert_eq!(api.resource_type, Some(ResourceType::Ngo));
        assert!(api.availability);
        assert_eq!(api.skills, vec!["rescue".to_string()]);
    }

    #[test]
    fn signup_role_defaults_to_community() {
        let req: SignupRequest = serde_json::from_str(
            r#"{"name":"A","email":"a@example.com","password":"secret1"}"#,
        )
        .unwrap();
        assert_eq!(req.role, Role::Community);
    }

    #[test]
    fn resource_update_flattens_prefs_patch() {
        let req: ResourceUpdateRequest = serde_json::from_str(
            r#"{"name":"B","availability":false,"skills":["medical"]}"#,
        )
        .unwrap();
        assert_eq!(req.name.as_deref(), Some("B"));
        assert_eq!(req.prefs.availability, Some(false));
        assert_eq!(req.prefs.skills, Some(vec!["medical".to_string()]));
    }

    #[test]
    fn assignment_action_parses_lowercase() {
        let req: AssignmentActionRequest =
            serde_json::from_str(r#"{"action":"decline"}"#).unwrap();
        assert_eq!(req.action, AssignmentAction::Decline);
    }
}
