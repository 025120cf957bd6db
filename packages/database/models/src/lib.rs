#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as stored in and retrieved
//! from the `SQLite` database. They are distinct from the API response
//! types in `relief_map_server_models` so the API contract can evolve
//! independently of the storage layout.
//!
//! Timestamps are stored as RFC 3339 strings throughout.

use relief_map_incident_models::{
    AssignmentStatus, IncidentCategory, IncidentStatus, ResourceType, Role, Urgency,
};
use serde::{Deserialize, Serialize};

/// An incident row as stored in the `incidents` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRow {
    /// Server-assigned UUID.
    pub id: String,
    /// Top-level incident category.
    pub category: IncidentCategory,
    /// Specific incident kind within the category.
    pub kind: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Urgency level.
    pub urgency: Urgency,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// Reporting principal's id.
    pub user_id: String,
    /// Uploaded media file ids, in submission order.
    pub media_ids: Vec<String>,
    /// Principal ids assigned by an admin (empty until reviewed).
    pub assigned_resources: Vec<String>,
    /// Free-text notes, never NULL (normalized to `""`).
    pub notes: String,
    /// Update counter, bumped on every write.
    pub version: i64,
    /// When the incident was created (RFC 3339).
    pub created_at: String,
    /// When the incident was last updated (RFC 3339).
    pub updated_at: String,
}

/// Filters for listing incidents.
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    /// Filter by lifecycle status.
    pub status: Option<IncidentStatus>,
    /// Filter by category.
    pub category: Option<IncidentCategory>,
    /// Filter by reporting principal.
    pub user_id: Option<String>,
    /// Maximum number of results.
    pub limit: u32,
    /// Number of results to skip.
    pub offset: u32,
}

/// An assignment row as stored in the `assignments` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    /// Server-assigned UUID.
    pub id: String,
    /// The assigned incident.
    pub incident_id: String,
    /// The assigned principal.
    pub resource_id: String,
    /// The resource's type at assignment time.
    pub resource_type: ResourceType,
    /// When the assignment was created (RFC 3339).
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

/// Typed preference bag for a principal.
///
/// Stored as a JSON column and validated into this closed shape at the
/// boundary; the role additionally lives in its own indexed column.
/// Unknown or missing fields fall back to the serde defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourcePrefs {
    /// Principal role; unknown/missing defaults to `community`.
    pub role: Role,
    /// Whether the resource is currently available for assignment.
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

impl Default for ResourcePrefs {
    fn default() -> Self {
        Self {
            role: Role::default(),
            availability: true,
            skills: Vec::new(),
            location: None,
            organization: None,
            assigned_incidents: 0,
            resolved_incidents: 0,
            rating: 0.0,
        }
    }
}

/// Highest allowed rating.
pub const MAX_RATING: f64 = 5.0;

/// Partial update of a preference bag; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefsPatch {
    /// New availability flag.
    pub availability: Option<bool>,
    /// Replacement skills list.
    pub skills: Option<Vec<String>>,
    /// New location.
    pub location: Option<String>,
    /// New organization name.
    pub organization: Option<String>,
    /// New rating, 0-5. Callers reject out-of-range values before merging.
    pub rating: Option<f64>,
}

impl PrefsPatch {
    /// Returns whether the patched rating, if any, lies within 0-5.
    /// `NaN` is out of range.
    #[must_use]
    pub fn rating_in_range(&self) -> bool {
        self.rating.is_none_or(|r| (0.0..=MAX_RATING).contains(&r))
    }
}

impl ResourcePrefs {
    /// Returns a new prefs bag with the patch applied on top of `self`.
    #[must_use]
    pub fn merged(&self, patch: &PrefsPatch) -> Self {
        Self {
            role: self.role,
            availability: patch.availability.unwrap_or(self.availability),
            skills: patch.skills.clone().unwrap_or_else(|| self.skills.clone()),
            location: patch.location.clone().or_else(|| self.location.clone()),
            organization: patch
                .organization
                .clone()
                .or_else(|| self.organization.clone()),
            assigned_incidents: self.assigned_incidents,
            resolved_incidents: self.resolved_incidents,
            rating: patch.rating.unwrap_or(self.rating),
        }
    }
}

/// A principal row as stored in the `principals` table, without
/// credential material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalRow {
    /// Server-assigned UUID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login email, unique.
    pub email: String,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Typed preference bag.
    pub prefs: ResourcePrefs,
    /// When the principal was created (RFC 3339).
    pub created_at: String,
}

/// A principal row together with its credential material, for login
/// verification only.
#[derive(Debug, Clone)]
pub struct PrincipalCredentials {
    /// The principal.
    pub principal: PrincipalRow,
    /// Hex-encoded salted password hash.
    pub password_hash: String,
    /// Per-principal salt.
    pub salt: String,
}

/// A session row as stored in the `sessions` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    /// Opaque session token.
    pub secret: String,
    /// Owning principal.
    pub principal_id: String,
    /// When the session was created (RFC 3339).
    pub created_at: String,
    /// When the session expires (RFC 3339).
    pub expires_at: String,
}

/// Filters for listing resource principals.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    /// Restrict to a single resource type; `None` means all resource types.
    pub resource_type: Option<ResourceType>,
    /// Filter by availability flag.
    pub available: Option<bool>,
    /// Require all of these skills (case-insensitive substring match).
    pub skills: Vec<String>,
    /// Maximum number of results.
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefs_default_is_available_community() {
        let prefs = ResourcePrefs::default();
        assert_eq!(prefs.role, Role::Community);
        assert!(prefs.availability);
        assert!(prefs.skills.is_empty());
        assert!((prefs.rating - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn prefs_deserialize_tolerates_missing_fields() {
        let prefs: ResourcePrefs = serde_json::from_str(r#"{"role":"volunteer"}"#).unwrap();
        assert_eq!(prefs.role, Role::Volunteer);
        assert!(prefs.availability);
    }

    #[test]
    fn prefs_merge_leaves_unpatched_fields() {
        let prefs = ResourcePrefs {
            role: Role::Ngo,
            skills: vec!["logistics".to_string()],
            rating: 4.5,
            ..ResourcePrefs::default()
        };
        let merged = prefs.merged(&PrefsPatch {
            availability: Some(false),
            ..PrefsPatch::default()
        });
        assert!(!merged.availability);
        assert_eq!(merged.role, Role::Ngo);
        assert_eq!(merged.skills, vec!["logistics".to_string()]);
        assert!((merged.rating - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn prefs_merge_never_changes_role_or_counters() {
        let prefs = ResourcePrefs {
            role: Role::Gov,
            assigned_incidents: 3,
            resolved_incidents: 2,
            ..ResourcePrefs::default()
        };
        let merged = prefs.merged(&PrefsPatch {
            rating: Some(5.0),
            ..PrefsPatch::default()
        });
        assert_eq!(merged.role, Role::Gov);
        assert_eq!(merged.assigned_incidents, 3);
        assert_eq!(merged.resolved_incidents, 2);
    }

    #[test]
    fn rating_range_check_rejects_out_of_bounds() {
        let patch = |rating| PrefsPatch {
            rating,
            ..PrefsPatch::default()
        };
        assert!(patch(None).rating_in_range());
        assert!(patch(Some(0.0)).rating_in_range());
        assert!(patch(Some(5.0)).rating_in_range());
        assert!(!patch(Some(5.1)).rating_in_range());
        assert!(!patch(Some(-3.0)).rating_in_range());
        assert!(!patch(Some(99.0)).rating_in_range());
        assert!(!patch(Some(f64::NAN)).rating_in_range());
    }
}
