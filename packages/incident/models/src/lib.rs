#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident taxonomy, role, and lifecycle status definitions.
//!
//! This crate defines the canonical incident category taxonomy used across
//! the entire relief-map system, along with the principal roles and the
//! incident/assignment lifecycle state machines. Every boundary (intake,
//! guard, assignment) validates raw input into these closed types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Top-level incident categories.
///
/// Each category constrains the set of specific incident kinds accepted at
/// intake; see [`IncidentCategory::allowed_kinds`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum IncidentCategory {
    /// Water-related disasters (floods, tsunamis, storm surges)
    Water,
    /// Fires (wildfires, building fires, electrical fires)
    Fire,
    /// Geological events (earthquakes, landslides, eruptions)
    Geological,
    /// Biological hazards (outbreaks, food poisoning, pandemics)
    Biological,
    /// Criminal incidents requiring coordinated response
    Crime,
    /// Man-made accidents (traffic, building collapse, explosions)
    ManMade,
    /// Industrial accidents (factory, chemical, gas)
    Industrial,
    /// Incidents not fitting any other category
    Other,
}

impl IncidentCategory {
    /// Returns the fixed set of incident kinds accepted for this category.
    ///
    /// The `Other` category accepts only the literal kind `"other"`
    /// (matched case-insensitively at intake).
    #[must_use]
    pub const fn allowed_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Water => &["Flood", "Tsunami", "Storm Surge"],
            Self::Fire => &["Wildfire", "Building Fire", "Electrical Fire"],
            Self::Geological => &["Earthquake", "Landslide", "Volcanic Eruption"],
            Self::Biological => &["Disease Outbreak", "Food Poisoning", "Pandemic"],
            Self::Crime => &["Theft", "Assault", "Kidnapping"],
            Self::ManMade => &["Traffic Accident", "Building Collapse", "Explosion"],
            Self::Industrial => &["Factory Accident", "Chemical Spill", "Gas Leak"],
            Self::Other => &["Other"],
        }
    }

    /// Returns whether `kind` is a valid incident kind for this category.
    ///
    /// Non-`Other` categories match exactly against the fixed kind table.
    /// `Other` matches the literal `"other"` case-insensitively.
    #[must_use]
    pub fn accepts_kind(self, kind: &str) -> bool {
        if self == Self::Other {
            return kind.eq_ignore_ascii_case("other");
        }
        self.allowed_kinds().contains(&kind)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Water,
            Self::Fire,
            Self::Geological,
            Self::Biological,
            Self::Crime,
            Self::ManMade,
            Self::Industrial,
            Self::Other,
        ]
    }
}

/// Urgency level of a reported incident.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Urgency {
    /// Non-time-critical report
    Low,
    /// Response needed within hours
    Medium,
    /// Immediate response needed
    High,
}

/// Lifecycle status of an incident.
///
/// Transitions: `Pending -> Reviewed` when resources are assigned,
/// `Reviewed -> Resolved` by explicit admin action. `Resolved` is terminal
/// and nothing transitions backwards or automatically.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IncidentStatus {
    /// Submitted, awaiting triage
    Pending,
    /// Resources assigned by an admin
    Reviewed,
    /// Closed out; terminal
    Resolved,
}

impl IncidentStatus {
    /// Returns whether this status may transition to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Reviewed) | (Self::Reviewed, Self::Resolved)
        )
    }
}

/// Role of an authenticated principal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Community member reporting incidents
    Community,
    /// Individual volunteer responder
    Volunteer,
    /// Non-governmental organization
    Ngo,
    /// Government agency
    Gov,
    /// Platform administrator
    Admin,
}

impl Role {
    /// Returns the route prefix this role is allowed to browse.
    #[must_use]
    pub const fn route_prefix(self) -> &'static str {
        match self {
            Self::Community => "/user",
            Self::Volunteer => "/volunteer",
            Self::Ngo => "/ngo",
            Self::Gov => "/gov",
            Self::Admin => "/admin",
        }
    }

    /// Returns the canonical dashboard path for this role.
    #[must_use]
    pub const fn dashboard_path(self) -> &'static str {
        match self {
            Self::Community => "/user/dashboard",
            Self::Volunteer => "/volunteer/dashboard",
            Self::Ngo => "/ngo/dashboard",
            Self::Gov => "/gov/dashboard",
            Self::Admin => "/admin/dashboard",
        }
    }

    /// Returns the resource type for this role, or `None` if the role is
    /// not eligible for incident assignment.
    #[must_use]
    pub const fn resource_type(self) -> Option<ResourceType> {
        match self {
            Self::Volunteer => Some(ResourceType::Volunteer),
            Self::Ngo => Some(ResourceType::Ngo),
            Self::Gov => Some(ResourceType::Gov),
            Self::Community | Self::Admin => None,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Community,
            Self::Volunteer,
            Self::Ngo,
            Self::Gov,
            Self::Admin,
        ]
    }
}

impl Default for Role {
    /// Unknown or missing roles default to `Community`.
    fn default() -> Self {
        Self::Community
    }
}

/// Subset of roles eligible for incident assignment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceType {
    /// Individual volunteer responder
    Volunteer,
    /// Non-governmental organization
    Ngo,
    /// Government agency
    Gov,
}

impl ResourceType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Volunteer, Self::Ngo, Self::Gov]
    }
}

/// Lifecycle status of an assignment.
///
/// Transitions: `Pending -> Accepted | Declined` by the assigned resource,
/// `Accepted -> Completed` when the work is done. `Declined` and
/// `Completed` are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssignmentStatus {
    /// Offered to the resource, awaiting response
    Pending,
    /// Accepted by the resource
    Accepted,
    /// Declined by the resource; terminal
    Declined,
    /// Work finished; terminal
    Completed,
}

impl AssignmentStatus {
    /// Returns whether this status may transition to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted | Self::Declined)
                | (Self::Accepted, Self::Completed)
        )
    }
}
