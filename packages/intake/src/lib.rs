#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident intake validation and normalization.
//!
//! Takes the raw fields of a multipart incident submission and either
//! produces a fully normalized, persistable payload or a list of
//! field-scoped issues. Nothing is persisted until every field validates;
//! valid input passes through unaltered (no silent coercion on the write
//! path).

use relief_map_incident_models::{IncidentCategory, Urgency};
use serde::Serialize;

/// Maximum number of media attachments per submission.
pub const MAX_MEDIA_FILES: usize = 5;

/// Maximum size of a single media attachment, in bytes (10 MiB).
pub const MAX_MEDIA_BYTES: usize = 10 * 1024 * 1024;

/// Maximum length of the free-text notes field, in characters.
pub const MAX_NOTES_CHARS: usize = 500;

/// A single media attachment extracted from the multipart body.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// Original filename as submitted, if any.
    pub filename: Option<String>,
    /// MIME type as submitted, if any.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Raw incident submission fields, prior to validation.
///
/// All scalar fields arrive as strings from the multipart form; numeric
/// coercion happens during validation.
#[derive(Debug, Clone, Default)]
pub struct IncidentSubmission {
    /// Raw category string.
    pub category: Option<String>,
    /// Raw incident kind string.
    pub kind: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Raw urgency string.
    pub urgency: Option<String>,
    /// Raw latitude string.
    pub lat: Option<String>,
    /// Raw longitude string.
    pub lng: Option<String>,
    /// Free-text notes (max 500 chars).
    pub notes: Option<String>,
    /// Attached media files, in submission order.
    pub media: Vec<MediaUpload>,
}

/// A field-scoped validation issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIssue {
    /// The offending submission field.
    pub field: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl FieldIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A validated, normalized incident payload ready for persistence.
///
/// Server-assigned fields (`id`, `user_id`, `status`, `media_ids`) are added
/// by the caller after media upload; see the server's intake handler.
#[derive(Debug, Clone)]
pub struct ValidatedIncident {
    /// Validated category.
    pub category: IncidentCategory,
    /// Incident kind, exactly as submitted.
    pub kind: String,
    /// Optional description, exactly as submitted.
    pub description: Option<String>,
    /// Validated urgency.
    pub urgency: Urgency,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Notes, normalized to `""` when absent.
    pub notes: String,
    /// Validated media attachments, in submission order.
    pub media: Vec<MediaUpload>,
}

/// Validates a raw incident submission.
///
/// All fields are checked and every issue is reported, so a caller can
/// surface the complete list next to the offending form fields in one
/// round trip.
///
/// # Errors
///
/// Returns the list of field-scoped issues when any field fails
/// validation. The list is never empty on the error path.
pub fn validate(submission: IncidentSubmission) -> Result<ValidatedIncident, Vec<FieldIssue>> {
    let mut issues = Vec::new();

    let category = match submission.category.as_deref() {
        None | Some("") => {
            issues.push(FieldIssue::new("category", "Category is required"));
            None
        }
        Some(raw) => match raw.parse::<IncidentCategory>() {
            Ok(cat) => Some(cat),
            Err(_) => {
                issues.push(FieldIssue::new(
                    "category",
                    format!("Unknown incident category: {raw}"),
                ));
                None
            }
        },
    };

    let kind = match submission.kind.as_deref() {
        None | Some("") => {
            issues.push(FieldIssue::new("type", "Incident type is required"));
            None
        }
        Some(raw) => Some(raw.to_string()),
    };

    // Cross-field check only when both sides parsed; a missing category or
    // kind already has its own issue.
    if let (Some(cat), Some(kind)) = (category, kind.as_deref()) {
        if !cat.accepts_kind(kind) {
            let message = if cat == IncidentCategory::Other {
                "When category is \"other\", the incident type must be \"other\".".to_string()
            } else {
                "Invalid incident type for selected category.".to_string()
            };
            issues.push(FieldIssue::new("type", message));
        }
    }

    let urgency = match submission.urgency.as_deref() {
        None | Some("") => {
            issues.push(FieldIssue::new("urgency", "Urgency is required"));
            None
        }
        Some(raw) => match raw.parse::<Urgency>() {
            Ok(urgency) => Some(urgency),
            Err(_) => {
                issues.push(FieldIssue::new(
                    "urgency",
                    format!("Urgency must be one of low, medium, high (got {raw})"),
                ));
                None
            }
        },
    };

    let lat = parse_coordinate(submission.lat.as_deref(), "lat", &mut issues);
    let lng = parse_coordinate(submission.lng.as_deref(), "lng", &mut issues);

    let notes = submission.notes.unwrap_or_default();
    if notes.chars().count() > MAX_NOTES_CHARS {
        issues.push(FieldIssue::new(
            "notes",
            format!("Notes must be at most {MAX_NOTES_CHARS} characters"),
        ));
    }

    if submission.media.len() > MAX_MEDIA_FILES {
        issues.push(FieldIssue::new(
            "media",
            format!("You can upload up to {MAX_MEDIA_FILES} files"),
        ));
    }
    for upload in &submission.media {
        if upload.bytes.len() > MAX_MEDIA_BYTES {
            let name = upload.filename.as_deref().unwrap_or("attachment");
            issues.push(FieldIssue::new(
                "media",
                format!("{name} exceeds the 10 MB per-file limit"),
            ));
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    // Every None above pushed an issue, so all fields are Some here.
    let (Some(category), Some(kind), Some(urgency), Some(lat), Some(lng)) =
        (category, kind, urgency, lat, lng)
    else {
        return Err(issues);
    };

    Ok(ValidatedIncident {
        category,
        kind,
        description: submission.description,
        urgency,
        lat,
        lng,
        notes,
        media: submission.media,
    })
}

/// Parses a latitude/longitude field. No range check is applied; the
/// intake contract only requires the value to be numeric.
fn parse_coordinate(
    raw: Option<&str>,
    field: &'static str,
    issues: &mut Vec<FieldIssue>,
) -> Option<f64> {
    match raw {
        None | Some("") => {
            issues.push(FieldIssue::new(field, format!("{field} is required")));
            None
        }
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                issues.push(FieldIssue::new(field, format!("{field} must be numeric")));
                None
            }
        },
    }
}
