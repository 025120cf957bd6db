// Actix runs each worker on its own thread; extractor futures don't
// need to be Send.
#![allow(clippy::future_not_send)]

//! Multipart form extraction for incident submissions.
//!
//! Pulls the raw text fields and media attachments out of a
//! `multipart/form-data` body into an [`IncidentSubmission`]. No
//! validation happens here; every field is passed through as submitted
//! and judged by `relief_map_intake::validate`.
//!
//! Buffering is bounded: an attachment part is kept up to one byte
//! past the per-file size limit (enough for validation to flag it),
//! and at most one attachment past the file-count limit is kept at
//! all. The rest of the stream is drained without being stored.

use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt as _;
use relief_map_intake::{IncidentSubmission, MAX_MEDIA_BYTES, MAX_MEDIA_FILES, MediaUpload};

/// Form field name carrying media attachments (repeatable).
const MEDIA_FIELD: &str = "media";

/// Errors from multipart extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The multipart payload was malformed or truncated.
    #[error("Malformed multipart payload: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
}

/// Reads an incident submission from a multipart payload.
///
/// Unknown form fields are ignored. Fields arrive in client order, so
/// media attachments keep their submission order.
///
/// # Errors
///
/// Returns [`ExtractError`] if the payload cannot be read.
pub async fn incident_submission(
    mut payload: Multipart,
) -> Result<IncidentSubmission, ExtractError> {
    let mut submission = IncidentSubmission::default();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == MEDIA_FIELD {
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(ToString::to_string);
            let content_type = field.content_type().map(ToString::to_string);

            // One attachment past the count limit is enough for the
            // validator to reject the submission; drain the rest.
            let cap = if submission.media.len() > MAX_MEDIA_FILES {
                0
            } else {
                MAX_MEDIA_BYTES + 1
            };
            let bytes = read_capped(&mut field, cap).await?;
            if cap > 0 {
                submission.media.push(MediaUpload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            continue;
        }

        let bytes = read_capped(&mut field, usize::MAX).await?;
        let value = String::from_utf8_lossy(&bytes).into_owned();
        match name.as_str() {
            "category" => submission.category = Some(value),
            "type" => submission.kind = Some(value),
            "description" => submission.description = Some(value),
            "urgency" => submission.urgency = Some(value),
            "lat" => submission.lat = Some(value),
            "lng" => submission.lng = Some(value),
            "notes" => submission.notes = Some(value),
            _ => log::debug!("Ignoring unknown form field: {name}"),
        }
    }

    Ok(submission)
}

/// Reads a field's bytes, keeping at most `cap` of them while still
/// consuming the stream so the next field can be read.
async fn read_capped(field: &mut Field, cap: usize) -> Result<Vec<u8>, ExtractError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        append_capped(&mut bytes, &chunk, cap);
    }
    Ok(bytes)
}

/// Appends `chunk` to `buf`, never growing `buf` beyond `cap` bytes.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], cap: usize) {
    let room = cap.saturating_sub(buf.len());
    let keep = room.min(chunk.len());
    buf.extend_from_slice(&chunk[..keep]);
}
