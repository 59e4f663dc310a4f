//! Upload classification and stored-file naming.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::errors::{DomainError, Result};
use crate::models::{MediaKind, Upload};

pub const SUPPORTED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];
pub const SUPPORTED_VIDEO_TYPES: [&str; 3] = ["video/webm", "video/mp4", "video/ogg"];

/// Image or video, from the declared content type or else the extension.
pub fn classify_media(upload: &Upload) -> Result<MediaKind> {
    let mime = upload
        .content_type
        .clone()
        .or_else(|| mime_guess::from_path(&upload.file_name).first())
        .ok_or_else(|| DomainError::Validation("Unsupported media type".into()))?;

    let essence = mime.essence_str();
    if SUPPORTED_IMAGE_TYPES.contains(&essence) {
        Ok(MediaKind::Image)
    } else if SUPPORTED_VIDEO_TYPES.contains(&essence) {
        Ok(MediaKind::Video)
    } else {
        Err(DomainError::Validation(format!("Unsupported media type: {essence}")))
    }
}

/// Name under which an upload is stored: creation time in nanoseconds plus
/// the declared extension, lower-cased.
pub fn stored_file_name(now: DateTime<Utc>, declared: &str) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros() * 1000);
    match Path::new(declared).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{nanos}.{}", ext.to_lowercase()),
        None => nanos.to_string(),
    }
}

/// Swaps the extension of a stored name, used for video thumbnails.
pub fn with_extension(name: &str, ext: &str) -> String {
    let stem = Path::new(name).file_stem().and_then(|stem| stem.to_str()).unwrap_or(name);
    format!("{stem}.{ext}")
}
