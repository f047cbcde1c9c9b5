pub mod attendance;
pub mod leave_request;

use actix_web::web;
use tracing::{error, info};

use crate::error::bad_request;
use crate::utils::image::normalize_base64;

/// The uploaded image, or a 400 carrying `missing_code` when there is none.
pub fn require_attachment(raw: Option<String>, missing_code: &str) -> actix_web::Result<String> {
    raw.filter(|r| !r.trim().is_empty())
        .ok_or_else(|| bad_request(missing_code, "image attachment is required"))
}

/// Decodes, downsizes and re-encodes an uploaded image on the blocking pool.
pub async fn normalize_attachment(raw: String) -> actix_web::Result<String> {
    web::block(move || normalize_base64(&raw))
        .await
        .map_err(|e| {
            error!(error = %e, "Image worker failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
        .map_err(|e| {
            info!(error = %e, "Rejected attachment");
            bad_request("invalid_image", e.to_string())
        })
}
