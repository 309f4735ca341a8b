use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::middleware::request_id;
use crate::models::UploadedImage;
use crate::services::{validate_upload, DocumentAssembler, StagingArea, UploadDecision, IMAGES_FIELD};

pub const OUTPUT_FILENAME: &str = "converted.pdf";
pub const PAGES_RENDERED_HEADER: &str = "x-pages-rendered";
pub const IMAGES_SKIPPED_HEADER: &str = "x-images-skipped";

pub async fn convert_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let start = Instant::now();
    let request_id = request_id(&headers);

    info!(request_id = %request_id, "Starting image to PDF conversion request");

    // Dropped on every early return below, which deletes whatever was staged.
    let staging = StagingArea::create(&state.config.staging_dir)?;

    let images = match collect_uploads(&mut multipart, &staging, request_id).await {
        Ok(images) => images,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to read uploads");
            return Err(e);
        }
    };

    if images.is_empty() {
        warn!(request_id = %request_id, "No acceptable images in request");
        return Err(AppError::NoImages);
    }

    info!(
        request_id = %request_id,
        images = images.len(),
        "Uploads staged, assembling PDF"
    );

    let assembly = match DocumentAssembler::new(state.config.decode_limits())
        .assemble_staged(staging, images)
        .await
    {
        Ok(assembly) => assembly,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "PDF assembly failed");
            return Err(e);
        }
    };

    for skipped in &assembly.skipped {
        warn!(
            request_id = %request_id,
            file_name = %skipped.file_name,
            reason = %skipped.reason,
            "Image left out of PDF"
        );
    }

    info!(
        request_id = %request_id,
        pages = assembly.pages,
        skipped = assembly.skipped.len(),
        assembly_time_ms = assembly.processing_time_ms,
        total_time_ms = start.elapsed().as_millis() as u64,
        "Conversion completed successfully"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", OUTPUT_FILENAME),
            ),
            (
                HeaderName::from_static(PAGES_RENDERED_HEADER),
                assembly.pages.to_string(),
            ),
            (
                HeaderName::from_static(IMAGES_SKIPPED_HEADER),
                assembly.skipped.len().to_string(),
            ),
        ],
        assembly.pdf,
    )
        .into_response())
}

/// Stages every acceptable part of the `images` field, in upload order.
/// Parts that fail validation are left out rather than failing the request.
async fn collect_uploads(
    multipart: &mut Multipart,
    staging: &StagingArea,
    request_id: &str,
) -> AppResult<Vec<UploadedImage>> {
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::invalid_upload(format!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some(IMAGES_FIELD) {
            debug!(
                request_id = %request_id,
                field = ?field.name(),
                "Ignoring unrelated multipart field"
            );
            continue;
        }

        let file_name = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());

        let kind = match validate_upload(&file_name, content_type.as_deref()) {
            UploadDecision::Accept(kind) => kind,
            UploadDecision::Reject { reason } => {
                warn!(
                    request_id = %request_id,
                    file_name = %file_name,
                    reason = %reason,
                    "Rejected upload"
                );
                continue;
            }
        };

        let data = field.bytes().await.map_err(|e| {
            AppError::invalid_upload(format!("Failed to read file data: {}", e))
        })?;

        let image = staging
            .stage(data, &file_name, content_type.as_deref().unwrap_or(""), kind)
            .await?;
        images.push(image);
    }

    Ok(images)
}
