//! Builds one PDF from a batch of staged uploads.
//!
//! Images are processed in upload order. An image that fails to decode is
//! logged and skipped; it contributes no page and the rest of the batch
//! carries on. A batch where nothing decodes still yields a valid PDF with
//! zero pages.

use std::time::Instant;

use lopdf::{dictionary, Document, Object, ObjectId};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{SkippedImage, UploadedImage};
use crate::services::compositor::compose_page;
use crate::services::decoder::{decode_raster, DecodeLimits, DecodedRaster};
use crate::services::staging::StagingArea;

const PDF_VERSION: &str = "1.5";

/// A page sequence under construction. `finish` consumes it, so nothing
/// can be appended to a finalized document.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
        }
    }

    pub fn push(&mut self, raster: DecodedRaster) -> AppResult<()> {
        let page_id = compose_page(&mut self.doc, self.pages_id, raster)?;
        self.page_ids.push(page_id);
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn finish(mut self) -> AppResult<Vec<u8>> {
        let kids: Vec<Object> = self.page_ids.iter().copied().map(Object::Reference).collect();
        let count = kids.len() as i64;

        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(concat!("imgpdf ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| AppError::assembly(format!("Failed to serialize PDF: {}", e)))?;
        Ok(buffer)
    }
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Assembly {
    pub pdf: Vec<u8>,
    pub pages: usize,
    pub skipped: Vec<SkippedImage>,
    pub processing_time_ms: u64,
}

/// Every page's pixels stay in memory until `finish`, so decoding is bounded
/// per image and by a running total across the request.
pub struct DocumentAssembler {
    limits: DecodeLimits,
}

impl DocumentAssembler {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    pub fn assemble(&self, images: &[UploadedImage]) -> AppResult<Assembly> {
        let start = Instant::now();
        let mut output = OutputDocument::new();
        let mut skipped = Vec::new();
        let mut used_pixels: u64 = 0;

        for (index, image) in images.iter().enumerate() {
            let remaining_pixels = self.limits.max_request_pixels.saturating_sub(used_pixels);
            let raster = match decode_raster(image, &self.limits, remaining_pixels) {
                Ok(raster) => raster,
                Err(AppError::DecodeFailed { file, message }) => {
                    warn!(
                        index,
                        file_name = %file,
                        reason = %message,
                        "Skipping image that failed to decode"
                    );
                    skipped.push(SkippedImage {
                        file_name: file,
                        reason: message,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (width, height) = raster.dimensions();
            used_pixels += raster.pixel_count();
            output.push(raster)?;

            tracing::debug!(
                index,
                file_name = %image.original_name,
                width,
                height,
                "Added page"
            );
        }

        let pages = output.page_count();
        let pdf = output.finish()?;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            images = images.len(),
            pages,
            skipped = skipped.len(),
            pdf_bytes = pdf.len(),
            used_pixels,
            processing_time_ms,
            "PDF assembled"
        );

        Ok(Assembly {
            pdf,
            pages,
            skipped,
            processing_time_ms,
        })
    }

    /// Runs `assemble` on the blocking pool and releases `staging` once the
    /// work is done, whether it succeeded or not. The task owns the staging
    /// area, so a dropped request future cannot delete files mid-decode.
    pub async fn assemble_staged(
        self,
        staging: StagingArea,
        images: Vec<UploadedImage>,
    ) -> AppResult<Assembly> {
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let result = self.assemble(&images);
            staging.close();
            result
        })
        .await?
    }
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new(DecodeLimits::default())
    }
}
