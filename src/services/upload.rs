//! Accept/reject decision for a single multipart file part, made before
//! anything touches disk.

use std::path::Path;

use crate::models::ImageKind;

/// Multipart field that carries the images.
pub const IMAGES_FIELD: &str = "images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadDecision {
    Accept(ImageKind),
    Reject { reason: String },
}

impl UploadDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UploadDecision::Accept(_))
    }
}

/// Both the extension and the declared MIME type must name JPEG or PNG.
/// They don't have to agree with each other; the decoder sniffs the content.
pub fn validate_upload(file_name: &str, content_type: Option<&str>) -> UploadDecision {
    if file_name.trim().is_empty() {
        return UploadDecision::Reject {
            reason: "missing file name".to_string(),
        };
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    let Some(kind) = ImageKind::from_extension(extension) else {
        return UploadDecision::Reject {
            reason: format!("extension '{}' is not one of jpg, jpeg, png", extension),
        };
    };

    match content_type {
        Some(mime) if ImageKind::from_mime_type(mime).is_some() => UploadDecision::Accept(kind),
        Some(mime) => UploadDecision::Reject {
            reason: format!("content type '{}' is not an accepted image type", mime),
        },
        None => UploadDecision::Reject {
            reason: "missing content type".to_string(),
        },
    }
}
