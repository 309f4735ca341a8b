use std::path::PathBuf;

/// Image formats the converter accepts at the upload boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        // Parameters such as `; charset=binary` are ignored.
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }
}

/// A file from the `images` field, staged on disk for the lifetime of one request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub path: PathBuf,
    pub original_name: String,
    pub mime_type: String,
    pub kind: ImageKind,
    pub size: usize,
}
