pub mod assembler;
pub mod compositor;
pub mod decoder;
pub mod staging;
pub mod upload;

pub use assembler::{Assembly, DocumentAssembler, OutputDocument};
pub use decoder::{decode_bytes, decode_raster, DecodeLimits, DecodedRaster, PDF_MAX_PAGE_SIDE};
pub use staging::StagingArea;
pub use upload::{validate_upload, UploadDecision, IMAGES_FIELD};
