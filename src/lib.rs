//! imgpdf
//!
//! An HTTP service that turns a batch of uploaded JPEG/PNG images into a
//! single PDF, one page per image, each page sized to its image.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use handlers::{create_router, AppState};
