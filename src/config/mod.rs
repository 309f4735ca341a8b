use std::env;
use std::path::{Component, Path, PathBuf};
use anyhow::{Result, Context};
use tracing::{info, warn};

use crate::services::decoder::{DecodeLimits, PDF_MAX_PAGE_SIDE};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_upload_size_mb: usize,
    pub max_concurrent_requests: usize,
    /// Longest side, in pixels, of an image that still becomes a page.
    pub max_image_side: u32,
    pub max_image_pixels: u64,
    /// Decoded pixels one request may hold across all of its pages.
    pub max_request_pixels: u64,
    /// Root under which every request creates its own scoped staging directory.
    pub staging_dir: PathBuf,
    /// Static asset root. Never the same tree as `staging_dir`.
    pub public_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            max_upload_size_mb: 25,
            max_concurrent_requests: 16,
            max_image_side: PDF_MAX_PAGE_SIDE,
            max_image_pixels: 40_000_000,
            max_request_pixels: 100_000_000,
            staging_dir: env::temp_dir().join("imgpdf-staging"),
            public_dir: PathBuf::from("public"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let defaults = Config::default();

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| {
                info!("SERVER_HOST not set, using default: {}", defaults.server_host);
                defaults.server_host.clone()
            }),
            server_port: Self::parse_env_var("PORT", defaults.server_port)
                .context("Failed to parse PORT")?,
            max_upload_size_mb: Self::parse_env_var("MAX_UPLOAD_SIZE_MB", defaults.max_upload_size_mb)
                .context("Failed to parse MAX_UPLOAD_SIZE_MB")?,
            max_concurrent_requests: Self::parse_env_var("MAX_CONCURRENT_REQUESTS", defaults.max_concurrent_requests)
                .context("Failed to parse MAX_CONCURRENT_REQUESTS")?,
            max_image_side: Self::parse_env_var("MAX_IMAGE_SIDE", defaults.max_image_side)
                .context("Failed to parse MAX_IMAGE_SIDE")?,
            max_image_pixels: Self::parse_env_var("MAX_IMAGE_PIXELS", defaults.max_image_pixels)
                .context("Failed to parse MAX_IMAGE_PIXELS")?,
            max_request_pixels: Self::parse_env_var("MAX_REQUEST_PIXELS", defaults.max_request_pixels)
                .context("Failed to parse MAX_REQUEST_PIXELS")?,
            staging_dir: Self::path_env_var("STAGING_DIR", defaults.staging_dir),
            public_dir: Self::path_env_var("PUBLIC_DIR", defaults.public_dir),
        };

        config.validate()?;

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.trim().parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    fn path_env_var(var_name: &str, default: PathBuf) -> PathBuf {
        match env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => PathBuf::from(val.trim()),
            _ => {
                info!("{} not set, using default: {}", var_name, default.display());
                default
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("PORT must be greater than 0"));
        }
        if self.max_upload_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_REQUESTS must be greater than 0"));
        }
        if self.max_image_side == 0 || self.max_image_side > PDF_MAX_PAGE_SIDE {
            return Err(anyhow::anyhow!(
                "MAX_IMAGE_SIDE must be between 1 and {}",
                PDF_MAX_PAGE_SIDE
            ));
        }
        if self.max_image_pixels == 0 {
            return Err(anyhow::anyhow!("MAX_IMAGE_PIXELS must be greater than 0"));
        }
        if self.max_request_pixels < self.max_image_pixels {
            return Err(anyhow::anyhow!(
                "MAX_REQUEST_PIXELS must be at least MAX_IMAGE_PIXELS"
            ));
        }

        let staging_dir = absolutize(&self.staging_dir)?;
        let public_dir = absolutize(&self.public_dir)?;
        if staging_dir.starts_with(&public_dir) {
            return Err(anyhow::anyhow!(
                "STAGING_DIR ({}) must not live inside PUBLIC_DIR ({})",
                staging_dir.display(),
                public_dir.display()
            ));
        }
        Ok(())
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_image_side: self.max_image_side,
            max_image_pixels: self.max_image_pixels,
            max_request_pixels: self.max_request_pixels,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb * 1024 * 1024
    }
}

/// Joins relative paths onto the working directory and folds `.` and `..`
/// lexically. Symlinks are not resolved; neither directory has to exist yet.
fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .context("Failed to read the working directory")?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
