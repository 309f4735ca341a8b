use serde::{Deserialize, Serialize};

/// An upload that produced no page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedImage {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub rate_limiting: RateLimitStats,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateLimitStats {
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub available_permits: usize,
}
