use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::RateLimitStats;

/// Caps concurrent conversions. Requests over the cap are turned away, not queued.
pub struct RequestLimiter {
    semaphore: Semaphore,
    total_requests: AtomicU64,
    rejected_requests: AtomicU64,
}

impl RequestLimiter {
    pub fn new(max_concurrent_requests: usize) -> Self {
        info!(
            max_concurrent_requests,
            "Initializing request semaphore"
        );
        Self {
            semaphore: Semaphore::new(max_concurrent_requests),
            total_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
        }
    }

    pub fn try_acquire(&self) -> Result<SemaphorePermit<'_>, AppError> {
        let total_requests = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;

        self.semaphore.try_acquire().map_err(|_| {
            let rejected = self.rejected_requests.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                total_requests,
                rejected_requests = rejected,
                available_permits = self.semaphore.available_permits(),
                "Rate limit exceeded - too many concurrent conversions"
            );
            AppError::RateLimitExceeded
        })
    }

    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            available_permits: self.semaphore.available_permits(),
        }
    }
}

/// Only `/convert` is limited; the form, health checks and static assets pass through.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RequestLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.uri().path() != "/convert" {
        return Ok(next.run(request).await);
    }

    let _permit = limiter.try_acquire()?;

    debug!(
        available_permits = limiter.stats().available_permits,
        "Request permit acquired"
    );

    let response = next.run(request).await;

    Ok(response)
}
