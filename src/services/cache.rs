//! Read-through cache cell with explicit invalidation
//!
//! One cell holds one snapshot. The async mutex is held from the staleness check
//! through fetch and install, so concurrent readers of a stale cell wait for the
//! single in-flight fetch instead of issuing their own.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;

/// Cached value plus its freshness state
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub value: Arc<T>,
    /// None never expires; such entries refresh only when invalidated
    pub expires_at: Option<DateTime<Utc>>,
    pub force_invalidated: bool,
}

impl<T> CacheEntry<T> {
    /// Served without a fetch iff not expired and not invalidated
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        !self.force_invalidated && self.expires_at.map_or(true, |at| now < at)
    }
}

pub struct RefreshCell<T> {
    name: &'static str,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<CacheEntry<T>>>,
}

impl<T: Send + Sync> RefreshCell<T> {
    pub fn new(name: &'static str, ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached snapshot, refreshing it first when stale.
    ///
    /// A failed refresh keeps the previous snapshot and serves it; on first
    /// population there is nothing to fall back to and the error propagates.
    pub async fn get<F, Fut>(&self, force_refresh: bool, fetch: F) -> ServiceResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(entry) = slot.as_mut() {
            if force_refresh {
                entry.force_invalidated = true;
            }
            if entry.is_fresh(self.clock.now()) {
                return Ok(entry.value.clone());
            }
        }

        match fetch().await {
            Ok(value) => {
                let value = Arc::new(value);
                *slot = Some(CacheEntry {
                    value: value.clone(),
                    expires_at: self.ttl.map(|ttl| self.clock.now() + ttl),
                    force_invalidated: false,
                });
                metrics::record_refresh(self.name, "fresh");
                tracing::debug!(cache = self.name, "Cache refreshed");
                Ok(value)
            }
            Err(ServiceError::Cancelled) => Err(ServiceError::Cancelled),
            Err(e) => match slot.as_ref() {
                Some(entry) => {
                    metrics::record_refresh(self.name, "stale");
                    tracing::warn!(cache = self.name, "Refresh failed, serving stale data: {}", e);
                    Ok(entry.value.clone())
                }
                None => {
                    metrics::record_refresh(self.name, "failed");
                    tracing::error!(cache = self.name, "Initial population failed: {}", e);
                    Err(e)
                }
            },
        }
    }

    /// Mark the entry stale; the next read refetches
    pub async fn invalidate(&self) {
        if let Some(entry) = self.slot.lock().await.as_mut() {
            entry.force_invalidated = true;
        }
    }

    /// Current value without refreshing
    pub async fn peek(&self) -> Option<Arc<T>> {
        self.slot.lock().await.as_ref().map(|e| e.value.clone())
    }
}
