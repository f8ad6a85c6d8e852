//! Per-Client Rate Limiting
//!
//! Sliding windows over the last minute and hour, keyed by client IP.
//! Counters live in a `DashMap` (sharded locks) so checks never contend
//! globally. Breaching the hour limit blocks the client for a configured
//! duration.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use engram_core::EngramError;

/// Per-client sliding-window state
#[derive(Debug, Default)]
struct ClientWindow {
    minute_hits: VecDeque<DateTime<Utc>>,
    hour_hits: VecDeque<DateTime<Utc>>,
    blocked_until: Option<DateTime<Utc>>,
}

/// Sliding-window rate limiter keyed by client address
pub struct RateLimiter {
    clients: DashMap<String, ClientWindow>,
    per_minute: u32,
    per_hour: u32,
    block_secs: u64,
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_hour: u32, block_secs: u64) -> Self {
        Self {
            clients: DashMap::new(),
            per_minute,
            per_hour,
            block_secs,
        }
    }

    /// Admit or reject one request from `client`. Rejection carries the
    /// seconds the client should wait before retrying.
    pub fn check(&self, client: &str) -> Result<(), EngramError> {
        self.check_at(client, Utc::now())
    }

    /// Clock-injectable variant for tests
    pub fn check_at(&self, client: &str, now: DateTime<Utc>) -> Result<(), EngramError> {
        let mut entry = self.clients.entry(client.to_string()).or_default();

        if let Some(until) = entry.blocked_until {
            if now < until {
                return Err(EngramError::RateLimited {
                    retry_after_seconds: (until - now).num_seconds().max(1) as u64,
                });
            }
            entry.blocked_until = None;
        }

        let minute_ago = now - Duration::seconds(60);
        let hour_ago = now - Duration::seconds(3600);
        while entry.minute_hits.front().is_some_and(|t| *t <= minute_ago) {
            entry.minute_hits.pop_front();
        }
        while entry.hour_hits.front().is_some_and(|t| *t <= hour_ago) {
            entry.hour_hits.pop_front();
        }

        if entry.hour_hits.len() >= self.per_hour as usize {
            // Hour breach escalates to a block
            let until = now + Duration::seconds(self.block_secs as i64);
            entry.blocked_until = Some(until);
            tracing::warn!(client, block_secs = self.block_secs, "hour rate limit breached; blocking client");
            return Err(EngramError::RateLimited {
                retry_after_seconds: self.block_secs,
            });
        }

        if entry.minute_hits.len() >= self.per_minute as usize {
            let oldest = entry.minute_hits.front().copied().unwrap_or(now);
            let retry = 60 - (now - oldest).num_seconds();
            return Err(EngramError::RateLimited {
                retry_after_seconds: retry.max(1) as u64,
            });
        }

        entry.minute_hits.push_back(now);
        entry.hour_hits.push_back(now);
        Ok(())
    }
}
