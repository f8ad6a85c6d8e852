//! Cleanup Scheduler
//!
//! Three recurring background jobs over the record store:
//!
//! 1. **Expiry** (daily default): delete records whose
//!    `created_at + ttl_seconds` has passed
//! 2. **Consolidation** (weekly default): merge near-duplicate pairs
//!    with identical witness sets
//! 3. **Decay** (monthly default): renormalise importance through the
//!    record's decay function
//!
//! Jobs are idempotent, run at most one instance per job type, and
//! journal a `{deleted, merged, demoted}` summary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::CleanupConfig;
use crate::error::Result;
use crate::store::MemoryStore;

/// Summary journalled after each job run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CleanupSummary {
    pub deleted: u64,
    pub merged: u64,
    pub demoted: u64,
}

/// The background cleanup scheduler
pub struct CleanupScheduler {
    store: Arc<MemoryStore>,
    config: CleanupConfig,
    expiry_running: AtomicBool,
    consolidation_running: AtomicBool,
    decay_running: AtomicBool,
}

impl CleanupScheduler {
    pub fn new(store: Arc<MemoryStore>, config: CleanupConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            config,
            expiry_running: AtomicBool::new(false),
            consolidation_running: AtomicBool::new(false),
            decay_running: AtomicBool::new(false),
        })
    }

    /// Spawn the three recurring jobs onto the runtime
    pub fn spawn(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let jobs: [(&'static str, u64, fn(&CleanupScheduler) -> Result<CleanupSummary>); 3] = [
            ("expiry", self.config.expiry_interval_secs, Self::run_expiry),
            (
                "consolidation",
                self.config.consolidation_interval_secs,
                Self::run_consolidation,
            ),
            ("decay", self.config.decay_interval_secs, Self::run_decay),
        ];

        jobs.into_iter()
            .map(|(name, period_secs, job)| {
                let scheduler = Arc::clone(self);
                tokio::spawn(async move {
                    let mut interval =
                        tokio::time::interval(Duration::from_secs(period_secs.max(1)));
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    // First tick fires immediately; skip it so startup
                    // isn't a cleanup storm.
                    interval.tick().await;
                    loop {
                        interval.tick().await;
                        match job(&scheduler) {
                            Ok(summary) => info!(
                                job = name,
                                deleted = summary.deleted,
                                merged = summary.merged,
                                demoted = summary.demoted,
                                "cleanup job finished"
                            ),
                            Err(e) => warn!(job = name, "cleanup job failed: {e}"),
                        }
                    }
                })
            })
            .collect()
    }

    /// Delete every record whose TTL has passed
    pub fn run_expiry(&self) -> Result<CleanupSummary> {
        let _guard = match JobGuard::acquire(&self.expiry_running) {
            Some(g) => g,
            None => return Ok(CleanupSummary::default()),
        };

        let mut summary = CleanupSummary::default();
        for id in self.store.expired_ids(Utc::now())? {
            if self.store.delete(&id)? {
                summary.deleted += 1;
            }
        }
        self.store
            .journal_cleanup("expiry", summary.deleted, 0, 0)?;
        Ok(summary)
    }

    /// Merge near-duplicate pairs (cosine similarity above the
    /// configured threshold, identical witness sets)
    pub fn run_consolidation(&self) -> Result<CleanupSummary> {
        let _guard = match JobGuard::acquire(&self.consolidation_running) {
            Some(g) => g,
            None => return Ok(CleanupSummary::default()),
        };

        let mut summary = CleanupSummary::default();
        let pairs = self
            .store
            .similar_pairs(self.config.consolidation_threshold)?;
        for (keep, absorb, similarity) in pairs {
            if self.store.merge_pair(&keep, &absorb)? {
                info!(%keep, %absorb, similarity, "consolidated near-duplicate memories");
                summary.merged += 1;
            }
        }
        self.store
            .journal_cleanup("consolidation", 0, summary.merged, 0)?;
        Ok(summary)
    }

    /// Apply importance decay per record decay function
    pub fn run_decay(&self) -> Result<CleanupSummary> {
        let _guard = match JobGuard::acquire(&self.decay_running) {
            Some(g) => g,
            None => return Ok(CleanupSummary::default()),
        };

        let demoted = self
            .store
            .decay_pass(Utc::now(), self.config.decay_lambda)?;
        let summary = CleanupSummary {
            demoted,
            ..Default::default()
        };
        self.store.journal_cleanup("decay", 0, 0, demoted)?;
        Ok(summary)
    }
}

/// One-in-flight guard per job type
struct JobGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> JobGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ============================================================================
// TESTS
// ============================================================================
