use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::CatalogError;
use crate::models::CourseVariant;
use crate::services::Catalog;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub courses_scanned: usize,
    pub statuses_refreshed: usize,
    pub scores_refreshed: usize,
    pub failures: usize,
}

/// Periodic refresh of derived course state: offline enrollment status and
/// trending scores for every live course.
pub struct CatalogScheduler {
    catalog: Arc<Catalog>,
    interval: Duration,
}

impl CatalogScheduler {
    pub fn new(catalog: Arc<Catalog>, interval_secs: u64) -> Self {
        Self {
            catalog,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Run forever, refreshing once per interval. Failed runs are logged and
    /// the loop continues.
    pub async fn start(self) {
        info!("Starting catalog refresh scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.run_once().await {
                Ok(stats) => {
                    info!(
                        "Catalog refresh completed - scanned: {}, statuses: {}, scores: {}, failures: {}",
                        stats.courses_scanned,
                        stats.statuses_refreshed,
                        stats.scores_refreshed,
                        stats.failures
                    );
                }
                Err(e) => warn!("Catalog refresh failed: {:?}", e),
            }
        }
    }

    /// One pass over all variants. A course that fails is logged and
    /// skipped; only a failure to list courses aborts the pass.
    pub async fn run_once(&self) -> Result<RefreshStats, CatalogError> {
        let mut stats = RefreshStats::default();

        for variant in CourseVariant::ALL {
            let ids = self.catalog.courses.live_ids(variant).await?;
            for id in ids {
                stats.courses_scanned += 1;

                if variant == CourseVariant::Offline {
                    match self.catalog.enrollments.update_enrollment_status(id).await {
                        Ok(_) => stats.statuses_refreshed += 1,
                        Err(e) => {
                            warn!("enrollment status refresh failed for course {}: {}", id, e);
                            stats.failures += 1;
                            continue;
                        }
                    }
                }

                match self.catalog.trending.recompute(variant, id).await {
                    Ok(_) => stats.scores_refreshed += 1,
                    Err(e) => {
                        warn!("trending refresh failed for {} course {}: {}", variant, id, e);
                        stats.failures += 1;
                    }
                }
            }
        }

        Ok(stats)
    }
}
