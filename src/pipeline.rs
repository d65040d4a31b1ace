// Per-query run: collect, score, rank, persist, engage
use crate::analyzer::Analyzer;
use crate::catalog::IntentCatalog;
use crate::collector::{CollectorSettings, FeedCollector, Termination};
use crate::config::{AppConfig, CollectorConfig};
use crate::notifier::Notifier;
use crate::scraper::PageDriver;
use crate::storage::{SqliteStorage, csv, post_key};

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub query: String,
    pub termination: Termination,
    pub collected: usize,
    pub engaged: usize,
    pub attempts: u32,
    pub timeouts: u32,
    pub noise: u32,
    pub duplicates: u32,
}

impl From<&CollectorConfig> for CollectorSettings {
    fn from(cfg: &CollectorConfig) -> Self {
        Self {
            target_count: cfg.target_count,
            max_attempts: cfg.max_attempts,
            per_request_timeout: Duration::from_millis(cfg.per_request_timeout_ms),
            require_source_url: cfg.require_source_url,
        }
    }
}

pub struct Pipeline<'a, D: PageDriver, A: Analyzer> {
    pub driver: &'a D,
    pub analyzer: &'a A,
    pub catalog: &'a IntentCatalog,
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<AppConfig>,
}

impl<D: PageDriver, A: Analyzer> Pipeline<'_, D, A> {
    /// Runs one query end to end. Partial collections still produce a full report.
    pub async fn process_query(&self, query: &str) -> RunSummary {
        let started = Instant::now();
        info!("Processing query: {}", query);

        {
            let storage = self.storage.lock().await;
            if let Ok(Some(prev)) = storage.get_stats(query) {
                info!(
                    "Previous report: {} posts | mean best {:.3} | Updated: {}",
                    prev.post_count, prev.mean_best_score, prev.last_updated
                );
            }
        }

        let collector = FeedCollector::new(self.driver, CollectorSettings::from(&self.config.collector));
        let outcome = collector.collect(query).await;
        let mut summary = RunSummary {
            query: query.to_string(),
            termination: outcome.termination,
            collected: outcome.items.len(),
            engaged: 0,
            attempts: outcome.attempts,
            timeouts: outcome.timeouts,
            noise: outcome.noise,
            duplicates: outcome.duplicates,
        };

        if outcome.items.is_empty() {
            warn!("No posts collected for '{}', skipping scoring", query);
            return summary;
        }

        let rows = match self.analyzer.score(&outcome.items, self.catalog) {
            Ok(rows) => rows,
            Err(e) => {
                error!("Scoring failed for '{}': {}", query, e);
                return summary;
            }
        };
        let ranked = self.analyzer.rank(&rows, &outcome.items);
        let stats = self.analyzer.calculate_stats(query, &ranked);
        info!(
            "Scored {} posts: mean best {:.3}, top intent {}",
            stats.post_count,
            stats.mean_best_score,
            stats.top_label.as_deref().unwrap_or("-")
        );

        {
            let mut storage = self.storage.lock().await;
            if let Err(e) = storage.replace_report(query, &ranked) {
                warn!("Report save failed: {}", e);
            }
            if let Err(e) = storage.update_stats(&stats) {
                warn!("Stats update failed: {}", e);
            }
        }

        if let Some(dir) = &self.config.output.csv_dir {
            match csv::write_report(Path::new(dir), query, &ranked) {
                Ok(path) => info!("Saved report to {}", path.display()),
                Err(e) => warn!("CSV write failed: {}", e),
            }
        }

        let engagement = &self.config.engagement;
        let selected = self
            .analyzer
            .select_for_engagement(&ranked, engagement.threshold, engagement.cap);
        info!("Selected {} posts for engagement", selected.len());

        for post in selected {
            let key = post_key(&post.item);
            match self.storage.lock().await.is_notified(&key) {
                Ok(true) => {
                    info!("Already engaged: {}", key);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Engagement check failed: {}", e);
                    continue;
                }
            }

            if let Err(e) = self.notifier.notify(post).await {
                warn!("Engagement failed for {}: {}", key, e);
            } else if let Err(e) = self.storage.lock().await.mark_notified(&key) {
                warn!("Mark notified failed: {}", e);
            } else {
                summary.engaged += 1;
            }
        }

        info!(
            "Finished query '{}' in {:.2}s",
            query,
            started.elapsed().as_secs_f64()
        );
        summary
    }
}
