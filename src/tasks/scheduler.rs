use std::sync::Arc;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use futures::{FutureExt, future::BoxFuture};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{
    config::SchedulerConfig,
    feeds::FeedIngestor,
    infrastructure::shutdown::ShutdownListener,
    training::{TrainingError, TrainingPipeline},
};

pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Registers the feed refresh and retrain jobs and starts the scheduler.
pub async fn configure_jobs(
    config: &SchedulerConfig,
    ingestor: Arc<FeedIngestor>,
    pipeline: Arc<TrainingPipeline>,
    shutdown: ShutdownListener,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let refresh: JobCallback = Arc::new(move || {
        let ingestor = ingestor.clone();
        async move {
            ingestor.fetch_all().await;
        }
        .boxed()
    });
    let retrain: JobCallback = Arc::new(move || {
        let pipeline = pipeline.clone();
        async move {
            match pipeline.retrain_from_store().await {
                Ok(outcome) => tracing::info!(target: "scheduler", ?outcome, "scheduled retrain finished"),
                Err(TrainingError::InProgress) => {
                    tracing::info!(target: "scheduler", "retrain already running; scheduled run skipped")
                }
                // Already logged by the pipeline.
                Err(_) => {}
            }
        }
        .boxed()
    });

    register(&scheduler, "feed_refresh", &config.feed_refresh_crons, config.timezone, refresh, &shutdown).await?;
    register(&scheduler, "retrain", &config.retrain_crons, config.timezone, retrain, &shutdown).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register(
    scheduler: &JobScheduler,
    name: &'static str,
    cron_specs: &[String],
    timezone: Tz,
    callback: JobCallback,
    shutdown: &ShutdownListener,
) -> Result<()> {
    for spec in cron_specs {
        let cb = callback.clone();
        let shutdown = shutdown.clone();
        let label = spec.clone();
        let job = Job::new_async_tz(spec.as_str(), timezone, move |_id, _l| {
            let cb = cb.clone();
            let stopping = shutdown.is_triggered();
            let cron_label = label.clone();
            Box::pin(async move {
                if stopping {
                    tracing::info!(target: "scheduler", job = name, cron = %cron_label, "shutdown in progress; job skipped");
                    return;
                }
                tracing::info!(target: "scheduler", job = name, cron = %cron_label, "job triggered");
                cb().await;
            })
        })
        .with_context(|| format!("invalid cron expression for {name}: {spec}"))?;
        scheduler.add(job).await?;
        tracing::info!(target: "scheduler", job = name, cron = %spec, timezone = %timezone, "job registered");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::FeedConfig,
        db::{FeedRepository, FeedbackRepository, memory_pool},
        infrastructure::shutdown::Shutdown,
        model::{ModelStore, TrainingParams},
        training::bundled_seed_corpus,
    };

    async fn collaborators(dir: &std::path::Path) -> (Arc<FeedIngestor>, Arc<TrainingPipeline>) {
        let pool = memory_pool().await;
        let feeds = FeedRepository::new(pool.clone());
        let store = Arc::new(ModelStore::new(dir, bundled_seed_corpus(), TrainingParams::default()));
        let ingestor = FeedIngestor::new(
            reqwest::Client::new(),
            FeedConfig {
                phishtank_url: "http://127.0.0.1:9/online-valid.csv".into(),
                openphish_url: "http://127.0.0.1:9/feed.txt".into(),
                fetch_timeout: std::time::Duration::from_millis(100),
            },
            feeds.clone(),
        );
        let pipeline = TrainingPipeline::new(store, FeedbackRepository::new(pool), feeds);
        (Arc::new(ingestor), Arc::new(pipeline))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let (ingestor, pipeline) = collaborators(tmp.path()).await;
        let config = SchedulerConfig {
            retrain_crons: vec!["every night".into()],
            feed_refresh_crons: vec![],
            timezone: Tz::UTC,
        };

        let Err(err) = configure_jobs(&config, ingestor, pipeline, Shutdown::new().subscribe()).await else {
            panic!("an unparsable cron expression must be rejected");
        };
        assert!(err.to_string().contains("retrain"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn valid_crons_start_the_scheduler() {
        let tmp = tempfile::tempdir().unwrap();
        let (ingestor, pipeline) = collaborators(tmp.path()).await;
        let config = SchedulerConfig {
            retrain_crons: vec!["0 0 3 * * *".into()],
            feed_refresh_crons: vec!["0 30 2 * * *".into()],
            timezone: chrono_tz::Asia::Seoul,
        };

        let mut scheduler = configure_jobs(&config, ingestor, pipeline, Shutdown::new().subscribe())
            .await
            .unwrap();
        scheduler.shutdown().await.unwrap();
    }
}
