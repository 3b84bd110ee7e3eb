use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use sqlx::SqlitePool;
use tokio::time::timeout;
use tokio_cron_scheduler::JobScheduler;

use crate::{
    config::AppConfig,
    db::{self, FeedRepository, FeedbackRepository},
    domain::TrainingExample,
    feeds::FeedIngestor,
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    model::ModelStore,
    scan::ScanService,
    tasks::scheduler::configure_jobs,
    training::{TrainingPipeline, bundled_seed_corpus, load_seed_csv},
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Long-running daemon: owns the database pool, the model store and the
/// scheduled jobs. The scan service is handed to whatever routing layer
/// embeds the daemon.
pub struct PhishGuardApp {
    pool: SqlitePool,
    store: Arc<ModelStore>,
    scanner: ScanService,
    pipeline: Arc<TrainingPipeline>,
    scheduler: JobScheduler,
    shutdown: Shutdown,
}

impl PhishGuardApp {
    pub async fn initialize(config: AppConfig, paths: ResolvedPaths, shutdown: Shutdown) -> Result<Self> {
        let pool = db::init_pool(&paths.db_path).await?;
        let feedback = FeedbackRepository::new(pool.clone());
        let feeds = FeedRepository::new(pool.clone());

        let seed = load_seed(&config)?;
        let store = Arc::new(ModelStore::new(paths.model_dir.clone(), seed, config.training));
        let artifact = store
            .load_or_train()
            .await
            .context("failed to load or train the initial model")?;
        tracing::info!(
            target: "lifecycle",
            artifact_id = %artifact.artifact_id,
            trained_at = %artifact.trained_at,
            "model ready"
        );

        let scanner = ScanService::new(store.clone(), pool.clone());

        let http_client = Client::builder()
            .user_agent(format!("phishguard/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let ingestor = Arc::new(FeedIngestor::new(http_client, config.feeds.clone(), feeds.clone()));
        let pipeline = Arc::new(TrainingPipeline::new(store.clone(), feedback, feeds));

        let scheduler = configure_jobs(
            &config.scheduler,
            ingestor,
            pipeline.clone(),
            shutdown.subscribe(),
        )
        .await?;

        Ok(Self {
            pool,
            store,
            scanner,
            pipeline,
            scheduler,
            shutdown,
        })
    }

    pub fn scanner(&self) -> &ScanService {
        &self.scanner
    }

    pub fn pipeline(&self) -> &Arc<TrainingPipeline> {
        &self.pipeline
    }

    pub async fn run(self) -> Result<()> {
        let PhishGuardApp {
            pool,
            store,
            scanner: _,
            pipeline,
            mut scheduler,
            shutdown,
        } = self;

        tracing::info!(target: "lifecycle", model_dir = %store.dir().display(), "phishguard started");
        shutdown.subscribe().notified().await;

        match timeout(SHUTDOWN_TIMEOUT, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(target: "scheduler", ?err, "scheduler shutdown failed"),
            Err(_) => tracing::warn!(
                target: "scheduler",
                "scheduler did not stop within {:?}",
                SHUTDOWN_TIMEOUT
            ),
        }

        if timeout(SHUTDOWN_TIMEOUT, pipeline.wait_idle()).await.is_err() {
            tracing::warn!(
                target: "training",
                "retrain still running after {:?}; abandoning it, active model untouched",
                SHUTDOWN_TIMEOUT
            );
        }

        if timeout(SHUTDOWN_TIMEOUT, pool.close()).await.is_err() {
            tracing::warn!(target: "db", "database pool did not close within {:?}", SHUTDOWN_TIMEOUT);
        }

        tracing::info!(target: "lifecycle", "phishguard stopped");
        Ok(())
    }
}

fn load_seed(config: &AppConfig) -> Result<Vec<TrainingExample>> {
    let Some(path) = &config.seed_corpus_path else {
        return Ok(bundled_seed_corpus());
    };
    let seed = load_seed_csv(path)?;
    tracing::info!(target: "training", path = %path.display(), examples = seed.len(), "seed corpus loaded");
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{DirectoryConfig, FeedConfig, LoggingConfig, SchedulerConfig},
        domain::EmailScan,
        infrastructure::directories::ensure_directories,
        model::TrainingParams,
    };

    fn config(root: &std::path::Path) -> AppConfig {
        AppConfig {
            directories: DirectoryConfig {
                logs_dir: root.join("logs").display().to_string(),
                data_dir: root.join("data").display().to_string(),
                db_filename: "phishguard.db".into(),
                model_dir: "model".into(),
            },
            logging: LoggingConfig { level: "info".into() },
            feeds: FeedConfig {
                phishtank_url: "http://127.0.0.1:9/online-valid.csv".into(),
                openphish_url: "http://127.0.0.1:9/feed.txt".into(),
                fetch_timeout: Duration::from_millis(100),
            },
            scheduler: SchedulerConfig {
                retrain_crons: vec!["0 0 3 * * *".into()],
                feed_refresh_crons: vec!["0 30 2 * * *".into()],
                timezone: chrono_tz::Tz::UTC,
            },
            training: TrainingParams::default(),
            seed_corpus_path: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn daemon_serves_scans_and_stops_on_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let paths = ensure_directories(&config.directories).unwrap();
        let shutdown = Shutdown::new();

        let app = PhishGuardApp::initialize(config, paths.clone(), shutdown.clone())
            .await
            .unwrap();
        assert!(paths.model_dir.join(crate::model::store::CURRENT_FILENAME).exists());

        let report = app
            .scanner()
            .scan_email(EmailScan::new("Security alert", "alerts@bank.example", "click here"))
            .await
            .unwrap();
        assert!(report.quarantined);
        assert!(!app.pipeline().is_running());

        shutdown.trigger("test");
        timeout(Duration::from_secs(30), app.run()).await.unwrap().unwrap();
    }
}
