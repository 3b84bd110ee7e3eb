use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{domain::TrainingExample, infrastructure::writer_lock::WriterLock};

use super::{
    artifact::{fit, ModelArtifact},
    classifier::{LogisticRegression, TrainingParams},
    error::ModelError,
    vectorizer::TfidfVectorizer,
};

pub const VECTORIZER_FILENAME: &str = "vectorizer.bin";
pub const CLASSIFIER_FILENAME: &str = "classifier.bin";
/// Names the artifact directory holding the active pair.
pub const CURRENT_FILENAME: &str = "CURRENT";

const STAGE_PREFIX: &str = ".stage-";
const SET_ASIDE_MARKER: &str = ".corrupt-";

#[derive(Serialize, Deserialize)]
struct VectorizerFile {
    artifact_id: String,
    trained_at: DateTime<Utc>,
    examples: usize,
    vectorizer: TfidfVectorizer,
}

#[derive(Serialize, Deserialize)]
struct ClassifierFile {
    artifact_id: String,
    classifier: LogisticRegression,
}

/// Owner of the active [`ModelArtifact`] and of its on-disk pair.
///
/// Readers take a snapshot through [`ModelStore::current`] or
/// [`ModelStore::load_or_train`] and keep using it for as long as they hold the
/// `Arc`; a concurrent [`ModelStore::replace`] only affects later snapshots.
pub struct ModelStore {
    dir: PathBuf,
    seed: Arc<Vec<TrainingExample>>,
    params: TrainingParams,
    active: ArcSwapOption<ModelArtifact>,
    init: Mutex<()>,
    writer: Mutex<()>,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>, seed: Vec<TrainingExample>, params: TrainingParams) -> Self {
        Self {
            dir: dir.into(),
            seed: Arc::new(seed),
            params,
            active: ArcSwapOption::empty(),
            init: Mutex::new(()),
            writer: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    pub fn seed_corpus(&self) -> &[TrainingExample] {
        &self.seed
    }

    pub fn current(&self) -> Option<Arc<ModelArtifact>> {
        self.active.load_full()
    }

    /// Returns the active artifact, loading the persisted pair or training on
    /// the seed corpus the first time round. Concurrent first callers wait for
    /// a single initialisation.
    ///
    /// A pair that decodes wrongly is moved aside and replaced by a fresh fit.
    /// An I/O failure while reading is returned as [`ModelError::Read`] and
    /// leaves the files alone.
    pub async fn load_or_train(&self) -> Result<Arc<ModelArtifact>, ModelError> {
        if let Some(artifact) = self.current() {
            return Ok(artifact);
        }

        let _init = self.init.lock().await;
        if let Some(artifact) = self.current() {
            return Ok(artifact);
        }

        let dir = self.dir.clone();
        match tokio::task::spawn_blocking(move || read_pair(&dir)).await? {
            Ok(Some(artifact)) => {
                tracing::info!(
                    target: "model",
                    artifact_id = %artifact.artifact_id,
                    trained_at = %artifact.trained_at,
                    dir = %self.dir.display(),
                    "loaded model artifact from disk"
                );
                let artifact = Arc::new(artifact);
                self.active.store(Some(artifact.clone()));
                return Ok(artifact);
            }
            Ok(None) => {
                tracing::info!(
                    target: "model",
                    dir = %self.dir.display(),
                    "no model artifact on disk; training on seed corpus"
                );
            }
            Err(ModelError::Corrupt { path, reason }) => {
                tracing::warn!(
                    target: "model",
                    path = %path.display(),
                    reason = %reason,
                    "discarding unusable model artifact; training on seed corpus"
                );
                let dir = self.dir.clone();
                tokio::task::spawn_blocking(move || set_aside(&dir, &path)).await?;
            }
            Err(err) => return Err(err),
        }

        let seed = self.seed.clone();
        let params = self.params;
        let artifact = tokio::task::spawn_blocking(move || fit(&seed, &params)).await??;
        self.install(artifact).await
    }

    /// Persists `artifact` and makes it the active one. On failure nothing
    /// changes: the previous artifact stays active and its files stay intact.
    pub async fn replace(&self, artifact: ModelArtifact) -> Result<(), ModelError> {
        self.install(artifact).await.map(|_| ())
    }

    async fn install(&self, artifact: ModelArtifact) -> Result<Arc<ModelArtifact>, ModelError> {
        let _writer = self.writer.lock().await;
        let artifact = Arc::new(artifact);

        let dir = self.dir.clone();
        let pending = artifact.clone();
        tokio::task::spawn_blocking(move || write_pair(&dir, &pending)).await??;

        let previous = self.active.swap(Some(artifact.clone()));
        tracing::info!(
            target: "model",
            artifact_id = %artifact.artifact_id,
            previous = previous.as_ref().map(|a| a.artifact_id.as_str()).unwrap_or("-"),
            examples = artifact.examples,
            "model artifact activated"
        );
        Ok(artifact)
    }
}

fn read_pair(dir: &Path) -> Result<Option<ModelArtifact>, ModelError> {
    let Some(artifact_id) = read_pointer(dir)? else {
        return Ok(None);
    };
    let artifact_dir = dir.join(&artifact_id);

    let vectorizer: Option<VectorizerFile> = read_half(&artifact_dir.join(VECTORIZER_FILENAME))?;
    let classifier: Option<ClassifierFile> = read_half(&artifact_dir.join(CLASSIFIER_FILENAME))?;
    let (vectorizer, classifier) = match (vectorizer, classifier) {
        (Some(vectorizer), Some(classifier)) => (vectorizer, classifier),
        (vectorizer, classifier) => {
            tracing::warn!(
                target: "model",
                artifact_id = %artifact_id,
                has_vectorizer = vectorizer.is_some(),
                has_classifier = classifier.is_some(),
                dir = %artifact_dir.display(),
                "incomplete model artifact pair on disk; ignoring it"
            );
            return Ok(None);
        }
    };

    if vectorizer.artifact_id != artifact_id || classifier.artifact_id != artifact_id {
        return Err(ModelError::Corrupt {
            path: artifact_dir,
            reason: format!(
                "pointer names {artifact_id} but vectorizer belongs to {} and classifier to {}",
                vectorizer.artifact_id, classifier.artifact_id
            ),
        });
    }
    if vectorizer.vectorizer.dimension() != classifier.classifier.dimension() {
        return Err(ModelError::Corrupt {
            path: artifact_dir,
            reason: format!(
                "vocabulary has {} terms but classifier expects {}",
                vectorizer.vectorizer.dimension(),
                classifier.classifier.dimension()
            ),
        });
    }

    Ok(Some(ModelArtifact {
        artifact_id,
        vectorizer: vectorizer.vectorizer,
        classifier: classifier.classifier,
        trained_at: vectorizer.trained_at,
        examples: vectorizer.examples,
    }))
}

fn read_pointer(dir: &Path) -> Result<Option<String>, ModelError> {
    let path = dir.join(CURRENT_FILENAME);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ModelError::Read { path, source }),
    };
    let artifact_id = String::from_utf8(bytes)
        .map(|raw| raw.trim().to_string())
        .unwrap_or_default();
    if !is_artifact_id(&artifact_id) {
        return Err(ModelError::Corrupt {
            path,
            reason: format!("{artifact_id:?} is not an artifact id"),
        });
    }
    Ok(Some(artifact_id))
}

fn is_artifact_id(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn read_half<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ModelError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ModelError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    bincode::deserialize(&bytes)
        .map(Some)
        .map_err(|err| ModelError::Corrupt {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
}

/// Both halves are written into a staging directory, which is renamed to the
/// artifact id once complete. Rewriting [`CURRENT_FILENAME`] is the commit:
/// until it lands, readers keep resolving the previous pair.
fn write_pair(dir: &Path, artifact: &ModelArtifact) -> Result<(), ModelError> {
    if !is_artifact_id(&artifact.artifact_id) {
        return Err(ModelError::persist(dir)(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{:?} is not an artifact id", artifact.artifact_id),
        )));
    }
    fs::create_dir_all(dir).map_err(ModelError::persist(dir))?;
    let _lock = WriterLock::acquire(dir).map_err(ModelError::persist(dir))?;
    let previous = read_pointer(dir).ok().flatten();

    let stage = tempfile::Builder::new()
        .prefix(STAGE_PREFIX)
        .tempdir_in(dir)
        .map_err(ModelError::persist(dir))?;
    write_half(
        &stage.path().join(VECTORIZER_FILENAME),
        &VectorizerFile {
            artifact_id: artifact.artifact_id.clone(),
            trained_at: artifact.trained_at,
            examples: artifact.examples,
            vectorizer: artifact.vectorizer.clone(),
        },
    )?;
    write_half(
        &stage.path().join(CLASSIFIER_FILENAME),
        &ClassifierFile {
            artifact_id: artifact.artifact_id.clone(),
            classifier: artifact.classifier.clone(),
        },
    )?;

    // The stage guard stays armed: it cleans up on failure and finds nothing
    // to remove after a successful rename.
    let artifact_dir = dir.join(&artifact.artifact_id);
    fs::rename(stage.path(), &artifact_dir).map_err(ModelError::persist(&artifact_dir))?;

    if let Err(err) = commit_pointer(dir, &artifact.artifact_id) {
        if let Err(cleanup) = fs::remove_dir_all(&artifact_dir) {
            tracing::warn!(
                target: "model",
                error = %cleanup,
                dir = %artifact_dir.display(),
                "failed to remove uncommitted model artifact"
            );
        }
        return Err(err);
    }

    prune(dir, &artifact.artifact_id, previous.as_deref());
    Ok(())
}

fn write_half<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    let bytes = bincode::serialize(value).map_err(|err| ModelError::persist(path)(io::Error::other(err)))?;
    let mut file = fs::File::create(path).map_err(ModelError::persist(path))?;
    file.write_all(&bytes).map_err(ModelError::persist(path))?;
    file.sync_all().map_err(ModelError::persist(path))
}

fn commit_pointer(dir: &Path, artifact_id: &str) -> Result<(), ModelError> {
    let pointer_path = dir.join(CURRENT_FILENAME);
    let mut pointer = tempfile::Builder::new()
        .prefix(STAGE_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(ModelError::persist(dir))?;
    pointer
        .write_all(artifact_id.as_bytes())
        .map_err(ModelError::persist(pointer.path()))?;
    pointer
        .as_file()
        .sync_all()
        .map_err(ModelError::persist(pointer.path()))?;
    pointer
        .persist(&pointer_path)
        .map_err(|err| ModelError::persist(&pointer_path)(err.error))?;
    sync_dir(dir);
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(err) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::warn!(target: "model", error = %err, dir = %dir.display(), "failed to sync model directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Removes artifact directories other than the active and previous ones, and
/// leftovers of interrupted writes. Set-aside entries are kept.
fn prune(dir: &Path, active: &str, previous: Option<&str>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(target: "model", error = %err, dir = %dir.display(), "failed to list model directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == active || Some(name) == previous || name.contains(SET_ASIDE_MARKER) {
            continue;
        }

        let path = entry.path();
        let removed = if name.starts_with(STAGE_PREFIX) {
            if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            }
        } else if path.join(VECTORIZER_FILENAME).exists() || path.join(CLASSIFIER_FILENAME).exists() {
            fs::remove_dir_all(&path)
        } else {
            continue;
        };

        match removed {
            Ok(()) => tracing::debug!(target: "model", path = %path.display(), "pruned model directory entry"),
            Err(err) => tracing::warn!(
                target: "model",
                error = %err,
                path = %path.display(),
                "failed to prune model directory entry"
            ),
        }
    }
}

/// Renames the top-level entry of `dir` that contains `path` to
/// `<name>.corrupt-<nanos>`, so a retrain cannot overwrite it.
fn set_aside(dir: &Path, path: &Path) {
    let Some(entry) = path
        .strip_prefix(dir)
        .ok()
        .and_then(|relative| relative.components().next())
        .map(|first| dir.join(first))
    else {
        return;
    };

    let _lock = match WriterLock::acquire(dir) {
        Ok(lock) => lock,
        Err(err) => {
            tracing::warn!(target: "model", error = %err, "failed to lock model directory; unusable artifact left in place");
            return;
        }
    };

    let mut target = entry.clone().into_os_string();
    target.push(format!(
        "{SET_ASIDE_MARKER}{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    match fs::rename(&entry, &target) {
        Ok(()) => tracing::warn!(
            target: "model",
            from = %entry.display(),
            to = %PathBuf::from(&target).display(),
            "unusable model artifact moved aside"
        ),
        Err(err) => tracing::warn!(
            target: "model",
            error = %err,
            path = %entry.display(),
            "failed to move unusable model artifact aside"
        ),
    }
}
