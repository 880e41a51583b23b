//! Artifact ledger.
//!
//! Append-only registry of artifacts published by tasks, plus handoffs that
//! group artifacts from one role to another. Every artifact is persisted as
//! a JSON sidecar under `<workspace>/<type>s/<id>.json`; non-documentation
//! artifacts also get their raw content at `<workspace>/<type>s/<id>-<name>`.
//! File names carry the artifact id, so republishing a name never touches
//! the files of an earlier artifact.
//! Handoffs live under `<workspace>/handoffs/<id>.json` and the whole ledger
//! can be exported to and reloaded from `<workspace>/manifest.json`.

use crate::models::{
    AgentRole, Artifact, ArtifactType, Handoff, IsolationContext, Manifest, NewArtifact,
};
use crate::telemetry;
use crate::{Result, SwarmError};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{Instrument, debug, info};

/// Subdirectories created by [`ArtifactLedger::initialize`].
pub const LEDGER_SUBDIRS: [&str; 3] = ["schemas", "interfaces", "contracts"];

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Default)]
struct LedgerState {
    artifacts: HashMap<String, Artifact>,
    // publication order of artifact ids
    order: Vec<String>,
    handoffs: Vec<Handoff>,
}

impl LedgerState {
    fn insert(&mut self, artifact: Artifact) {
        if !self.artifacts.contains_key(&artifact.id) {
            self.order.push(artifact.id.clone());
        }
        self.artifacts.insert(artifact.id.clone(), artifact);
    }

    fn ordered(&self) -> impl Iterator<Item = &Artifact> {
        self.order.iter().filter_map(|id| self.artifacts.get(id))
    }
}

/// Registry of published artifacts rooted at one workspace directory.
#[derive(Debug)]
pub struct ArtifactLedger {
    workspace_path: PathBuf,
    state: RwLock<LedgerState>,
}

impl ArtifactLedger {
    /// Ledger for build `request_id` rooted at `base_path`.
    ///
    /// Isolated builds use `<base>/solutions/users/<u>/projects/<p>/builds/<b>/artifacts`,
    /// staging builds `<base>/solutions/_staging/<request_id>/artifacts`.
    pub fn new(
        base_path: impl AsRef<Path>,
        request_id: &str,
        isolation: Option<&IsolationContext>,
    ) -> Self {
        let base = base_path.as_ref();
        let workspace_path = match isolation {
            Some(ctx) => base.join(ctx.build_dir()).join("artifacts"),
            None => base
                .join("solutions")
                .join("_staging")
                .join(request_id)
                .join("artifacts"),
        };
        Self::at(workspace_path)
    }

    /// Ledger rooted at an explicit workspace directory.
    pub fn at(workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace_path: workspace_path.into(),
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    /// JSON sidecar of `artifact`.
    pub fn sidecar_path(&self, artifact: &Artifact) -> PathBuf {
        self.workspace_path
            .join(artifact.artifact_type.directory())
            .join(format!("{}.json", artifact.id))
    }

    /// Raw content file of `artifact`, for types that keep one.
    pub fn content_path(&self, artifact: &Artifact) -> Option<PathBuf> {
        artifact.artifact_type.stores_raw_content().then(|| {
            self.workspace_path
                .join(artifact.artifact_type.directory())
                .join(format!("{}-{}", artifact.id, artifact.name))
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the workspace and its standard subdirectories.
    pub async fn initialize(&self) -> Result<()> {
        for dir in LEDGER_SUBDIRS {
            create_dir(&self.workspace_path.join(dir)).await?;
        }
        debug!(workspace = %self.workspace_path.display(), "Ledger initialized");
        Ok(())
    }

    /// Persist and register a new artifact.
    ///
    /// The id is `<role>-<unix millis>-<random>`. Nothing is registered when
    /// persistence fails.
    pub async fn publish(&self, new: NewArtifact) -> Result<Artifact> {
        validate_name(&new.name)?;

        let now = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let artifact = Artifact {
            id: format!("{}-{}-{}", new.produced_by, now.timestamp_millis(), &suffix[..9]),
            artifact_type: new.artifact_type,
            name: new.name,
            path: new.path,
            content: new.content,
            metadata: new.metadata,
            produced_by: new.produced_by,
            consumed_by: new.consumed_by,
            timestamp: now,
        };

        async {
            create_dir(&self.workspace_path.join(artifact.artifact_type.directory())).await?;
            write_json(&self.sidecar_path(&artifact), &artifact).await?;
            if let Some(path) = self.content_path(&artifact) {
                write_file(&path, artifact.content.as_bytes()).await?;
            }
            Ok::<_, SwarmError>(())
        }
        .instrument(telemetry::ledger_span("publish"))
        .await?;

        self.write().insert(artifact.clone());
        telemetry::log_artifact_published(
            &artifact.id,
            artifact.artifact_type,
            &artifact.produced_by,
        );
        Ok(artifact)
    }

    /// Record a handoff over the given artifact ids.
    ///
    /// Ids that do not resolve to a published artifact are dropped.
    pub async fn create_handoff<I, S>(
        &self,
        from_role: AgentRole,
        to_role: AgentRole,
        artifact_ids: I,
        message: Option<String>,
    ) -> Result<Handoff>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let artifacts: Vec<Artifact> = {
            let state = self.read();
            artifact_ids
                .into_iter()
                .filter_map(|id| state.artifacts.get(id.as_ref()).cloned())
                .collect()
        };

        let now = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let handoff = Handoff {
            id: format!("handoff-{}-{}", now.timestamp_millis(), &suffix[..6]),
            from_role,
            to_role,
            artifacts,
            message,
            timestamp: now,
        };

        let dir = self.workspace_path.join("handoffs");
        create_dir(&dir).await?;
        write_json(&dir.join(format!("{}.json", handoff.id)), &handoff)
            .instrument(telemetry::ledger_span("handoff"))
            .await?;

        self.write().handoffs.push(handoff.clone());
        debug!(
            handoff_id = %handoff.id,
            from = %handoff.from_role,
            to = %handoff.to_role,
            artifacts = handoff.artifacts.len(),
            "Handoff recorded"
        );
        Ok(handoff)
    }

    pub fn get(&self, id: &str) -> Option<Artifact> {
        self.read().artifacts.get(id).cloned()
    }

    /// All artifacts in publication order.
    pub fn all_artifacts(&self) -> Vec<Artifact> {
        self.read().ordered().cloned().collect()
    }

    pub fn by_type(&self, artifact_type: ArtifactType) -> Vec<Artifact> {
        self.read()
            .ordered()
            .filter(|a| a.artifact_type == artifact_type)
            .cloned()
            .collect()
    }

    pub fn by_producer(&self, role: &AgentRole) -> Vec<Artifact> {
        self.read()
            .ordered()
            .filter(|a| &a.produced_by == role)
            .cloned()
            .collect()
    }

    /// Artifacts that list `role` among their consumers.
    pub fn for_consumer(&self, role: &AgentRole) -> Vec<Artifact> {
        self.read()
            .ordered()
            .filter(|a| a.is_consumed_by(role))
            .cloned()
            .collect()
    }

    pub fn handoffs(&self) -> Vec<Handoff> {
        self.read().handoffs.clone()
    }

    /// Handoffs addressed to `role`.
    pub fn handoffs_for(&self, role: &AgentRole) -> Vec<Handoff> {
        self.read()
            .handoffs
            .iter()
            .filter(|h| &h.to_role == role)
            .cloned()
            .collect()
    }

    pub fn manifest(&self) -> Manifest {
        let state = self.read();
        Manifest {
            artifacts: state.ordered().cloned().collect(),
            handoffs: state.handoffs.clone(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.workspace_path.join(MANIFEST_FILE)
    }

    /// Write every artifact and handoff to `manifest.json`.
    pub async fn export_manifest(&self) -> Result<PathBuf> {
        let manifest = self.manifest();
        let path = self.manifest_path();
        create_dir(&self.workspace_path).await?;
        write_json(&path, &manifest)
            .instrument(telemetry::ledger_span("export_manifest"))
            .await?;
        info!(
            path = %path.display(),
            artifacts = manifest.artifacts.len(),
            handoffs = manifest.handoffs.len(),
            "Manifest exported"
        );
        Ok(path)
    }

    /// Merge `manifest.json` into memory and return the number of artifacts read.
    ///
    /// A missing manifest is not an error and loads nothing. Handoffs already
    /// known by id are kept once.
    pub async fn load_from_workspace(&self) -> Result<usize> {
        let path = self.manifest_path();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No manifest to load");
                return Ok(0);
            }
            Err(e) => return Err(SwarmError::file(path.display().to_string(), e.to_string())),
        };

        let manifest: Manifest = serde_json::from_str(&raw).map_err(|e| {
            SwarmError::ledger(format!("invalid manifest {}: {}", path.display(), e))
        })?;

        let count = manifest.artifacts.len();
        let mut state = self.write();
        for artifact in manifest.artifacts {
            state.insert(artifact);
        }
        for handoff in manifest.handoffs {
            if !state.handoffs.iter().any(|h| h.id == handoff.id) {
                state.handoffs.push(handoff);
            }
        }
        info!(path = %path.display(), artifacts = count, "Manifest loaded");
        Ok(count)
    }
}

/// Artifact names are file names, never paths.
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SwarmError::ledger("invalid artifact name: empty name"));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(SwarmError::ledger(format!(
            "invalid artifact name '{}': path separators and traversal patterns are not allowed",
            name
        )));
    }
    Ok(())
}

async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| SwarmError::file(path.display().to_string(), e.to_string()))
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| SwarmError::file(path.display().to_string(), e.to_string()))
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_file(path, json.as_bytes()).await
}
