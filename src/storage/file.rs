use super::memory::StoreState;
use super::{ExpireCondition, Store, StoreError, StoreResult};
use crate::audit::ActivityEvent;
use crate::auth::Credential;
use crate::history::{CappedInsert, Interaction, NewInteraction};
use crate::session::{EndReason, Identity, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const STORE_FILE_NAME: &str = "store.json";
pub const ACTIVITY_FILE_NAME: &str = "activity.jsonl";

/// JSON-file backed store.
///
/// The whole state lives in memory. Credentials, sessions and interactions
/// are snapshotted to `<data_dir>/store.json` after each mutation; the
/// mutation is applied to a copy first, so a failed write leaves both the
/// file and the in-memory state unchanged. Each snapshot costs time in the
/// size of those collections.
///
/// Two writes skip the snapshot:
/// - activity events are kept apart from the state and appended as one
///   JSON line each to `<data_dir>/activity.jsonl`
/// - `touch_session` only updates memory; the new `last_activity` reaches
///   disk with the next snapshot or [`FileStore::flush`]
pub struct FileStore {
    path: PathBuf,
    activity_path: PathBuf,
    state: Mutex<StoreState>,
    activity: Mutex<Vec<ActivityEvent>>,
}

impl FileStore {
    /// Opens (or creates) the store in `data_dir`.
    ///
    /// A file that fails to parse is moved aside to `store.json.corrupted`
    /// and an empty store is started in its place.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        create_data_dir(data_dir).await?;
        let path = data_dir.join(STORE_FILE_NAME);
        let activity_path = data_dir.join(ACTIVITY_FILE_NAME);

        let state = match fs::read_to_string(&path).await {
            Ok(json) => match serde_json::from_str::<StoreState>(&json) {
                Ok(mut state) => {
                    state.rebuild_index();
                    info!("Loaded store from {:?}", path);
                    state
                }
                Err(e) => {
                    error!("Failed to parse store file {:?}: {}", path, e);
                    quarantine(&path).await?;
                    StoreState::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No store file at {:?}, starting empty", path);
                StoreState::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read store file: {:?}", path));
            }
        };

        let activity = load_activity(&activity_path).await?;

        Ok(Self {
            path,
            activity_path,
            state: Mutex::new(state),
            activity: Mutex::new(activity),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn activity_path(&self) -> &Path {
        &self.activity_path
    }

    /// Writes the current state, including pending touches, to disk.
    pub async fn flush(&self) -> Result<()> {
        let guard = self.state.lock().await;
        self.persist(&guard).await
    }

    /// Applies `f` to a copy of the state and, if it reports a change,
    /// persists the copy before swapping it in.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> StoreResult<(T, bool)>,
    ) -> StoreResult<T> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let (out, changed) = f(&mut next)?;

        if changed {
            self.persist(&next)
                .await
                .map_err(|e| StoreError::unavailable(format!("{:#}", e)))?;
            *guard = next;
        }
        Ok(out)
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).context("Failed to serialize store")?;
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("Failed to write store file: {:?}", tmp_path))?;

        // Set file permissions to 0600 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp_path, permissions)
                .await
                .with_context(|| format!("Failed to set permissions on: {:?}", tmp_path))?;
        }

        fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace store file: {:?}", self.path))?;

        debug!("Persisted store to {:?}", self.path);
        Ok(())
    }
}

async fn create_data_dir(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        // Set directory permissions to 0700 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o700);
            fs::set_permissions(data_dir, permissions)
                .await
                .with_context(|| format!("Failed to set permissions on: {:?}", data_dir))?;
        }

        info!("Created data directory: {:?}", data_dir);
    }
    Ok(())
}

/// Reads the activity file, skipping unparseable lines.
async fn load_activity(path: &Path) -> Result<Vec<ActivityEvent>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read activity file: {:?}", path));
        }
    };

    let mut events = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ActivityEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping bad activity line {} in {:?}: {}", number + 1, path, e),
        }
    }
    Ok(events)
}

async fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("Failed to open activity file: {:?}", path))?;
    file.write_all(line.as_bytes())
        .await
        .with_context(|| format!("Failed to append to activity file: {:?}", path))?;
    file.flush().await?;
    Ok(())
}

async fn quarantine(path: &Path) -> Result<()> {
    let corrupted_path = path.with_extension("json.corrupted");
    fs::rename(path, &corrupted_path)
        .await
        .with_context(|| format!("Failed to rename corrupted file: {:?}", path))?;

    error!(
        "Corrupted store file detected. Moved {:?} to {:?}",
        path, corrupted_path
    );
    Ok(())
}

#[async_trait]
impl Store for FileStore {
    async fn insert_credential(&self, credential: Credential) -> StoreResult<()> {
        self.mutate(|state| state.insert_credential(credential).map(|()| ((), true)))
            .await
    }

    async fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>> {
        Ok(self.state.lock().await.find_credential(username))
    }

    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        self.mutate(|state| state.insert_session(session).map(|()| ((), true)))
            .await
    }

    async fn find_active_session(&self, identity: &Identity) -> StoreResult<Option<Session>> {
        Ok(self.state.lock().await.find_active_session(identity))
    }

    async fn find_active_sessions_for_user(&self, username: &str) -> StoreResult<Vec<Session>> {
        Ok(self.state.lock().await.find_active_sessions_for_user(username))
    }

    async fn list_active_sessions(&self) -> StoreResult<Vec<Session>> {
        Ok(self.state.lock().await.list_active_sessions())
    }

    async fn session_history(&self, identity: &Identity) -> StoreResult<Vec<Session>> {
        Ok(self.state.lock().await.session_history(identity))
    }

    async fn touch_session(&self, identity: &Identity, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self.state.lock().await.touch_session(identity, at))
    }

    async fn expire_session(
        &self,
        identity: &Identity,
        condition: ExpireCondition,
        reason: EndReason,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        self.mutate(|state| {
            let expired = state.expire_session(identity, condition, reason, at);
            let changed = expired.is_some();
            Ok((expired, changed))
        })
        .await
    }

    async fn append_activity(&self, event: ActivityEvent) -> StoreResult<()> {
        let mut line = serde_json::to_string(&event)
            .map_err(|e| StoreError::unavailable(format!("Failed to encode activity: {}", e)))?;
        line.push('\n');

        let mut activity = self.activity.lock().await;
        append_line(&self.activity_path, &line)
            .await
            .map_err(|e| StoreError::unavailable(format!("{:#}", e)))?;
        activity.push(event);
        Ok(())
    }

    async fn recent_activity(&self, limit: usize) -> StoreResult<Vec<ActivityEvent>> {
        let activity = self.activity.lock().await;
        let skip = activity.len().saturating_sub(limit);
        Ok(activity[skip..].to_vec())
    }

    async fn insert_interaction(
        &self,
        interaction: NewInteraction,
        cap: NonZeroUsize,
    ) -> StoreResult<CappedInsert> {
        self.mutate(|state| Ok((state.insert_interaction(interaction, cap), true)))
            .await
    }

    async fn count_interactions(&self, username: &str) -> StoreResult<usize> {
        Ok(self.state.lock().await.count_interactions(username))
    }

    async fn recent_interactions(
        &self,
        username: &str,
        limit: usize,
    ) -> StoreResult<Vec<Interaction>> {
        Ok(self.state.lock().await.recent_interactions(username, limit))
    }
}
