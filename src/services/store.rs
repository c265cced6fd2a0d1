//! Persistent key-value state stores
//!
//! The engine persists its session under [`SESSION_KEY`] so a run survives a
//! process restart. Anything unreadable is treated as "no session".

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::StoreError,
    state::{SessionStatus, TimerSession},
};

/// Key the session record is stored under
pub const SESSION_KEY: &str = "session";

/// Narrow get/set store
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Block until every accepted `set` is durable
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-process store; forgets everything on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// JSON object file, rewritten atomically after every `set`.
///
/// Inside a tokio runtime the rewrite runs on the blocking pool and only the
/// newest document is written; `flush` writes it synchronously.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
    version: Arc<AtomicU64>,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open the store; a missing or corrupt file opens empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring corrupt state file {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(e) => {
                debug!("No state file at {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
            version: Arc::new(AtomicU64::new(0)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode the current values and claim the next write version
    fn snapshot(&self) -> Result<(u64, Vec<u8>), StoreError> {
        let values = match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        let document = serde_json::to_vec_pretty(&*values)?;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        Ok((version, document))
    }
}

fn write_atomic(path: &Path, document: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, document)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Write `document` unless a newer version was queued after it
fn write_if_latest(
    path: &Path,
    document: &[u8],
    version: u64,
    latest: &AtomicU64,
    write_lock: &Mutex<()>,
) -> Result<(), StoreError> {
    let _guard = match write_lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if latest.load(Ordering::SeqCst) != version {
        return Ok(());
    }
    write_atomic(path, document)
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self.values.lock() {
            Ok(mut values) => values.insert(key.to_string(), value.to_string()),
            Err(poisoned) => poisoned
                .into_inner()
                .insert(key.to_string(), value.to_string()),
        };
        let (version, document) = self.snapshot()?;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return write_if_latest(
                &self.path,
                &document,
                version,
                &self.version,
                &self.write_lock,
            );
        };

        let path = self.path.clone();
        let latest = Arc::clone(&self.version);
        let write_lock = Arc::clone(&self.write_lock);
        runtime.spawn_blocking(move || {
            if let Err(e) = write_if_latest(&path, &document, version, &latest, &write_lock) {
                warn!("Failed to write state file {}: {}", path.display(), e);
            }
        });
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let (version, document) = self.snapshot()?;
        write_if_latest(
            &self.path,
            &document,
            version,
            &self.version,
            &self.write_lock,
        )
    }
}

/// On-disk form of a [`TimerSession`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub status: SessionStatus,
    pub duration_ms: u64,
    pub accumulated_ms: u64,
    pub start_mono_ms: Option<u64>,
    pub start_wall_ms: Option<i64>,
    pub last_notified_boundary: Option<u64>,
    pub saved_at_wall_ms: i64,
}

impl PersistedSession {
    pub fn capture(session: &TimerSession, now_wall_ms: i64) -> Self {
        Self {
            status: session.status,
            duration_ms: session.duration_ms,
            accumulated_ms: session.accumulated_ms,
            start_mono_ms: session.start_mono_ms,
            start_wall_ms: session.start_wall_ms,
            last_notified_boundary: session.last_notified_boundary,
            saved_at_wall_ms: now_wall_ms,
        }
    }

    /// Rebuild a live session in this process.
    ///
    /// Monotonic readings from an earlier process mean nothing here, so an
    /// open segment is measured on the wall clock, folded into the
    /// accumulated time and reopened at `now_mono_ms`.
    pub fn restore(self, now_mono_ms: u64, now_wall_ms: i64) -> Option<TimerSession> {
        let valid = match self.status {
            SessionStatus::Idle => true,
            _ => self.duration_ms > 0 && self.accumulated_ms <= self.duration_ms,
        };
        if !valid {
            return None;
        }

        let mut session = TimerSession {
            status: self.status,
            duration_ms: self.duration_ms,
            accumulated_ms: self.accumulated_ms,
            start_mono_ms: None,
            start_wall_ms: None,
            last_notified_boundary: self.last_notified_boundary,
        };

        match self.status {
            SessionStatus::Running => {
                let segment_start = self.start_wall_ms?;
                let away_ms = now_wall_ms.saturating_sub(segment_start).max(0) as u64;
                session.accumulated_ms = (self.accumulated_ms + away_ms).min(self.duration_ms);
                session.start_mono_ms = Some(now_mono_ms);
                session.start_wall_ms = Some(now_wall_ms);
            }
            SessionStatus::Idle => session = TimerSession::idle(),
            SessionStatus::Paused | SessionStatus::Completed => {}
        }

        Some(session)
    }
}

/// Write the session record, logging instead of failing
pub fn save_session(store: &dyn StateStore, session: &TimerSession, now_wall_ms: i64) {
    let record = PersistedSession::capture(session, now_wall_ms);
    let result = serde_json::to_string(&record)
        .map_err(StoreError::from)
        .and_then(|json| store.set(SESSION_KEY, &json));

    if let Err(e) = result {
        warn!("Failed to persist timer session: {}", e);
    }
}

/// Read the session record; absent or corrupt records yield an idle session
pub fn load_session(store: &dyn StateStore, now_mono_ms: u64, now_wall_ms: i64) -> TimerSession {
    let Some(raw) = store.get(SESSION_KEY) else {
        return TimerSession::idle();
    };

    match serde_json::from_str::<PersistedSession>(&raw) {
        Ok(record) => record.restore(now_mono_ms, now_wall_ms).unwrap_or_else(|| {
            warn!("Persisted timer session is inconsistent, starting idle");
            TimerSession::idle()
        }),
        Err(e) => {
            warn!("Persisted timer session is unreadable ({}), starting idle", e);
            TimerSession::idle()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_session() -> TimerSession {
        TimerSession {
            status: SessionStatus::Running,
            duration_ms: 1_800_000,
            accumulated_ms: 60_000,
            start_mono_ms: Some(5_000),
            start_wall_ms: Some(1_000_000),
            last_notified_boundary: None,
        }
    }

    #[test]
    fn absent_record_is_idle() {
        let store = MemoryStore::new();
        assert_eq!(load_session(&store, 0, 0), TimerSession::idle());
    }

    #[test]
    fn corrupt_record_is_idle() {
        let store = MemoryStore::new();
        store.set(SESSION_KEY, "{not json").unwrap();
        assert_eq!(load_session(&store, 0, 0), TimerSession::idle());
    }

    #[test]
    fn inconsistent_record_is_idle() {
        let store = MemoryStore::new();
        let mut session = running_session();
        session.accumulated_ms = session.duration_ms + 1;
        save_session(&store, &session, 0);
        assert_eq!(load_session(&store, 0, 0), TimerSession::idle());
    }

    #[test]
    fn running_record_folds_time_spent_away() {
        let store = MemoryStore::new();
        save_session(&store, &running_session(), 1_000_000);

        let restored = load_session(&store, 42, 1_090_000);
        assert_eq!(restored.status, SessionStatus::Running);
        assert_eq!(restored.accumulated_ms, 150_000);
        assert_eq!(restored.start_mono_ms, Some(42));
    }

    #[test]
    fn wall_clock_going_backward_counts_as_zero() {
        let store = MemoryStore::new();
        save_session(&store, &running_session(), 1_000_000);

        let restored = load_session(&store, 0, 900_000);
        assert_eq!(restored.accumulated_ms, 60_000);
    }

    #[test]
    fn paused_record_restores_as_is() {
        let store = MemoryStore::new();
        let mut session = running_session();
        session.status = SessionStatus::Paused;
        session.start_mono_ms = None;
        session.start_wall_ms = None;
        session.last_notified_boundary = Some(0);
        save_session(&store, &session, 0);

        assert_eq!(load_session(&store, 999, 5_000_000), session);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("timer.json");

        let store = FileStore::open(&path);
        store.set("answer", "42").unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("answer").as_deref(), Some("42"));
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timer.json");
        fs::write(&path, "garbage").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get(SESSION_KEY), None);
    }

    #[tokio::test]
    async fn file_store_writes_newest_document_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timer.json");

        let store = FileStore::open(&path);
        for value in ["1", "2", "3"] {
            store.set("answer", value).unwrap();
        }
        assert_eq!(store.get("answer").as_deref(), Some("3"));

        store.flush().unwrap();
        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("answer").as_deref(), Some("3"));
    }

    #[test]
    fn stale_write_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timer.json");
        let latest = AtomicU64::new(2);
        let lock = Mutex::new(());

        write_if_latest(&path, b"{}", 1, &latest, &lock).unwrap();
        assert!(!path.exists());

        write_if_latest(&path, b"{}", 2, &latest, &lock).unwrap();
        assert!(path.exists());
    }
}
