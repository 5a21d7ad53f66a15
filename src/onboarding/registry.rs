//! Live onboarding sessions, keyed by ID.
//!
//! Sessions idle for longer than the registry's TTL are dropped, either
//! when next looked up or by the periodic sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::session::OnboardingSession;

/// Idle time after which a session is discarded.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// How often the background sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    handle: Arc<Mutex<OnboardingSession>>,
    last_seen: Instant,
}

/// Owns every open [`OnboardingSession`].
///
/// Each session sits behind its own mutex, so a slow store append for one
/// user never blocks another user's wizard.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_ttl(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            ttl,
            ..Self::default()
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry.last_seen.elapsed() > self.ttl
    }

    /// Start a new session on step 1.
    pub async fn create(&self) -> (Uuid, Arc<Mutex<OnboardingSession>>) {
        let session = OnboardingSession::new();
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| !self.is_expired(entry));
        sessions.insert(
            id,
            Entry {
                handle: Arc::clone(&handle),
                last_seen: Instant::now(),
            },
        );
        (id, handle)
    }

    /// Look up a live session and mark it as used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<OnboardingSession>>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        if self.is_expired(entry) {
            sessions.remove(&id);
            debug!(session = %id, "Onboarding session expired");
            return None;
        }
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.handle))
    }

    /// Drop a session. Returns false if it did not exist or had expired.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions
            .write()
            .await
            .remove(&id)
            .is_some_and(|entry| !self.is_expired(&entry))
    }

    /// Drop every idle session. Returns how many were removed.
    pub async fn expire_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Expired idle onboarding sessions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Spawn a background task that drops idle sessions every minute.
pub fn spawn_expiry_task(registry: Arc<SessionRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            registry.expire_idle().await;
        }
    })
}
