use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Registry of object-reference handles for playable artifacts.
///
/// Each registered payload gets a unique `blob:` URL that external players
/// resolve until it is revoked.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    entries: Arc<Mutex<HashMap<String, Arc<[u8]>>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, data: Arc<[u8]>) -> String {
        let url = format!("blob:voice-memo/{}", Uuid::new_v4());
        debug!("Registered {} ({} bytes)", url, data.len());
        self.lock().insert(url.clone(), data);
        url
    }

    /// Release a handle. Returns false if it was unknown or already revoked.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.lock().remove(url).is_some();
        if removed {
            debug!("Revoked {}", url);
        }
        removed
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.lock().get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<[u8]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
