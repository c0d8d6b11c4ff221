use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::OnceCell;

use crate::{
    audio::{decode, fetch, AudioAsset},
    Result, ScrubError,
};

type Slot = Arc<OnceCell<Arc<AudioAsset>>>;

/// Shared cache of decoded audio keyed by URL.
///
/// Clones share the same entries, so one store can be handed to every
/// component that needs audio. Concurrent loads of the same URL wait on a
/// single fetch; failed loads are not remembered.
#[derive(Clone, Default)]
pub struct AssetStore {
    entries: Arc<Mutex<HashMap<String, Slot>>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached asset for `url`, loading it on first use.
    pub async fn get_or_load(&self, url: &str) -> Result<Arc<AudioAsset>> {
        let slot = {
            let mut entries = self.lock()?;
            Arc::clone(entries.entry(url.to_string()).or_default())
        };

        let asset = slot
            .get_or_try_init(|| async {
                tracing::debug!(url, "loading audio asset");
                let bytes = fetch::fetch(url).await?;
                let hint = decode::extension_hint(url);
                let buffer = decode::decode(bytes, hint.as_deref())?;
                Ok::<_, ScrubError>(Arc::new(AudioAsset::new(buffer)))
            })
            .await?;

        Ok(Arc::clone(asset))
    }

    /// Registers an asset decoded elsewhere, replacing any previous entry.
    pub fn insert(&self, url: impl Into<String>, asset: Arc<AudioAsset>) -> Result<()> {
        let slot = Arc::new(OnceCell::new_with(Some(asset)));
        self.lock()?.insert(url.into(), slot);
        Ok(())
    }

    /// Returns the asset for `url` if it has finished loading.
    pub fn get(&self, url: &str) -> Option<Arc<AudioAsset>> {
        let entries = self.lock().ok()?;
        entries.get(url).and_then(|slot| slot.get().cloned())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// Number of loaded assets.
    pub fn len(&self) -> usize {
        self.lock()
            .map(|entries| entries.values().filter(|slot| slot.initialized()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Slot>>> {
        self.entries
            .lock()
            .map_err(|_| ScrubError::msg("asset store has been poisoned"))
    }
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore")
            .field("loaded", &self.len())
            .finish()
    }
}
