//! Persistent download catalogue.
//!
//! The Manager owns the items map, the state file and the waiting
//! queue. Downloads run as spawned tasks; their events flow through a
//! wrapped handler set that keeps the Item and the state file current
//! (see `wire`). All catalogue access is serialized by a read-write
//! lock; each item's active downloader sits in its own lock so stop and
//! status queries never wait on progress handlers.

mod error;
mod state;
mod validate;
mod wire;

pub use error::ManagerError;
pub use state::{decode, StateFile, StateStore, STATE_VERSION};
pub use validate::validate_resume;

use crate::checksum;
use crate::config::SdmConfig;
use crate::downloader::{
    check_destination, DownloadError, DownloadOpts, Downloader, Handlers, NoopHandlers, ResumePart,
};
use crate::http;
use crate::item::{Item, ItemState};
use crate::queue::{Priority, Queue};
use crate::router;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Per-download options accepted by `add_download`.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub file_name: Option<String>,
    /// Destination directory; defaults to the configured download dir.
    pub dir: Option<PathBuf>,
    pub priority: Priority,
    pub headers: Vec<(String, String)>,
    pub max_segments: Option<usize>,
    pub max_connections: Option<usize>,
    pub overwrite: bool,
    /// Hidden from top-level listings.
    pub children: bool,
}

pub struct Manager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    cfg: SdmConfig,
    client: reqwest::Client,
    parts_root: PathBuf,
    download_dir: PathBuf,
    store: StateStore,
    items: RwLock<BTreeMap<String, Arc<ItemState>>>,
    queue: Mutex<Queue>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    handlers: Arc<dyn Handlers>,
}

impl Manager {
    /// Opens (or creates) the state file under `state_dir` and loads the
    /// catalogue. `user_handlers` observes every download's events.
    pub fn open(
        cfg: SdmConfig,
        state_dir: PathBuf,
        user_handlers: Arc<dyn Handlers>,
    ) -> Result<Self, ManagerError> {
        let client = http::build_client(&cfg).map_err(DownloadError::Http)?;
        let parts_root = state_dir.join("downloads");
        std::fs::create_dir_all(&parts_root)?;

        let (store, loaded) = StateStore::open(&state_dir.join("items.sdm"))?;
        let items = loaded
            .items
            .into_iter()
            .map(|(hash, item)| (hash, ItemState::new(item)))
            .collect();

        let mut queue = Queue::new(cfg.max_concurrent_downloads);
        queue.restore(loaded.waiting_queue);

        let download_dir = if cfg.download_dir.is_empty() {
            std::env::current_dir()?
        } else {
            PathBuf::from(&cfg.download_dir)
        };

        Ok(Self {
            inner: Arc::new(ManagerInner {
                cfg,
                client,
                parts_root,
                download_dir,
                store,
                items: RwLock::new(items),
                queue: Mutex::new(queue),
                tasks: Mutex::new(HashMap::new()),
                handlers: user_handlers,
            }),
        })
    }

    pub fn open_default(cfg: SdmConfig, state_dir: PathBuf) -> Result<Self, ManagerError> {
        Self::open(cfg, state_dir, Arc::new(NoopHandlers))
    }

    /// Probes `url`, registers an Item and enqueues it. The download
    /// starts immediately when a concurrency slot is free. Returns the
    /// item hash.
    pub async fn add_download(&self, url: &str, opts: AddOptions) -> Result<String, ManagerError> {
        let dir = opts.dir.clone().unwrap_or_else(|| self.inner.download_dir.clone());
        let mut dopts =
            DownloadOpts::from_config(&self.inner.cfg, dir.clone(), self.inner.parts_root.clone());
        dopts.file_name = opts.file_name.clone();
        dopts.headers = opts.headers.clone();
        dopts.overwrite = opts.overwrite;
        if let Some(n) = opts.max_segments {
            dopts.max_segments = n;
        }
        if let Some(n) = opts.max_connections {
            dopts.max_connections = n;
        }

        let dl = router::downloader_for(self.inner.client.clone(), url, dopts)?;
        let probed = dl.probe().await.map_err(ManagerError::Download)?;
        let name = dl.file_name().map_err(ManagerError::Download)?;
        let absolute = dl.absolute_location().map_err(ManagerError::Download)?;
        let hash = checksum::item_hash(url, &absolute);

        if self.inner.get(&hash).is_some() {
            tracing::info!(item = %hash, "already registered");
            return Ok(hash);
        }
        check_destination(&absolute, opts.overwrite).map_err(ManagerError::Download)?;

        let item = Item {
            hash: hash.clone(),
            name,
            url: url.to_string(),
            download_location: dir,
            absolute_location: absolute,
            total_size: probed.content_length,
            downloaded: 0,
            resumable: probed.resumable,
            parts: BTreeMap::new(),
            headers: opts.headers,
            children: opts.children,
        };
        self.inner
            .items
            .write()
            .unwrap()
            .insert(hash.clone(), ItemState::new(item));

        let start_now = self.inner.queue.lock().unwrap().add(&hash, opts.priority);
        self.inner.persist(false);

        if start_now {
            self.inner.spawn_run(hash.clone(), Some(Arc::new(dl)));
        } else {
            tracing::info!(item = %hash, "queued, waiting for a slot");
        }
        Ok(hash)
    }

    /// Restarts a persisted download after integrity validation.
    pub async fn resume_download(&self, hash: &str) -> Result<(), ManagerError> {
        let state = self
            .inner
            .get(hash)
            .ok_or_else(|| ManagerError::NotFound(hash.to_string()))?;
        if state.is_downloading() {
            return Ok(());
        }
        let item = state.snapshot();
        if !item.resumable {
            return Err(ManagerError::NotResumable(hash.to_string()));
        }
        validate_resume(&item, &self.inner.parts_root.join(hash))?;

        let start_now = self
            .inner
            .queue
            .lock()
            .unwrap()
            .add(hash, Priority::Normal);
        self.inner.persist(false);
        if start_now {
            self.inner.spawn_run(hash.to_string(), None);
        }
        Ok(())
    }

    /// Cancels an active download (non-blocking) or removes a waiting
    /// one from the queue. Progress stays on disk for resume.
    pub fn stop_download(&self, hash: &str) -> Result<(), ManagerError> {
        let state = self
            .inner
            .get(hash)
            .ok_or_else(|| ManagerError::NotFound(hash.to_string()))?;
        if let Some(dl) = state.take_downloader() {
            dl.stop();
        } else {
            let mut queue = self.inner.queue.lock().unwrap();
            if !queue.is_active(hash) {
                queue.forget(hash);
            }
        }
        Ok(())
    }

    pub fn is_downloading(&self, hash: &str) -> bool {
        self.inner
            .get(hash)
            .map(|s| s.is_downloading())
            .unwrap_or(false)
    }

    /// Top-level items (children hidden).
    pub fn list(&self) -> Vec<Item> {
        self.inner
            .items
            .read()
            .unwrap()
            .values()
            .map(|s| s.snapshot())
            .filter(|i| !i.children)
            .collect()
    }

    pub fn get_item(&self, hash: &str) -> Option<Item> {
        self.inner.get(hash).map(|s| s.snapshot())
    }

    /// Awaits the spawned task for `hash`, if one is running.
    pub async fn wait(&self, hash: &str) {
        let handle = self.inner.tasks.lock().unwrap().remove(hash);
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Starts queued downloads while concurrency slots are free. Used
    /// after a restart to pick up the persisted waiting list.
    pub fn kick(&self) {
        let started = self.inner.queue.lock().unwrap().fill();
        for hash in started {
            self.inner.spawn_run(hash, None);
        }
    }

    /// Drops every item that finished (`downloaded == total_size`) or
    /// has no active downloader, and deletes their per-download
    /// directories. Only a download that is both incomplete and running
    /// survives.
    pub fn flush(&self) -> Result<(), ManagerError> {
        let removed: Vec<(String, Arc<ItemState>)> = {
            let mut items = self.inner.items.write().unwrap();
            let gone: Vec<String> = items
                .iter()
                .filter(|(_, s)| {
                    s.item.lock().unwrap().finished() || !s.is_downloading()
                })
                .map(|(h, _)| h.clone())
                .collect();
            gone.into_iter()
                .filter_map(|h| items.remove(&h).map(|s| (h, s)))
                .collect()
        };
        for (hash, _) in &removed {
            self.inner.queue.lock().unwrap().forget(hash);
            let dir = self.inner.parts_root.join(hash);
            let _ = std::fs::remove_dir_all(&dir);
            tracing::debug!(item = %hash, "flushed");
        }
        self.inner.persist(true);
        Ok(())
    }

    /// Drops one item; refuses while it is actively downloading.
    pub fn flush_one(&self, hash: &str) -> Result<(), ManagerError> {
        {
            let mut items = self.inner.items.write().unwrap();
            let state = items
                .get(hash)
                .ok_or_else(|| ManagerError::NotFound(hash.to_string()))?;
            if state.is_downloading() {
                return Err(ManagerError::FlushWhileDownloading(hash.to_string()));
            }
            items.remove(hash);
        }
        self.inner.queue.lock().unwrap().forget(hash);
        let _ = std::fs::remove_dir_all(self.inner.parts_root.join(hash));
        self.inner.persist(true);
        Ok(())
    }

    /// Stops everything and writes the catalogue durably.
    pub fn close(&self) -> Result<(), ManagerError> {
        let states: Vec<Arc<ItemState>> =
            self.inner.items.read().unwrap().values().cloned().collect();
        for state in states {
            if let Some(dl) = state.take_downloader() {
                dl.stop();
            }
        }
        self.inner.persist(true);
        Ok(())
    }

    pub fn active_count(&self) -> usize {
        self.inner.queue.lock().unwrap().active_count()
    }

    pub fn waiting_count(&self) -> usize {
        self.inner.queue.lock().unwrap().waiting_count()
    }
}

impl ManagerInner {
    fn get(&self, hash: &str) -> Option<Arc<ItemState>> {
        self.items.read().unwrap().get(hash).cloned()
    }

    /// Writes the whole catalogue through the durable-write protocol.
    /// Handlers cannot surface errors, so failures are logged.
    pub(crate) fn persist(&self, durable: bool) {
        let state = {
            let items = self.items.read().unwrap();
            let map = items
                .iter()
                .map(|(hash, s)| (hash.clone(), s.snapshot()))
                .collect();
            let waiting = self.queue.lock().unwrap().waiting().to_vec();
            StateFile {
                version: STATE_VERSION,
                items: map,
                waiting_queue: waiting,
            }
        };
        if let Err(e) = self.store.write(&state, durable) {
            tracing::warn!(error = %e, path = %self.store.path().display(), "state write failed");
        }
    }

    fn spawn_run(self: &Arc<Self>, hash: String, prebuilt: Option<Arc<Downloader>>) {
        let inner = Arc::clone(self);
        let task_hash = hash.clone();
        let handle = tokio::spawn(async move {
            inner.run_one(task_hash, prebuilt).await;
        });
        self.tasks.lock().unwrap().insert(hash, handle);
    }

    async fn run_one(self: Arc<Self>, hash: String, prebuilt: Option<Arc<Downloader>>) {
        match self.run_one_inner(&hash, prebuilt).await {
            Ok(()) => tracing::info!(item = %hash, "download finished"),
            Err(ManagerError::Download(DownloadError::Stopped)) => {
                tracing::info!(item = %hash, "download stopped")
            }
            Err(e) => tracing::warn!(item = %hash, error = %e, "download failed"),
        }

        if let Some(state) = self.get(&hash) {
            state.clear_downloader();
        }
        let next = self.queue.lock().unwrap().on_complete(&hash);
        self.persist(false);
        if let Some(next_hash) = next {
            self.spawn_run(next_hash, None);
        }
    }

    async fn run_one_inner(
        self: &Arc<Self>,
        hash: &str,
        prebuilt: Option<Arc<Downloader>>,
    ) -> Result<(), ManagerError> {
        let state = self
            .get(hash)
            .ok_or_else(|| ManagerError::NotFound(hash.to_string()))?;
        let item = state.snapshot();

        let dl = match prebuilt {
            Some(dl) => dl,
            None => {
                let mut dopts = DownloadOpts::from_config(
                    &self.cfg,
                    item.download_location.clone(),
                    self.parts_root.clone(),
                );
                dopts.file_name = Some(item.name.clone());
                dopts.headers = item.headers.clone();
                dopts.overwrite = true;
                let dl = Arc::new(router::downloader_for(
                    self.client.clone(),
                    &item.url,
                    dopts,
                )?);
                dl.probe().await.map_err(ManagerError::Download)?;
                dl
            }
        };
        state.set_downloader(Arc::clone(&dl));

        let patched: Arc<dyn Handlers> = Arc::new(wire::ItemHandlers::new(
            Arc::clone(self),
            Arc::clone(&state),
            Arc::clone(&self.handlers),
        ));

        let fresh = item.parts.is_empty() && item.downloaded == 0;
        let result = if fresh {
            dl.download(patched).await
        } else {
            let parts = item
                .parts
                .iter()
                .map(|(off, p)| {
                    (
                        *off,
                        ResumePart {
                            hash: p.hash.clone(),
                            final_offset: p.final_offset,
                            compiled: p.compiled,
                        },
                    )
                })
                .collect();
            dl.resume(parts, patched).await
        };
        result.map_err(ManagerError::Download)
    }
}
