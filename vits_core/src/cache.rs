//! Hot-reloading model cache.
//!
//! One entry per model directory, created on first use and never evicted.
//! Every `reload_period`-th lookup re-hashes the checkpoint and reloads the
//! model when the bytes changed, so an updated checkpoint is picked up
//! without restarting the server. Between checks a stale model may be served
//! for up to `reload_period - 1` requests.
//!
//! # Locking
//!
//! Entries live in per-path mutex slots inside a `DashMap`. The map is only
//! touched long enough to fetch or insert a slot; the fingerprint check,
//! reload and counter update happen under the slot's mutex. Lookups for the
//! same path serialize, lookups for different paths never wait on each other.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use dashmap::DashMap;
use tracing::{debug, error, info};

use crate::{
    checkpoint::{Checkpoint, Fingerprint, ModelLayout},
    error::ModelError,
    loader::{ModelLoader, Voice},
};

/// Lookups between two checkpoint fingerprint checks.
pub const RELOAD_PERIOD: u64 = 20;

#[derive(Debug)]
struct CacheEntry {
    fingerprint: Fingerprint,
    voice: Arc<Voice>,
    default_speaker: String,
    use_counter: u64,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// What a successful lookup hands out. Holds no lock.
#[derive(Debug, Clone)]
pub struct ModelLease {
    pub voice: Arc<Voice>,
    pub default_speaker: String,
    /// The model was (re)loaded by this lookup.
    pub loaded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loader invocations, successful or not.
    pub loads: u64,
    /// Periodic fingerprint checks on already loaded models.
    pub stale_checks: u64,
    /// Checks that found changed bytes and swapped the model.
    pub reloads: u64,
}

#[derive(Default)]
struct Counters {
    loads: AtomicU64,
    stale_checks: AtomicU64,
    reloads: AtomicU64,
}

pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    slots: DashMap<PathBuf, Slot>,
    reload_period: u64,
    loaded: AtomicUsize,
    counters: Counters,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self::with_reload_period(loader, RELOAD_PERIOD)
    }

    pub fn with_reload_period(loader: Arc<dyn ModelLoader>, reload_period: u64) -> Self {
        Self {
            loader,
            slots: DashMap::new(),
            reload_period: reload_period.max(1),
            loaded: AtomicUsize::new(0),
            counters: Counters::default(),
        }
    }

    pub fn reload_period(&self) -> u64 {
        self.reload_period
    }

    /// Return the current model for `model_dir`, loading or reloading it as needed.
    ///
    /// Fails with [`ModelError::ModelUnavailable`] when the checkpoint is
    /// missing or the model has no speakers, and with
    /// [`ModelError::ModelLoad`] when the loader rejects the files. A failed
    /// lookup leaves the entry (and its counter) as it was; a failed first
    /// load leaves no slot behind.
    pub fn get(&self, model_dir: &Path) -> Result<ModelLease, ModelError> {
        loop {
            let slot = self.slot(model_dir);
            // A panicking loader poisons the mutex, but the entry is only
            // replaced after a successful load, so its contents stay valid.
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.is_none() && !self.is_current(model_dir, &slot) {
                // dropped by a failed first load while we waited
                continue;
            }

            let result = self.lookup(model_dir, &mut guard);
            if guard.is_none() {
                self.slots.remove_if(model_dir, |_, s| Arc::ptr_eq(s, &slot));
            }
            return result;
        }
    }

    fn slot(&self, model_dir: &Path) -> Slot {
        if let Some(slot) = self.slots.get(model_dir) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(model_dir.to_path_buf()).or_default().value())
    }

    fn is_current(&self, model_dir: &Path, slot: &Slot) -> bool {
        self.slots
            .get(model_dir)
            .is_some_and(|s| Arc::ptr_eq(s.value(), slot))
    }

    fn lookup(
        &self,
        model_dir: &Path,
        slot: &mut Option<CacheEntry>,
    ) -> Result<ModelLease, ModelError> {
        let layout = ModelLayout::new(model_dir);
        let checkpoint_path = layout.checkpoint_path();
        if !checkpoint_path.exists() {
            error!("Model checkpoint not found: {}", checkpoint_path.display());
            return Err(ModelError::unavailable(
                model_dir,
                format!("checkpoint {} not found", checkpoint_path.display()),
            ));
        }
        let unreadable = |e: std::io::Error| {
            ModelError::unavailable(
                model_dir,
                format!("cannot read checkpoint {}: {e}", checkpoint_path.display()),
            )
        };

        let needs_load = match slot.as_ref() {
            None => true,
            // every `reload_period`-th lookup since the last (re)load
            Some(entry) if entry.use_counter.wrapping_add(1) % self.reload_period == 0 => {
                self.counters.stale_checks.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Lookup {} of {}, checking if the checkpoint has been updated",
                    entry.use_counter.wrapping_add(1),
                    model_dir.display()
                );
                Fingerprint::of_file(&checkpoint_path).map_err(unreadable)? != entry.fingerprint
            }
            Some(_) => false,
        };

        if needs_load {
            // The stored fingerprint is taken from the bytes actually loaded
            let checkpoint = Checkpoint::read(&checkpoint_path).map_err(unreadable)?;
            let fresh = self.load(&layout, checkpoint)?;
            match slot.replace(fresh) {
                Some(_) => {
                    self.counters.reloads.fetch_add(1, Ordering::Relaxed);
                    info!("Reloaded changed model {}", model_dir.display());
                }
                None => {
                    self.loaded.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let entry = slot
            .as_mut()
            .ok_or_else(|| ModelError::unavailable(model_dir, "model is not loaded"))?;
        entry.use_counter = entry.use_counter.wrapping_add(1);
        debug!("Model {} used {} times", model_dir.display(), entry.use_counter);

        Ok(ModelLease {
            voice: Arc::clone(&entry.voice),
            default_speaker: entry.default_speaker.clone(),
            loaded: needs_load,
        })
    }

    fn load(&self, layout: &ModelLayout, checkpoint: Checkpoint) -> Result<CacheEntry, ModelError> {
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        let voice = self.loader.load(layout, &checkpoint)?;
        let default_speaker = match voice.speakers().first() {
            Some(name) => name.to_string(),
            None => {
                error!("No speakers found in model {}", layout.root().display());
                return Err(ModelError::unavailable(layout.root(), "speaker table is empty"));
            }
        };
        Ok(CacheEntry {
            fingerprint: checkpoint.fingerprint,
            voice: Arc::new(voice),
            default_speaker,
            use_counter: 0,
        })
    }

    /// Whether a model for `model_dir` has been loaded at least once.
    pub fn contains(&self, model_dir: &Path) -> bool {
        self.with_entry(model_dir, |_| ()).is_some()
    }

    pub fn use_counter(&self, model_dir: &Path) -> Option<u64> {
        self.with_entry(model_dir, |e| e.use_counter)
    }

    pub fn fingerprint(&self, model_dir: &Path) -> Option<Fingerprint> {
        self.with_entry(model_dir, |e| e.fingerprint.clone())
    }

    /// Number of loaded models. Never waits on a model that is loading.
    pub fn len(&self) -> usize {
        self.loaded.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            loads: self.counters.loads.load(Ordering::Relaxed),
            stale_checks: self.counters.stale_checks.load(Ordering::Relaxed),
            reloads: self.counters.reloads.load(Ordering::Relaxed),
        }
    }

    // Waits for a load in progress on the same path.
    fn with_entry<T>(&self, model_dir: &Path, f: impl FnOnce(&CacheEntry) -> T) -> Option<T> {
        let slot = self.slots.get(model_dir).map(|s| Arc::clone(s.value()))?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(f)
    }
}
