// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The AssetManager owns the indices and dispatches one task per bundle.

use crate::config::AssetManagerConfig;
use satchel_core::{
    Asset, AssetError, AssetHandle, AssetResult, BundleSource, BundleState, BundleStatus,
    CacheGate, ContainerOpener, ModPaths, Stopwatch,
};
use satchel_data::{AssetIndex, AssetRecord, BundleObserver, BundleRecord, UnloadQueue, UnloadTick};
use satchel_lanes::{
    run_bundle, AssetLoaderLane, AttributeOverlayLane, ContainerStrategy, CreatorRegistry,
    DirectoryStrategy, LaneContext, LoaderStrategy, PackArchiveOpener,
};
use satchel_telemetry::{CounterHandle, GaugeHandle, HistogramHandle, MetricsRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct ManagerMetrics {
    requested: CounterHandle,
    finalized: CounterHandle,
    failed: CounterHandle,
    unload_queue_depth: GaugeHandle,
    load_time_ms: HistogramHandle,
}

impl ManagerMetrics {
    fn new(registry: &MetricsRegistry) -> Self {
        Self {
            requested: registry.register_counter("bundles", "requested", "Bundles requested"),
            finalized: registry.register_counter("bundles", "finalized", "Bundles that reached Final"),
            failed: registry.register_counter("bundles", "failed", "Bundles that failed"),
            unload_queue_depth: registry.register_gauge(
                "bundles",
                "unload_queue_depth",
                "Bundles counting down to release",
                "bundles",
            ),
            load_time_ms: registry.register_histogram(
                "bundles",
                "load_time",
                "Time from dispatch to WaitingForUnload",
                "ms",
                vec![5.0, 16.0, 50.0, 100.0, 500.0, 2000.0],
            ),
        }
    }

    fn record_outcome(&self, status: &BundleStatus) {
        let counter = match status.state {
            BundleState::Final => &self.finalized,
            BundleState::Failed => &self.failed,
            _ => return,
        };
        if let Err(e) = counter.increment() {
            log::warn!("Failed to record bundle outcome: {e}");
        }
    }
}

/// Records the time a bundle took to become queryable.
struct LoadClock {
    started: Mutex<Option<Stopwatch>>,
    histogram: HistogramHandle,
}

impl BundleObserver for LoadClock {
    fn on_state_change(&self, bundle: &BundleRecord) {
        if bundle.state() != BundleState::WaitingForUnload {
            return;
        }
        let started = self
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ms) = started.and_then(|s| s.elapsed_secs_f64()).map(|s| s * 1000.0) {
            if let Err(e) = self.histogram.observe(ms) {
                log::warn!("Failed to record load time: {e}");
            }
        }
    }
}

struct InFlight {
    bundle: Arc<BundleRecord>,
    task: JoinHandle<()>,
}

/// The façade over bundle loading, querying and eviction.
///
/// An `AssetManager` is an ordinary owned value: construct it inside a tokio
/// runtime, share it by reference, and call [`AssetManager::tick`] once per
/// simulation step to drive TTL eviction.
pub struct AssetManager {
    config: AssetManagerConfig,
    index: Arc<AssetIndex>,
    unload_queue: Arc<UnloadQueue>,
    cache: CacheGate,
    creators: Arc<CreatorRegistry>,
    strategies: HashMap<BundleSource, Arc<dyn LoaderStrategy>>,
    lane_context: LaneContext,
    runtime: Handle,
    in_flight: Mutex<Vec<InFlight>>,
    metrics_registry: MetricsRegistry,
    metrics: ManagerMetrics,
}

impl AssetManager {
    /// Creates a manager on the current tokio runtime, with the stock creators
    /// and the pack archive as container format.
    ///
    /// # Errors
    /// [`AssetError::Configuration`] when called outside a tokio runtime.
    pub fn new(config: AssetManagerConfig) -> AssetResult<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            AssetError::Configuration(format!("AssetManager needs a tokio runtime: {e}"))
        })?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Creates a manager spawning its bundle tasks on `runtime`.
    pub fn with_runtime(config: AssetManagerConfig, runtime: Handle) -> Self {
        let metrics_registry = MetricsRegistry::new();
        let creators = Arc::new(CreatorRegistry::with_default_creators(&metrics_registry));
        let cache = CacheGate::new(config.cache_ready_at_start);
        let index = Arc::new(AssetIndex::new());
        let unload_queue = Arc::new(UnloadQueue::new());
        let lane_context = LaneContext {
            index: index.clone(),
            unload_queue: unload_queue.clone(),
            overlay: AttributeOverlayLane::new(
                config.sidecar_extension.clone(),
                config.attribute_tag.clone(),
            ),
            io_timeout: config.io_timeout(),
        };

        let mut manager = Self {
            metrics: ManagerMetrics::new(&metrics_registry),
            config,
            index,
            unload_queue,
            cache,
            creators,
            strategies: HashMap::new(),
            lane_context,
            runtime,
            in_flight: Mutex::new(Vec::new()),
            metrics_registry,
        };

        let opener = Arc::new(PackArchiveOpener::new(manager.creators.clone()));
        manager.set_container_opener(opener);
        manager.register_strategy(Arc::new(DirectoryStrategy::new(manager.creators.clone())));
        manager
    }

    /// Replaces the container format used by the container strategy.
    pub fn set_container_opener(&mut self, opener: Arc<dyn ContainerOpener>) {
        self.register_strategy(Arc::new(ContainerStrategy::new(opener, self.cache.clone())));
    }

    /// Registers the strategy for its [`BundleSource`], replacing any previous one.
    pub fn register_strategy(&mut self, strategy: Arc<dyn LoaderStrategy>) {
        self.strategies.insert(strategy.source(), strategy);
    }

    /// Registers a creator for the given file extensions.
    pub fn register_creator<A: Asset>(
        &self,
        extensions: &[&str],
        loader: impl AssetLoaderLane<A> + Send + Sync + 'static,
    ) {
        self.creators.register(extensions, loader);
    }

    /// Builds a bundle record and registers it under `bundle_id`, without
    /// starting it. Observers can be attached before [`AssetManager::dispatch`].
    ///
    /// Registering an id that is already live replaces the index entry; the
    /// previous record keeps running unindexed.
    ///
    /// # Errors
    /// [`AssetError::Configuration`] for an empty id or filename.
    pub fn create_bundle(
        &self,
        paths: &ModPaths,
        filename: &str,
        bundle_id: &str,
        source: BundleSource,
    ) -> AssetResult<Arc<BundleRecord>> {
        if bundle_id.trim().is_empty() {
            return Err(AssetError::Configuration("bundle id is empty".into()));
        }
        let location = paths.bundle_location(filename)?;
        let bundle = Arc::new(BundleRecord::new(
            bundle_id,
            location,
            source,
            self.config.unload_ttl_ticks,
        ));
        self.index.register_bundle(bundle.clone());
        if let Err(e) = self.metrics.requested.increment() {
            log::warn!("Failed to count bundle request: {e}");
        }
        log::info!(
            "Bundle '{}' created at '{}' ({:?}).",
            bundle.id(),
            bundle.location(),
            source
        );
        Ok(bundle)
    }

    /// Starts loading `bundle` in the background and returns immediately.
    ///
    /// # Errors
    /// [`AssetError::InvalidTransition`] if the bundle was already dispatched,
    /// [`AssetError::Configuration`] if no strategy handles its source.
    pub fn dispatch(&self, bundle: &Arc<BundleRecord>) -> AssetResult<()> {
        let strategy = self
            .strategies
            .get(&bundle.source())
            .cloned()
            .ok_or_else(|| {
                AssetError::Configuration(format!(
                    "no loader strategy registered for {:?}",
                    bundle.source()
                ))
            })?;

        // The task may not have left `Unloaded` yet, so the state alone
        // cannot tell a second dispatch apart.
        let state = bundle.state();
        if state != BundleState::Unloaded || !bundle.claim_dispatch() {
            return Err(AssetError::InvalidTransition {
                bundle_id: bundle.id().to_string(),
                from: state,
                to: BundleState::Loading,
            });
        }

        bundle.add_observer(Arc::new(LoadClock {
            started: Mutex::new(Some(Stopwatch::new())),
            histogram: self.metrics.load_time_ms.clone(),
        }));

        let ctx = self.lane_context.clone();
        let metrics = self.metrics.clone();
        let record = bundle.clone();
        let task = self.runtime.spawn(async move {
            let status = run_bundle(strategy.as_ref(), &record, &ctx).await;
            metrics.record_outcome(&status);
        });

        self.lock_in_flight().push(InFlight {
            bundle: bundle.clone(),
            task,
        });
        Ok(())
    }

    /// Creates a bundle, attaches `observer` and dispatches it.
    ///
    /// Returns the not-yet-loaded record immediately.
    pub fn load_bundle(
        &self,
        paths: &ModPaths,
        filename: &str,
        bundle_id: &str,
        source: BundleSource,
        observer: Option<Arc<dyn BundleObserver>>,
    ) -> AssetResult<Arc<BundleRecord>> {
        let bundle = self.create_bundle(paths, filename, bundle_id, source)?;
        if let Some(observer) = observer {
            bundle.add_observer(observer);
        }
        self.dispatch(&bundle)?;
        Ok(bundle)
    }

    /// Snapshot of every indexed asset of type `T`, optionally restricted to
    /// one bundle. An unknown bundle id yields an empty map.
    ///
    /// # Errors
    /// [`AssetError::StaleReference`] if the bundle already reached a terminal state.
    pub fn get_assets_of_type<T: Asset>(
        &self,
        bundle_id: Option<&str>,
    ) -> AssetResult<HashMap<String, AssetRecord>> {
        self.index.assets_of_type::<T>(bundle_id)
    }

    /// Typed view of one bundle's own asset array.
    ///
    /// # Errors
    /// [`AssetError::StaleReference`] if the bundle already reached a terminal state.
    pub fn get_raw_assets_of_type_bundled_in<T: Asset>(
        &self,
        bundle_id: &str,
    ) -> AssetResult<HashMap<String, AssetHandle<T>>> {
        self.index.raw_assets_of_type_bundled_in::<T>(bundle_id)
    }

    /// Advances the unload queue by one simulation step.
    pub fn tick(&self) -> UnloadTick {
        let outcome = self.unload_queue.tick();
        if let Err(e) = self
            .metrics
            .unload_queue_depth
            .set(outcome.pending as f64)
        {
            log::warn!("Failed to record unload queue depth: {e}");
        }
        self.lock_in_flight().retain(|f| !f.task.is_finished());
        outcome
    }

    /// Requests cancellation of the live bundle registered under `bundle_id`.
    ///
    /// Returns `false` if no such bundle is live.
    pub fn cancel(&self, bundle_id: &str) -> bool {
        match self.index.bundle(bundle_id) {
            Some(bundle) => {
                bundle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every in-flight bundle and waits for their tasks to end.
    pub async fn shutdown(&self) {
        let in_flight = std::mem::take(&mut *self.lock_in_flight());
        log::info!("Shutting down {} bundle task(s).", in_flight.len());
        for entry in &in_flight {
            entry.bundle.cancel();
        }
        for entry in in_flight {
            if let Err(e) = entry.task.await {
                log::error!("Bundle task '{}' ended abnormally: {e}", entry.bundle.id());
            }
        }
    }

    /// The live record registered under `bundle_id`.
    pub fn bundle(&self, bundle_id: &str) -> Option<Arc<BundleRecord>> {
        self.index.bundle(bundle_id)
    }

    /// The status of a live bundle, or the last status of a retired one.
    pub fn bundle_status(&self, bundle_id: &str) -> Option<BundleStatus> {
        self.index.bundle_status(bundle_id)
    }

    /// Number of bundles counting down in the unload queue.
    pub fn pending_unloads(&self) -> usize {
        self.unload_queue.len()
    }

    /// Number of dispatched bundle tasks that have not ended yet.
    pub fn in_flight(&self) -> usize {
        self.lock_in_flight()
            .iter()
            .filter(|f| !f.task.is_finished())
            .count()
    }

    /// The shared "cache ready" gate container loads wait on.
    pub fn cache_gate(&self) -> &CacheGate {
        &self.cache
    }

    /// The global indices.
    pub fn index(&self) -> &Arc<AssetIndex> {
        &self.index
    }

    /// The manager's metrics.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics_registry
    }

    /// The configuration the manager was built with.
    pub fn config(&self) -> &AssetManagerConfig {
        &self.config
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Vec<InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManager")
            .field("config", &self.config)
            .field("live_bundles", &self.index.live_bundles().len())
            .field("indexed_assets", &self.index.asset_count())
            .field("unload_queue", &self.unload_queue.len())
            .finish()
    }
}
