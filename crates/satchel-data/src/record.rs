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

//! The per-bundle state machine.

use crate::{lock, read, write};
use satchel_core::{
    AssetError, AssetResult, AttributeNode, BundleLocation, BundleSource, BundleState,
    BundleStatus, LoadedAsset,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// A listener notified synchronously on every state write of a bundle.
///
/// Observers run on whichever thread performed the transition, in registration
/// order. They may query the bundle and the indices, but must not drive
/// transitions of the bundle they are being notified about.
pub trait BundleObserver: Send + Sync {
    /// Called after every state write.
    fn on_state_change(&self, bundle: &BundleRecord);

    /// Called once, after every `on_state_change` for the entry into `Final`.
    fn on_finalized(&self, _bundle: &BundleRecord) {}
}

impl<F> BundleObserver for F
where
    F: Fn(&BundleRecord) + Send + Sync,
{
    fn on_state_change(&self, bundle: &BundleRecord) {
        self(bundle)
    }
}

struct BundleInner {
    state: BundleState,
    ttl: u32,
    assets: Option<Vec<LoadedAsset>>,
    attributes: Option<Arc<AttributeNode>>,
    failure: Option<String>,
}

/// Outcome of one unload-queue tick applied to a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TtlStep {
    /// Still counting; carries the remaining ticks.
    Counting(u32),
    /// The countdown elapsed and the bundle moved to `ReadyForUnload`.
    Released,
    /// The bundle is no longer waiting (cancelled or failed).
    Dropped(BundleState),
}

/// A bundle's identity, location and lifecycle state.
///
/// Records are shared as `Arc<BundleRecord>` between the manager, the loader
/// task and the unload queue. Every field except the identity sits behind a
/// lock, and every state write goes through [`BundleRecord::advance`],
/// [`BundleRecord::fail`] or the unload queue.
pub struct BundleRecord {
    serial: u64,
    id: String,
    location: BundleLocation,
    source: BundleSource,
    unload_ttl: u32,
    dispatched: AtomicBool,
    inner: Mutex<BundleInner>,
    observers: RwLock<Vec<Arc<dyn BundleObserver>>>,
    // Held for a whole write + notification so observers see writes in order.
    transition: Mutex<()>,
    state_tx: watch::Sender<BundleState>,
    cancel_tx: watch::Sender<bool>,
}

impl BundleRecord {
    /// Creates a record in the `Unloaded` state.
    pub fn new(
        id: impl Into<String>,
        location: BundleLocation,
        source: BundleSource,
        unload_ttl: u32,
    ) -> Self {
        let (state_tx, _) = watch::channel(BundleState::Unloaded);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            id: id.into(),
            location,
            source,
            unload_ttl,
            dispatched: AtomicBool::new(false),
            inner: Mutex::new(BundleInner {
                state: BundleState::Unloaded,
                ttl: unload_ttl,
                assets: None,
                attributes: None,
                failure: None,
            }),
            observers: RwLock::new(Vec::new()),
            transition: Mutex::new(()),
            state_tx,
            cancel_tx,
        }
    }

    /// The caller-chosen bundle identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// A process-unique number telling apart records that share an id.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Where the bundle is loaded from.
    pub fn location(&self) -> &BundleLocation {
        &self.location
    }

    /// Which loader strategy handles this bundle.
    pub fn source(&self) -> BundleSource {
        self.source
    }

    /// Claims the record for a loader task. Only the first call returns `true`.
    pub fn claim_dispatch(&self) -> bool {
        self.dispatched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The current state.
    pub fn state(&self) -> BundleState {
        lock(&self.inner).state
    }

    /// The remaining countdown. Only meaningful while `WaitingForUnload`.
    pub fn ttl(&self) -> u32 {
        lock(&self.inner).ttl
    }

    /// Whether the record reached `Final`.
    pub fn is_finalized(&self) -> bool {
        self.state() == BundleState::Final
    }

    /// The failure reason, for `Failed` records.
    pub fn failure(&self) -> Option<String> {
        lock(&self.inner).failure.clone()
    }

    /// A snapshot of the state and failure reason.
    pub fn status(&self) -> BundleStatus {
        let inner = lock(&self.inner);
        BundleStatus {
            state: inner.state,
            failure: inner.failure.clone(),
        }
    }

    /// Registers an observer. Observers added late miss earlier transitions.
    pub fn add_observer(&self, observer: Arc<dyn BundleObserver>) {
        write(&self.observers).push(observer);
    }

    /// A copy of the extracted asset array. Empty before `AssetLoading`.
    ///
    /// # Errors
    /// Returns [`AssetError::StaleReference`] once the record is terminal.
    pub fn assets(&self) -> AssetResult<Vec<LoadedAsset>> {
        let inner = lock(&self.inner);
        self.ensure_live(inner.state)?;
        Ok(inner.assets.clone().unwrap_or_default())
    }

    /// The sidecar document, if one was loaded.
    ///
    /// # Errors
    /// Returns [`AssetError::StaleReference`] once the record is terminal.
    pub fn attributes(&self) -> AssetResult<Option<Arc<AttributeNode>>> {
        let inner = lock(&self.inner);
        self.ensure_live(inner.state)?;
        Ok(inner.attributes.clone())
    }

    /// Stores the extracted assets. Only allowed while `AssetLoading`.
    pub fn set_assets(&self, assets: Vec<LoadedAsset>) -> AssetResult<()> {
        let mut inner = lock(&self.inner);
        self.ensure_state(inner.state, BundleState::AssetLoading)?;
        inner.assets = Some(assets);
        Ok(())
    }

    /// Stores the sidecar document. Only allowed while `AttributesLoading`.
    pub fn set_attributes(&self, attributes: Arc<AttributeNode>) -> AssetResult<()> {
        let mut inner = lock(&self.inner);
        self.ensure_state(inner.state, BundleState::AttributesLoading)?;
        inner.attributes = Some(attributes);
        Ok(())
    }

    /// Moves the record one step forward along the success path.
    ///
    /// `ReadyForUnload` is reserved for the unload queue and `Failed` for
    /// [`BundleRecord::fail`].
    ///
    /// # Errors
    /// [`AssetError::StaleReference`] if the record is terminal, otherwise
    /// [`AssetError::InvalidTransition`] if `next` is not the direct successor.
    pub fn advance(&self, next: BundleState) -> AssetResult<()> {
        let _ordered = lock(&self.transition);
        {
            let mut inner = lock(&self.inner);
            let reserved = matches!(next, BundleState::ReadyForUnload | BundleState::Failed);
            if reserved || !inner.state.can_advance_to(next) {
                return Err(self.rejected(inner.state, next));
            }
            inner.state = next;
            if next == BundleState::WaitingForUnload {
                inner.ttl = self.unload_ttl;
            }
            if next == BundleState::Final {
                inner.assets = None;
                inner.attributes = None;
            }
        }
        self.announce(next);
        Ok(())
    }

    /// Moves the record to `Failed`, recording why.
    ///
    /// Returns `false` if the record was already terminal.
    pub fn fail(&self, error: &AssetError) -> bool {
        let _ordered = lock(&self.transition);
        {
            let mut inner = lock(&self.inner);
            if inner.state.is_terminal() {
                return false;
            }
            inner.state = BundleState::Failed;
            inner.failure = Some(error.to_string());
            inner.assets = None;
            inner.attributes = None;
        }
        log::error!("Bundle '{}' failed: {}", self.id, error);
        self.announce(BundleState::Failed);
        true
    }

    /// Applies one unload-queue tick: decrement, and release on reaching zero.
    pub(crate) fn tick_ttl(&self) -> TtlStep {
        let _ordered = lock(&self.transition);
        {
            let mut inner = lock(&self.inner);
            if inner.state != BundleState::WaitingForUnload {
                return TtlStep::Dropped(inner.state);
            }
            inner.ttl = inner.ttl.saturating_sub(1);
            if inner.ttl > 0 {
                return TtlStep::Counting(inner.ttl);
            }
            inner.ttl = self.unload_ttl;
            inner.state = BundleState::ReadyForUnload;
        }
        self.announce(BundleState::ReadyForUnload);
        TtlStep::Released
    }

    /// A receiver that observes every state write.
    pub fn subscribe(&self) -> watch::Receiver<BundleState> {
        self.state_tx.subscribe()
    }

    /// Suspends until the record reaches `target` or a terminal state, and
    /// returns the state it stopped at.
    pub async fn wait_for_state(&self, target: BundleState) -> BundleState {
        let mut rx = self.subscribe();
        let reached = match rx
            .wait_for(|state| *state == target || state.is_terminal())
            .await
        {
            Ok(state) => *state,
            // The sender lives in `self`; this arm only runs if it was dropped.
            Err(_) => self.state(),
        };
        reached
    }

    /// Requests cancellation. The loader task fails the record at its next
    /// suspension point.
    pub fn cancel(&self) {
        if !self.cancel_tx.send_replace(true) {
            log::info!("Cancellation requested for bundle '{}'.", self.id);
        }
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Suspends until cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    fn announce(&self, next: BundleState) {
        log::debug!("Bundle '{}' -> {:?}", self.id, next);

        let observers: Vec<_> = read(&self.observers).clone();
        for observer in &observers {
            observer.on_state_change(self);
        }
        if next == BundleState::Final {
            for observer in &observers {
                observer.on_finalized(self);
            }
        }

        self.state_tx.send_replace(next);
    }

    fn ensure_live(&self, state: BundleState) -> AssetResult<()> {
        if state.is_terminal() {
            return Err(AssetError::StaleReference {
                bundle_id: self.id.clone(),
                state,
            });
        }
        Ok(())
    }

    fn ensure_state(&self, state: BundleState, required: BundleState) -> AssetResult<()> {
        self.ensure_live(state)?;
        if state != required {
            return Err(AssetError::InvalidTransition {
                bundle_id: self.id.clone(),
                from: state,
                to: required,
            });
        }
        Ok(())
    }

    fn rejected(&self, from: BundleState, to: BundleState) -> AssetError {
        if from.is_terminal() {
            AssetError::StaleReference {
                bundle_id: self.id.clone(),
                state: from,
            }
        } else {
            AssetError::InvalidTransition {
                bundle_id: self.id.clone(),
                from,
                to,
            }
        }
    }
}

impl fmt::Debug for BundleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleRecord")
            .field("id", &self.id)
            .field("serial", &self.serial)
            .field("location", &self.location)
            .field("source", &self.source)
            .field("state", &self.state())
            .finish()
    }
}
