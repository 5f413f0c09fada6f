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

//! Tick-driven countdown of bundles waiting to be released.

use crate::lock;
use crate::record::{BundleRecord, TtlStep};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// What a single [`UnloadQueue::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnloadTick {
    /// Ids of bundles moved to `ReadyForUnload` this tick.
    pub released: Vec<String>,
    /// Bundles still counting down after the tick.
    pub pending: usize,
}

/// Bundles in `WaitingForUnload`, in the order they were queued.
///
/// Decay is linear: each tick takes one off every countdown. Queuing a bundle
/// again does not reset its countdown.
#[derive(Debug, Default)]
pub struct UnloadQueue {
    pending: Mutex<Vec<Arc<BundleRecord>>>,
}

impl UnloadQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `bundle`. A record already queued is left where it is.
    pub fn push(&self, bundle: Arc<BundleRecord>) {
        let mut pending = lock(&self.pending);
        if pending.iter().any(|b| b.serial() == bundle.serial()) {
            return;
        }
        log::trace!(
            "Bundle '{}' queued for unload in {} tick(s).",
            bundle.id(),
            bundle.ttl()
        );
        pending.push(bundle);
    }

    /// Removes a queued record. Returns `false` if it was not queued.
    pub fn remove(&self, bundle: &BundleRecord) -> bool {
        let mut pending = lock(&self.pending);
        let before = pending.len();
        pending.retain(|b| b.serial() != bundle.serial());
        pending.len() != before
    }

    /// Whether `bundle` is queued.
    pub fn contains(&self, bundle: &BundleRecord) -> bool {
        lock(&self.pending)
            .iter()
            .any(|b| b.serial() == bundle.serial())
    }

    /// Number of queued bundles.
    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        lock(&self.pending).is_empty()
    }

    /// Advances every countdown by one scheduler tick.
    ///
    /// Bundles whose countdown reaches zero move to `ReadyForUnload` and leave
    /// the queue; bundles no longer in `WaitingForUnload` are dropped from it.
    pub fn tick(&self) -> UnloadTick {
        // Observers run during the transitions below, so the queue lock is not
        // held while ticking.
        let snapshot: Vec<_> = lock(&self.pending).clone();
        let mut leaving = HashSet::new();
        let mut released = Vec::new();

        for bundle in &snapshot {
            match bundle.tick_ttl() {
                TtlStep::Counting(_) => {}
                TtlStep::Released => {
                    log::info!("Bundle '{}' is ready for unload.", bundle.id());
                    released.push(bundle.id().to_string());
                    leaving.insert(bundle.serial());
                }
                TtlStep::Dropped(state) => {
                    log::debug!(
                        "Bundle '{}' left the unload queue in {:?}.",
                        bundle.id(),
                        state
                    );
                    leaving.insert(bundle.serial());
                }
            }
        }

        let mut pending = lock(&self.pending);
        pending.retain(|b| !leaving.contains(&b.serial()));
        UnloadTick {
            released,
            pending: pending.len(),
        }
    }
}
