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

//! Interface contracts for packed bundle containers.
//!
//! The on-disk container format is owned by an external packaging tool. The
//! container strategy only ever talks to it through these traits.

use crate::asset::LoadedAsset;
use crate::error::AssetResult;
use async_trait::async_trait;
use tokio::sync::watch;

/// Opens containers from a `file://` locator.
#[async_trait]
pub trait ContainerOpener: Send + Sync {
    /// Opens the container at `locator`.
    ///
    /// # Errors
    /// Returns [`crate::AssetError::Io`] if the container cannot be reached or read.
    async fn open(&self, locator: &str) -> AssetResult<Box<dyn BundleContainer>>;
}

/// An open container handle.
#[async_trait]
pub trait BundleContainer: Send + Sync {
    /// Extracts every asset stored in the container.
    async fn extract_all(&self) -> AssetResult<Vec<LoadedAsset>>;

    /// Releases the underlying handle. Dropping the container releases it too.
    fn release(self: Box<Self>);
}

/// The shared "cache subsystem ready" flag every container load waits on.
///
/// Cloning a gate yields another view of the same flag.
#[derive(Debug, Clone)]
pub struct CacheGate {
    ready: watch::Sender<bool>,
}

impl CacheGate {
    /// Creates a gate in the given initial state.
    pub fn new(ready: bool) -> Self {
        let (ready, _) = watch::channel(ready);
        Self { ready }
    }

    /// Opens the gate, resuming every waiting load.
    pub fn set_ready(&self) {
        log::info!("Bundle cache reported ready.");
        self.ready.send_replace(true);
    }

    /// Closes the gate. Loads already past it are unaffected.
    pub fn set_not_ready(&self) {
        self.ready.send_replace(false);
    }

    /// Whether the gate is currently open.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Suspends until the gate is open.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for CacheGate {
    fn default() -> Self {
        Self::new(true)
    }
}
