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

//! Primitive types describing a bundle's lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// The lifecycle state of a bundle.
///
/// States only ever move forward along the declaration order, one step at a
/// time. `Failed` is the exception: it can be entered from any state that is
/// not already terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BundleState {
    /// Created, no load attempt yet.
    Unloaded,
    /// The loader strategy started and is waiting on I/O.
    Loading,
    /// The container is open and its assets are being extracted.
    AssetLoading,
    /// Assets are indexed and sidecar attributes are being merged.
    AttributesLoading,
    /// Fully loaded and queryable; counting down towards release.
    WaitingForUnload,
    /// The countdown elapsed; the strategy may release the container.
    ReadyForUnload,
    /// The container was released. Terminal.
    Final,
    /// The load was aborted by an I/O error, a timeout or a cancellation. Terminal.
    Failed,
}

impl BundleState {
    /// Returns `true` for `Final` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, BundleState::Final | BundleState::Failed)
    }

    /// The next state on the success path, if any.
    pub fn successor(self) -> Option<BundleState> {
        match self {
            BundleState::Unloaded => Some(BundleState::Loading),
            BundleState::Loading => Some(BundleState::AssetLoading),
            BundleState::AssetLoading => Some(BundleState::AttributesLoading),
            BundleState::AttributesLoading => Some(BundleState::WaitingForUnload),
            BundleState::WaitingForUnload => Some(BundleState::ReadyForUnload),
            BundleState::ReadyForUnload => Some(BundleState::Final),
            BundleState::Final | BundleState::Failed => None,
        }
    }

    /// Whether a record in `self` may be moved to `next`.
    pub fn can_advance_to(self, next: BundleState) -> bool {
        if next == BundleState::Failed {
            return !self.is_terminal();
        }
        self.successor() == Some(next)
    }

    /// Whether the asset array may be populated in this state.
    pub fn has_assets(self) -> bool {
        (BundleState::AssetLoading..=BundleState::Final).contains(&self)
    }

    /// Whether the attribute document may be populated in this state.
    pub fn has_attributes(self) -> bool {
        (BundleState::AttributesLoading..=BundleState::Final).contains(&self)
    }
}

/// The kind of source a bundle is loaded from. Selects the loader strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BundleSource {
    /// A packed container file opened through a [`crate::ContainerOpener`].
    Container,
    /// A flat directory of typed files.
    Directory,
}

/// Where a bundle task was suspended when it timed out or was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuspensionPoint {
    /// Waiting for the shared cache subsystem to report ready.
    CacheReady,
    /// Waiting for the container or directory to be opened.
    ContainerOpen,
    /// Waiting for asset extraction to complete.
    AssetExtraction,
    /// Waiting for the attribute sidecar to be read.
    AttributeRead,
    /// Waiting for the unload queue to release the bundle.
    UnloadWait,
}

impl Display for SuspensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SuspensionPoint::CacheReady => "waiting for the cache",
            SuspensionPoint::ContainerOpen => "opening the container",
            SuspensionPoint::AssetExtraction => "extracting assets",
            SuspensionPoint::AttributeRead => "reading the sidecar",
            SuspensionPoint::UnloadWait => "waiting for unload",
        };
        f.write_str(text)
    }
}

/// The last known status of a bundle, kept after it leaves the live index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleStatus {
    /// The state the bundle was in when sampled.
    pub state: BundleState,
    /// Why the bundle failed, for `Failed` bundles.
    pub failure: Option<String>,
}
