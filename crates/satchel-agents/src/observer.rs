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

//! An observer that forwards bundle transitions over a channel.

use crossbeam_channel::{unbounded, Receiver, Sender};
use satchel_core::BundleState;
use satchel_data::{BundleObserver, BundleRecord};

/// One observed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEvent {
    /// The bundle's id.
    pub bundle_id: String,
    /// The state the bundle entered.
    pub state: BundleState,
    /// `true` for the extra event sent after the entry into `Final`.
    pub finalized: bool,
}

/// Sends a [`BundleEvent`] for every transition of the bundles it observes.
///
/// A disconnected receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<BundleEvent>,
}

impl ChannelObserver {
    /// Creates an observer and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<BundleEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    /// Wraps an existing sender.
    pub fn with_sender(sender: Sender<BundleEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, bundle: &BundleRecord, finalized: bool) {
        let _ = self.sender.send(BundleEvent {
            bundle_id: bundle.id().to_string(),
            state: bundle.state(),
            finalized,
        });
    }
}

impl BundleObserver for ChannelObserver {
    fn on_state_change(&self, bundle: &BundleRecord) {
        self.send(bundle, false);
    }

    fn on_finalized(&self, bundle: &BundleRecord) {
        self.send(bundle, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::{BundleLocation, BundleSource};
    use std::sync::Arc;

    #[test]
    fn forwards_transitions() {
        let (observer, events) = ChannelObserver::new();
        let bundle = BundleRecord::new(
            "root",
            BundleLocation::new("/x"),
            BundleSource::Directory,
            1,
        );
        bundle.add_observer(Arc::new(observer));
        bundle.advance(BundleState::Loading).unwrap();
        bundle.advance(BundleState::AssetLoading).unwrap();

        let states: Vec<_> = events.try_iter().map(|e| e.state).collect();
        assert_eq!(states, vec![BundleState::Loading, BundleState::AssetLoading]);
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (observer, events) = ChannelObserver::new();
        drop(events);
        let bundle = BundleRecord::new("b", BundleLocation::new("/x"), BundleSource::Directory, 1);
        bundle.add_observer(Arc::new(observer));
        bundle.advance(BundleState::Loading).unwrap();
    }
}
