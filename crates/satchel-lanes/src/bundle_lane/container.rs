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

use super::{finalize, settle, suspend, LaneContext, LoaderStrategy};
use async_trait::async_trait;
use satchel_core::{AssetResult, BundleSource, BundleState, CacheGate, ContainerOpener, SuspensionPoint};
use satchel_data::BundleRecord;
use std::sync::Arc;

/// Loads bundles packed into a single container file.
///
/// The bundle stays `Unloaded` until the shared [`CacheGate`] is open; no I/O
/// is attempted before that.
pub struct ContainerStrategy {
    opener: Arc<dyn ContainerOpener>,
    cache: CacheGate,
}

impl ContainerStrategy {
    /// Creates a strategy opening containers through `opener`.
    pub fn new(opener: Arc<dyn ContainerOpener>, cache: CacheGate) -> Self {
        Self { opener, cache }
    }
}

#[async_trait]
impl LoaderStrategy for ContainerStrategy {
    fn source(&self) -> BundleSource {
        BundleSource::Container
    }

    async fn load(&self, bundle: &Arc<BundleRecord>, ctx: &LaneContext) -> AssetResult<()> {
        if !self.cache.is_ready() {
            log::debug!("Bundle '{}' waiting for the cache.", bundle.id());
        }
        suspend(bundle, SuspensionPoint::CacheReady, ctx.io_timeout, async {
            self.cache.wait_ready().await;
            Ok(())
        })
        .await?;

        bundle.advance(BundleState::Loading)?;

        let locator = bundle.location().locator();
        let container = suspend(
            bundle,
            SuspensionPoint::ContainerOpen,
            ctx.io_timeout,
            self.opener.open(&locator),
        )
        .await?;

        bundle.advance(BundleState::AssetLoading)?;
        let assets = suspend(
            bundle,
            SuspensionPoint::AssetExtraction,
            ctx.io_timeout,
            container.extract_all(),
        )
        .await?;

        settle(bundle, assets, ctx).await?;

        container.release();
        finalize(bundle, ctx)
    }
}
