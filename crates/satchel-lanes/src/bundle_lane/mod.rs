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

//! Loader strategies: the per-bundle procedures that drive a record from
//! `Unloaded` to a terminal state.
//!
//! Every strategy shares the same tail once its assets are extracted:
//! publish into the index, overlay the sidecar, wait in the unload queue,
//! release, finalize. Each suspension point races the record's cancellation
//! signal, and all but the unload wait are bounded by the I/O timeout.

mod attribute_overlay;
mod container;
mod directory;

pub use attribute_overlay::{
    AttributeOverlayLane, OverlayReport, DEFAULT_ATTRIBUTE_TAG, DEFAULT_SIDECAR_EXTENSION,
};
pub use container::ContainerStrategy;
pub use directory::DirectoryStrategy;

use async_trait::async_trait;
use satchel_core::{
    AssetError, AssetResult, BundleSource, BundleState, BundleStatus, LoadedAsset, SuspensionPoint,
};
use satchel_data::{AssetIndex, BundleRecord, UnloadQueue};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// The shared services a strategy works against.
#[derive(Debug, Clone)]
pub struct LaneContext {
    /// The global asset and bundle indices.
    pub index: Arc<AssetIndex>,
    /// The TTL eviction queue.
    pub unload_queue: Arc<UnloadQueue>,
    /// The sidecar loader.
    pub overlay: AttributeOverlayLane,
    /// Limit for each bounded suspension point. `None` waits forever.
    pub io_timeout: Option<Duration>,
}

/// A procedure that loads one bundle.
#[async_trait]
pub trait LoaderStrategy: Send + Sync {
    /// The bundle source this strategy handles.
    fn source(&self) -> BundleSource;

    /// Drives `bundle` to `Final`.
    ///
    /// Returns an error if the load stopped early. The record is left in
    /// whatever state it reached; [`run_bundle`] is responsible for failing it.
    async fn load(&self, bundle: &Arc<BundleRecord>, ctx: &LaneContext) -> AssetResult<()>;
}

/// Runs `strategy` on `bundle` and moves the record to `Failed` if the load
/// stops early. Returns the record's terminal status.
pub async fn run_bundle(
    strategy: &dyn LoaderStrategy,
    bundle: &Arc<BundleRecord>,
    ctx: &LaneContext,
) -> BundleStatus {
    match strategy.load(bundle, ctx).await {
        Ok(()) => bundle.status(),
        Err(err) => {
            if !bundle.state().is_terminal() {
                ctx.unload_queue.remove(bundle);
                let status = BundleStatus {
                    state: BundleState::Failed,
                    failure: Some(err.to_string()),
                };
                ctx.index.retire(bundle, status);
                bundle.fail(&err);
            }
            bundle.status()
        }
    }
}

/// Awaits `fut`, giving up on cancellation or once `timeout` elapses.
pub(crate) async fn suspend<T, F>(
    bundle: &BundleRecord,
    point: SuspensionPoint,
    timeout: Option<Duration>,
    fut: F,
) -> AssetResult<T>
where
    F: Future<Output = AssetResult<T>>,
{
    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| AssetError::Timeout {
                    bundle_id: bundle.id().to_string(),
                    point,
                    elapsed: limit,
                })?,
            None => fut.await,
        }
    };

    tokio::select! {
        biased;
        _ = bundle.cancelled() => Err(AssetError::Cancelled {
            bundle_id: bundle.id().to_string(),
            point,
        }),
        out = bounded => out,
    }
}

/// The part of every strategy that follows extraction.
///
/// Expects `bundle` in `AssetLoading`; returns once the unload queue has moved
/// it to `ReadyForUnload`.
pub(crate) async fn settle(
    bundle: &Arc<BundleRecord>,
    assets: Vec<LoadedAsset>,
    ctx: &LaneContext,
) -> AssetResult<()> {
    let count = assets.len();
    bundle.set_assets(assets)?;
    ctx.index.publish_assets(bundle)?;
    log::debug!("Bundle '{}' published {count} asset(s).", bundle.id());

    bundle.advance(BundleState::AttributesLoading)?;
    let overlay = suspend(bundle, SuspensionPoint::AttributeRead, ctx.io_timeout, async {
        Ok(ctx.overlay.apply(bundle, &ctx.index).await)
    })
    .await;
    match overlay {
        Ok(_) => {}
        // A timed-out sidecar counts as a miss.
        Err(AssetError::Timeout { elapsed, .. }) => log::warn!(
            "Bundle '{}': sidecar not read within {elapsed:?}, continuing without attributes.",
            bundle.id()
        ),
        Err(e) => return Err(e),
    }

    bundle.advance(BundleState::WaitingForUnload)?;
    ctx.unload_queue.push(bundle.clone());

    let reached = suspend(bundle, SuspensionPoint::UnloadWait, None, async {
        Ok(bundle.wait_for_state(BundleState::ReadyForUnload).await)
    })
    .await?;
    if reached != BundleState::ReadyForUnload {
        return Err(AssetError::StaleReference {
            bundle_id: bundle.id().to_string(),
            state: reached,
        });
    }
    Ok(())
}

/// Drops the bundle from the indices and moves it to `Final`.
pub(crate) fn finalize(bundle: &BundleRecord, ctx: &LaneContext) -> AssetResult<()> {
    ctx.index.retire(
        bundle,
        BundleStatus {
            state: BundleState::Final,
            failure: None,
        },
    );
    bundle.advance(BundleState::Final)?;
    log::info!("Bundle '{}' finalized.", bundle.id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::BundleLocation;

    fn record() -> Arc<BundleRecord> {
        Arc::new(BundleRecord::new(
            "root",
            BundleLocation::new("/nowhere/root.ksp"),
            BundleSource::Directory,
            2,
        ))
    }

    fn context(timeout: Option<Duration>) -> LaneContext {
        LaneContext {
            index: Arc::new(AssetIndex::new()),
            unload_queue: Arc::new(UnloadQueue::new()),
            overlay: AttributeOverlayLane::default(),
            io_timeout: timeout,
        }
    }

    #[tokio::test]
    async fn suspend_times_out() {
        let bundle = record();
        let err = suspend(
            &bundle,
            SuspensionPoint::ContainerOpen,
            Some(Duration::from_millis(10)),
            std::future::pending::<AssetResult<()>>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AssetError::Timeout {
                point: SuspensionPoint::ContainerOpen,
                ..
            }
        ));
    }

    fn at_asset_loading() -> Arc<BundleRecord> {
        let bundle = record();
        bundle.advance(BundleState::Loading).unwrap();
        bundle.advance(BundleState::AssetLoading).unwrap();
        bundle
    }

    #[tokio::test]
    async fn cancel_interrupts_the_sidecar_read() {
        let ctx = context(None);
        let bundle = at_asset_loading();
        bundle.cancel();

        let err = settle(&bundle, Vec::new(), &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            AssetError::Cancelled {
                point: SuspensionPoint::AttributeRead,
                ..
            }
        ));
        assert_eq!(bundle.state(), BundleState::AttributesLoading);
        assert!(ctx.unload_queue.is_empty());
    }

    #[tokio::test]
    async fn sidecar_timeout_is_not_a_failure() {
        let ctx = context(Some(Duration::ZERO));
        let bundle = at_asset_loading();

        let task = {
            let (bundle, ctx) = (bundle.clone(), ctx.clone());
            tokio::spawn(async move { settle(&bundle, Vec::new(), &ctx).await })
        };
        assert_eq!(
            bundle.wait_for_state(BundleState::WaitingForUnload).await,
            BundleState::WaitingForUnload
        );
        assert!(bundle.failure().is_none());

        bundle.cancel();
        assert!(matches!(
            task.await.unwrap(),
            Err(AssetError::Cancelled {
                point: SuspensionPoint::UnloadWait,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn suspend_prefers_cancellation() {
        let bundle = record();
        bundle.cancel();
        let err = suspend(&bundle, SuspensionPoint::CacheReady, None, async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Cancelled { .. }));
    }

    struct Broken;

    #[async_trait]
    impl LoaderStrategy for Broken {
        fn source(&self) -> BundleSource {
            BundleSource::Container
        }

        async fn load(&self, bundle: &Arc<BundleRecord>, _ctx: &LaneContext) -> AssetResult<()> {
            bundle.advance(BundleState::Loading)?;
            Err(AssetError::io("file:///nowhere/root.ksp", "unreachable"))
        }
    }

    #[tokio::test]
    async fn run_bundle_fails_and_retires_the_record() {
        let ctx = context(None);
        let bundle = record();
        ctx.index.register_bundle(bundle.clone());

        let status = run_bundle(&Broken, &bundle, &ctx).await;
        assert_eq!(status.state, BundleState::Failed);
        assert!(status.failure.unwrap().contains("unreachable"));
        assert!(ctx.index.bundle("root").is_none());
        assert_eq!(
            ctx.index.bundle_status("root").unwrap().state,
            BundleState::Failed
        );
    }
}
