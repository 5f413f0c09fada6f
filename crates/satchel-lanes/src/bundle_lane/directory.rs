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
use crate::asset_lane::pack::split_file_name;
use crate::asset_lane::CreatorRegistry;
use async_trait::async_trait;
use satchel_core::{
    AssetError, AssetResult, BundleSource, BundleState, LoadedAsset, SuspensionPoint,
};
use satchel_data::BundleRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Loads every file of a flat directory that a registered creator handles.
///
/// Files are visited in name order. Files whose extension has no creator are
/// skipped; a file a creator cannot decode fails the bundle.
pub struct DirectoryStrategy {
    creators: Arc<CreatorRegistry>,
}

impl DirectoryStrategy {
    /// Creates a strategy decoding files through `creators`.
    pub fn new(creators: Arc<CreatorRegistry>) -> Self {
        Self { creators }
    }
}

#[async_trait]
impl LoaderStrategy for DirectoryStrategy {
    fn source(&self) -> BundleSource {
        BundleSource::Directory
    }

    async fn load(&self, bundle: &Arc<BundleRecord>, ctx: &LaneContext) -> AssetResult<()> {
        bundle.advance(BundleState::Loading)?;

        let dir = bundle.location().to_path();
        let files = suspend(
            bundle,
            SuspensionPoint::ContainerOpen,
            ctx.io_timeout,
            blocking(bundle, move || list_files(&dir)),
        )
        .await?;

        bundle.advance(BundleState::AssetLoading)?;
        let creators = self.creators.clone();
        let assets = suspend(
            bundle,
            SuspensionPoint::AssetExtraction,
            ctx.io_timeout,
            blocking(bundle, move || decode_files(&creators, &files)),
        )
        .await?;

        settle(bundle, assets, ctx).await?;
        finalize(bundle, ctx)
    }
}

/// Runs `f` on the blocking pool.
async fn blocking<T, F>(bundle: &BundleRecord, f: F) -> AssetResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AssetResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        AssetError::io(
            bundle.location().as_str(),
            format!("blocking task failed: {e}"),
        )
    })?
}

fn list_files(dir: &Path) -> AssetResult<Vec<PathBuf>> {
    let location = dir.display().to_string();
    if !dir.is_dir() {
        return Err(AssetError::io(location, "not a directory"));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| AssetError::io(location.clone(), e))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn decode_files(creators: &CreatorRegistry, files: &[PathBuf]) -> AssetResult<Vec<LoadedAsset>> {
    let mut assets = Vec::new();
    for path in files {
        let Some((name, extension)) = split_file_name(path) else {
            continue;
        };
        if !creators.has_creator(&extension) {
            log::trace!("Skipping '{}': no creator for '.{extension}'.", path.display());
            continue;
        }
        let bytes =
            std::fs::read(path).map_err(|e| AssetError::io(path.display().to_string(), e))?;
        if let Some(asset) = creators.create(&name, &extension, &bytes) {
            assets.push(asset?);
        }
    }
    Ok(assets)
}
