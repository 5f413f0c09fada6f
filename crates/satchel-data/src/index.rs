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

//! The global asset and bundle indices, with typed snapshot queries.

use crate::record::BundleRecord;
use crate::{read, write};
use satchel_core::{
    Asset, AssetError, AssetHandle, AssetResult, AttributeNode, BundleStatus, LoadedAsset,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// One extracted asset, as seen by the global index.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    bundle_id: String,
    bundle_serial: u64,
    asset: LoadedAsset,
    attributes: Option<Arc<AttributeNode>>,
}

impl AssetRecord {
    fn new(bundle: &BundleRecord, asset: LoadedAsset) -> Self {
        Self {
            bundle_id: bundle.id().to_string(),
            bundle_serial: bundle.serial(),
            asset,
            attributes: None,
        }
    }

    /// The id of the bundle that produced this asset. A lookup key only.
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    /// The asset's name.
    pub fn name(&self) -> &str {
        self.asset.name()
    }

    /// The untyped asset.
    pub fn asset(&self) -> &LoadedAsset {
        &self.asset
    }

    /// A typed handle, if the asset is an `A`.
    pub fn downcast<A: Asset>(&self) -> Option<AssetHandle<A>> {
        self.asset.downcast()
    }

    /// The sidecar sub-document merged onto this asset, if any.
    pub fn attributes(&self) -> Option<&AttributeNode> {
        self.attributes.as_deref()
    }
}

/// Owns the name → asset and id → bundle mappings.
///
/// Both mappings are last-writer-wins. Bundles leave the live mapping when they
/// reach a terminal state; their last status stays queryable afterwards.
#[derive(Debug, Default)]
pub struct AssetIndex {
    assets_by_name: RwLock<HashMap<String, AssetRecord>>,
    bundles_by_id: RwLock<HashMap<String, Arc<BundleRecord>>>,
    retired: RwLock<HashMap<String, BundleStatus>>,
}

impl AssetIndex {
    /// Creates empty indices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bundle` under its id, returning the record it replaced.
    pub fn register_bundle(&self, bundle: Arc<BundleRecord>) -> Option<Arc<BundleRecord>> {
        write(&self.retired).remove(bundle.id());
        let replaced = write(&self.bundles_by_id).insert(bundle.id().to_string(), bundle);
        if let Some(previous) = &replaced {
            log::warn!(
                "Bundle id '{}' re-registered; the previous instance ({:?}) keeps running unindexed.",
                previous.id(),
                previous.state()
            );
        }
        replaced
    }

    /// The live record registered under `bundle_id`.
    pub fn bundle(&self, bundle_id: &str) -> Option<Arc<BundleRecord>> {
        read(&self.bundles_by_id).get(bundle_id).cloned()
    }

    /// Every live record.
    pub fn live_bundles(&self) -> Vec<Arc<BundleRecord>> {
        read(&self.bundles_by_id).values().cloned().collect()
    }

    /// The current status of a live bundle, or the last status of a retired one.
    pub fn bundle_status(&self, bundle_id: &str) -> Option<BundleStatus> {
        if let Some(bundle) = self.bundle(bundle_id) {
            return Some(bundle.status());
        }
        read(&self.retired).get(bundle_id).cloned()
    }

    /// Inserts every asset of `bundle` into the name index.
    ///
    /// Returns the number of assets published.
    pub fn publish_assets(&self, bundle: &BundleRecord) -> AssetResult<usize> {
        let assets = bundle.assets()?;
        let mut by_name = write(&self.assets_by_name);
        for asset in &assets {
            let record = AssetRecord::new(bundle, asset.clone());
            if let Some(previous) = by_name.insert(asset.name().to_string(), record) {
                if previous.bundle_id != bundle.id() {
                    log::debug!(
                        "Asset '{}' from bundle '{}' shadows the one from '{}'.",
                        asset.name(),
                        bundle.id(),
                        previous.bundle_id
                    );
                }
            }
        }
        Ok(assets.len())
    }

    /// Attaches a sidecar sub-document to the asset called `name`.
    ///
    /// Returns `false` if no such asset is indexed.
    pub fn attach_attributes(&self, name: &str, attributes: Arc<AttributeNode>) -> bool {
        match write(&self.assets_by_name).get_mut(name) {
            Some(record) => {
                record.attributes = Some(attributes);
                true
            }
            None => false,
        }
    }

    /// A copy of the record indexed under `name`.
    pub fn asset(&self, name: &str) -> Option<AssetRecord> {
        read(&self.assets_by_name).get(name).cloned()
    }

    /// Number of indexed assets.
    pub fn asset_count(&self) -> usize {
        read(&self.assets_by_name).len()
    }

    /// Snapshot of every indexed asset of type `A`, optionally restricted to
    /// one bundle. Assets of other types are skipped.
    ///
    /// An unknown `bundle_id` yields an empty map.
    ///
    /// # Errors
    /// Returns [`AssetError::StaleReference`] if `bundle_id` names a bundle that
    /// already reached a terminal state.
    pub fn assets_of_type<A: Asset>(
        &self,
        bundle_id: Option<&str>,
    ) -> AssetResult<HashMap<String, AssetRecord>> {
        if let Some(id) = bundle_id {
            self.ensure_not_retired(id)?;
        }
        Ok(read(&self.assets_by_name)
            .iter()
            .filter(|(_, record)| record.asset.is::<A>())
            .filter(|(_, record)| bundle_id.map_or(true, |id| record.bundle_id == id))
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect())
    }

    /// Typed view of one bundle's own asset array, before or after it was
    /// merged into the name index.
    ///
    /// # Errors
    /// Returns [`AssetError::StaleReference`] if the bundle is terminal.
    pub fn raw_assets_of_type_bundled_in<A: Asset>(
        &self,
        bundle_id: &str,
    ) -> AssetResult<HashMap<String, AssetHandle<A>>> {
        let Some(bundle) = self.bundle(bundle_id) else {
            self.ensure_not_retired(bundle_id)?;
            return Ok(HashMap::new());
        };
        Ok(bundle
            .assets()?
            .iter()
            .filter_map(|asset| asset.downcast::<A>().map(|h| (asset.name().to_string(), h)))
            .collect())
    }

    /// Removes `bundle` from the indices and remembers `status` as its last.
    ///
    /// Only assets this very record published are removed, and the id mapping
    /// is only dropped if it still points at this record. Returns the number of
    /// assets removed.
    pub fn retire(&self, bundle: &BundleRecord, status: BundleStatus) -> usize {
        let removed = {
            let mut by_name = write(&self.assets_by_name);
            let before = by_name.len();
            by_name.retain(|_, record| record.bundle_serial != bundle.serial());
            before - by_name.len()
        };

        {
            let mut by_id = write(&self.bundles_by_id);
            let is_current = by_id
                .get(bundle.id())
                .is_some_and(|current| current.serial() == bundle.serial());
            if is_current {
                by_id.remove(bundle.id());
                write(&self.retired).insert(bundle.id().to_string(), status);
            }
        }

        log::debug!(
            "Retired bundle '{}' and {} indexed asset(s).",
            bundle.id(),
            removed
        );
        removed
    }

    fn ensure_not_retired(&self, bundle_id: &str) -> AssetResult<()> {
        if read(&self.bundles_by_id).contains_key(bundle_id) {
            return Ok(());
        }
        match read(&self.retired).get(bundle_id) {
            Some(status) => Err(AssetError::StaleReference {
                bundle_id: bundle_id.to_string(),
                state: status.state,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::{BundleLocation, BundleSource, BundleState, ShaderSource, Texture};

    fn texture() -> Texture {
        Texture {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        }
    }

    fn shader(name: &str) -> ShaderSource {
        ShaderSource::new(format!("// {name}\nvoid main() {{}}"))
    }

    fn loaded_bundle(id: &str, assets: Vec<LoadedAsset>) -> Arc<BundleRecord> {
        let bundle = Arc::new(BundleRecord::new(
            id,
            BundleLocation::new(format!("/p/{id}")),
            BundleSource::Container,
            30,
        ));
        bundle.advance(BundleState::Loading).unwrap();
        bundle.advance(BundleState::AssetLoading).unwrap();
        bundle.set_assets(assets).unwrap();
        bundle
    }

    fn status(state: BundleState) -> BundleStatus {
        BundleStatus {
            state,
            failure: None,
        }
    }

    #[test]
    fn typed_query_filters_by_type_and_bundle() {
        let index = AssetIndex::new();
        let a = loaded_bundle(
            "a",
            vec![
                LoadedAsset::new("t1", texture()),
                LoadedAsset::new("s1", shader("s1")),
            ],
        );
        let b = loaded_bundle("b", vec![LoadedAsset::new("t2", texture())]);
        for bundle in [&a, &b] {
            index.register_bundle(bundle.clone());
            index.publish_assets(bundle).unwrap();
        }

        let all_textures = index.assets_of_type::<Texture>(None).unwrap();
        assert_eq!(all_textures.len(), 2);

        let a_textures = index.assets_of_type::<Texture>(Some("a")).unwrap();
        assert_eq!(a_textures.keys().collect::<Vec<_>>(), vec!["t1"]);

        let a_shaders = index.assets_of_type::<ShaderSource>(Some("a")).unwrap();
        assert!(a_shaders["s1"]
            .downcast::<ShaderSource>()
            .unwrap()
            .source
            .starts_with("// s1"));
    }

    #[test]
    fn unknown_bundle_yields_empty_map() {
        let index = AssetIndex::new();
        assert!(index.assets_of_type::<Texture>(Some("nope")).unwrap().is_empty());
        assert!(index
            .raw_assets_of_type_bundled_in::<Texture>("nope")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn snapshots_do_not_alias_the_index() {
        let index = AssetIndex::new();
        let a = loaded_bundle("a", vec![LoadedAsset::new("t1", texture())]);
        index.register_bundle(a.clone());
        index.publish_assets(&a).unwrap();

        let snapshot = index.assets_of_type::<Texture>(Some("a")).unwrap();
        assert!(index.attach_attributes("t1", Arc::new(AttributeNode::new("ASSET_ATTRIBUTE"))));

        assert!(snapshot["t1"].attributes().is_none());
        assert!(index.asset("t1").unwrap().attributes().is_some());
    }

    #[test]
    fn last_writer_wins_across_bundles() {
        let index = AssetIndex::new();
        let a = loaded_bundle("a", vec![LoadedAsset::new("shared", texture())]);
        let b = loaded_bundle("b", vec![LoadedAsset::new("shared", texture())]);
        index.publish_assets(&a).unwrap();
        index.publish_assets(&b).unwrap();
        assert_eq!(index.asset("shared").unwrap().bundle_id(), "b");
        assert_eq!(index.asset_count(), 1);
    }

    #[test]
    fn raw_query_sees_assets_before_publication() {
        let index = AssetIndex::new();
        let a = loaded_bundle(
            "a",
            vec![
                LoadedAsset::new("t1", texture()),
                LoadedAsset::new("s1", shader("s1")),
            ],
        );
        index.register_bundle(a.clone());
        let raw = index.raw_assets_of_type_bundled_in::<Texture>("a").unwrap();
        assert_eq!(raw.len(), 1);
        assert!(raw["t1"].is_valid());
        assert_eq!(index.asset_count(), 0);
    }

    #[test]
    fn retired_bundle_queries_are_stale() {
        let index = AssetIndex::new();
        let a = loaded_bundle("a", vec![LoadedAsset::new("t1", texture())]);
        index.register_bundle(a.clone());
        index.publish_assets(&a).unwrap();

        assert_eq!(index.retire(&a, status(BundleState::Final)), 1);
        assert_eq!(index.asset_count(), 0);
        assert!(matches!(
            index.assets_of_type::<Texture>(Some("a")),
            Err(AssetError::StaleReference { .. })
        ));
        assert!(matches!(
            index.raw_assets_of_type_bundled_in::<Texture>("a"),
            Err(AssetError::StaleReference { .. })
        ));
        assert_eq!(
            index.bundle_status("a").unwrap().state,
            BundleState::Final
        );
    }

    #[test]
    fn retiring_an_old_instance_keeps_the_new_one() {
        let index = AssetIndex::new();
        let old = loaded_bundle("a", vec![LoadedAsset::new("old_tex", texture())]);
        index.register_bundle(old.clone());
        index.publish_assets(&old).unwrap();

        let new = loaded_bundle("a", vec![LoadedAsset::new("new_tex", texture())]);
        assert!(index.register_bundle(new.clone()).is_some());
        index.publish_assets(&new).unwrap();

        index.retire(&old, status(BundleState::Final));
        assert!(index.asset("old_tex").is_none());
        assert!(index.asset("new_tex").is_some());
        assert_eq!(index.bundle("a").unwrap().serial(), new.serial());
        assert!(index.assets_of_type::<Texture>(Some("a")).is_ok());
    }
}
