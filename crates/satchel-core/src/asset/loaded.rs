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

use super::{Asset, AssetHandle};
use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

/// An extracted asset whose concrete type is erased.
///
/// This is the opaque handle stored in a bundle's asset array and in the global
/// index. The concrete type is only checked when a typed query asks for it.
#[derive(Clone)]
pub struct LoadedAsset {
    name: Arc<str>,
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl LoadedAsset {
    /// Erases the type of `asset` and tags it with `name`.
    pub fn new<A: Asset>(name: impl Into<Arc<str>>, asset: A) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<A>(),
            type_name: std::any::type_name::<A>(),
            value: Arc::new(asset),
        }
    }

    /// The asset's name, used as its key in the global index.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully qualified name of the stored type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the stored asset is an `A`.
    pub fn is<A: Asset>(&self) -> bool {
        self.type_id == TypeId::of::<A>()
    }

    /// Returns a typed handle if the stored asset is an `A`.
    pub fn downcast<A: Asset>(&self) -> Option<AssetHandle<A>> {
        self.value
            .clone()
            .downcast::<A>()
            .ok()
            .map(AssetHandle::from_arc)
    }
}

impl fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedAsset")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Mesh(u32);
    impl Asset for Mesh {}

    #[derive(Debug)]
    struct Sound;
    impl Asset for Sound {}

    #[test]
    fn downcast_to_stored_type() {
        let asset = LoadedAsset::new("hull", Mesh(7));
        assert!(asset.is::<Mesh>());
        assert_eq!(asset.name(), "hull");
        let handle = asset.downcast::<Mesh>().expect("stored type should downcast");
        assert_eq!(*handle, Mesh(7));
    }

    #[test]
    fn downcast_to_other_type_is_none() {
        let asset = LoadedAsset::new("hull", Mesh(7));
        assert!(!asset.is::<Sound>());
        assert!(asset.downcast::<Sound>().is_none());
    }

    #[test]
    fn clones_share_the_asset() {
        let asset = LoadedAsset::new("hull", Mesh(1));
        let copy = asset.clone();
        let a = asset.downcast::<Mesh>().expect("mesh");
        let b = copy.downcast::<Mesh>().expect("mesh");
        assert!(a.ptr_eq(&b));
    }
}
