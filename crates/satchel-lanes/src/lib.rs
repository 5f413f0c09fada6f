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

//! # Satchel Lanes
//!
//! The hot path of bundle loading: creators that decode raw bytes, the pack
//! archive container, the attribute overlay and the two loader strategies.

#![warn(missing_docs)]

pub mod asset_lane;
pub mod bundle_lane;

pub use asset_lane::{
    AssetLoaderLane, CreatorRegistry, PackArchive, PackArchiveOpener, PackBuilder, PackEntry,
    ShaderSourceLoaderLane, TextureLoaderLane, MAX_PACK_BYTES,
};
pub use bundle_lane::{
    run_bundle, AttributeOverlayLane, ContainerStrategy, DirectoryStrategy, LaneContext,
    LoaderStrategy, OverlayReport,
};
