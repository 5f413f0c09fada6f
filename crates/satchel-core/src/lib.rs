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

//! # Satchel Core
//!
//! Foundational crate containing the traits, primitive types and error taxonomy
//! shared by every layer of the bundle lifecycle manager. It knows nothing about
//! how bundles are stored or scheduled.

#![warn(missing_docs)]

pub mod asset;
pub mod attributes;
pub mod bundle;
pub mod container;
pub mod error;
pub mod paths;
pub mod utils;

pub use asset::{Asset, AssetHandle, LoadedAsset, ShaderSource, Texture};
pub use attributes::AttributeNode;
pub use bundle::{BundleSource, BundleState, BundleStatus, SuspensionPoint};
pub use container::{BundleContainer, CacheGate, ContainerOpener};
pub use error::{AssetError, AssetResult};
pub use paths::{BundleLocation, ModPaths};
pub use utils::timer::Stopwatch;
