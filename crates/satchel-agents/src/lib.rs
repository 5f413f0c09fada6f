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

//! # Satchel Agents
//!
//! The public face of the bundle lifecycle manager. [`AssetManager`] creates
//! bundle records, dispatches them onto the tokio runtime and answers queries
//! against the global indices; [`ShaderAssetConsumer`] is a downstream
//! consumer that reacts to bundles becoming queryable.

#![warn(missing_docs)]

pub mod asset_agent;
pub mod config;
pub mod observer;
pub mod shader_agent;

pub use asset_agent::AssetManager;
pub use config::{AssetManagerConfig, DEFAULT_UNLOAD_TTL_TICKS};
pub use observer::{BundleEvent, ChannelObserver};
pub use shader_agent::{ShaderAssetConsumer, ShaderRecord};

pub use satchel_core::{
    AssetError, AssetHandle, AssetResult, AttributeNode, BundleSource, BundleState, BundleStatus,
    ModPaths, ShaderSource, Texture,
};
pub use satchel_data::{AssetRecord, BundleObserver, BundleRecord, UnloadTick};
