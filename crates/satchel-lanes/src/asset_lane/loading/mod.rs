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

//! Creators that turn raw file bytes into typed assets.

mod shader_loader_lane;
mod texture_loader_lane;

pub use shader_loader_lane::{ShaderSourceLoaderLane, SHADER_EXTENSIONS};
pub use texture_loader_lane::{TextureLoaderLane, TEXTURE_EXTENSIONS};

use satchel_core::Asset;
use std::error::Error;

/// A creator for one kind of asset.
///
/// Implementors do the CPU-bound work of decoding raw bytes into an
/// engine-ready value. They run on the blocking pool and must not touch the
/// bundle indices.
pub trait AssetLoaderLane<A: Asset> {
    /// Decodes `bytes` into an `A`.
    fn load(&self, bytes: &[u8]) -> Result<A, Box<dyn Error + Send + Sync>>;
}
