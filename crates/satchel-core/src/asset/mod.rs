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

//! Provides the foundational traits and primitive types for Satchel's asset model.
//!
//! Assets extracted from a bundle are stored untyped, as [`LoadedAsset`] values,
//! and only regain their concrete type when a typed query downcasts them into an
//! [`AssetHandle`].

mod handle;
mod kinds;
mod loaded;

pub use handle::*;
pub use kinds::*;
pub use loaded::*;

/// A marker trait for types that can be extracted from a bundle.
///
/// - `Send` + `Sync`: assets are decoded on blocking worker threads and shared
///   with the tasks that index them.
/// - `'static`: assets outlive the bundle that produced them.
///
/// # Examples
///
/// ```
/// use satchel_core::asset::Asset;
///
/// struct Mesh {
///     vertices: Vec<[f32; 3]>,
/// }
///
/// impl Asset for Mesh {}
/// ```
pub trait Asset: Send + Sync + 'static {}
