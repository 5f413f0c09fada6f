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

//! The built-in asset kinds produced by the stock creators.

use super::Asset;

/// A decoded image, kept on the CPU as tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub pixels: Vec<u8>,
}

impl Texture {
    /// Returns `true` if the pixel buffer matches the declared dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

impl Asset for Texture {}

/// Shader program text, compiled later by the rendering side.
///
/// The shader's name is the asset name it is indexed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// The program text.
    pub source: String,
}

impl ShaderSource {
    /// Wraps program text.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Whether the program text is blank.
    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }
}

impl Asset for ShaderSource {}
