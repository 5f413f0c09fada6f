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

//! Image decoding into CPU-side RGBA8 textures.

use super::AssetLoaderLane;
use anyhow::Context;
use satchel_core::Texture;

/// Extensions handled by [`TextureLoaderLane`] in the default registry.
pub const TEXTURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Decodes PNG and JPEG files with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextureLoaderLane;

impl AssetLoaderLane<Texture> for TextureLoaderLane {
    fn load(&self, bytes: &[u8]) -> Result<Texture, Box<dyn std::error::Error + Send + Sync>> {
        let img = image::load_from_memory(bytes).context("Failed to decode image from memory")?;

        // Keep the pixels in sRGB space.
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(Texture {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn decodes_png() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(2, 3, Rgba([10, 20, 30, 255]))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let texture = TextureLoaderLane.load(&png).unwrap();
        assert_eq!((texture.width, texture.height), (2, 3));
        assert!(texture.is_valid());
        assert_eq!(&texture.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(TextureLoaderLane.load(b"not an image").is_err());
    }
}
