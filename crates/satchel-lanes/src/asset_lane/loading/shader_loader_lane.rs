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

use super::AssetLoaderLane;
use anyhow::Context;
use satchel_core::ShaderSource;

/// Extensions handled by [`ShaderSourceLoaderLane`] in the default registry.
pub const SHADER_EXTENSIONS: &[&str] = &["shader", "glsl", "wgsl"];

/// Reads shader program text. Compilation happens later, on the rendering side.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderSourceLoaderLane;

impl AssetLoaderLane<ShaderSource> for ShaderSourceLoaderLane {
    fn load(&self, bytes: &[u8]) -> Result<ShaderSource, Box<dyn std::error::Error + Send + Sync>> {
        let text = std::str::from_utf8(bytes).context("Shader source is not valid UTF-8")?;
        // Editors on some platforms prepend a byte-order mark.
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Ok(ShaderSource::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bom() {
        let shader = ShaderSourceLoaderLane
            .load("\u{feff}void main() {}".as_bytes())
            .unwrap();
        assert_eq!(shader.source, "void main() {}");
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(ShaderSourceLoaderLane.load(&[0xff, 0xfe, 0x00]).is_err());
    }
}
