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

#![allow(dead_code)]

use anyhow::Result;
use satchel_agents::{AssetManager, BundleRecord, BundleState, ModPaths};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

/// A throwaway install root with `GameData/Tint/Packages` in place.
pub struct ModFixture {
    _root: TempDir,
    pub paths: ModPaths,
}

impl ModFixture {
    pub fn new() -> Result<Self> {
        satchel_telemetry::logging::init_for_tests();
        let root = tempfile::tempdir()?;
        let paths = ModPaths::new(root.path(), "Tint")?;
        std::fs::create_dir_all(paths.packages())?;
        Ok(Self { _root: root, paths })
    }

    /// Path of `name` inside the packages directory.
    pub fn package(&self, name: &str) -> PathBuf {
        PathBuf::from(self.paths.packages()).join(name)
    }

    /// Creates a directory bundle holding the given files.
    pub fn directory(&self, name: &str, files: &[(&str, &[u8])]) -> Result<PathBuf> {
        let dir = self.package(name);
        std::fs::create_dir_all(&dir)?;
        for (file, bytes) in files {
            std::fs::write(dir.join(file), bytes)?;
        }
        Ok(dir)
    }
}

pub fn png_bytes() -> Result<Vec<u8>> {
    let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 40, 40, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Waits for `state` or a terminal state, returning the one reached.
pub async fn reach(bundle: &BundleRecord, state: BundleState) -> Result<BundleState> {
    Ok(tokio::time::timeout(WAIT, bundle.wait_for_state(state)).await?)
}

/// Polls `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> Result<()> {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await?;
    Ok(())
}

/// Ticks the manager until `bundle` is terminal.
pub async fn drain(manager: &AssetManager, bundle: &BundleRecord) -> Result<BundleState> {
    eventually(|| {
        manager.tick();
        bundle.state().is_terminal()
    })
    .await?;
    Ok(bundle.state())
}
