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

//! Asset manager configuration, loadable from RON.
//!
//! ```ron
//! (
//!     unload_ttl_ticks: 30,
//!     io_timeout_ms: Some(5000),
//!     cache_ready_at_start: true,
//! )
//! ```

use satchel_core::{AssetError, AssetResult};
use satchel_lanes::bundle_lane::{DEFAULT_ATTRIBUTE_TAG, DEFAULT_SIDECAR_EXTENSION};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Ticks a bundle stays in `WaitingForUnload` before it is released.
pub const DEFAULT_UNLOAD_TTL_TICKS: u32 = 30;

/// Tunables of the [`crate::AssetManager`]. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// Scheduler ticks an idle bundle is kept before release.
    pub unload_ttl_ticks: u32,
    /// Limit for the cache wait, container open and extraction, in
    /// milliseconds. `None` waits forever.
    pub io_timeout_ms: Option<u64>,
    /// Whether the cache gate starts open.
    pub cache_ready_at_start: bool,
    /// Appended to a bundle's location to find its sidecar.
    pub sidecar_extension: String,
    /// Tag of the sidecar entries joined onto assets.
    pub attribute_tag: String,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            unload_ttl_ticks: DEFAULT_UNLOAD_TTL_TICKS,
            io_timeout_ms: None,
            cache_ready_at_start: true,
            sidecar_extension: DEFAULT_SIDECAR_EXTENSION.to_string(),
            attribute_tag: DEFAULT_ATTRIBUTE_TAG.to_string(),
        }
    }
}

impl AssetManagerConfig {
    /// Parses a RON document.
    ///
    /// # Errors
    /// [`AssetError::Configuration`] for malformed RON or invalid values.
    pub fn from_ron_str(text: &str) -> AssetResult<Self> {
        let config: Self = ron::from_str(text)
            .map_err(|e| AssetError::Configuration(format!("invalid manager config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a RON file.
    ///
    /// # Errors
    /// [`AssetError::Io`] if the file cannot be read, otherwise as
    /// [`AssetManagerConfig::from_ron_str`].
    pub fn load(path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AssetError::io(path.display().to_string(), e))?;
        Self::from_ron_str(&text)
    }

    /// The I/O timeout as a [`Duration`].
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }

    /// Sets the TTL, in ticks.
    pub fn with_unload_ttl(mut self, ticks: u32) -> Self {
        self.unload_ttl_ticks = ticks;
        self
    }

    /// Sets the I/O timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    /// Sets whether the cache gate starts open.
    pub fn with_cache_ready_at_start(mut self, ready: bool) -> Self {
        self.cache_ready_at_start = ready;
        self
    }

    fn validate(&self) -> AssetResult<()> {
        if self.unload_ttl_ticks == 0 {
            return Err(AssetError::Configuration(
                "unload_ttl_ticks must be at least 1".into(),
            ));
        }
        if self.attribute_tag.trim().is_empty() {
            return Err(AssetError::Configuration("attribute_tag is empty".into()));
        }
        Ok(())
    }
}
