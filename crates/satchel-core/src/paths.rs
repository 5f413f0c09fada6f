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

//! Canonical locations for a mod's directories and bundles.
//!
//! Every path produced here uses `/` as its separator, whatever the host
//! platform, so that locations compare equal across the codebase.

use crate::error::{AssetError, AssetResult};
use std::path::{Path, PathBuf};

/// The separator used in every generated location.
pub const PATH_SEP: &str = "/";

const GAME_DATA_DIR: &str = "GameData";
const PLUGIN_DATA_DIR: &str = "PluginData";
const PACKAGES_DIR: &str = "Packages";
const FILE_SCHEME: &str = "file://";

fn normalize(raw: &str) -> String {
    raw.replace('\\', PATH_SEP)
}

/// Resolves a mod's package, plugin-data and bundle directories from an install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModPaths {
    base: String,
    mod_name: String,
    plugin_data_below: Option<String>,
}

impl ModPaths {
    /// Creates the resolver for `mod_name` installed under `install_root`.
    ///
    /// # Errors
    /// Returns [`AssetError::Configuration`] if `mod_name` is empty.
    pub fn new(install_root: impl AsRef<Path>, mod_name: &str) -> AssetResult<Self> {
        let mod_name = normalize(mod_name.trim());
        let mod_name = mod_name.trim_matches('/');
        if mod_name.is_empty() {
            return Err(AssetError::Configuration(
                "mod name must not be empty".to_string(),
            ));
        }

        let base = normalize(&install_root.as_ref().to_string_lossy());
        let trimmed = base.trim_end_matches('/');
        // Keep a bare "/" root intact.
        let base = if trimmed.is_empty() && base.starts_with('/') {
            String::new()
        } else {
            trimmed.to_string()
        };

        Ok(Self {
            base,
            mod_name: mod_name.to_string(),
            plugin_data_below: None,
        })
    }

    /// Places `PluginData` below an intermediate directory of the mod.
    pub fn with_plugin_data_below(mut self, dir: &str) -> Self {
        let dir = normalize(dir);
        let dir = dir.trim_matches('/');
        self.plugin_data_below = (!dir.is_empty()).then(|| dir.to_string());
        self
    }

    /// The install root.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The mod's directory relative to `GameData`.
    pub fn mod_relative(&self) -> &str {
        &self.mod_name
    }

    /// `<base>/GameData/<mod>`
    pub fn mod_dir(&self) -> String {
        [self.base.as_str(), GAME_DATA_DIR, self.mod_name.as_str()].join(PATH_SEP)
    }

    /// `<mod_dir>/[<below>/]PluginData`
    pub fn plugin_data(&self) -> String {
        match &self.plugin_data_below {
            Some(below) => [self.mod_dir().as_str(), below, PLUGIN_DATA_DIR].join(PATH_SEP),
            None => [self.mod_dir().as_str(), PLUGIN_DATA_DIR].join(PATH_SEP),
        }
    }

    /// `<mod_dir>/Packages`, where bundles live.
    pub fn packages(&self) -> String {
        [self.mod_dir().as_str(), PACKAGES_DIR].join(PATH_SEP)
    }

    /// The location of `filename` inside the packages directory.
    ///
    /// # Errors
    /// Returns [`AssetError::Configuration`] if `filename` is empty.
    pub fn bundle_location(&self, filename: &str) -> AssetResult<BundleLocation> {
        let filename = normalize(filename.trim());
        let filename = filename.trim_start_matches('/');
        if filename.is_empty() {
            return Err(AssetError::Configuration(
                "bundle filename must not be empty".to_string(),
            ));
        }
        Ok(BundleLocation::new(
            [self.packages().as_str(), filename].join(PATH_SEP),
        ))
    }
}

/// The resolved, immutable location of one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleLocation(String);

impl BundleLocation {
    /// Wraps a raw path, normalising its separators.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(normalize(path.as_ref()))
    }

    /// The location as a `/`-separated path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The location as a filesystem path.
    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    /// The `file://` locator handed to container openers.
    pub fn locator(&self) -> String {
        if self.0.starts_with('/') {
            format!("{FILE_SCHEME}{}", self.0)
        } else {
            format!("{FILE_SCHEME}/{}", self.0)
        }
    }

    /// Reverses [`BundleLocation::locator`]. Returns `None` for other schemes.
    pub fn from_locator(locator: &str) -> Option<PathBuf> {
        let rest = locator.strip_prefix(FILE_SCHEME)?;
        // "file:///C:/x" carries a drive letter after the third slash.
        let bytes = rest.as_bytes();
        let has_drive = bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':';
        let path = if has_drive { &rest[1..] } else { rest };
        Some(PathBuf::from(path))
    }

    /// The sidecar file sharing this location's base path.
    pub fn sidecar(&self, extension: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.0, extension))
    }
}

impl std::fmt::Display for BundleLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_mod_directories() {
        let paths = ModPaths::new("/games/ksp/", "DLTD/Tinter").expect("valid paths");
        assert_eq!(paths.base(), "/games/ksp");
        assert_eq!(paths.mod_dir(), "/games/ksp/GameData/DLTD/Tinter");
        assert_eq!(paths.packages(), "/games/ksp/GameData/DLTD/Tinter/Packages");
        assert_eq!(
            paths.plugin_data(),
            "/games/ksp/GameData/DLTD/Tinter/PluginData"
        );
    }

    #[test]
    fn plugin_data_below_intermediate_dir() {
        let paths = ModPaths::new("/g", "M")
            .expect("valid paths")
            .with_plugin_data_below("Plugins");
        assert_eq!(paths.plugin_data(), "/g/GameData/M/Plugins/PluginData");
    }

    #[test]
    fn backslashes_are_normalised() {
        let paths = ModPaths::new("C:\\Games\\KSP", "Mod\\Sub").expect("valid paths");
        assert_eq!(paths.mod_dir(), "C:/Games/KSP/GameData/Mod/Sub");
        let loc = paths.bundle_location("shaders\\tint.ksp").expect("location");
        assert_eq!(loc.as_str(), "C:/Games/KSP/GameData/Mod/Sub/Packages/shaders/tint.ksp");
    }

    #[test]
    fn empty_mod_name_is_a_configuration_error() {
        let err = ModPaths::new("/g", "  ").expect_err("empty mod must fail");
        assert!(matches!(err, AssetError::Configuration(_)));
    }

    #[test]
    fn empty_filename_is_a_configuration_error() {
        let paths = ModPaths::new("/g", "M").expect("valid paths");
        assert!(matches!(
            paths.bundle_location(""),
            Err(AssetError::Configuration(_))
        ));
    }

    #[test]
    fn locator_round_trip() {
        let unix = BundleLocation::new("/g/GameData/M/Packages/a.ksp");
        assert_eq!(unix.locator(), "file:///g/GameData/M/Packages/a.ksp");
        assert_eq!(
            BundleLocation::from_locator(&unix.locator()),
            Some(PathBuf::from("/g/GameData/M/Packages/a.ksp"))
        );

        let windows = BundleLocation::new("C:/g/a.ksp");
        assert_eq!(windows.locator(), "file:///C:/g/a.ksp");
        assert_eq!(
            BundleLocation::from_locator(&windows.locator()),
            Some(PathBuf::from("C:/g/a.ksp"))
        );
        assert_eq!(BundleLocation::from_locator("http://x/a.ksp"), None);
    }

    #[test]
    fn sidecar_appends_extension() {
        let loc = BundleLocation::new("/g/a.ksp");
        assert_eq!(loc.sidecar(".atr"), PathBuf::from("/g/a.ksp.atr"));
    }
}
