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

//! Joins a bundle's sidecar document onto its indexed assets by name.

use satchel_core::{AssetError, AttributeNode};
use satchel_data::{AssetIndex, BundleRecord};
use std::io::ErrorKind;
use std::sync::Arc;

/// Default sidecar extension appended to a bundle's location.
pub const DEFAULT_SIDECAR_EXTENSION: &str = ".atr";
/// Default tag of the sidecar entries joined onto assets.
pub const DEFAULT_ATTRIBUTE_TAG: &str = "ASSET_ATTRIBUTE";

/// What one overlay pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayReport {
    /// Whether a sidecar file was found and parsed.
    pub sidecar_found: bool,
    /// Names of the assets that received attributes.
    pub attached: Vec<String>,
    /// Entries that named no indexed asset.
    pub join_misses: Vec<String>,
    /// Entries without a `name` value.
    pub unnamed: usize,
}

/// Best-effort sidecar loader. Never fails the pipeline: every problem is
/// logged and reported instead.
#[derive(Debug, Clone)]
pub struct AttributeOverlayLane {
    sidecar_extension: String,
    attribute_tag: String,
}

impl Default for AttributeOverlayLane {
    fn default() -> Self {
        Self::new(DEFAULT_SIDECAR_EXTENSION, DEFAULT_ATTRIBUTE_TAG)
    }
}

impl AttributeOverlayLane {
    /// Creates an overlay lane reading `<location><sidecar_extension>` and
    /// joining entries tagged `attribute_tag`.
    pub fn new(sidecar_extension: impl Into<String>, attribute_tag: impl Into<String>) -> Self {
        Self {
            sidecar_extension: sidecar_extension.into(),
            attribute_tag: attribute_tag.into(),
        }
    }

    /// The extension appended to a bundle's location to find its sidecar.
    pub fn sidecar_extension(&self) -> &str {
        &self.sidecar_extension
    }

    /// Reads the sidecar of `bundle`, stores it on the record and attaches each
    /// tagged entry to the indexed asset it names.
    pub async fn apply(&self, bundle: &BundleRecord, index: &AssetIndex) -> OverlayReport {
        let mut report = OverlayReport::default();
        let path = bundle.location().sidecar(&self.sidecar_extension);

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::trace!("Bundle '{}' has no sidecar.", bundle.id());
                return report;
            }
            Err(e) => {
                log::warn!(
                    "Cannot read sidecar '{}' of bundle '{}': {e}",
                    path.display(),
                    bundle.id()
                );
                return report;
            }
        };

        let document = match AttributeNode::parse(&text) {
            Ok(document) => Arc::new(document),
            Err(e) => {
                log::warn!("Ignoring sidecar '{}': {e}", path.display());
                return report;
            }
        };
        report.sidecar_found = true;

        if let Err(e) = bundle.set_attributes(document.clone()) {
            log::warn!("Cannot store sidecar on bundle '{}': {e}", bundle.id());
        }

        for entry in document.nodes(&self.attribute_tag) {
            let Some(name) = entry.value("name") else {
                let err = AssetError::Configuration(format!(
                    "{} entry without a 'name' in '{}'",
                    self.attribute_tag,
                    path.display()
                ));
                log::warn!("{err}");
                report.unnamed += 1;
                continue;
            };

            if index.attach_attributes(name, Arc::new(entry.clone())) {
                report.attached.push(name.to_string());
            } else {
                let err = AssetError::AttributeJoinMiss {
                    name: name.to_string(),
                };
                log::warn!("Bundle '{}': {err}", bundle.id());
                report.join_misses.push(name.to_string());
            }
        }

        log::debug!(
            "Bundle '{}': attributes attached to {} asset(s), {} miss(es).",
            bundle.id(),
            report.attached.len(),
            report.join_misses.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::{BundleLocation, BundleSource, BundleState, LoadedAsset, ShaderSource};

    fn bundle_at(path: &std::path::Path) -> Arc<BundleRecord> {
        let bundle = Arc::new(BundleRecord::new(
            "root",
            BundleLocation::new(path.to_string_lossy()),
            BundleSource::Container,
            30,
        ));
        bundle.advance(BundleState::Loading).unwrap();
        bundle.advance(BundleState::AssetLoading).unwrap();
        bundle
            .set_assets(vec![
                LoadedAsset::new("A", ShaderSource::new("a")),
                LoadedAsset::new("B", ShaderSource::new("b")),
            ])
            .unwrap();
        bundle
    }

    #[tokio::test]
    async fn attaches_named_entries_and_reports_misses() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("shaders.ksp");
        std::fs::write(
            dir.path().join("shaders.ksp.atr"),
            "ASSET_ATTRIBUTE { name = A\n useBlend = true }\n\
             ASSET_ATTRIBUTE { name = Ghost }\n\
             ASSET_ATTRIBUTE { replace = X }\n\
             OTHER { name = B }\n",
        )
        .unwrap();

        let index = AssetIndex::new();
        let bundle = bundle_at(&location);
        index.register_bundle(bundle.clone());
        index.publish_assets(&bundle).unwrap();
        bundle.advance(BundleState::AttributesLoading).unwrap();

        let report = AttributeOverlayLane::default().apply(&bundle, &index).await;
        assert!(report.sidecar_found);
        assert_eq!(report.attached, vec!["A".to_string()]);
        assert_eq!(report.join_misses, vec!["Ghost".to_string()]);
        assert_eq!(report.unnamed, 1);

        let a = index.asset("A").unwrap();
        assert_eq!(a.attributes().and_then(|n| n.value("useBlend")), Some("true"));
        assert!(index.asset("B").unwrap().attributes().is_none());
        assert!(bundle.attributes().unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_sidecar_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let index = AssetIndex::new();
        let bundle = bundle_at(&dir.path().join("plain.ksp"));
        index.publish_assets(&bundle).unwrap();
        bundle.advance(BundleState::AttributesLoading).unwrap();

        let report = AttributeOverlayLane::default().apply(&bundle, &index).await;
        assert_eq!(report, OverlayReport::default());
        assert!(bundle.attributes().unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_sidecar_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("bad.ksp");
        std::fs::write(dir.path().join("bad.ksp.atr"), "ASSET_ATTRIBUTE { name = A\n").unwrap();

        let index = AssetIndex::new();
        let bundle = bundle_at(&location);
        index.publish_assets(&bundle).unwrap();
        bundle.advance(BundleState::AttributesLoading).unwrap();

        let report = AttributeOverlayLane::default().apply(&bundle, &index).await;
        assert!(!report.sidecar_found);
        assert!(index.asset("A").unwrap().attributes().is_none());
    }

    #[tokio::test]
    async fn custom_tag_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("x.ksp");
        std::fs::write(dir.path().join("x.ksp.meta"), "TINT { name = B }\n").unwrap();

        let index = AssetIndex::new();
        let bundle = bundle_at(&location);
        index.publish_assets(&bundle).unwrap();
        bundle.advance(BundleState::AttributesLoading).unwrap();

        let report = AttributeOverlayLane::new(".meta", "TINT")
            .apply(&bundle, &index)
            .await;
        assert_eq!(report.attached, vec!["B".to_string()]);
    }
}
