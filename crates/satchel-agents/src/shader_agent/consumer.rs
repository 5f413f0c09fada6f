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

use satchel_core::{AssetHandle, AssetResult, AttributeNode, BundleState, ShaderSource};
use satchel_data::{AssetIndex, BundleObserver, BundleRecord};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A shader asset together with the replacement rules from its attributes.
#[derive(Debug, Clone)]
pub struct ShaderRecord {
    /// The asset name.
    pub name: String,
    /// The shader source.
    pub source: AssetHandle<ShaderSource>,
    /// Names of the shaders this one replaces.
    pub replaces: Vec<String>,
    /// Parameter name to shader property, from `parameter = name, property`.
    pub parameters: BTreeMap<String, String>,
    /// Keywords to test for before replacing.
    pub keywords: Vec<String>,
    /// Whether the shader blends.
    pub use_blend: bool,
    /// Number of independently tinted colour areas.
    pub num_colour_areas: u32,
    /// A shader for which the blend UI is hidden.
    pub disable_blend_ui_for: Option<String>,
}

impl ShaderRecord {
    /// Builds a record from the attribute node joined onto a shader asset.
    ///
    /// Malformed entries are logged and skipped; they never reject the record.
    pub fn from_attributes(
        name: impl Into<String>,
        source: AssetHandle<ShaderSource>,
        attributes: &AttributeNode,
    ) -> Self {
        let name = name.into();

        let mut parameters = BTreeMap::new();
        for value in attributes.values("parameter") {
            match value.split_once(',') {
                Some((key, property)) => {
                    parameters.insert(key.trim().to_string(), property.trim().to_string());
                }
                None => log::warn!("Shader '{name}': ignoring parameter '{value}' without ','."),
            }
        }

        let use_blend = match attributes.value("useBlend") {
            Some(v) => v.trim().parse::<bool>().unwrap_or_else(|_| {
                log::warn!("Shader '{name}': useBlend '{v}' is not a bool.");
                false
            }),
            None => false,
        };

        let num_colour_areas = match attributes.value("numColourAreas") {
            Some(v) => v.trim().parse::<u32>().unwrap_or_else(|_| {
                log::warn!("Shader '{name}': numColourAreas '{v}' is not a count.");
                1
            }),
            None => 1,
        };

        Self {
            replaces: owned(attributes.values("replace")),
            keywords: owned(attributes.values("testForKeyword")),
            disable_blend_ui_for: attributes
                .value("disableBlendUIfor")
                .map(|v| v.trim().to_string()),
            name,
            source,
            parameters,
            use_blend,
            num_colour_areas,
        }
    }

    /// Whether this shader replaces `shader_name`.
    pub fn replaces(&self, shader_name: &str) -> bool {
        self.replaces.iter().any(|r| r == shader_name)
    }
}

fn owned(values: Vec<&str>) -> Vec<String> {
    values.into_iter().map(|v| v.trim().to_string()).collect()
}

/// Collects shader assets that carry attributes into [`ShaderRecord`]s.
///
/// Attach it to a bundle as an observer: when the bundle enters
/// `WaitingForUnload` its shaders are ingested. Records outlive the bundle;
/// the first record registered under a name wins.
#[derive(Debug)]
pub struct ShaderAssetConsumer {
    index: Arc<AssetIndex>,
    records: RwLock<Vec<ShaderRecord>>,
}

impl ShaderAssetConsumer {
    /// Creates a consumer reading from `index`.
    pub fn new(index: Arc<AssetIndex>) -> Self {
        Self {
            index,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Ingests every attributed shader of `bundle_id` currently in the index.
    /// Returns the number of new records.
    ///
    /// # Errors
    /// [`satchel_core::AssetError::StaleReference`] if the bundle is already terminal.
    pub fn ingest(&self, bundle_id: &str) -> AssetResult<usize> {
        let mut found: Vec<_> = self
            .index
            .assets_of_type::<ShaderSource>(Some(bundle_id))?
            .into_values()
            .filter_map(|record| {
                let attributes = record.attributes()?;
                let source = record.downcast::<ShaderSource>()?;
                Some(ShaderRecord::from_attributes(record.name(), source, attributes))
            })
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let mut added = 0;
        for record in found {
            if records.iter().any(|r| r.name == record.name) {
                log::debug!("Shader '{}' already managed, skipping.", record.name);
                continue;
            }
            records.push(record);
            added += 1;
        }
        log::info!("Bundle '{bundle_id}': {added} shader(s) now managed.");
        Ok(added)
    }

    /// The managed shader named `name`.
    pub fn shader(&self, name: &str) -> Option<ShaderRecord> {
        self.read().iter().find(|r| r.name == name).cloned()
    }

    /// The first managed shader that replaces `shader_name`.
    pub fn replacement_for(&self, shader_name: &str) -> Option<ShaderRecord> {
        self.read().iter().find(|r| r.replaces(shader_name)).cloned()
    }

    /// Whether a shader named `name` is managed.
    pub fn is_managed(&self, name: &str) -> bool {
        self.read().iter().any(|r| r.name == name)
    }

    /// Every managed record, in ingestion order.
    pub fn records(&self) -> Vec<ShaderRecord> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ShaderRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BundleObserver for ShaderAssetConsumer {
    fn on_state_change(&self, bundle: &BundleRecord) {
        if bundle.state() != BundleState::WaitingForUnload {
            return;
        }
        if let Err(e) = self.ingest(bundle.id()) {
            log::warn!("Could not ingest shaders of '{}': {e}", bundle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(text: &str) -> AttributeNode {
        AttributeNode::parse(text)
            .unwrap()
            .nodes("ASSET_ATTRIBUTE")
            .next()
            .cloned()
            .unwrap()
    }

    #[test]
    fn parses_replacement_rules() {
        let attrs = node(
            "ASSET_ATTRIBUTE\n{\n name = Tinted\n replace = KSP/Diffuse\n replace = KSP/Bumped\n \
             parameter = tintHue , _TintHue\n parameter = broken\n testForKeyword = TINT_ON\n \
             useBlend = true\n numColourAreas = 3\n disableBlendUIfor = KSP/Bumped\n}\n",
        );
        let record = ShaderRecord::from_attributes(
            "Tinted",
            AssetHandle::new(ShaderSource::new("void main() {}")),
            &attrs,
        );

        assert_eq!(record.replaces, vec!["KSP/Diffuse", "KSP/Bumped"]);
        assert_eq!(record.parameters.len(), 1);
        assert_eq!(record.parameters["tintHue"], "_TintHue");
        assert_eq!(record.keywords, vec!["TINT_ON"]);
        assert!(record.use_blend);
        assert_eq!(record.num_colour_areas, 3);
        assert_eq!(record.disable_blend_ui_for.as_deref(), Some("KSP/Bumped"));
        assert!(record.replaces("KSP/Bumped"));
        assert!(!record.replaces("KSP/Specular"));
    }

    #[test]
    fn defaults_for_missing_or_malformed_values() {
        let attrs = node("ASSET_ATTRIBUTE\n{\n name = Plain\n numColourAreas = lots\n}\n");
        let record =
            ShaderRecord::from_attributes("Plain", AssetHandle::new(ShaderSource::new("")), &attrs);
        assert!(!record.use_blend);
        assert_eq!(record.num_colour_areas, 1);
        assert!(record.disable_blend_ui_for.is_none());
        assert!(record.parameters.is_empty());
    }

    #[test]
    fn unknown_bundle_ingests_nothing() {
        let consumer = ShaderAssetConsumer::new(Arc::new(AssetIndex::new()));
        assert_eq!(consumer.ingest("ghost").unwrap(), 0);
        assert!(consumer.records().is_empty());
        assert!(consumer.replacement_for("KSP/Diffuse").is_none());
    }
}
