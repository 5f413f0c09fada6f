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

//! A registry of creators, keyed by lowercased file extension.

use super::loading::{
    AssetLoaderLane, ShaderSourceLoaderLane, TextureLoaderLane, SHADER_EXTENSIONS,
    TEXTURE_EXTENSIONS,
};
use satchel_core::{Asset, AssetError, AssetResult, LoadedAsset};
use satchel_telemetry::{CounterHandle, HistogramHandle, MetricsRegistry, ScopedMetricTimer};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

/// Type-erased creator.
trait AnyLoaderLane: Send + Sync {
    fn load_any(
        &self,
        name: &str,
        bytes: &[u8],
        metrics: &CreatorMetrics,
    ) -> AssetResult<LoadedAsset>;
}

/// Wraps a typed [`AssetLoaderLane`] so it can sit in the registry.
struct AssetLoaderLaneWrapper<A: Asset, L: AssetLoaderLane<A>>(L, PhantomData<fn() -> A>);

impl<A, L> AnyLoaderLane for AssetLoaderLaneWrapper<A, L>
where
    A: Asset,
    L: AssetLoaderLane<A> + Send + Sync,
{
    fn load_any(
        &self,
        name: &str,
        bytes: &[u8],
        metrics: &CreatorMetrics,
    ) -> AssetResult<LoadedAsset> {
        let _timer = ScopedMetricTimer::new(&metrics.decode_time_ms);

        let asset: A = self.0.load(bytes).map_err(|e| AssetError::Decode {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        if let Err(e) = metrics.decoded_total.increment() {
            log::warn!("Failed to count decoded asset: {e}");
        }
        Ok(LoadedAsset::new(name, asset))
    }
}

struct CreatorMetrics {
    decode_time_ms: HistogramHandle,
    decoded_total: CounterHandle,
}

impl CreatorMetrics {
    fn new(registry: &MetricsRegistry) -> Self {
        Self {
            decode_time_ms: registry.register_histogram(
                "assets",
                "decode_time",
                "Asset decoding time",
                "ms",
                vec![1.0, 5.0, 16.0, 33.0, 100.0, 500.0],
            ),
            decoded_total: registry.register_counter(
                "assets",
                "decoded_total",
                "Total number of assets decoded from raw bytes",
            ),
        }
    }
}

/// Maps lowercased file extensions to creators.
///
/// Registration is last-writer-wins per extension. The registry is shared
/// between the directory strategy and the pack archive opener.
pub struct CreatorRegistry {
    metrics: CreatorMetrics,
    creators: RwLock<HashMap<String, Arc<dyn AnyLoaderLane>>>,
}

impl CreatorRegistry {
    /// Creates an empty registry.
    pub fn new(metrics_registry: &MetricsRegistry) -> Self {
        Self {
            metrics: CreatorMetrics::new(metrics_registry),
            creators: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry with the stock texture and shader creators.
    pub fn with_default_creators(metrics_registry: &MetricsRegistry) -> Self {
        let registry = Self::new(metrics_registry);
        registry.register(TEXTURE_EXTENSIONS, TextureLoaderLane);
        registry.register(SHADER_EXTENSIONS, ShaderSourceLoaderLane);
        registry
    }

    /// Registers `loader` for every extension in `extensions`.
    ///
    /// Extensions are matched case-insensitively, with or without a leading dot.
    pub fn register<A: Asset>(
        &self,
        extensions: &[&str],
        loader: impl AssetLoaderLane<A> + Send + Sync + 'static,
    ) {
        let wrapped: Arc<dyn AnyLoaderLane> =
            Arc::new(AssetLoaderLaneWrapper(loader, PhantomData));
        let mut creators = self
            .creators
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for extension in extensions {
            let key = normalize_extension(extension);
            log::debug!("Registered creator for '.{key}' ({}).", std::any::type_name::<A>());
            creators.insert(key, wrapped.clone());
        }
    }

    /// Whether a creator handles `extension`.
    pub fn has_creator(&self, extension: &str) -> bool {
        self.creators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&normalize_extension(extension))
    }

    /// Every registered extension, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut out: Vec<_> = self
            .creators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Decodes `bytes` into an asset called `name`.
    ///
    /// Returns `None` if no creator handles `extension`.
    pub fn create(&self, name: &str, extension: &str, bytes: &[u8]) -> Option<AssetResult<LoadedAsset>> {
        let creator = self
            .creators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_extension(extension))
            .cloned()?;
        Some(creator.load_any(name, bytes, &self.metrics))
    }
}

impl std::fmt::Debug for CreatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatorRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::{ShaderSource, Texture};

    #[test]
    fn default_creators_cover_images_and_shaders() {
        let registry = CreatorRegistry::with_default_creators(&MetricsRegistry::new());
        assert_eq!(
            registry.extensions(),
            vec!["glsl", "jpeg", "jpg", "png", "shader", "wgsl"]
        );
        assert!(registry.has_creator(".PNG"));
        assert!(!registry.has_creator("ini"));
    }

    #[test]
    fn unknown_extension_yields_none() {
        let registry = CreatorRegistry::with_default_creators(&MetricsRegistry::new());
        assert!(registry.create("c", "ini", b"[section]").is_none());
    }

    #[test]
    fn decodes_and_counts() {
        let metrics = MetricsRegistry::new();
        let registry = CreatorRegistry::with_default_creators(&metrics);
        let asset = registry
            .create("b", "Shader", b"void main() {}")
            .expect("creator registered")
            .expect("decodes");
        assert_eq!(asset.name(), "b");
        assert!(asset.is::<ShaderSource>());
        assert!(!asset.is::<Texture>());
        assert_eq!(registry.metrics.decoded_total.get().unwrap(), 1);
        assert_eq!(registry.metrics.decode_time_ms.sample_count().unwrap(), 1);
    }

    #[test]
    fn decode_failure_names_the_asset() {
        let registry = CreatorRegistry::with_default_creators(&MetricsRegistry::new());
        let err = registry
            .create("broken", "png", b"nope")
            .expect("creator registered")
            .unwrap_err();
        assert!(matches!(err, AssetError::Decode { ref name, .. } if name == "broken"));
    }

    struct Upper;

    impl AssetLoaderLane<ShaderSource> for Upper {
        fn load(&self, bytes: &[u8]) -> Result<ShaderSource, Box<dyn std::error::Error + Send + Sync>> {
            Ok(ShaderSource::new(String::from_utf8_lossy(bytes).to_uppercase()))
        }
    }

    #[test]
    fn later_registration_wins() {
        let registry = CreatorRegistry::with_default_creators(&MetricsRegistry::new());
        registry.register(&["glsl"], Upper);
        let asset = registry.create("s", "glsl", b"abc").unwrap().unwrap();
        assert_eq!(asset.downcast::<ShaderSource>().unwrap().source, "ABC");
    }
}
