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

//! The reference bundle container: a single bincode-encoded archive of named,
//! extension-tagged byte entries.
//!
//! Entries are decoded through the same [`CreatorRegistry`] the directory
//! strategy uses, so an archive and a directory with the same files produce
//! the same assets.

use super::registry::CreatorRegistry;
use async_trait::async_trait;
use satchel_core::{
    AssetError, AssetResult, BundleContainer, BundleLocation, ContainerOpener, LoadedAsset,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const PACK_MAGIC: [u8; 4] = *b"SPAK";
const PACK_VERSION: u32 = 1;

/// Upper bound on an archive's size and on what decoding it may allocate.
pub const MAX_PACK_BYTES: usize = 256 * 1024 * 1024;

/// One file stored in a pack archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackEntry {
    /// The asset name (file stem).
    pub name: String,
    /// The lowercased extension selecting the creator.
    pub extension: String,
    /// The raw file contents.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PackManifest {
    version: u32,
    entries: Vec<PackEntry>,
}

/// Decodes an archive's bytes into its entries.
///
/// # Errors
/// [`AssetError::Configuration`] for a bad magic, a corrupt or truncated
/// body, an unknown version, or an archive over [`MAX_PACK_BYTES`].
pub fn decode_pack(bytes: &[u8]) -> AssetResult<Vec<PackEntry>> {
    let body = bytes
        .strip_prefix(&PACK_MAGIC[..])
        .ok_or_else(|| AssetError::Configuration("not a pack archive (bad magic)".into()))?;
    if body.len() > MAX_PACK_BYTES {
        return Err(AssetError::Configuration(format!(
            "pack archive of {} bytes exceeds the {MAX_PACK_BYTES} byte limit",
            bytes.len()
        )));
    }
    // Length prefixes are untrusted; the limit keeps them from sizing allocations.
    let config = bincode::config::standard().with_limit::<MAX_PACK_BYTES>();
    let (manifest, _): (PackManifest, usize) = bincode::serde::decode_from_slice(body, config)
        .map_err(|e| AssetError::Configuration(format!("corrupt pack archive: {e}")))?;
    if manifest.version != PACK_VERSION {
        return Err(AssetError::Configuration(format!(
            "unsupported pack version {} (expected {PACK_VERSION})",
            manifest.version
        )));
    }
    Ok(manifest.entries)
}

/// Assembles a pack archive.
#[derive(Debug, Default, Clone)]
pub struct PackBuilder {
    entries: Vec<PackEntry>,
}

impl PackBuilder {
    /// Starts an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. The extension is stored lowercased, without a dot.
    pub fn add(mut self, name: impl Into<String>, extension: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.push(PackEntry {
            name: name.into(),
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            bytes: bytes.into(),
        });
        self
    }

    /// Adds a file, naming the entry after its stem.
    pub fn add_file(self, path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        let (name, extension) = split_file_name(path).ok_or_else(|| {
            AssetError::Configuration(format!("'{}' has no name or extension", path.display()))
        })?;
        let bytes = std::fs::read(path).map_err(|e| AssetError::io(path.display().to_string(), e))?;
        Ok(self.add(name, &extension, bytes))
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes the archive.
    pub fn to_bytes(&self) -> AssetResult<Vec<u8>> {
        let manifest = PackManifest {
            version: PACK_VERSION,
            entries: self.entries.clone(),
        };
        let body = bincode::serde::encode_to_vec(&manifest, bincode::config::standard())
            .map_err(|e| AssetError::Configuration(format!("cannot encode pack archive: {e}")))?;
        let mut out = Vec::with_capacity(PACK_MAGIC.len() + body.len());
        out.extend_from_slice(&PACK_MAGIC);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Encodes the archive and writes it to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> AssetResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)
            .map_err(|e| AssetError::io(path.display().to_string(), e))
    }
}

/// Splits a path into its stem and lowercased extension.
pub(crate) fn split_file_name(path: &Path) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?;
    let extension = path.extension()?.to_str()?;
    Some((stem.to_string(), extension.to_ascii_lowercase()))
}

/// Opens pack archives from `file://` locators.
#[derive(Debug, Clone)]
pub struct PackArchiveOpener {
    creators: Arc<CreatorRegistry>,
}

impl PackArchiveOpener {
    /// Creates an opener decoding entries through `creators`.
    pub fn new(creators: Arc<CreatorRegistry>) -> Self {
        Self { creators }
    }
}

#[async_trait]
impl ContainerOpener for PackArchiveOpener {
    async fn open(&self, locator: &str) -> AssetResult<Box<dyn BundleContainer>> {
        let path = BundleLocation::from_locator(locator).ok_or_else(|| {
            AssetError::Configuration(format!("unsupported locator '{locator}'"))
        })?;
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| AssetError::io(locator, e))?
            .len();
        if size > MAX_PACK_BYTES as u64 {
            return Err(AssetError::Configuration(format!(
                "pack '{locator}' is {size} bytes, over the {MAX_PACK_BYTES} byte limit"
            )));
        }
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| AssetError::io(locator, e))?;
        let entries = decode_pack(&bytes)?;
        log::debug!("Opened pack '{locator}' with {} entries.", entries.len());
        Ok(Box::new(PackArchive {
            locator: locator.to_string(),
            entries,
            creators: self.creators.clone(),
        }))
    }
}

/// An open pack archive.
pub struct PackArchive {
    locator: String,
    entries: Vec<PackEntry>,
    creators: Arc<CreatorRegistry>,
}

impl PackArchive {
    /// The archive's entries.
    pub fn entries(&self) -> &[PackEntry] {
        &self.entries
    }
}

#[async_trait]
impl BundleContainer for PackArchive {
    async fn extract_all(&self) -> AssetResult<Vec<LoadedAsset>> {
        let entries = self.entries.clone();
        let creators = self.creators.clone();
        let locator = self.locator.clone();

        tokio::task::spawn_blocking(move || {
            let mut assets = Vec::with_capacity(entries.len());
            for entry in &entries {
                match creators.create(&entry.name, &entry.extension, &entry.bytes) {
                    Some(asset) => assets.push(asset?),
                    None => log::trace!(
                        "Skipping '{}.{}' in '{locator}': no creator registered.",
                        entry.name,
                        entry.extension
                    ),
                }
            }
            Ok(assets)
        })
        .await
        .map_err(|e| AssetError::io(&self.locator, format!("extraction task failed: {e}")))?
    }

    fn release(self: Box<Self>) {
        log::trace!("Released pack '{}'.", self.locator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::ShaderSource;
    use satchel_telemetry::MetricsRegistry;

    #[test]
    fn builder_output_decodes() {
        let bytes = PackBuilder::new()
            .add("a", ".SHADER", "x")
            .add("b", "ini", "y")
            .to_bytes()
            .unwrap();
        let entries = decode_pack(&bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].extension, "shader");
        assert_eq!(entries[1].bytes, b"y");
    }

    #[test]
    fn bad_magic_is_rejected() {
        assert!(matches!(
            decode_pack(b"ZIP!...."),
            Err(AssetError::Configuration(_))
        ));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        // One entry whose name claims 2^40 bytes, followed by three.
        let mut bytes = b"SPAK".to_vec();
        bytes.extend_from_slice(&[0x01, 0x01, 0xFD]);
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        bytes.extend_from_slice(b"abc");

        assert!(matches!(
            decode_pack(&bytes),
            Err(AssetError::Configuration(msg)) if msg.contains("corrupt")
        ));
    }

    #[test]
    fn truncated_archive_is_rejected() {
        let bytes = PackBuilder::new()
            .add("a", "shader", "void main() {}")
            .to_bytes()
            .unwrap();
        for cut in [PACK_MAGIC.len(), PACK_MAGIC.len() + 2, bytes.len() - 1] {
            assert!(
                matches!(decode_pack(&bytes[..cut]), Err(AssetError::Configuration(_))),
                "cut at {cut} decoded"
            );
        }
    }

    #[tokio::test]
    async fn opener_reads_from_locator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tint.ksp");
        PackBuilder::new()
            .add("Tinted", "shader", "void main() {}")
            .add("readme", "txt", "ignored")
            .write_to(&path)
            .unwrap();

        let creators = Arc::new(CreatorRegistry::with_default_creators(&MetricsRegistry::new()));
        let opener = PackArchiveOpener::new(creators);
        let locator = BundleLocation::new(path.to_string_lossy()).locator();
        let container = opener.open(&locator).await.unwrap();
        let assets = container.extract_all().await.unwrap();
        container.release();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].name(), "Tinted");
        assert!(assets[0].is::<ShaderSource>());
    }

    #[tokio::test]
    async fn missing_archive_is_io_error() {
        let creators = Arc::new(CreatorRegistry::new(&MetricsRegistry::new()));
        let opener = PackArchiveOpener::new(creators);
        let err = opener
            .open("file:///definitely/not/here.ksp")
            .await
            .err()
            .expect("open fails");
        assert!(matches!(err, AssetError::Io { .. }));
    }
}
