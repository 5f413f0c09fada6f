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

//! Error taxonomy for the bundle lifecycle.

use crate::bundle::{BundleState, SuspensionPoint};
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for asset and bundle operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// An error raised by the bundle lifecycle.
///
/// Attribute join misses and type mismatches are deliberately non-fatal: the
/// former is only ever logged, the latter is never constructed because typed
/// queries silently skip assets of another kind.
#[derive(Debug, Clone, Error)]
pub enum AssetError {
    /// A container, directory or download could not be reached or read.
    #[error("I/O failure at '{location}': {reason}")]
    Io {
        /// The path or locator that failed.
        location: String,
        /// The underlying error message.
        reason: String,
    },

    /// Malformed paths or a sidecar entry missing a required field.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A sidecar entry names an asset that is not present in the index.
    #[error("attribute entry '{name}' matches no loaded asset")]
    AttributeJoinMiss {
        /// The asset name declared by the sidecar entry.
        name: String,
    },

    /// A query or mutation targeted a bundle that already reached a terminal state.
    #[error("bundle '{bundle_id}' is {state:?} and can no longer be queried or mutated")]
    StaleReference {
        /// The identifier of the retired bundle.
        bundle_id: String,
        /// The terminal state the bundle is in.
        state: BundleState,
    },

    /// A creator could not turn raw bytes into an asset.
    #[error("failed to decode asset '{name}': {reason}")]
    Decode {
        /// The name of the asset being decoded.
        name: String,
        /// The creator's error message.
        reason: String,
    },

    /// A state write that does not follow the forward-only lifecycle.
    #[error("bundle '{bundle_id}' cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The identifier of the bundle.
        bundle_id: String,
        /// The state the bundle is currently in.
        from: BundleState,
        /// The state that was requested.
        to: BundleState,
    },

    /// A suspension point did not complete within the configured limit.
    #[error("bundle '{bundle_id}' timed out after {elapsed:?} while {point}")]
    Timeout {
        /// The identifier of the bundle.
        bundle_id: String,
        /// Where the load was suspended.
        point: SuspensionPoint,
        /// The limit that was exceeded.
        elapsed: Duration,
    },

    /// The load was cancelled while suspended.
    #[error("bundle '{bundle_id}' was cancelled while {point}")]
    Cancelled {
        /// The identifier of the bundle.
        bundle_id: String,
        /// Where the load was suspended.
        point: SuspensionPoint,
    },
}

impl AssetError {
    /// Builds an [`AssetError::Io`] from any displayable error.
    pub fn io(location: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Io {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` for errors that end a bundle's load.
    ///
    /// Join misses are reported but never abort the pipeline.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AssetError::AttributeJoinMiss { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_miss_is_not_fatal() {
        let miss = AssetError::AttributeJoinMiss {
            name: "ghost".to_string(),
        };
        assert!(!miss.is_fatal());
        assert!(AssetError::Configuration("x".into()).is_fatal());
    }

    #[test]
    fn io_error_message_names_location() {
        let err = AssetError::io("file:///mods/a.bundle", "not found");
        assert_eq!(
            err.to_string(),
            "I/O failure at 'file:///mods/a.bundle': not found"
        );
    }
}
