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

//! The structured document read from a bundle's attribute sidecar.
//!
//! The text format is a tree of tagged nodes holding `key = value` pairs:
//!
//! ```text
//! // shaders.ksp.atr
//! ASSET_ATTRIBUTE
//! {
//!     name = TintedDiffuse
//!     replace = KSP/Diffuse
//!     replace = KSP/Bumped
//!     parameter = tintHue, _TintHue
//! }
//! ```
//!
//! Keys and node tags may repeat. Values are kept as raw strings.

use crate::error::{AssetError, AssetResult};

const ROOT_TAG: &str = "root";

/// One node of an attribute document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeNode {
    tag: String,
    values: Vec<(String, String)>,
    nodes: Vec<AttributeNode>,
}

impl AttributeNode {
    /// Creates an empty node with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Parses a whole document. The returned node is an untagged root.
    ///
    /// # Errors
    /// Returns [`AssetError::Configuration`] for unbalanced braces, a `{` with no
    /// preceding tag, or a line that is neither a tag nor a `key = value` pair.
    pub fn parse(text: &str) -> AssetResult<Self> {
        let mut stack = vec![AttributeNode::new(ROOT_TAG)];
        let mut pending_tag: Option<String> = None;

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.split("//").next().unwrap_or_default();
            for token in tokenize(line) {
                match token {
                    "{" => {
                        let tag = pending_tag.take().ok_or_else(|| {
                            AssetError::Configuration(format!(
                                "line {}: '{{' without a node name",
                                line_no + 1
                            ))
                        })?;
                        stack.push(AttributeNode::new(tag));
                    }
                    "}" => {
                        if stack.len() == 1 {
                            return Err(AssetError::Configuration(format!(
                                "line {}: unmatched '}}'",
                                line_no + 1
                            )));
                        }
                        if let Some(node) = stack.pop() {
                            if let Some(parent) = stack.last_mut() {
                                parent.nodes.push(node);
                            }
                        }
                    }
                    pair if pair.contains('=') => {
                        if let Some(tag) = pending_tag.take() {
                            return Err(AssetError::Configuration(format!(
                                "line {}: node '{tag}' has no body",
                                line_no + 1
                            )));
                        }
                        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                        if let Some(node) = stack.last_mut() {
                            node.add_value(key.trim(), value.trim());
                        }
                    }
                    tag => {
                        if let Some(previous) = pending_tag.replace(tag.to_string()) {
                            return Err(AssetError::Configuration(format!(
                                "line {}: node '{previous}' has no body",
                                line_no + 1
                            )));
                        }
                    }
                }
            }
        }

        if let Some(tag) = pending_tag {
            return Err(AssetError::Configuration(format!(
                "node '{tag}' has no body"
            )));
        }
        if stack.len() != 1 {
            return Err(AssetError::Configuration(format!(
                "{} unclosed node(s) at end of document",
                stack.len() - 1
            )));
        }
        Ok(stack.pop().unwrap_or_default())
    }

    /// The node's tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Appends a value. Existing values with the same key are kept.
    pub fn add_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.push((key.into(), value.into()));
    }

    /// Appends a child node.
    pub fn add_node(&mut self, node: AttributeNode) {
        self.nodes.push(node);
    }

    /// The first value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `key`, in document order.
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Whether at least one value is stored under `key`.
    pub fn has_value(&self, key: &str) -> bool {
        self.values.iter().any(|(k, _)| k == key)
    }

    /// All `key = value` pairs of this node.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Child nodes tagged `tag`.
    pub fn nodes<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a AttributeNode> + 'a {
        self.nodes.iter().filter(move |n| n.tag == tag)
    }

    /// All child nodes.
    pub fn children(&self) -> &[AttributeNode] {
        &self.nodes
    }
}

/// Splits a line into braces and the text between them.
fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, c) in line.char_indices() {
        if c == '{' || c == '}' {
            let before = line[start..i].trim();
            if !before.is_empty() {
                tokens.push(before);
            }
            tokens.push(&line[i..i + 1]);
            start = i + 1;
        }
    }
    let rest = line[start..].trim();
    if !rest.is_empty() {
        tokens.push(rest);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
// tint shaders
ASSET_ATTRIBUTE
{
    name = TintedDiffuse
    replace = KSP/Diffuse
    replace = KSP/Bumped
    parameter = tintHue, _TintHue
}
ASSET_ATTRIBUTE { name = TintedSpecular }
OTHER
{
    name = ignored
    NESTED
    {
        depth = 2
    }
}
"#;

    #[test]
    fn parses_nodes_and_repeated_values() {
        let doc = AttributeNode::parse(SAMPLE).expect("sample parses");
        let attrs: Vec<_> = doc.nodes("ASSET_ATTRIBUTE").collect();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].value("name"), Some("TintedDiffuse"));
        assert_eq!(attrs[0].values("replace"), vec!["KSP/Diffuse", "KSP/Bumped"]);
        assert_eq!(attrs[0].value("parameter"), Some("tintHue, _TintHue"));
        assert_eq!(attrs[1].value("name"), Some("TintedSpecular"));
    }

    #[test]
    fn nested_nodes_are_kept() {
        let doc = AttributeNode::parse(SAMPLE).expect("sample parses");
        let other = doc.nodes("OTHER").next().expect("OTHER node");
        let nested = other.nodes("NESTED").next().expect("NESTED node");
        assert_eq!(nested.value("depth"), Some("2"));
        assert_eq!(doc.children().len(), 3);
    }

    #[test]
    fn comments_are_stripped() {
        let doc = AttributeNode::parse("A { key = v // trailing\n }").expect("parses");
        let a = doc.nodes("A").next().expect("A node");
        assert_eq!(a.value("key"), Some("v"));
    }

    #[test]
    fn empty_value_is_allowed() {
        let doc = AttributeNode::parse("A { key = }").expect("parses");
        assert_eq!(doc.nodes("A").next().and_then(|a| a.value("key")), Some(""));
    }

    #[test]
    fn unbalanced_braces_fail() {
        assert!(matches!(
            AttributeNode::parse("A {\n name = x\n"),
            Err(AssetError::Configuration(_))
        ));
        assert!(matches!(
            AttributeNode::parse("}\n"),
            Err(AssetError::Configuration(_))
        ));
        assert!(matches!(
            AttributeNode::parse("{ name = x }"),
            Err(AssetError::Configuration(_))
        ));
    }

    #[test]
    fn tag_without_body_fails() {
        assert!(AttributeNode::parse("A\nB\n{ }").is_err());
        assert!(AttributeNode::parse("A").is_err());
    }
}
