//! Content domain types.
//!
//! The two shapes of content the pipeline evaluates: a text prompt
//! before generation, and a rendered artifact after generation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A piece of content submitted to a guard.
///
/// Serialization is canonical: struct fields serialize in declaration
/// order and metadata uses a sorted map, so the serialized form is
/// stable and suitable for fingerprinting.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    /// A text prompt, evaluated before generation starts.
    Prompt {
        text: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        metadata: BTreeMap<String, serde_json::Value>,
    },
    /// A rendered artifact, evaluated before release.
    Artifact {
        /// Location of the artifact in object storage.
        uri: String,
        /// MIME type, e.g. `video/mp4`.
        media_type: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        metadata: BTreeMap<String, serde_json::Value>,
    },
}

impl Content {
    /// Convenience constructor for a plain text prompt.
    pub fn prompt(text: impl Into<String>) -> Self {
        Content::Prompt {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Convenience constructor for an artifact reference.
    pub fn artifact(uri: impl Into<String>, media_type: impl Into<String>) -> Self {
        Content::Artifact {
            uri: uri.into(),
            media_type: media_type.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Text representation used by scorers that operate on text.
    pub fn scannable_text(&self) -> String {
        match self {
            Content::Prompt { text, metadata } => {
                let mut out = text.clone();
                for value in metadata.values() {
                    if let Some(s) = value.as_str() {
                        out.push(' ');
                        out.push_str(s);
                    }
                }
                out
            }
            Content::Artifact { uri, metadata, .. } => {
                let mut out = uri.clone();
                for value in metadata.values() {
                    if let Some(s) = value.as_str() {
                        out.push(' ');
                        out.push_str(s);
                    }
                }
                out
            }
        }
    }

    /// Metadata map attached to this content.
    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        match self {
            Content::Prompt { metadata, .. } | Content::Artifact { metadata, .. } => metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_serialization_is_stable() {
        let a = Content::prompt("a sunset over the ocean");
        let b = Content::prompt("a sunset over the ocean");
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_metadata_order_is_canonical() {
        let mut first = BTreeMap::new();
        first.insert("z".to_string(), serde_json::json!(1));
        first.insert("a".to_string(), serde_json::json!(2));

        let mut second = BTreeMap::new();
        second.insert("a".to_string(), serde_json::json!(2));
        second.insert("z".to_string(), serde_json::json!(1));

        let a = Content::Prompt {
            text: "x".to_string(),
            metadata: first,
        };
        let b = Content::Prompt {
            text: "x".to_string(),
            metadata: second,
        };
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_scannable_text_includes_metadata_strings() {
        let mut metadata = BTreeMap::new();
        metadata.insert("style".to_string(), serde_json::json!("noir"));
        let content = Content::Prompt {
            text: "city street".to_string(),
            metadata,
        };
        assert!(content.scannable_text().contains("noir"));
    }
}
