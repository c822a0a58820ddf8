//! Resource identity types.
//!
//! Provides the composite identity key used to deduplicate and look up
//! resources, and the descriptor a caller hands over when pinning one.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SdkError;

/// Composite identity of a cluster resource.
///
/// Formatted as `apiVersion:kind:namespace:name`, with an empty segment for
/// any field the document does not carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Derives the key of a resource document.
    ///
    /// Only `apiVersion`, `kind`, `metadata.namespace` and `metadata.name`
    /// contribute; everything else in the document is ignored.
    #[must_use]
    pub fn of(document: &Value) -> Self {
        Self::from_parts(
            str_field(document, "apiVersion"),
            str_field(document, "kind"),
            metadata_field(document, "namespace"),
            metadata_field(document, "name"),
        )
    }

    /// Builds a key from its four identity parts.
    #[must_use]
    pub fn from_parts(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self(format!("{}:{}:{}:{}", api_version, kind, namespace, name))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A resource document offered for pinning.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Full resource document (metadata, spec, status).
    pub document: Value,

    /// Plural form for kinds the server cannot pluralize on its own.
    pub plural: Option<String>,
}

impl ResourceDescriptor {
    /// Wraps a resource document.
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self {
            document,
            plural: None,
        }
    }

    /// Sets the plural override.
    #[must_use]
    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    /// Returns the identity key of the wrapped document.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::of(&self.document)
    }

    /// Checks that the document can be pinned.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind`, `metadata` or `metadata.name` is missing.
    pub fn validate(&self) -> Result<(), SdkError> {
        if str_field(&self.document, "kind").is_empty() {
            return Err(SdkError::InvalidResource("missing kind".to_string()));
        }
        if !self.document.get("metadata").is_some_and(Value::is_object) {
            return Err(SdkError::InvalidResource("missing metadata".to_string()));
        }
        if metadata_field(&self.document, "name").is_empty() {
            return Err(SdkError::InvalidResource(
                "missing metadata.name".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the `apiVersion` of the document, or "".
    #[must_use]
    pub fn api_version(&self) -> &str {
        str_field(&self.document, "apiVersion")
    }

    /// Returns the `kind` of the document, or "".
    #[must_use]
    pub fn kind(&self) -> &str {
        str_field(&self.document, "kind")
    }

    /// Returns `metadata.name`, or "".
    #[must_use]
    pub fn name(&self) -> &str {
        metadata_field(&self.document, "name")
    }

    /// Returns `metadata.namespace` if set and non-empty.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        Some(metadata_field(&self.document, "namespace")).filter(|ns| !ns.is_empty())
    }
}

impl From<Value> for ResourceDescriptor {
    fn from(document: Value) -> Self {
        Self::new(document)
    }
}

/// Coordinates of a resource on the server, used to fetch it before pinning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// API group and version, e.g. `pkg.crossplane.io/v1`.
    pub api_version: String,
    /// Resource kind.
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// Namespace, absent for cluster-scoped resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Plural override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
}

impl ResourceRef {
    /// Parses `apiVersion/kind/[namespace/]name`.
    ///
    /// The api version may itself contain a group (`group/version`), so the
    /// kind is located as the first segment starting with an uppercase letter.
    #[must_use]
    pub fn parse(spec: &str) -> Option<Self> {
        let parts: Vec<&str> = spec.split('/').collect();
        let kind_idx = parts
            .iter()
            .position(|p| p.chars().next().is_some_and(char::is_uppercase))?;
        if kind_idx == 0 {
            return None;
        }

        let api_version = parts.get(..kind_idx)?.join("/");
        let kind = (*parts.get(kind_idx)?).to_string();
        let rest = parts.get(kind_idx + 1..)?;

        let (namespace, name) = match rest {
            [name] => (None, *name),
            [namespace, name] => (Some((*namespace).to_string()), *name),
            _ => return None,
        };
        if name.is_empty() {
            return None;
        }

        Some(Self {
            api_version,
            kind,
            name: name.to_string(),
            namespace,
            plural: None,
        })
    }

    /// Returns the identity key this reference resolves to.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::from_parts(
            &self.api_version,
            &self.kind,
            self.namespace.as_deref().unwrap_or(""),
            &self.name,
        )
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}/{}", self.api_version, self.kind, ns, self.name),
            None => write!(f, "{}/{}/{}", self.api_version, self.kind, self.name),
        }
    }
}

pub(crate) fn str_field<'a>(document: &'a Value, field: &str) -> &'a str {
    document.get(field).and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn metadata_field<'a>(document: &'a Value, field: &str) -> &'a str {
    document
        .get("metadata")
        .and_then(|m| m.get(field))
        .and_then(Value::as_str)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_full_document() {
        let doc = json!({
            "apiVersion": "v1",
            "kind": "Widget",
            "metadata": { "name": "a", "namespace": "ns" },
            "status": { "x": 1 }
        });
        assert_eq!(ResourceKey::of(&doc).as_str(), "v1:Widget:ns:a");
    }

    #[test]
    fn test_key_missing_fields_are_empty() {
        let doc = json!({ "kind": "Widget", "metadata": { "name": "a" } });
        assert_eq!(ResourceKey::of(&doc).as_str(), ":Widget::a");

        assert_eq!(ResourceKey::of(&json!(null)).as_str(), ":::");
        assert_eq!(ResourceKey::of(&json!({ "kind": 42 })).as_str(), ":::");
    }

    #[test]
    fn test_key_ignores_non_identity_fields() {
        let a = json!({
            "apiVersion": "v1",
            "kind": "Widget",
            "metadata": { "name": "a", "namespace": "ns", "resourceVersion": "1" },
            "spec": { "size": 1 }
        });
        let b = json!({
            "apiVersion": "v1",
            "kind": "Widget",
            "metadata": { "name": "a", "namespace": "ns", "resourceVersion": "2" },
            "status": { "ready": true }
        });
        assert_eq!(ResourceKey::of(&a), ResourceKey::of(&b));
    }

    #[test]
    fn test_key_from_parts_matches_of() {
        let doc = json!({
            "apiVersion": "pkg.crossplane.io/v1",
            "kind": "Provider",
            "metadata": { "name": "provider-aws" }
        });
        assert_eq!(
            ResourceKey::of(&doc),
            ResourceKey::from_parts("pkg.crossplane.io/v1", "Provider", "", "provider-aws")
        );
    }

    #[test]
    fn test_descriptor_validate() {
        let ok = ResourceDescriptor::new(json!({ "kind": "Widget", "metadata": { "name": "a" } }));
        assert!(ok.validate().is_ok());

        let no_kind = ResourceDescriptor::new(json!({ "metadata": { "name": "a" } }));
        assert!(no_kind.validate().is_err());

        let empty_kind = ResourceDescriptor::new(json!({ "kind": "", "metadata": { "name": "a" } }));
        assert!(empty_kind.validate().is_err());

        let no_metadata = ResourceDescriptor::new(json!({ "kind": "Widget" }));
        assert!(no_metadata.validate().is_err());

        let no_name = ResourceDescriptor::new(json!({ "kind": "Widget", "metadata": {} }));
        assert!(no_name.validate().is_err());
    }

    #[test]
    fn test_descriptor_accessors() {
        let desc = ResourceDescriptor::new(json!({
            "apiVersion": "v1",
            "kind": "Widget",
            "metadata": { "name": "a", "namespace": "" }
        }))
        .with_plural("widgets");

        assert_eq!(desc.api_version(), "v1");
        assert_eq!(desc.kind(), "Widget");
        assert_eq!(desc.name(), "a");
        assert_eq!(desc.namespace(), None);
        assert_eq!(desc.plural.as_deref(), Some("widgets"));
    }

    #[test]
    fn test_ref_parse_namespaced() {
        let r = ResourceRef::parse("example.org/v1alpha1/XDatabase/team-a/db").expect("parse");
        assert_eq!(r.api_version, "example.org/v1alpha1");
        assert_eq!(r.kind, "XDatabase");
        assert_eq!(r.namespace.as_deref(), Some("team-a"));
        assert_eq!(r.name, "db");
        assert_eq!(r.key().as_str(), "example.org/v1alpha1:XDatabase:team-a:db");
    }

    #[test]
    fn test_ref_parse_cluster_scoped() {
        let r = ResourceRef::parse("v1/Widget/a").expect("parse");
        assert_eq!(r.api_version, "v1");
        assert_eq!(r.kind, "Widget");
        assert!(r.namespace.is_none());
        assert_eq!(r.to_string(), "v1/Widget/a");
    }

    #[test]
    fn test_ref_parse_invalid() {
        assert!(ResourceRef::parse("Widget/a").is_none());
        assert!(ResourceRef::parse("v1/widget/a").is_none());
        assert!(ResourceRef::parse("v1/Widget").is_none());
        assert!(ResourceRef::parse("v1/Widget/ns/a/extra").is_none());
        assert!(ResourceRef::parse("v1/Widget/").is_none());
    }
}
