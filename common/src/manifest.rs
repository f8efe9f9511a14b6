//! Static pod manifest as written by the installer into the manifests
//! directory and into every revisioned resources directory.
//!
//! Only the fields the startup monitor reads or rewrites are typed. Everything
//! else is kept verbatim in flattened maps so a manifest survives a
//! decode/encode cycle without losing the parts we do not understand.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Deployment generation of a static pod.
pub type Revision = u64;

/// Label carrying the revision on every installer-written manifest.
pub const REVISION_LABEL: &str = "revision";

/// Annotation stamped on a manifest republished during a fallback. The value
/// is the revision that failed to become healthy.
pub const FALLBACK_FOR_REVISION_ANNOTATION: &str = "fallback-for-revision";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to decode pod manifest: {0}")]
    Decode(#[source] serde_yaml::Error),

    #[error("failed to encode pod manifest: {0}")]
    Encode(#[source] serde_yaml::Error),

    #[error("pod {0} doesn't have revision label")]
    MissingRevision(String),

    #[error("empty revision label on {0} pod")]
    EmptyRevision(String),

    #[error("invalid revision label on pod {name}: {value:?}")]
    InvalidRevision { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Metadata fields the monitor never touches.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "serde_yaml::Value::is_null")]
    pub spec: serde_yaml::Value,
    /// Top level fields other than the ones above, e.g. `status`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl PodManifest {
    pub fn from_slice(raw: &[u8]) -> Result<Self, ManifestError> {
        serde_yaml::from_slice(raw).map_err(ManifestError::Decode)
    }

    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        serde_yaml::to_string(self).map_err(ManifestError::Encode)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Parse the `revision` label.
    ///
    /// A missing, empty, negative or non-numeric label is an error; the
    /// manifest is then considered unusable for the current sync.
    pub fn revision(&self) -> Result<Revision, ManifestError> {
        let name = &self.metadata.name;
        let value = self
            .metadata
            .labels
            .get(REVISION_LABEL)
            .ok_or_else(|| ManifestError::MissingRevision(name.clone()))?;
        if value.is_empty() {
            return Err(ManifestError::EmptyRevision(name.clone()));
        }
        value
            .parse::<Revision>()
            .map_err(|_| ManifestError::InvalidRevision {
                name: name.clone(),
                value: value.clone(),
            })
    }

    pub fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.annotations.insert(key.into(), value.into());
    }

    /// Replace `metadata.uid` with a freshly generated one and return it.
    ///
    /// The node agent treats a manifest with an unchanged name, file and uid as
    /// an update of the running pod; a new uid forces a delete and create.
    pub fn regenerate_uid(&mut self) -> String {
        let uid = Uuid::new_v4().to_string();
        self.metadata.uid = Some(uid.clone());
        uid
    }
}
