use std::path::{Path, PathBuf};

use common::Revision;

/// Paths of one static pod target.
///
/// The root manifests live in `manifests_dir`, the revisioned copies and the
/// last known good link in `resources_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    target: String,
    manifests_dir: PathBuf,
    resources_dir: PathBuf,
}

impl TargetLayout {
    pub fn new(
        target: impl Into<String>,
        manifests_dir: impl Into<PathBuf>,
        resources_dir: impl Into<PathBuf>,
    ) -> Self {
        TargetLayout {
            target: target.into(),
            manifests_dir: manifests_dir.into(),
            resources_dir: resources_dir.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    /// The manifest the node agent currently runs.
    pub fn active_manifest(&self) -> PathBuf {
        self.manifests_dir.join(self.manifest_file_name())
    }

    /// Sentinel whose removal tells the host that the monitor is done.
    pub fn self_marker(&self) -> PathBuf {
        self.manifests_dir
            .join(format!("{}-startup-monitor.yaml", self.target))
    }

    pub fn revision_dir_prefix(&self) -> String {
        format!("{}-pod-", self.target)
    }

    pub fn revisioned_manifest(&self, revision: Revision) -> PathBuf {
        self.resources_dir
            .join(format!("{}{revision}", self.revision_dir_prefix()))
            .join(self.manifest_file_name())
    }

    pub fn last_known_good(&self) -> PathBuf {
        self.resources_dir
            .join(format!("{}-last-known-good", self.target))
    }

    fn manifest_file_name(&self) -> String {
        format!("{}-pod.yaml", self.target)
    }
}
