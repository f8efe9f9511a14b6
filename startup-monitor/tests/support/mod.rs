#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use startup_monitor::TargetLayout;
use tempfile::TempDir;

pub const TARGET: &str = "kube-apiserver";

/// A manifests directory and a static pod resources directory in a temp dir.
pub struct Node {
    pub root: TempDir,
    pub layout: TargetLayout,
}

pub fn pod_yaml(revision: u64, uid: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Pod
metadata:
  name: {TARGET}
  namespace: openshift-kube-apiserver
  uid: {uid}
  labels:
    app: openshift-kube-apiserver
    revision: "{revision}"
spec:
  containers:
  - name: {TARGET}
    image: registry.local/kube-apiserver:rev{revision}
"#
    )
}

impl Node {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let manifests = root.path().join("manifests");
        let resources = root.path().join("static-pod-resources");
        fs::create_dir_all(&manifests).unwrap();
        fs::create_dir_all(&resources).unwrap();
        let layout = TargetLayout::new(TARGET, manifests, resources);
        Node { root, layout }
    }

    /// Write the revisioned manifest of `revision`, as the installer does.
    pub fn install_revision(&self, revision: u64) {
        let manifest = self.layout.revisioned_manifest(revision);
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(&manifest, pod_yaml(revision, &format!("uid-{revision}"))).unwrap();
    }

    /// Make `revision` the active manifest and create the monitor marker.
    pub fn activate(&self, revision: u64) {
        fs::write(
            self.layout.active_manifest(),
            pod_yaml(revision, &format!("uid-{revision}")),
        )
        .unwrap();
        fs::write(self.layout.self_marker(), "kind: Pod\n").unwrap();
    }

    pub fn snapshot(&self) -> BTreeMap<PathBuf, String> {
        let mut out = BTreeMap::new();
        walk(self.root.path(), &mut out);
        out
    }
}

fn walk(dir: &Path, out: &mut BTreeMap<PathBuf, String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let kind = entry.file_type().unwrap();
        if kind.is_symlink() {
            let target = fs::read_link(&path).unwrap();
            out.insert(path, format!("-> {}", target.display()));
        } else if kind.is_dir() {
            out.insert(path.clone(), "<dir>".to_string());
            walk(&path, out);
        } else {
            out.insert(path.clone(), fs::read_to_string(&path).unwrap());
        }
    }
}
