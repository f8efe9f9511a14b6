//! Maintenance of the last known good link and the fall back procedure.

use std::io;

use common::{FALLBACK_FOR_REVISION_ANNOTATION, PodManifest, Revision};
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::fs::{FileSystem, file_exists, remove_if_exists};
use crate::layout::TargetLayout;
use crate::revision::find_previous_revision;

/// Permission bits of a root manifest written by the monitor.
pub const MANIFEST_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// The last known good manifest was republished as the active one.
    Restored { from: Revision },
    /// Nothing usable to fall back to.
    NoCandidate,
}

/// Point the last known good link at the manifest of `revision`.
///
/// In strict mode an existing link is removed first. A link left dangling by a
/// pruned revision is replaced in either mode. A directory in place of the
/// link is never removed.
pub fn create_last_known_good(
    fs: &dyn FileSystem,
    layout: &TargetLayout,
    revision: Revision,
    strict: bool,
) -> Result<(), MonitorError> {
    let target = layout.revisioned_manifest(revision);
    let link = layout.last_known_good();

    if strict && file_exists(fs, &link)? {
        fs.remove(&link).map_err(|e| MonitorError::io(&link, e))?;
        info!(
            "Removed existing last known good revision manifest {}",
            link.display()
        );
    }

    let symlink_err = |source| MonitorError::Symlink {
        link: link.clone(),
        target: target.clone(),
        source,
    };
    match fs.symlink(&target, &link) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            // A link whose revision was pruned resolves to nothing but still
            // occupies the path.
            if file_exists(fs, &link)? {
                return Err(symlink_err(e));
            }
            fs.remove(&link).map_err(|e| MonitorError::io(&link, e))?;
            warn!("Removed dangling last known good link {}", link.display());
            fs.symlink(&target, &link).map_err(symlink_err)?;
        }
        Err(e) => return Err(symlink_err(e)),
    }
    info!("Created a symlink {} for {}", link.display(), target.display());
    Ok(())
}

/// Record `revision` as the last known good one and remove the monitor's own
/// marker so that the host tears it down.
///
/// Safe to repeat: the link is recreated and a marker that is already gone is
/// not an error.
pub fn promote_and_retire(
    fs: &dyn FileSystem,
    layout: &TargetLayout,
    revision: Revision,
) -> Result<(), MonitorError> {
    create_last_known_good(fs, layout, revision, true)?;

    let marker = layout.self_marker();
    if remove_if_exists(fs, &marker)? {
        info!("Removed the startup monitor marker {}", marker.display());
    }
    Ok(())
}

/// Republish the last known good manifest as the active one because
/// `pinned` did not become healthy in time.
///
/// When no last known good link exists yet one is created for the previous
/// revision found among the resource directories. Running out of candidates
/// is not an error; it is logged and reported as
/// [`FallbackOutcome::NoCandidate`].
pub fn fallback_to_previous_revision(
    fs: &dyn FileSystem,
    layout: &TargetLayout,
    pinned: Revision,
) -> Result<FallbackOutcome, MonitorError> {
    let link = layout.last_known_good();

    if !file_exists(fs, &link)? {
        let Some(previous) = find_previous_revision(fs, layout)? else {
            info!(
                "Unable to roll back because no previous revision has been found for {}",
                layout.target()
            );
            return Ok(FallbackOutcome::NoCandidate);
        };
        if previous >= pinned {
            warn!(
                "Previous revision {previous} is not older than the watched revision {pinned}, falling back to it anyway"
            );
        }

        let previous_manifest = layout.revisioned_manifest(previous);
        if !file_exists(fs, &previous_manifest)? {
            info!(
                "Unable to roll back because a manifest {:?} hasn't been found for the previous revision {previous}",
                previous_manifest
            );
            return Ok(FallbackOutcome::NoCandidate);
        }

        create_last_known_good(fs, layout, previous, false)?;
    }

    // Either the link existed, was just created, or a previous sync failed
    // after creating it. In every case republish what it points at.
    let raw = fs.read_file(&link).map_err(|e| MonitorError::io(&link, e))?;
    let mut pod = PodManifest::from_slice(&raw).map_err(|e| MonitorError::manifest(&link, e))?;
    pod.set_annotation(FALLBACK_FOR_REVISION_ANNOTATION, pinned.to_string());
    pod.regenerate_uid();

    let active = layout.active_manifest();
    // Remove first so file watchers observe a create rather than a modification.
    if remove_if_exists(fs, &active)? {
        info!("Removed existing static pod manifest {:?}", active);
    }

    let content = pod.to_yaml().map_err(|e| MonitorError::manifest(&active, e))?;
    info!("Writing a static pod manifest {:?}", active);
    debug!("{content}");
    fs.write_file(&active, content.as_bytes(), MANIFEST_MODE)
        .map_err(|e| MonitorError::io(&active, e))?;

    Ok(FallbackOutcome::Restored { from: pinned })
}
