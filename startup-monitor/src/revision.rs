use common::Revision;
use tracing::debug;

use crate::error::MonitorError;
use crate::fs::FileSystem;
use crate::layout::TargetLayout;

/// Find the revision preceding the newest one among the revisioned resource
/// directories of the target.
///
/// Only directories starting with the target name are considered and each of
/// them must be named `<target>-pod-<revision>`; a single malformed name fails
/// the whole lookup. Returns `None` when fewer than two revisions exist.
///
/// The result is the second highest revision found. It is not compared with
/// the revision being watched.
pub fn find_previous_revision(
    fs: &dyn FileSystem,
    layout: &TargetLayout,
) -> Result<Option<Revision>, MonitorError> {
    let dir = layout.resources_dir();
    let entries = fs.read_dir(dir).map_err(|e| MonitorError::io(dir, e))?;
    let separator = layout.revision_dir_prefix();

    let mut revisions = Vec::new();
    for entry in entries {
        if !entry.is_dir || !entry.name.starts_with(layout.target()) {
            continue;
        }

        debug!("Considering {} for revision extraction", entry.name);
        let parts: Vec<&str> = entry.name.split(separator.as_str()).collect();
        if parts.len() != 2 {
            return Err(MonitorError::RevisionFormat { name: entry.name });
        }
        let revision = parts[1]
            .parse::<Revision>()
            .map_err(|source| MonitorError::RevisionParse {
                name: entry.name.clone(),
                source,
            })?;
        revisions.push(revision);
    }

    if revisions.len() < 2 {
        return Ok(None);
    }
    revisions.sort_unstable();
    Ok(Some(revisions[revisions.len() - 2]))
}
