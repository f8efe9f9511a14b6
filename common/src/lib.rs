pub mod manifest;

pub use manifest::{
    FALLBACK_FOR_REVISION_ANNOTATION, ManifestError, ObjectMeta, PodManifest, REVISION_LABEL,
    Revision,
};
