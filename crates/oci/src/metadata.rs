//! Metadata describing a pulled artifact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reference::{ArtifactReference, Revision};

/// Annotation holding the artifact creation timestamp.
pub const CREATED_ANNOTATION: &str = "org.opencontainers.image.created";

/// Annotation holding the URL the artifact content was built from.
pub const SOURCE_ANNOTATION: &str = "org.opencontainers.image.source";

/// Annotation holding the revision (e.g. a commit) the artifact was built from.
pub const REVISION_ANNOTATION: &str = "org.opencontainers.image.revision";

/// Result of a successful pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// The reference URL as supplied by the caller.
    pub source: String,
    /// Resolved revision identifier.
    pub revision: String,
    /// Content digest in `<host>/<repository>@sha256:<hex>` form.
    pub digest: String,
    /// Where the artifact content came from, if annotated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Creation timestamp, if annotated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// All manifest annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ArtifactMetadata {
    /// Build metadata for `reference` from its manifest annotations and digest.
    ///
    /// The revision annotation wins; otherwise the reference's own tag or
    /// digest is reported.
    #[must_use]
    pub fn from_manifest(
        reference: &ArtifactReference,
        manifest_digest: &str,
        annotations: BTreeMap<String, String>,
    ) -> Self {
        let revision = annotations
            .get(REVISION_ANNOTATION)
            .filter(|r| !r.is_empty())
            .cloned()
            .unwrap_or_else(|| match reference.revision() {
                Revision::Tag(tag) => tag,
                Revision::Digest(digest) => digest,
            });

        Self {
            source: reference.url().to_string(),
            revision,
            digest: reference.with_content_digest(manifest_digest),
            origin: annotations.get(SOURCE_ANNOTATION).cloned(),
            created: annotations.get(CREATED_ANNOTATION).cloned(),
            annotations,
        }
    }
}
