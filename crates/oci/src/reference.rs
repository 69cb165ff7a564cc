//! Artifact reference parsing.
//!
//! Artifact URLs take the form `oci://<host>/<repository>[:<tag>|@<digest>]`.
//! Parsing never touches the network or the filesystem.

use oci_distribution::Reference;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// URL scheme every artifact reference must carry.
pub const OCI_SCHEME: &str = "oci://";

/// Tag used when a reference names neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

/// The revision part of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Revision {
    /// A mutable tag, resolved by the registry at pull time.
    Tag(String),
    /// An immutable content digest (e.g. `sha256:...`).
    Digest(String),
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => write!(f, "{tag}"),
            Self::Digest(digest) => write!(f, "{digest}"),
        }
    }
}

/// A parsed `oci://` artifact reference.
#[derive(Debug, Clone)]
pub struct ArtifactReference {
    url: String,
    inner: Reference,
}

impl ArtifactReference {
    /// Parse an artifact URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] if the URL is empty, lacks the
    /// `oci://` scheme, or does not name a valid repository.
    pub fn parse(url: &str) -> Result<Self> {
        if url.is_empty() {
            return Err(Error::invalid_reference(url, "artifact URL is required"));
        }

        let Some(rest) = url.strip_prefix(OCI_SCHEME) else {
            return Err(Error::invalid_reference(
                url,
                "URL must be in format 'oci://<domain>/<org>/<repo>'",
            ));
        };

        if rest.is_empty() || rest.starts_with('/') || rest.contains(char::is_whitespace) {
            return Err(Error::invalid_reference(
                url,
                "URL must be in format 'oci://<domain>/<org>/<repo>'",
            ));
        }

        let parsed: Reference = rest
            .parse()
            .map_err(|e: oci_distribution::ParseError| Error::invalid_reference(url, e.to_string()))?;

        // Pin untagged references to the default tag so every reference
        // names exactly one revision.
        let inner = if parsed.tag().is_none() && parsed.digest().is_none() {
            Reference::with_tag(
                parsed.registry().to_string(),
                parsed.repository().to_string(),
                DEFAULT_TAG.to_string(),
            )
        } else {
            parsed
        };

        Ok(Self {
            url: url.to_string(),
            inner,
        })
    }

    /// The URL exactly as supplied by the caller.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Registry host, including the port if one was given.
    #[must_use]
    pub fn registry(&self) -> &str {
        self.inner.registry()
    }

    /// Repository path within the registry.
    #[must_use]
    pub fn repository(&self) -> &str {
        self.inner.repository()
    }

    /// The tag, if the reference names one.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.inner.tag()
    }

    /// The digest, if the reference names one.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.inner.digest()
    }

    /// The revision this reference pins. A digest wins over a tag.
    #[must_use]
    pub fn revision(&self) -> Revision {
        match (self.inner.digest(), self.inner.tag()) {
            (Some(digest), _) => Revision::Digest(digest.to_string()),
            (None, Some(tag)) => Revision::Tag(tag.to_string()),
            (None, None) => Revision::Tag(DEFAULT_TAG.to_string()),
        }
    }

    /// Content-addressed form of this repository at `digest`.
    ///
    /// For example `ghcr.io/org/app@sha256:...`.
    #[must_use]
    pub fn with_content_digest(&self, digest: &str) -> String {
        format!("{}/{}@{}", self.registry(), self.repository(), digest)
    }

    /// The underlying registry reference.
    #[must_use]
    pub const fn as_oci(&self) -> &Reference {
        &self.inner
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry(), self.repository())?;
        match self.revision() {
            Revision::Digest(digest) => write!(f, "@{digest}"),
            Revision::Tag(tag) => write!(f, ":{tag}"),
        }
    }
}

impl FromStr for ArtifactReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
