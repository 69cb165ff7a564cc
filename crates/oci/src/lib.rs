//! OCI artifact pulling for artifactctl.
//!
//! This crate provides functionality to:
//! - Parse `oci://` artifact references
//! - Resolve registry credentials from the local Docker login config
//! - Pull an artifact's content layer and verify its digest
//! - Extract the content into an existing directory
//!
//! # Example
//!
//! ```ignore
//! use artifactctl_oci::{ArtifactPuller, DockerConfig, OciClient};
//! use std::time::Duration;
//!
//! let puller = ArtifactPuller::new(OciClient::default(), DockerConfig::discover());
//! let meta = puller
//!     .pull("oci://ghcr.io/org/manifests/app:v0.0.1", "./manifests".as_ref(), Duration::from_secs(60))
//!     .await?;
//! println!("{} {}", meta.revision, meta.digest);
//! ```

#![warn(missing_docs)]

mod credentials;
mod destination;
mod error;
mod extract;
mod metadata;
mod puller;
mod reference;
mod registry;

pub use credentials::{CredentialSource, Credentials, DockerConfig, StaticCredentials};
pub use destination::PullDestination;
pub use error::{Error, ErrorKind, Result};
pub use extract::{extract_archive, extract_layer};
pub use metadata::{
    ArtifactMetadata, CREATED_ANNOTATION, REVISION_ANNOTATION, SOURCE_ANNOTATION,
};
pub use puller::ArtifactPuller;
pub use reference::{ArtifactReference, DEFAULT_TAG, OCI_SCHEME, Revision};
pub use registry::{OciClient, OciClientConfig, RegistryClient, STAGING_PREFIX};

/// Re-exported so custom [`RegistryClient`]s can honour cancellation.
pub use tokio_util::sync::CancellationToken;
