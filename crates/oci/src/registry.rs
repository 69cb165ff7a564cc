//! OCI registry client for resolving and pulling artifacts.
//!
//! Uses `oci-distribution` for registry operations.

use async_trait::async_trait;
use oci_distribution::Client;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::OciDistributionError;
use oci_distribution::manifest::OciDescriptor;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use crate::credentials::Credentials;
use crate::extract::{extract_layer, promote};
use crate::metadata::ArtifactMetadata;
use crate::reference::ArtifactReference;
use crate::{Error, Result};

/// Prefix of the staging directory created inside the destination.
pub const STAGING_PREFIX: &str = ".artifactctl-pull-";

/// Resolves, fetches, verifies and extracts artifacts.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Pull `reference` and extract its content into `destination`.
    ///
    /// Implementations stop at the next opportunity once `cancel` fires.
    async fn pull(
        &self,
        reference: &ArtifactReference,
        credentials: &Credentials,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<ArtifactMetadata>;
}

/// Settings for [`OciClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OciClientConfig {
    /// Talk plain HTTP instead of HTTPS.
    pub insecure: bool,
}

/// OCI registry client backed by `oci-distribution`.
pub struct OciClient {
    client: Client,
}

impl Default for OciClient {
    fn default() -> Self {
        Self::new(OciClientConfig::default())
    }
}

impl OciClient {
    /// Create a new OCI client.
    #[must_use]
    pub fn new(config: OciClientConfig) -> Self {
        let protocol = if config.insecure {
            ClientProtocol::Http
        } else {
            ClientProtocol::Https
        };
        let client = Client::new(ClientConfig {
            protocol,
            ..Default::default()
        });
        Self { client }
    }

    /// Pull a blob using its descriptor and verify its digest.
    ///
    /// After downloading, the blob's SHA256 digest is verified against the
    /// expected digest from the descriptor. If verification fails, the file
    /// is deleted and an error is returned.
    async fn pull_blob_by_descriptor(
        &self,
        reference: &ArtifactReference,
        descriptor: &OciDescriptor,
        dest: &Path,
    ) -> Result<()> {
        debug!(digest = %descriptor.digest, ?dest, "Pulling blob");

        let mut file = tokio::fs::File::create(dest).await?;

        self.client
            .pull_blob(reference.as_oci(), descriptor, &mut file)
            .await
            .map_err(|e| Error::blob_pull_failed(&descriptor.digest, e.to_string()))?;

        file.flush().await?;
        drop(file);

        let computed_digest = compute_file_digest(dest).await?;
        if computed_digest != descriptor.digest {
            tokio::fs::remove_file(dest).await.ok();
            return Err(Error::digest_mismatch(&descriptor.digest, &computed_digest));
        }

        debug!(digest = %descriptor.digest, ?dest, "Pulled and verified blob");
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for OciClient {
    #[instrument(skip_all, fields(reference = %reference))]
    async fn pull(
        &self,
        reference: &ArtifactReference,
        credentials: &Credentials,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<ArtifactMetadata> {
        let auth = credentials.to_registry_auth();
        info!(anonymous = credentials.is_anonymous(), "Resolving artifact manifest");

        let (manifest, manifest_digest) = self
            .client
            .pull_image_manifest(reference.as_oci(), &auth)
            .await
            .map_err(|e| classify_manifest_error(reference, e))?;

        trace!(?manifest, "Got manifest");

        let Some(layer) = manifest.layers.first() else {
            return Err(Error::invalid_manifest(
                reference.to_string(),
                "no layers found in artifact",
            ));
        };
        if manifest.layers.len() > 1 {
            debug!(
                layer_count = manifest.layers.len(),
                "Artifact has multiple layers; extracting the first"
            );
        }

        // The staging directory is removed on every exit path when dropped.
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(destination)
            .map_err(|e| Error::extraction_failed(destination.display().to_string(), e.to_string()))?;

        let blob_path = staging.path().join("layer.tar.gz");
        self.pull_blob_by_descriptor(reference, layer, &blob_path)
            .await?;

        let destination = destination.to_path_buf();
        let cancel = cancel.clone();
        let files = tokio::task::spawn_blocking(move || -> Result<usize> {
            let content = staging.path().join("content");
            std::fs::create_dir(&content)?;
            let files = extract_layer(&blob_path, &content, &cancel)?;
            promote(&content, &destination, &cancel)?;
            drop(staging);
            Ok(files)
        })
        .await
        .map_err(|e| Error::extraction_failed("<layer>", e.to_string()))??;

        let annotations: BTreeMap<String, String> = manifest
            .annotations
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();
        let metadata = ArtifactMetadata::from_manifest(reference, &manifest_digest, annotations);

        info!(digest = %metadata.digest, files, "Pulled artifact");
        Ok(metadata)
    }
}

/// Map a manifest fetch failure onto the pull error taxonomy.
fn classify_manifest_error(reference: &ArtifactReference, err: OciDistributionError) -> Error {
    match err {
        OciDistributionError::AuthenticationFailure(message) => {
            Error::authentication_failed(reference.registry(), message)
        }
        OciDistributionError::UnauthorizedError { url } => Error::authentication_failed(
            reference.registry(),
            format!("not authorized to access {url}"),
        ),
        OciDistributionError::ImageManifestNotFoundError(message) => {
            Error::resolution_failed(reference.to_string(), format!("not found: {message}"))
        }
        other => Error::resolution_failed(reference.to_string(), other.to_string()),
    }
}

/// Compute the SHA256 digest of a file.
///
/// Returns the digest in OCI format: `sha256:<hex>`.
pub(crate) async fn compute_file_digest(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(oci_digest(&hasher.finalize()))
}

/// Format a raw SHA256 hash as `sha256:<hex>`.
fn oci_digest(hash: &[u8]) -> String {
    let mut digest = String::with_capacity(7 + hash.len() * 2);
    digest.push_str("sha256:");
    for byte in hash {
        let _ = write!(digest, "{byte:02x}");
    }
    digest
}
