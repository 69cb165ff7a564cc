//! Artifact pull orchestration.
//!
//! [`ArtifactPuller`] checks the request, resolves credentials and hands the
//! actual transfer to a [`RegistryClient`] under a deadline.

use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::credentials::CredentialSource;
use crate::destination::PullDestination;
use crate::metadata::ArtifactMetadata;
use crate::reference::ArtifactReference;
use crate::registry::RegistryClient;
use crate::{Error, Result};

/// Pulls artifacts into local directories.
pub struct ArtifactPuller<C, S> {
    client: C,
    credentials: S,
}

impl<C, S> ArtifactPuller<C, S>
where
    C: RegistryClient,
    S: CredentialSource,
{
    /// Create a puller from its collaborators.
    #[must_use]
    pub const fn new(client: C, credentials: S) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Pull `reference` into `destination`, giving up after `deadline`.
    ///
    /// The reference and destination are validated before anything touches
    /// the network. Errors from the registry client are returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidReference`] for an empty or malformed reference
    /// - [`Error::InvalidDestination`] if `destination` is not an existing directory
    /// - [`Error::DeadlineExceeded`] if the pull outlives `deadline`
    /// - anything the credential source or registry client reports
    #[instrument(skip(self, destination), fields(destination = %destination.display()))]
    pub async fn pull(
        &self,
        reference: &str,
        destination: &Path,
        deadline: Duration,
    ) -> Result<ArtifactMetadata> {
        let reference = ArtifactReference::parse(reference)?;
        let destination = PullDestination::new(destination)?;

        let cancel = CancellationToken::new();
        // Fires when this future completes or is dropped, stopping any
        // blocking work the client left running.
        let _guard = cancel.clone().drop_guard();

        let pull = async {
            let credentials = self.credentials.resolve(reference.registry()).await?;
            debug!(registry = %reference.registry(), ?credentials, "Resolved credentials");

            self.client
                .pull(&reference, &credentials, destination.path(), &cancel)
                .await
        };

        match tokio::time::timeout(deadline, pull).await {
            Ok(result) => {
                let metadata = result?;
                info!(revision = %metadata.revision, digest = %metadata.digest, "Artifact pulled");
                Ok(metadata)
            }
            Err(_) => {
                cancel.cancel();
                Err(Error::DeadlineExceeded(deadline))
            }
        }
    }
}
