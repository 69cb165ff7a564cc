//! `artifactctl pull artifact`

use artifactctl_oci::{
    ArtifactMetadata, ArtifactPuller, ArtifactReference, CredentialSource, Credentials,
    DockerConfig, OciClient, OciClientConfig, PullDestination, RegistryClient, StaticCredentials,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Instrument, debug};

use crate::cli::{CliError, OkEnvelope, PullArtifactArgs};
use crate::output::Printer;

/// What a successful pull reports, in `--json` mode.
#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    /// Metadata returned by the registry.
    #[serde(flatten)]
    pub metadata: ArtifactMetadata,
    /// Directory the content was extracted into.
    pub path: PathBuf,
}

/// Execute `pull artifact` against the configured registry.
///
/// Credentials come from `--creds` when given, otherwise from the local
/// Docker login configuration.
///
/// # Errors
///
/// Returns a configuration error for a bad URL or output path, and a pull
/// error for anything that fails once the registry is contacted.
pub async fn execute_pull_artifact(
    args: &PullArtifactArgs,
    timeout: Duration,
    json: bool,
) -> Result<(), CliError> {
    let client = OciClient::new(OciClientConfig {
        insecure: args.insecure,
    });
    let mut printer = Printer::stdout();

    let span = crate::command_span!("pull artifact");
    async {
        match &args.creds {
            Some(creds) => {
                let source = StaticCredentials::new(Credentials::parse(creds));
                let puller = ArtifactPuller::new(client, source);
                pull_artifact(&puller, args, timeout, json, &mut printer).await
            }
            None => {
                let config = DockerConfig::discover();
                debug!(path = %config.path().display(), "Using docker config for credentials");
                let puller = ArtifactPuller::new(client, config);
                pull_artifact(&puller, args, timeout, json, &mut printer).await
            }
        }
    }
    .instrument(span)
    .await
}

/// Validate the request, run `puller` and report the result to `printer`.
///
/// # Errors
///
/// See [`execute_pull_artifact`].
pub async fn pull_artifact<C, S, W>(
    puller: &ArtifactPuller<C, S>,
    args: &PullArtifactArgs,
    timeout: Duration,
    json: bool,
    printer: &mut Printer<W>,
) -> Result<(), CliError>
where
    C: RegistryClient,
    S: CredentialSource,
    W: Write,
{
    // Reject bad input before announcing anything.
    ArtifactReference::parse(&args.url)?;
    PullDestination::new(&args.output)?;

    if !json {
        printer
            .action(format!("pulling artifact from {}", args.url))
            .map_err(write_error)?;
    }

    let metadata = puller.pull(&args.url, &args.output, timeout).await?;

    let report = PullReport {
        metadata,
        path: args.output.clone(),
    };
    render_report(printer, &report, json)
}

fn render_report<W: Write>(
    printer: &mut Printer<W>,
    report: &PullReport,
    json: bool,
) -> Result<(), CliError> {
    if json {
        let body = serde_json::to_string(&OkEnvelope::new(report))
            .map_err(|e| CliError::pull(format!("Failed to serialize result: {e}")))?;
        return printer.plain(body).map_err(write_error);
    }

    print_summary(printer, report).map_err(write_error)
}

fn print_summary<W: Write>(printer: &mut Printer<W>, report: &PullReport) -> std::io::Result<()> {
    let meta = &report.metadata;
    printer.success(format!("source {}", meta.source))?;
    printer.success(format!("revision {}", meta.revision))?;
    printer.success(format!("digest {}", meta.digest))?;
    printer.success(format!(
        "artifact content extracted to {}",
        report.path.display()
    ))
}

fn write_error(err: std::io::Error) -> CliError {
    CliError::pull(format!("Failed to write output: {err}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use artifactctl_oci::{CancellationToken, Error, REVISION_ANNOTATION};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    const URL: &str = "oci://ghcr.io/org/manifests/app:v0.0.1";
    const DIGEST: &str =
        "sha256:3b4d6e5f1a2c3b4d6e5f1a2c3b4d6e5f1a2c3b4d6e5f1a2c3b4d6e5f1a2c3b4d";

    /// Writes one file and reports fixed metadata.
    struct FakeRegistry;

    #[async_trait]
    impl RegistryClient for FakeRegistry {
        async fn pull(
            &self,
            reference: &ArtifactReference,
            _credentials: &Credentials,
            destination: &Path,
            _cancel: &CancellationToken,
        ) -> artifactctl_oci::Result<ArtifactMetadata> {
            std::fs::write(destination.join("deploy.yaml"), "kind: Deployment")?;
            Ok(ArtifactMetadata::from_manifest(
                reference,
                DIGEST,
                BTreeMap::from([(REVISION_ANNOTATION.to_string(), "main@sha1:abc".to_string())]),
            ))
        }
    }

    struct UnknownManifest;

    #[async_trait]
    impl RegistryClient for UnknownManifest {
        async fn pull(
            &self,
            reference: &ArtifactReference,
            _credentials: &Credentials,
            _destination: &Path,
            _cancel: &CancellationToken,
        ) -> artifactctl_oci::Result<ArtifactMetadata> {
            Err(Error::resolution_failed(reference.to_string(), "not found"))
        }
    }

    fn args(url: &str, output: &Path) -> PullArtifactArgs {
        PullArtifactArgs {
            url: url.to_string(),
            output: output.to_path_buf(),
            creds: None,
            insecure: false,
        }
    }

    fn anonymous<C: RegistryClient>(client: C) -> ArtifactPuller<C, StaticCredentials> {
        ArtifactPuller::new(client, StaticCredentials::new(Credentials::Anonymous))
    }

    #[tokio::test]
    async fn test_success_prints_progress_lines() {
        let out = TempDir::new().unwrap();
        let puller = anonymous(FakeRegistry);
        let mut printer = Printer::new(Vec::new());

        pull_artifact(
            &puller,
            &args(URL, out.path()),
            Duration::from_secs(60),
            false,
            &mut printer,
        )
        .await
        .unwrap();

        let text = String::from_utf8(printer.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], format!("► pulling artifact from {URL}"));
        assert_eq!(lines[1], format!("✔ source {URL}"));
        assert_eq!(lines[2], "✔ revision main@sha1:abc");
        assert_eq!(
            lines[3],
            format!("✔ digest ghcr.io/org/manifests/app@{DIGEST}")
        );
        assert_eq!(
            lines[4],
            format!("✔ artifact content extracted to {}", out.path().display())
        );
        assert!(out.path().join("deploy.yaml").is_file());
    }

    #[tokio::test]
    async fn test_json_mode_prints_single_envelope() {
        let out = TempDir::new().unwrap();
        let puller = anonymous(FakeRegistry);
        let mut printer = Printer::new(Vec::new());

        pull_artifact(
            &puller,
            &args(URL, out.path()),
            Duration::from_secs(60),
            true,
            &mut printer,
        )
        .await
        .unwrap();

        let text = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["data"]["source"], URL);
        assert_eq!(value["data"]["revision"], "main@sha1:abc");
        assert_eq!(
            value["data"]["path"],
            out.path().display().to_string().as_str()
        );
    }

    #[tokio::test]
    async fn test_invalid_url_prints_nothing_and_skips_registry() {
        let out = TempDir::new().unwrap();
        let puller = anonymous(FakeRegistry);
        let mut printer = Printer::new(Vec::new());

        let err = pull_artifact(
            &puller,
            &args("ghcr.io/org/app:v1", out.path()),
            Duration::from_secs(60),
            false,
            &mut printer,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CliError::Config { .. }));
        assert!(printer.into_inner().is_empty());
    }

    #[tokio::test]
    async fn test_missing_output_dir_is_config_error() {
        let out = TempDir::new().unwrap();
        let missing = out.path().join("nope");
        let puller = anonymous(FakeRegistry);
        let mut printer = Printer::new(Vec::new());

        let err = pull_artifact(
            &puller,
            &args(URL, &missing),
            Duration::from_secs(60),
            false,
            &mut printer,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CliError::Config { .. }));
        assert!(err.to_string().contains("path does not exist"));
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn test_registry_failure_is_pull_error() {
        let out = TempDir::new().unwrap();
        let puller = anonymous(UnknownManifest);
        let mut printer = Printer::new(Vec::new());

        let err = pull_artifact(
            &puller,
            &args(URL, out.path()),
            Duration::from_secs(60),
            false,
            &mut printer,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CliError::Pull { .. }));
        let text = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains('✔'));
    }
}
