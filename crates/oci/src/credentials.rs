//! Registry credential resolution.
//!
//! The default source reads the local Docker login config
//! (`$DOCKER_CONFIG/config.json` or `~/.docker/config.json`), consulting
//! credential helpers the same way `docker login` stores them.

use async_trait::async_trait;
use base64::Engine;
use oci_distribution::secrets::RegistryAuth;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Key Docker uses for Docker Hub in `auths` and when talking to helpers.
const DOCKER_HUB_SERVER: &str = "https://index.docker.io/v1/";

/// Hostnames that all refer to Docker Hub.
const DOCKER_HUB_ALIASES: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];

/// Environment variables consulted for `ghcr.io` when nothing else matches.
const GHCR_TOKEN_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN"];

/// Credentials presented to a registry.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// No credentials.
    #[default]
    Anonymous,
    /// Username and password (or token) authentication.
    Basic {
        /// Username; empty for bare tokens.
        username: String,
        /// Password or token.
        password: String,
    },
}

impl Credentials {
    /// Create basic credentials.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse `user:password`, or a bare token.
    #[must_use]
    pub fn parse(creds: &str) -> Self {
        match creds.split_once(':') {
            Some((username, password)) => Self::basic(username, password),
            None => Self::basic("", creds),
        }
    }

    /// Whether these are anonymous credentials.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    pub(crate) fn to_registry_auth(&self) -> RegistryAuth {
        match self {
            Self::Anonymous => RegistryAuth::Anonymous,
            Self::Basic { username, password } => {
                RegistryAuth::Basic(username.clone(), password.clone())
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Resolves the credentials to use for a registry.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Resolve credentials for `registry` (a host, optionally with port).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the local login
    /// configuration cannot be read.
    async fn resolve(&self, registry: &str) -> Result<Credentials>;
}

/// The same credentials for every registry, e.g. from `--creds`.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Wrap fixed credentials.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn resolve(&self, _registry: &str) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}

/// On-disk layout of `config.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default)]
    creds_store: Option<String>,
    #[serde(default)]
    cred_helpers: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Response of `docker-credential-<helper> get`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HelperResponse {
    username: String,
    secret: String,
}

/// Credentials from the local Docker login configuration.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    path: PathBuf,
}

impl DockerConfig {
    /// Locate `config.json` via `DOCKER_CONFIG`, falling back to `~/.docker`.
    #[must_use]
    pub fn discover() -> Self {
        let dir = std::env::var_os("DOCKER_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".docker")))
            .unwrap_or_else(|| PathBuf::from(".docker"));
        Self::from_path(dir.join("config.json"))
    }

    /// Read credentials from a specific `config.json`.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the config file this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self, registry: &str) -> Result<Option<ConfigFile>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                Error::authentication_failed(
                    registry,
                    format!("invalid docker config {}: {e}", self.path.display()),
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "No docker config found");
                Ok(None)
            }
            Err(e) => Err(Error::authentication_failed(
                registry,
                format!("cannot read docker config {}: {e}", self.path.display()),
            )),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self::discover()
    }
}

#[async_trait]
impl CredentialSource for DockerConfig {
    async fn resolve(&self, registry: &str) -> Result<Credentials> {
        let host = canonical_host(registry);

        if let Some(config) = self.load(registry).await? {
            if let Some(helper) = config
                .cred_helpers
                .iter()
                .find(|(key, _)| canonical_host(key) == host)
                .map(|(_, helper)| helper)
            {
                debug!(%registry, %helper, "Using credential helper");
                let credentials = run_helper(helper, registry).await?;
                if !credentials.is_anonymous() {
                    return Ok(credentials);
                }
            }

            if let Some(entry) = config
                .auths
                .iter()
                .find(|(key, _)| canonical_host(key) == host)
                .map(|(_, entry)| entry)
            {
                if let Some(credentials) = decode_auth_entry(registry, entry)? {
                    debug!(%registry, "Using credentials from docker config");
                    return Ok(credentials);
                }
            }

            if let Some(store) = &config.creds_store {
                debug!(%registry, %store, "Using credential store");
                let credentials = run_helper(store, registry).await?;
                if !credentials.is_anonymous() {
                    return Ok(credentials);
                }
            }
        }

        if host == "ghcr.io" {
            for var in GHCR_TOKEN_VARS {
                if let Ok(token) = std::env::var(var) {
                    if !token.is_empty() {
                        debug!(%registry, env = %var, "Using token from environment");
                        return Ok(Credentials::basic("", token));
                    }
                }
            }
        }

        Ok(Credentials::Anonymous)
    }
}

/// Reduce an `auths` key or registry name to a bare host.
///
/// `https://ghcr.io/v2/` and `ghcr.io` both become `ghcr.io`; every Docker
/// Hub alias becomes `index.docker.io`.
fn canonical_host(key: &str) -> String {
    let without_scheme = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_ascii_lowercase();

    if DOCKER_HUB_ALIASES.contains(&host.as_str()) {
        "index.docker.io".to_string()
    } else {
        host
    }
}

/// The server URL credential helpers know a registry by.
fn helper_server_url(registry: &str) -> String {
    if canonical_host(registry) == "index.docker.io" {
        DOCKER_HUB_SERVER.to_string()
    } else {
        registry.to_string()
    }
}

fn decode_auth_entry(registry: &str, entry: &AuthEntry) -> Result<Option<Credentials>> {
    if let Some(auth) = entry.auth.as_deref().filter(|a| !a.is_empty()) {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth.trim())
            .map_err(|e| {
                Error::authentication_failed(registry, format!("invalid auth entry: {e}"))
            })?;
        let decoded = String::from_utf8(decoded).map_err(|e| {
            Error::authentication_failed(registry, format!("invalid auth entry: {e}"))
        })?;
        let Some((username, password)) = decoded.split_once(':') else {
            return Err(Error::authentication_failed(
                registry,
                "invalid auth entry: expected 'username:password'",
            ));
        };
        return Ok(Some(Credentials::basic(username, password)));
    }

    match (&entry.username, &entry.password) {
        (Some(username), Some(password)) => Ok(Some(Credentials::basic(username, password))),
        _ => Ok(None),
    }
}

/// Ask `docker-credential-<helper>` for the registry's credentials.
async fn run_helper(helper: &str, registry: &str) -> Result<Credentials> {
    let program = format!("docker-credential-{helper}");
    let server_url = helper_server_url(registry);

    let mut child = tokio::process::Command::new(&program)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            Error::authentication_failed(registry, format!("cannot run {program}: {e}"))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(server_url.as_bytes()).await.map_err(|e| {
            Error::authentication_failed(registry, format!("{program}: {e}"))
        })?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| Error::authentication_failed(registry, format!("{program}: {e}")))?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains("credentials not found") || stderr.contains("credentials not found") {
            trace!(%registry, %program, "Helper has no credentials");
            return Ok(Credentials::Anonymous);
        }
        return Err(Error::authentication_failed(
            registry,
            format!("{program} failed: {}", stderr.trim()),
        ));
    }

    let response: HelperResponse = serde_json::from_str(stdout.trim()).map_err(|e| {
        Error::authentication_failed(registry, format!("invalid {program} output: {e}"))
    })?;

    Ok(Credentials::basic(response.username, response.secret))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, json: &str) -> DockerConfig {
        let path = dir.path().join("config.json");
        std::fs::write(&path, json).unwrap();
        DockerConfig::from_path(path)
    }

    #[test]
    fn test_parse_user_password() {
        assert_eq!(
            Credentials::parse("flux:s3cr3t"),
            Credentials::basic("flux", "s3cr3t")
        );
    }

    #[test]
    fn test_parse_bare_token() {
        assert_eq!(Credentials::parse("ghp_token"), Credentials::basic("", "ghp_token"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::basic("flux", "s3cr3t");
        let debug = format!("{creds:?}");
        assert!(debug.contains("flux"));
        assert!(!debug.contains("s3cr3t"));
    }

    #[test]
    fn test_canonical_host() {
        assert_eq!(canonical_host("https://ghcr.io/v2/"), "ghcr.io");
        assert_eq!(canonical_host("GHCR.io"), "ghcr.io");
        assert_eq!(canonical_host("localhost:5000"), "localhost:5000");
        assert_eq!(canonical_host("docker.io"), "index.docker.io");
        assert_eq!(canonical_host(DOCKER_HUB_SERVER), "index.docker.io");
    }

    #[test]
    fn test_helper_server_url() {
        assert_eq!(helper_server_url("docker.io"), DOCKER_HUB_SERVER);
        assert_eq!(helper_server_url("ghcr.io"), "ghcr.io");
    }

    #[tokio::test]
    async fn test_static_credentials() {
        let source = StaticCredentials::new(Credentials::basic("u", "p"));
        assert_eq!(
            source.resolve("anything.example.com").await.unwrap(),
            Credentials::basic("u", "p")
        );
    }

    #[tokio::test]
    async fn test_missing_config_is_anonymous() {
        let temp = TempDir::new().unwrap();
        let source = DockerConfig::from_path(temp.path().join("config.json"));
        let creds = source.resolve("registry.example.com").await.unwrap();
        assert!(creds.is_anonymous());
    }

    #[tokio::test]
    async fn test_auth_field_decoded() {
        let temp = TempDir::new().unwrap();
        // base64("flux:s3cr3t")
        let source = write_config(
            &temp,
            r#"{"auths": {"https://registry.example.com/v2/": {"auth": "Zmx1eDpzM2NyM3Q="}}}"#,
        );

        let creds = source.resolve("registry.example.com").await.unwrap();
        assert_eq!(creds, Credentials::basic("flux", "s3cr3t"));
    }

    #[tokio::test]
    async fn test_username_password_fields() {
        let temp = TempDir::new().unwrap();
        let source = write_config(
            &temp,
            r#"{"auths": {"localhost:5000": {"username": "admin", "password": "pw"}}}"#,
        );

        let creds = source.resolve("localhost:5000").await.unwrap();
        assert_eq!(creds, Credentials::basic("admin", "pw"));
    }

    #[tokio::test]
    async fn test_docker_hub_alias() {
        let temp = TempDir::new().unwrap();
        let source = write_config(
            &temp,
            r#"{"auths": {"https://index.docker.io/v1/": {"auth": "Zmx1eDpzM2NyM3Q="}}}"#,
        );

        let creds = source.resolve("docker.io").await.unwrap();
        assert_eq!(creds, Credentials::basic("flux", "s3cr3t"));
    }

    #[tokio::test]
    async fn test_unrelated_registry_is_anonymous() {
        let temp = TempDir::new().unwrap();
        let source = write_config(
            &temp,
            r#"{"auths": {"registry.example.com": {"auth": "Zmx1eDpzM2NyM3Q="}}}"#,
        );

        let creds = source.resolve("other.example.com").await.unwrap();
        assert!(creds.is_anonymous());
    }

    #[tokio::test]
    async fn test_malformed_config_is_authentication_failure() {
        let temp = TempDir::new().unwrap();
        let source = write_config(&temp, "{not json");

        let err = source.resolve("registry.example.com").await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(..)));
    }

    #[tokio::test]
    async fn test_invalid_auth_entry_is_authentication_failure() {
        let temp = TempDir::new().unwrap();
        let source = write_config(
            &temp,
            r#"{"auths": {"registry.example.com": {"auth": "!!!not-base64"}}}"#,
        );

        let err = source.resolve("registry.example.com").await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(..)));
    }

    #[tokio::test]
    async fn test_missing_helper_is_authentication_failure() {
        let temp = TempDir::new().unwrap();
        let source = write_config(
            &temp,
            r#"{"credHelpers": {"registry.example.com": "artifactctl-test-does-not-exist"}}"#,
        );

        let err = source.resolve("registry.example.com").await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(..)));
        assert!(err.to_string().contains("docker-credential-artifactctl-test-does-not-exist"));
    }

    #[tokio::test]
    async fn test_ghcr_token_fallback() {
        let temp = TempDir::new().unwrap();
        let source = DockerConfig::from_path(temp.path().join("config.json"));

        let creds = temp_env::async_with_vars(
            [("GITHUB_TOKEN", Some("ghp_test")), ("GH_TOKEN", None)],
            source.resolve("ghcr.io"),
        )
        .await
        .unwrap();

        assert_eq!(creds, Credentials::basic("", "ghp_test"));
    }

    #[tokio::test]
    async fn test_ghcr_without_token_is_anonymous() {
        let temp = TempDir::new().unwrap();
        let source = DockerConfig::from_path(temp.path().join("config.json"));

        let creds = temp_env::async_with_vars(
            [("GITHUB_TOKEN", None::<&str>), ("GH_TOKEN", None)],
            source.resolve("ghcr.io"),
        )
        .await
        .unwrap();

        assert!(creds.is_anonymous());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_credential_helper_invoked() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let helper = temp.path().join("docker-credential-artifactctl-test");
        std::fs::write(
            &helper,
            "#!/bin/sh\nread server\necho \"{\\\"ServerURL\\\":\\\"$server\\\",\\\"Username\\\":\\\"helper-user\\\",\\\"Secret\\\":\\\"$server-secret\\\"}\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&helper, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = write_config(
            &temp,
            r#"{"credHelpers": {"registry.example.com": "artifactctl-test"}}"#,
        );

        let path = format!(
            "{}:{}",
            temp.path().display(),
            std::env::var("PATH").unwrap_or_default()
        );
        let creds = temp_env::async_with_vars(
            [("PATH", Some(path.as_str()))],
            source.resolve("registry.example.com"),
        )
        .await
        .unwrap();

        assert_eq!(
            creds,
            Credentials::basic("helper-user", "registry.example.com-secret")
        );
    }

    /// Put an executable `docker-credential-<name>` into `dir`.
    #[cfg(unix)]
    fn install_helper(dir: &TempDir, name: &str, script: &str) {
        use std::os::unix::fs::PermissionsExt;

        let helper = dir.path().join(format!("docker-credential-{name}"));
        std::fs::write(&helper, script).unwrap();
        std::fs::set_permissions(&helper, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    fn path_with(dir: &TempDir) -> String {
        format!(
            "{}:{}",
            dir.path().display(),
            std::env::var("PATH").unwrap_or_default()
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_exiting_early_is_authentication_failure() {
        let temp = TempDir::new().unwrap();
        install_helper(&temp, "artifactctl-early-exit", "#!/bin/sh\nexec 0<&-\nexit 3\n");
        let source = write_config(
            &temp,
            r#"{"credHelpers": {"registry.example.com": "artifactctl-early-exit"}}"#,
        );

        let path = path_with(&temp);
        let err = temp_env::async_with_vars(
            [("PATH", Some(path.as_str()))],
            source.resolve("registry.example.com"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::AuthenticationFailure);
        assert!(err.to_string().contains("docker-credential-artifactctl-early-exit"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_creds_store_falls_back_to_ghcr_token() {
        let temp = TempDir::new().unwrap();
        install_helper(
            &temp,
            "artifactctl-empty-store",
            "#!/bin/sh\nread server\necho \"credentials not found in native keychain\"\nexit 1\n",
        );
        let source = write_config(&temp, r#"{"credsStore": "artifactctl-empty-store"}"#);

        let path = path_with(&temp);
        let creds = temp_env::async_with_vars(
            [
                ("PATH", Some(path.as_str())),
                ("GITHUB_TOKEN", Some("ghp_from_env")),
                ("GH_TOKEN", None),
            ],
            source.resolve("ghcr.io"),
        )
        .await
        .unwrap();

        assert_eq!(creds, Credentials::basic("", "ghp_from_env"));
    }
}
