use tracing::instrument;

#[instrument]
pub fn get_version_info() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let name = env!("CARGO_PKG_NAME");
    let description = env!("CARGO_PKG_DESCRIPTION");

    tracing::debug!(
        package_name = name,
        package_version = version,
        "Gathering package information"
    );

    format!(
        "{name} {version} - {description}\n\
        Correlation ID: {}",
        crate::tracing::correlation_id()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version_info_format() {
        let version_info = get_version_info();

        assert!(version_info.starts_with("artifactctl "));
        assert!(version_info.contains(env!("CARGO_PKG_VERSION")));
        assert!(version_info.contains("Correlation ID:"));
    }
}
