//! PyPI JSON API adapter
//!
//! Fetches the latest release of a package from PyPI.
//! API endpoint: https://pypi.org/pypi/{package}/json

use crate::error::RegistryError;
use crate::registry::{HttpClient, RegistryAdapter};
use async_trait::async_trait;
use serde::Deserialize;

/// PyPI API base URL
pub const PYPI_API_URL: &str = "https://pypi.org/pypi";

/// PyPI adapter
pub struct PyPIAdapter {
    client: HttpClient,
    base_url: String,
}

/// PyPI package metadata response
#[derive(Debug, Deserialize)]
struct PyPIResponse {
    info: PackageInfo,
}

#[derive(Debug, Deserialize)]
struct PackageInfo {
    /// Latest non-prerelease version as chosen by PyPI
    version: String,
}

impl PyPIAdapter {
    /// Create a new PyPI adapter against the public index
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, PYPI_API_URL)
    }

    /// Create an adapter against a mirror exposing the same JSON API
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL for a package
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}/json", self.base_url, package)
    }

    fn latest_from_response(package: &str, response: PyPIResponse) -> Result<String, RegistryError> {
        let version = response.info.version.trim().to_string();
        if version.is_empty() {
            return Err(RegistryError::invalid_response(
                package,
                "PyPI",
                "empty info.version",
            ));
        }
        Ok(version)
    }
}

#[async_trait]
impl RegistryAdapter for PyPIAdapter {
    fn registry_name(&self) -> &'static str {
        "PyPI"
    }

    async fn fetch_latest(&self, package: &str) -> Result<String, RegistryError> {
        let url = self.build_url(package);
        let response: PyPIResponse = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;
        Self::latest_from_response(package, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> PyPIAdapter {
        PyPIAdapter::new(HttpClient::new().unwrap())
    }

    #[test]
    fn test_pypi_adapter_registry_name() {
        assert_eq!(adapter().registry_name(), "PyPI");
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            adapter().build_url("requests"),
            "https://pypi.org/pypi/requests/json"
        );
    }

    #[test]
    fn test_build_url_with_dashes() {
        assert_eq!(
            adapter().build_url("flask-restful"),
            "https://pypi.org/pypi/flask-restful/json"
        );
    }

    #[test]
    fn test_custom_base_url_trailing_slash() {
        let adapter =
            PyPIAdapter::with_base_url(HttpClient::new().unwrap(), "http://mirror.local/pypi/");
        assert_eq!(
            adapter.build_url("flask"),
            "http://mirror.local/pypi/flask/json"
        );
    }

    #[test]
    fn test_latest_from_response() {
        let json = r#"{"info": {"version": "3.1.2", "name": "Flask"}, "releases": {}}"#;
        let response: PyPIResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            PyPIAdapter::latest_from_response("flask", response).unwrap(),
            "3.1.2"
        );
    }

    #[test]
    fn test_latest_from_response_empty_version() {
        let response: PyPIResponse = serde_json::from_str(r#"{"info": {"version": ""}}"#).unwrap();
        assert!(matches!(
            PyPIAdapter::latest_from_response("flask", response),
            Err(RegistryError::InvalidResponse { .. })
        ));
    }
}
