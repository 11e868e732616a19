//! GCP Authentication
//!
//! Google Cloud Platform認証機能

use google_cloud_bigquery::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_bigquery::client::google_cloud_auth::project::Config as AuthConfig;
use google_cloud_bigquery::client::google_cloud_auth::token::DefaultTokenSourceProvider;
use google_cloud_bigquery::client::{Client, ClientConfig};
use log::debug;
use std::fs;

use crate::domain::entities::credentials::Credentials;
use crate::error::{Error, Result};

/// Expands tilde in path and returns the full path
pub fn expand_key_path(key_path: &str) -> String {
    shellexpand::tilde(key_path).to_string()
}

/// Loads a service account key file into Credentials
pub fn load_credentials(key_path: &str, project_id: &str) -> Result<Credentials> {
    let expanded_path = expand_key_path(key_path);
    debug!("Loading service account key from {}", expanded_path);

    let content = fs::read_to_string(&expanded_path)?;
    Ok(Credentials::from_json_str(&content, project_id)?)
}

/// Creates a BigQuery client with service account authentication
///
/// 認証情報はメモリ上のJSONから読み込む（環境変数は変更しない）
pub async fn create_bigquery_client(credentials: &Credentials) -> Result<Client> {
    if !credentials.is_valid() {
        return Err(Error::message_of(
            "Service account credentials and project id are required",
        ));
    }

    let file: CredentialsFile = serde_json::from_value(credentials.service_account().clone())?;

    let (config, _project_id) = ClientConfig::new_with_credentials(file)
        .await
        .map_err(|e| Error::warehouse("Failed to authenticate with service account", e))?;

    Client::new(config)
        .await
        .map_err(|e| Error::warehouse("Failed to create BigQuery client", e))
}

const STORAGE_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/devstorage.read_write"];

/// Cloud Storage 用のトークンプロバイダー
pub async fn storage_token_provider(credentials: &Credentials) -> Result<DefaultTokenSourceProvider> {
    let file: CredentialsFile = serde_json::from_value(credentials.service_account().clone())?;
    DefaultTokenSourceProvider::new_with_credentials(
        AuthConfig::default().with_scopes(&STORAGE_SCOPES),
        Box::new(file),
    )
    .await
    .map_err(|e| Error::warehouse("Failed to authenticate with Cloud Storage", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_expand_key_path_with_tilde() {
        #[cfg(unix)]
        let home = std::env::var("HOME")
            .expect("HOME environment variable should be set on Unix systems");

        #[cfg(windows)]
        let home = std::env::var("USERPROFILE")
            .expect("USERPROFILE environment variable should be set on Windows");

        let result = expand_key_path("~/keys/bq.json");
        let expected = format!("{}/keys/bq.json", home);

        #[cfg(unix)]
        assert_eq!(result, expected);

        #[cfg(windows)]
        assert_eq!(result.replace('\\', "/"), expected.replace('\\', "/"));
    }

    #[test]
    fn test_expand_key_path_absolute() {
        assert_eq!(
            expand_key_path("/absolute/path/key.json"),
            "/absolute/path/key.json"
        );
    }

    #[test]
    fn test_load_credentials_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({"type": "service_account", "client_email": "svc@p.iam.gserviceaccount.com"})
        )
        .unwrap();

        let credentials = load_credentials(file.path().to_str().unwrap(), "my-project").unwrap();

        assert!(credentials.is_valid());
        assert_eq!(credentials.project_id(), "my-project");
        assert_eq!(credentials.service_account()["type"], "service_account");
    }

    #[test]
    fn test_load_credentials_missing_file() {
        let result = load_credentials("/nonexistent/key.json", "p");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_create_client_rejects_empty_credentials() {
        let credentials = Credentials::new(json!({}), "my-project");
        let result = create_bigquery_client(&credentials).await;
        assert!(result.is_err());
    }
}
