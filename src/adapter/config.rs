//! Configuration
//!
//! JSON設定ファイルの読み込み

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::adapter::auth::gcp_auth::expand_key_path;
use crate::domain::services::token_sql::DEFAULT_TOKEN_TABLE;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub project_id: String,

    // Authentication
    pub service_account_key_path: String,

    // OAuth2 client
    pub api_name: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// 有効期限の何秒前からリフレッシュするか
    #[serde(default)]
    pub refresh_margin_secs: Option<i64>,
    /// トークンテーブル（`dataset.table`）
    #[serde(default)]
    pub token_table: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let path = expand_key_path(path);
        let content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read config file {}", path))?;
        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        if let Some(secs) = config.refresh_margin_secs {
            if secs < 0 || chrono::Duration::try_seconds(secs).is_none() {
                bail!("refresh_margin_secs out of range: {}", secs);
            }
        }
        Ok(config)
    }

    pub fn token_table(&self) -> &str {
        self.token_table.as_deref().unwrap_or(DEFAULT_TOKEN_TABLE)
    }

    pub fn refresh_margin(&self) -> Option<chrono::Duration> {
        self.refresh_margin_secs
            .and_then(chrono::Duration::try_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = write_config(
            r#"{
                "project_id": "my-project",
                "service_account_key_path": "~/keys/bq.json",
                "api_name": "searchconsole",
                "client_id": "123.apps.googleusercontent.com",
                "client_secret": "secret"
            }"#,
        );

        let config = Config::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.project_id, "my-project");
        assert_eq!(config.api_name, "searchconsole");
        assert!(config.redirect_url.is_none());
        assert!(config.refresh_margin().is_none());
        assert_eq!(config.token_table(), "oauth2.tokens");
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"{
                "project_id": "my-project",
                "service_account_key_path": "/keys/bq.json",
                "api_name": "searchconsole",
                "client_id": "123.apps.googleusercontent.com",
                "client_secret": "secret",
                "redirect_url": "http://localhost:9000/callback",
                "refresh_margin_secs": 300,
                "token_table": "auth.tokens"
            }"#,
        );

        let config = Config::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(
            config.redirect_url.as_deref(),
            Some("http://localhost:9000/callback")
        );
        assert_eq!(config.refresh_margin(), Some(chrono::Duration::minutes(5)));
        assert_eq!(config.token_table(), "auth.tokens");
    }

    #[test]
    fn test_load_rejects_out_of_range_margin() {
        for margin in ["9223372036854775807", "-1"] {
            let file = write_config(&format!(
                r#"{{
                    "project_id": "my-project",
                    "service_account_key_path": "/keys/bq.json",
                    "api_name": "searchconsole",
                    "client_id": "123.apps.googleusercontent.com",
                    "client_secret": "secret",
                    "refresh_margin_secs": {}
                }}"#,
                margin
            ));

            let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
            assert!(err.to_string().contains("refresh_margin_secs out of range"));
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/config.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_invalid_json() {
        let file = write_config("{ not json");
        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config JSON"));
    }
}
