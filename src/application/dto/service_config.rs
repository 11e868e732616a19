//! # Service Configuration DTO
//!
//! Google APIサービスの認可モード別設定

use chrono::Duration;

use crate::domain::repositories::token_source::TokenSource;

/// OAuth2で認可するサービスの設定
pub struct ServiceWithOAuth2Config {
    /// API名（トークンテーブルのキー）
    pub api_name: String,
    /// OAuth2クライアントID
    pub client_id: String,
    pub client_secret: String,
    /// トークンの読み書き先
    pub token_source: Box<dyn TokenSource>,
    /// 未指定時は `http://localhost:8080/oauth/redirect`
    pub redirect_url: Option<String>,
    /// 有効期限のこの時間前からリフレッシュする
    pub refresh_margin: Option<Duration>,
}

impl std::fmt::Debug for ServiceWithOAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWithOAuth2Config")
            .field("api_name", &self.api_name)
            .field("client_id", &self.client_id)
            .field("redirect_url", &self.redirect_url)
            .field("refresh_margin", &self.refresh_margin)
            .finish_non_exhaustive()
    }
}

/// APIキーで認可するサービスの設定
#[derive(Debug, Clone)]
pub struct ServiceWithApiKeyConfig {
    pub api_name: String,
    pub api_key: String,
}

/// 発行済みアクセストークンで認可するサービスの設定
#[derive(Debug, Clone)]
pub struct ServiceWithAccessTokenConfig {
    pub api_name: String,
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::token_source::MemoryTokenSource;

    #[test]
    fn test_oauth2_config_debug_hides_secret() {
        let config = ServiceWithOAuth2Config {
            api_name: "searchconsole".to_string(),
            client_id: "123.apps.googleusercontent.com".to_string(),
            client_secret: "super-secret".to_string(),
            token_source: Box::new(MemoryTokenSource::default()),
            redirect_url: None,
            refresh_margin: Some(Duration::minutes(5)),
        };

        let debug = format!("{:?}", config);

        assert!(debug.contains("searchconsole"));
        assert!(!debug.contains("super-secret"));
    }
}
