//! Google API HTTP Service
//!
//! OAuth2 / APIキー / アクセストークンで認可するHTTPクライアント

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use oauth2::basic::BasicClient;
use oauth2::{
    AsyncHttpClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, HttpClientError, HttpRequest, HttpResponse, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;

use super::error_response::GoogleErrorResponse;
use super::retry::{is_retryable, is_retryable_status, retry_policy};
use crate::application::dto::service_config::{
    ServiceWithAccessTokenConfig, ServiceWithApiKeyConfig, ServiceWithOAuth2Config,
};
use crate::domain::entities::token::Token;
use crate::domain::repositories::token_source::TokenSource;
use crate::error::{Error, Result};

pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8080/oauth/redirect";

type GoogleOAuth2Client = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// リクエスト設定
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: Method,
    pub url: String,
    pub parameters: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestConfig {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            parameters: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// クエリパラメータを追加（同名のものは置き換え）
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.parameters.retain(|(n, _)| n != &name);
        self.parameters.push((name, value.into()));
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(name, value);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// 成功レスポンス
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    /// ボディをモデルにデコード（空ボディは `null`）
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        Ok(serde_json::from_str(body)?)
    }
}

struct OAuth2Authorization {
    client: GoogleOAuth2Client,
    token_source: Mutex<Box<dyn TokenSource>>,
    refresh_margin: Duration,
}

enum Authorization {
    OAuth2(Box<OAuth2Authorization>),
    ApiKey(String),
    AccessToken(String),
}

/// Google APIサービス
pub struct GoogleService {
    api_name: String,
    client_id: String,
    authorization: Authorization,
    http: reqwest::Client,
    retry: ExponentialBuilder,
    call_count: AtomicI64,
}

impl GoogleService {
    /// OAuth2で認可するサービスを作成
    pub fn new_with_oauth2(config: ServiceWithOAuth2Config) -> Result<Self> {
        Self::oauth2_with_endpoints(config, AUTH_URL, TOKEN_URL)
    }

    pub(crate) fn oauth2_with_endpoints(
        config: ServiceWithOAuth2Config,
        auth_url: &str,
        token_url: &str,
    ) -> Result<Self> {
        if config.client_id.is_empty() {
            return Err(Error::message_of("ClientID not provided"));
        }

        let redirect_url = config
            .redirect_url
            .clone()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string());

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(auth_url.to_string()).map_err(url_error)?)
            .set_token_uri(TokenUrl::new(token_url.to_string()).map_err(url_error)?)
            .set_redirect_uri(RedirectUrl::new(redirect_url).map_err(url_error)?);

        Ok(Self {
            api_name: config.api_name,
            client_id: config.client_id,
            authorization: Authorization::OAuth2(Box::new(OAuth2Authorization {
                client,
                token_source: Mutex::new(config.token_source),
                refresh_margin: config.refresh_margin.unwrap_or_else(Duration::zero),
            })),
            http: http_client()?,
            retry: retry_policy(),
            call_count: AtomicI64::new(0),
        })
    }

    /// APIキーで認可するサービスを作成
    pub fn new_with_api_key(config: ServiceWithApiKeyConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::message_of("ApiKey not provided"));
        }
        Ok(Self {
            api_name: config.api_name,
            client_id: String::new(),
            authorization: Authorization::ApiKey(config.api_key),
            http: http_client()?,
            retry: retry_policy(),
            call_count: AtomicI64::new(0),
        })
    }

    /// 発行済みアクセストークンで認可するサービスを作成
    pub fn new_with_access_token(config: ServiceWithAccessTokenConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            return Err(Error::message_of("AccessToken not provided"));
        }
        Ok(Self {
            api_name: config.api_name,
            client_id: String::new(),
            authorization: Authorization::AccessToken(config.access_token),
            http: http_client()?,
            retry: retry_policy(),
            call_count: AtomicI64::new(0),
        })
    }

    /// リトライポリシーを差し替える
    pub fn with_retry_policy(mut self, retry: ExponentialBuilder) -> Self {
        self.retry = retry;
        self
    }

    fn oauth2(&self) -> Result<&OAuth2Authorization> {
        match &self.authorization {
            Authorization::OAuth2(oauth2) => Ok(oauth2.as_ref()),
            _ => Err(Error::OAuth2(format!(
                "{} is not configured for OAuth2",
                self.api_name
            ))),
        }
    }

    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    /// クライアントIDの先頭（最初の `.` まで）
    pub fn api_key(&self) -> &str {
        client_id_short(&self.client_id)
    }

    pub fn api_call_count(&self) -> i64 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn api_reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }

    /// 同意画面のURL
    ///
    /// # Arguments
    ///
    /// * `scope` - スペース区切りのスコープ
    /// * `access_type` - 例: `offline`
    /// * `prompt` - 例: `consent`
    /// * `state` - 未指定ならランダム生成
    pub fn authorize_url(
        &self,
        scope: &str,
        access_type: Option<&str>,
        prompt: Option<&str>,
        state: Option<&str>,
    ) -> Result<String> {
        let oauth2 = self.oauth2()?;
        let csrf = match state {
            Some(state) => CsrfToken::new(state.to_string()),
            None => CsrfToken::new_random(),
        };

        let mut request = oauth2
            .client
            .authorize_url(|| csrf)
            .add_scopes(scope.split_whitespace().map(|s| Scope::new(s.to_string())));
        if let Some(access_type) = access_type {
            request = request.add_extra_param("access_type", access_type.to_string());
        }
        if let Some(prompt) = prompt {
            request = request.add_extra_param("prompt", prompt.to_string());
        }

        let (url, _csrf) = request.url();
        Ok(url.to_string())
    }

    /// トークン取得の開始（同意画面のURLを出力して返す）
    ///
    /// 認可コードを受け取ったら `get_token_from_code` で交換する
    pub fn init_token(
        &self,
        scope: &str,
        access_type: Option<&str>,
        prompt: Option<&str>,
        state: Option<&str>,
    ) -> Result<String> {
        let url = self.authorize_url(scope, access_type, prompt, state)?;
        info!("Go to this url to get new access token:\n\n{}\n", url);
        Ok(url)
    }

    /// 認可コードをトークンに交換して保存
    pub async fn get_token_from_code(&self, code: &str) -> Result<Token> {
        let oauth2 = self.oauth2()?;
        let transport = |request: HttpRequest| token_transport(&self.http, request);

        let response = oauth2
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&transport)
            .await?;
        let token = token_from_payload(&serde_json::to_value(&response)?, Utc::now());

        let mut source = oauth2.token_source.lock().await;
        source.set_token(Some(token.clone()), true).await?;
        info!("Token for {} stored", self.api_name);
        Ok(token)
    }

    /// 有効なトークンを返す
    ///
    /// 未読み込みならトークンソースから読み込み、
    /// 期限切れ（マージン込み）ならリフレッシュして保存する
    pub async fn validate_token(&self) -> Result<Token> {
        let oauth2 = self.oauth2()?;
        let mut source = oauth2.token_source.lock().await;

        if source.token().is_none() {
            source.retrieve_token().await?;
        }

        let token = match source.token() {
            Some(token) => token,
            None => match source.new_token().await? {
                Some(token) => {
                    source.set_token(Some(token.clone()), true).await?;
                    token
                }
                None => {
                    return Err(Error::OAuth2(format!(
                        "no token available for {}, authorize first",
                        self.api_name
                    )))
                }
            },
        };

        if token.is_valid(oauth2.refresh_margin, Utc::now()) {
            return Ok(token);
        }

        let refresh_token = token
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::OAuth2("access token expired and no refresh token".to_string()))?;

        info!("Refreshing access token for {}", self.api_name);
        let transport = |request: HttpRequest| token_transport(&self.http, request);
        let response = (|| async {
            let response = oauth2
                .client
                .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
                .request_async(&transport)
                .await?;
            Ok::<_, Error>(response)
        })
        .retry(self.retry)
        .when(is_retryable)
        .notify(|err, dur: std::time::Duration| {
            warn!("Token refresh retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;

        let refreshed = merge_refreshed(&token, token_from_payload(&serde_json::to_value(&response)?, Utc::now()));
        source.set_token(Some(refreshed.clone()), true).await?;
        Ok(refreshed)
    }

    /// リクエストを送信する
    ///
    /// 一時的なエラーは指数バックオフでリトライする。
    /// 失敗時は Google のエラーレスポンスのメッセージを優先する
    pub async fn http_request(&self, config: RequestConfig) -> Result<ApiResponse> {
        let mut config = config;
        let bearer = match &self.authorization {
            Authorization::OAuth2(_) => self.validate_token().await?.access_token,
            Authorization::AccessToken(token) => Some(token.clone()),
            Authorization::ApiKey(key) => {
                config.set_parameter("key", key.clone());
                None
            }
        };

        let config = &config;
        let bearer = bearer.as_deref();
        (|| async { self.send(config, bearer).await })
            .retry(self.retry)
            .when(is_retryable)
            .notify(|err, dur: std::time::Duration| {
                warn!("{} {} retrying after error {}, sleeping {:?}", config.method, config.url, err, dur);
            })
            .await
    }

    async fn send(&self, config: &RequestConfig, bearer: Option<&str>) -> Result<ApiResponse> {
        debug!("{} {}", config.method, config.url);

        let mut builder = self.http.request(config.method.clone(), &config.url);
        if !config.parameters.is_empty() {
            builder = builder.query(&config.parameters);
        }
        for (name, value) in &config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &config.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(ApiResponse {
                status: status.as_u16(),
                body,
            });
        }

        let mut error = Error::Api {
            status: Some(status.as_u16()),
            message: format!("{} {} returned {}", config.method, config.url, status),
        };
        if let Some(message) = GoogleErrorResponse::parse(&body)
            .as_ref()
            .and_then(GoogleErrorResponse::message)
        {
            error.set_message(message);
        }
        Err(error)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.http_request(RequestConfig::new(Method::GET, url))
            .await?
            .json()
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        self.http_request(RequestConfig::new(Method::POST, url).with_body(body)?)
            .await?
            .json()
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        self.http_request(RequestConfig::new(Method::PUT, url).with_body(body)?)
            .await?
            .json()
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        self.http_request(RequestConfig::new(Method::PATCH, url).with_body(body)?)
            .await?
            .json()
    }

    pub async fn delete(&self, url: &str) -> Result<()> {
        self.http_request(RequestConfig::new(Method::DELETE, url))
            .await
            .map(|_| ())
    }
}

fn http_client() -> Result<reqwest::Client> {
    // トークンエンドポイントのリダイレクトは追わない
    Ok(reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

/// トークンエンドポイントへの送信
///
/// 429 / 5xx はステータス付きのエラーにする。oauth2 のパーサーはステータスを保持しない
async fn token_transport(http: &reqwest::Client, request: HttpRequest) -> Result<HttpResponse> {
    let response = http.call(request).await.map_err(|e| match e {
        HttpClientError::Reqwest(e) => Error::from(*e),
        other => Error::OAuth2(format!("request failed: {}", other)),
    })?;

    let status = response.status().as_u16();
    if !is_retryable_status(status) {
        return Ok(response);
    }
    let (error, message) = token_error_fields(response.body());
    Err(Error::OAuth2Server {
        status: Some(status),
        error,
        message: if message.is_empty() {
            format!("token endpoint returned {}", status)
        } else {
            message
        },
    })
}

/// エラー応答の `error` と表示用メッセージ
fn token_error_fields(body: &[u8]) -> (String, String) {
    let payload: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let field = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);

    match (field("error"), field("error_description")) {
        (Some(error), Some(description)) => {
            let message = format!("{}: {}", error, description);
            (error, message)
        }
        (Some(error), None) => (error.clone(), error),
        _ => (String::new(), String::from_utf8_lossy(body).trim().to_string()),
    }
}

fn url_error(e: impl std::fmt::Display) -> Error {
    Error::OAuth2(format!("invalid endpoint url: {}", e))
}

fn client_id_short(client_id: &str) -> &str {
    client_id.split('.').next().unwrap_or_default()
}

/// トークンエンドポイントのレスポンスをトークンに変換
fn token_from_payload(payload: &Value, now: DateTime<Utc>) -> Token {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let expiry = payload
        .get("expires_in")
        .and_then(Value::as_i64)
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime));

    Token::new(
        text("access_token"),
        text("scope"),
        text("token_type"),
        text("refresh_token"),
        expiry,
    )
}

/// リフレッシュ結果に無い項目は元のトークンから引き継ぐ
fn merge_refreshed(previous: &Token, mut refreshed: Token) -> Token {
    if refreshed.refresh_token.is_none() {
        refreshed.refresh_token = previous.refresh_token.clone();
    }
    if refreshed.scope.is_none() {
        refreshed.scope = previous.scope.clone();
    }
    if refreshed.token_type.is_none() {
        refreshed.token_type = previous.token_type.clone();
    }
    refreshed
}
